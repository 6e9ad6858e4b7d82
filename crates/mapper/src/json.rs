//! JsonOutboundMessageMapper - message to JSON text

use contracts::Message;
use serde::Serialize;

use crate::error::MapperError;

/// Renders messages as compact JSON
///
/// By default the whole envelope is written:
/// `{"headers":{"id":..,"timestamp":..,"history":[..],..},"payload":..}`.
/// With payload extraction enabled only the payload is written.
#[derive(Debug, Clone, Default)]
pub struct JsonOutboundMessageMapper {
    should_extract_payload: bool,
}

impl JsonOutboundMessageMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write only the payload instead of the full envelope
    pub fn set_should_extract_payload(&mut self, extract: bool) {
        self.should_extract_payload = extract;
    }

    pub fn should_extract_payload(&self) -> bool {
        self.should_extract_payload
    }

    /// Map a message to JSON text
    ///
    /// Pure: the same message always maps to the same text.
    ///
    /// # Errors
    /// Returns [`MapperError::Serialization`] if the payload cannot be
    /// represented as JSON.
    pub fn to_text<T: Serialize>(&self, message: &Message<T>) -> Result<String, MapperError> {
        let text = if self.should_extract_payload {
            serde_json::to_string(message.payload())?
        } else {
            serde_json::to_string(message)?
        };
        Ok(text)
    }
}

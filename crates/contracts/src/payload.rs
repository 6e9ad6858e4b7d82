//! Payload - standard message body used across the engine

use bytes::Bytes;
use serde::Serialize;

/// Message payload
///
/// Raw bytes and text cover stream-style handlers; `Json` carries structured
/// values for mappers and transformers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// Raw byte sequence
    Bytes(Bytes),
    /// UTF-8 text
    Text(String),
    /// Structured value
    Json(serde_json::Value),
}

impl Payload {
    /// Short payload kind name (used for logging/errors)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "text",
            Self::Json(_) => "json",
        }
    }

    /// Byte view of the payload
    ///
    /// Text is viewed as its UTF-8 encoding. Structured values have no byte
    /// representation and return `None`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Text(text) => Some(text.as_bytes()),
            Self::Json(_) => None,
        }
    }

    /// Payload size in bytes (`None` for structured values)
    pub fn len(&self) -> Option<usize> {
        self.as_bytes().map(<[u8]>::len)
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<&'static [u8]> for Payload {
    fn from(value: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(value))
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

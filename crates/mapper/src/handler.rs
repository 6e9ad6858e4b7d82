//! MappingHandler - writes each message as one line of JSON

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use contracts::{HandlerError, Message, MessageHandler};
use serde::Serialize;
use tracing::trace;

use crate::json::JsonOutboundMessageMapper;

/// Handler that maps messages to JSON and writes them newline-delimited
pub struct MappingHandler<W> {
    name: String,
    mapper: JsonOutboundMessageMapper,
    writer: Mutex<W>,
}

impl<W: Write + Send> MappingHandler<W> {
    pub fn new(name: impl Into<String>, mapper: JsonOutboundMessageMapper, writer: W) -> Self {
        Self {
            name: name.into(),
            mapper,
            writer: Mutex::new(writer),
        }
    }

    pub fn mapper(&self) -> &JsonOutboundMessageMapper {
        &self.mapper
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, W> MessageHandler<T> for MappingHandler<W>
where
    T: Serialize + Send + Sync,
    W: Write + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, message: &Message<T>) -> Result<(), HandlerError> {
        let text = self
            .mapper
            .to_text(message)
            .map_err(|e| HandlerError::serialization(&self.name, e.to_string()))?;

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{text}")
            .and_then(|()| writer.flush())
            .map_err(|e| HandlerError::io(&self.name, e))?;

        trace!(handler = %self.name, message_id = %message.id(), len = text.len(), "Mapped");
        Ok(())
    }
}

//! LogHandler - logs message summary via tracing

use contracts::{HandlerError, Message, MessageHandler, Payload};
use tracing::info;

/// Handler that logs message summaries for debugging
pub struct LogHandler {
    name: String,
}

impl LogHandler {
    /// Create a new LogHandler with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl MessageHandler<Payload> for LogHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, message: &Message<Payload>) -> Result<(), HandlerError> {
        info!(
            handler = %self.name,
            message_id = %message.id(),
            timestamp = message.headers().timestamp(),
            kind = message.payload().kind(),
            size = ?message.payload().len(),
            history = message.history().len(),
            "Message received"
        );
        Ok(())
    }
}

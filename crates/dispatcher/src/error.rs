//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Source channel failed (closed) - fatal for the poll cycle
    #[error("channel error: {0}")]
    Channel(#[from] channel::ChannelError),

    /// Delivery failed while error propagation is enabled
    #[error("dispatch error: {0}")]
    Delivery(#[from] contracts::DispatchError),
}

impl DispatcherError {
    /// True if the source channel is closed
    pub fn is_channel_closed(&self) -> bool {
        matches!(self, Self::Channel(channel::ChannelError::Closed { .. }))
    }
}

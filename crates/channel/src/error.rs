//! Channel error types

use thiserror::Error;

/// Channel-specific errors
///
/// A timeout is not an error: `send` returns `Ok(false)` and `receive`
/// returns `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Channel closed; no further sends, and receives found nothing left to drain
    #[error("channel '{name}' is closed")]
    Closed { name: String },
}

impl ChannelError {
    /// Create a closed error
    pub fn closed(name: impl Into<String>) -> Self {
        Self::Closed { name: name.into() }
    }
}

//! Framing error types

use thiserror::Error;

/// Errors raised while framing or unframing socket traffic
#[derive(Error, Debug)]
pub enum FramingError {
    /// Underlying stream failure
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload contains the framing terminator
    #[error("payload cannot be framed as {format}: {message}")]
    InvalidPayload {
        format: &'static str,
        message: String,
    },

    /// Frame exceeds the configured (or representable) size
    #[error("frame of {size} bytes exceeds maximum of {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Stream ended inside a frame
    #[error("stream ended with {buffered} bytes of an incomplete frame")]
    UnexpectedEof { buffered: usize },

    /// Incoming bytes do not start a valid frame
    #[error("invalid frame: {message}")]
    InvalidFrame { message: String },

    /// Unknown format name
    #[error("unknown message format '{0}' (expected length_header, stx_etx or crlf)")]
    UnknownFormat(String),

    /// Structured payload could not be rendered
    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl FramingError {
    /// Create an invalid payload error
    pub fn invalid_payload(format: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            format,
            message: message.into(),
        }
    }

    /// Create an invalid frame error
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }
}

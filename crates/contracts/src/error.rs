//! Layered error definitions
//!
//! Categorized by source: config / handler / dispatch

use thiserror::Error;
use uuid::Uuid;

use crate::DeliveryFailure;

/// Unified configuration error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failure raised by a single handler while accepting one message
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Payload kind the handler cannot convert
    #[error("handler '{handler}' cannot accept {kind} payloads")]
    UnsupportedPayload { handler: String, kind: &'static str },

    /// Underlying sink or transport failed
    #[error("handler '{handler}' io error: {source}")]
    Io {
        handler: String,
        #[source]
        source: std::io::Error,
    },

    /// Handler declined the message (full downstream queue, failed transform, ...)
    #[error("handler '{handler}' rejected message: {message}")]
    Rejected { handler: String, message: String },

    /// Payload or headers could not be serialized
    #[error("handler '{handler}' serialization error: {message}")]
    Serialization { handler: String, message: String },
}

impl HandlerError {
    /// Create unsupported payload error
    pub fn unsupported_payload(handler: impl Into<String>, kind: &'static str) -> Self {
        Self::UnsupportedPayload {
            handler: handler.into(),
            kind,
        }
    }

    /// Create io error with handler context
    pub fn io(handler: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            handler: handler.into(),
            source,
        }
    }

    /// Create rejection error
    pub fn rejected(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            handler: handler.into(),
            message: message.into(),
        }
    }

    /// Create serialization error
    pub fn serialization(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            handler: handler.into(),
            message: message.into(),
        }
    }

    /// Short failure kind (used for metrics labels)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedPayload { .. } => "unsupported_payload",
            Self::Io { .. } => "io",
            Self::Rejected { .. } => "rejected",
            Self::Serialization { .. } => "serialization",
        }
    }
}

/// Dispatch strategy errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler accepted the message (or fail-fast stopped at the first failure)
    #[error("delivery of message {message_id} failed for {} handler(s)", failures.len())]
    Delivery {
        message_id: Uuid,
        failures: Vec<DeliveryFailure>,
    },
}

impl DispatchError {
    /// Create delivery error
    pub fn delivery(message_id: Uuid, failures: Vec<DeliveryFailure>) -> Self {
        Self::Delivery {
            message_id,
            failures,
        }
    }

    /// Failures recorded while dispatching
    pub fn failures(&self) -> &[DeliveryFailure] {
        match self {
            Self::Delivery { failures, .. } => failures,
        }
    }
}

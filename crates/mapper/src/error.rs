//! Mapper error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapperError {
    /// serde_json could not represent the message
    #[error("failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),
}

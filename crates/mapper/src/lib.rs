//! # Mapper
//!
//! Outbound message mapping: renders messages as JSON text, either the whole
//! envelope (headers + payload) or the payload alone.

pub mod error;
pub mod handler;
pub mod json;

pub use error::MapperError;
pub use handler::MappingHandler;
pub use json::JsonOutboundMessageMapper;

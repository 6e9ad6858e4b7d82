//! Handler implementations
//!
//! Contains ByteStreamHandler, LogHandler, and TransformingHandler.

mod log;
mod stream;
mod transform;

pub use self::log::LogHandler;
pub use self::stream::ByteStreamHandler;
pub use self::transform::TransformingHandler;

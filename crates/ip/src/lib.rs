//! # IP
//!
//! 套接字写出模块。
//!
//! 负责：
//! - 消息帧格式（长度头 / STX-ETX / CRLF）的编码与解码
//! - 基于 `AsyncWrite` 的 `SocketWriter`，每条消息一次完整写出
//! - 从分片或粘包的字节流中重组帧
//! - `SocketHandle`：把同步 handler 桥接到异步写出 worker

pub mod error;
pub mod format;
pub mod handle;
pub mod reader;
pub mod writer;

pub use error::FramingError;
pub use format::{payload_bytes, FrameDecoder, MessageFormat, DEFAULT_MAX_FRAME_SIZE};
pub use handle::{SocketHandle, SocketStats};
pub use reader::StreamSocketReader;
pub use writer::{LocalSocketWriter, SocketWriter, StreamSocketWriter};

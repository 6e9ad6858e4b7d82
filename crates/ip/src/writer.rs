//! SocketWriter trait and the stream-backed implementation

use std::net::SocketAddr;

use contracts::{Message, Payload};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, instrument, trace};

use crate::error::FramingError;
use crate::format::{payload_bytes, MessageFormat};

/// Writes framed messages to a socket
#[trait_variant::make(SocketWriter: Send)]
pub trait LocalSocketWriter {
    /// Framing currently applied
    fn message_format(&self) -> MessageFormat;

    /// Change the framing for subsequent writes
    fn set_message_format(&mut self, format: MessageFormat);

    /// Frame `bytes` and write the whole frame
    ///
    /// # Errors
    /// Framing errors leave the stream untouched; I/O failures surface as
    /// [`FramingError::Io`].
    async fn write(&mut self, bytes: &[u8]) -> Result<(), FramingError>;
}

/// [`SocketWriter`] over any async byte stream
///
/// Each frame is built in full and written with a single `write_all` followed
/// by `flush`. Nothing is buffered across calls.
pub struct StreamSocketWriter<W> {
    stream: W,
    format: MessageFormat,
}

impl StreamSocketWriter<TcpStream> {
    /// Connect a TCP writer
    #[instrument(name = "socket_writer_connect")]
    pub async fn connect(addr: SocketAddr, format: MessageFormat) -> Result<Self, FramingError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        debug!(%addr, %format, "Socket writer connected");
        Ok(Self::with_format(stream, format))
    }
}

impl<W: AsyncWrite + Unpin + Send> StreamSocketWriter<W> {
    /// Wrap a stream using the default length-header framing
    pub fn new(stream: W) -> Self {
        Self::with_format(stream, MessageFormat::default())
    }

    pub fn with_format(stream: W, format: MessageFormat) -> Self {
        Self { stream, format }
    }

    /// Frame and write a message's payload
    pub async fn write_message(&mut self, message: &Message<Payload>) -> Result<(), FramingError> {
        let bytes = payload_bytes(message.payload())?;
        SocketWriter::write(self, &bytes).await
    }

    /// Recover the underlying stream
    pub fn into_inner(self) -> W {
        self.stream
    }
}

impl<W: AsyncWrite + Unpin + Send> SocketWriter for StreamSocketWriter<W> {
    fn message_format(&self) -> MessageFormat {
        self.format
    }

    fn set_message_format(&mut self, format: MessageFormat) {
        self.format = format;
    }

    #[instrument(
        name = "socket_writer_write",
        skip(self, bytes),
        fields(format = %self.format, size = bytes.len())
    )]
    async fn write(&mut self, bytes: &[u8]) -> Result<(), FramingError> {
        let frame = self.format.encode(bytes)?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        trace!(frame_len = frame.len(), "Frame written");
        Ok(())
    }
}

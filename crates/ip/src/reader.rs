//! StreamSocketReader - reads framed messages from an async byte stream

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::error::FramingError;
use crate::format::{FrameDecoder, MessageFormat};

/// Reads complete frames regardless of how the peer's bytes were split
pub struct StreamSocketReader<R> {
    stream: R,
    decoder: FrameDecoder,
}

impl<R: AsyncRead + Unpin> StreamSocketReader<R> {
    pub fn new(stream: R, format: MessageFormat) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::new(format),
        }
    }

    /// Use a custom frame body bound
    pub fn with_max_frame_size(stream: R, format: MessageFormat, max_frame_size: usize) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::with_max_frame_size(format, max_frame_size),
        }
    }

    /// Read the next frame body
    ///
    /// Returns `Ok(None)` when the stream ends cleanly between frames.
    ///
    /// # Errors
    /// [`FramingError::UnexpectedEof`] if the stream ends mid-frame, plus any
    /// decoding or I/O error.
    pub async fn read_frame(&mut self) -> Result<Option<Bytes>, FramingError> {
        loop {
            if let Some(frame) = self.decoder.decode()? {
                trace!(size = frame.len(), "Frame read");
                return Ok(Some(frame));
            }

            if self.stream.read_buf(self.decoder.buffer_mut()).await? == 0 {
                self.decoder.finish()?;
                return Ok(None);
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.stream
    }
}

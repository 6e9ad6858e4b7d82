//! Message framing: encoding and incremental decoding

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use contracts::Payload;

use crate::error::FramingError;

const STX: u8 = 0x02;
const ETX: u8 = 0x03;
const CRLF: &[u8] = b"\r\n";
const LENGTH_HEADER_LEN: usize = 4;

/// Default bound on a decoded frame body (2 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 2 * 1024 * 1024;

/// Framing applied to each message written to a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    /// 4-byte big-endian length followed by the payload
    #[default]
    LengthHeader,
    /// `0x02` + payload + `0x03`
    StxEtx,
    /// Payload + `\r\n`
    Crlf,
}

impl MessageFormat {
    /// Config name of this format
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LengthHeader => "length_header",
            Self::StxEtx => "stx_etx",
            Self::Crlf => "crlf",
        }
    }

    /// Check that `payload` can be framed in this format
    ///
    /// # Errors
    /// - [`FramingError::InvalidPayload`] if a delimited payload contains its terminator
    /// - [`FramingError::FrameTooLarge`] if the length does not fit the header
    pub fn validate(&self, payload: &[u8]) -> Result<(), FramingError> {
        match self {
            Self::LengthHeader => {
                if u32::try_from(payload.len()).is_err() {
                    return Err(FramingError::FrameTooLarge {
                        size: payload.len(),
                        max: u32::MAX as usize,
                    });
                }
            }
            Self::StxEtx => {
                if payload.contains(&ETX) {
                    return Err(FramingError::invalid_payload(
                        self.as_str(),
                        "payload contains ETX (0x03)",
                    ));
                }
            }
            Self::Crlf => {
                if find(payload, CRLF).is_some() {
                    return Err(FramingError::invalid_payload(
                        self.as_str(),
                        "payload contains CRLF",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Build one complete frame around `payload`
    ///
    /// # Errors
    /// Same as [`MessageFormat::validate`].
    pub fn encode(&self, payload: &[u8]) -> Result<Bytes, FramingError> {
        self.validate(payload)?;
        let frame = match self {
            Self::LengthHeader => {
                let mut frame = BytesMut::with_capacity(LENGTH_HEADER_LEN + payload.len());
                // Length checked by validate
                frame.put_u32(payload.len() as u32);
                frame.put_slice(payload);
                frame
            }
            Self::StxEtx => {
                let mut frame = BytesMut::with_capacity(payload.len() + 2);
                frame.put_u8(STX);
                frame.put_slice(payload);
                frame.put_u8(ETX);
                frame
            }
            Self::Crlf => {
                let mut frame = BytesMut::with_capacity(payload.len() + CRLF.len());
                frame.put_slice(payload);
                frame.put_slice(CRLF);
                frame
            }
        };
        Ok(frame.freeze())
    }
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageFormat {
    type Err = FramingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "length_header" => Ok(Self::LengthHeader),
            "stx_etx" => Ok(Self::StxEtx),
            "crlf" => Ok(Self::Crlf),
            _ => Err(FramingError::UnknownFormat(s.to_string())),
        }
    }
}

/// Raw bytes of a payload as written to a socket
///
/// Text is UTF-8, bytes are verbatim and JSON is rendered compactly.
pub fn payload_bytes(payload: &Payload) -> Result<Bytes, FramingError> {
    match payload {
        Payload::Bytes(bytes) => Ok(bytes.clone()),
        Payload::Text(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
        Payload::Json(value) => Ok(Bytes::from(serde_json::to_vec(value)?)),
    }
}

/// Reassembles frames from arbitrarily split input
#[derive(Debug)]
pub struct FrameDecoder {
    format: MessageFormat,
    max_frame_size: usize,
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Create a decoder with [`DEFAULT_MAX_FRAME_SIZE`]
    pub fn new(format: MessageFormat) -> Self {
        Self::with_max_frame_size(format, DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a decoder with an explicit frame body bound
    pub fn with_max_frame_size(format: MessageFormat, max_frame_size: usize) -> Self {
        Self {
            format,
            max_frame_size,
            buffer: BytesMut::new(),
        }
    }

    pub fn format(&self) -> MessageFormat {
        self.format
    }

    /// Append received bytes
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Buffer for direct reads
    pub(crate) fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Bytes held that do not yet form a complete frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Take the next complete frame body, if one is buffered
    ///
    /// # Errors
    /// - [`FramingError::FrameTooLarge`] when a frame exceeds the bound
    /// - [`FramingError::InvalidFrame`] when STX/ETX input does not start with STX
    pub fn decode(&mut self) -> Result<Option<Bytes>, FramingError> {
        match self.format {
            MessageFormat::LengthHeader => self.decode_length_header(),
            MessageFormat::StxEtx => self.decode_stx_etx(),
            MessageFormat::Crlf => self.decode_crlf(),
        }
    }

    /// Check that the stream ended on a frame boundary
    ///
    /// # Errors
    /// Returns [`FramingError::UnexpectedEof`] if partial frame bytes remain.
    pub fn finish(&self) -> Result<(), FramingError> {
        if self.buffer.is_empty() {
            Ok(())
        } else {
            Err(FramingError::UnexpectedEof {
                buffered: self.buffer.len(),
            })
        }
    }

    fn decode_length_header(&mut self) -> Result<Option<Bytes>, FramingError> {
        if self.buffer.len() < LENGTH_HEADER_LEN {
            return Ok(None);
        }
        let mut header = [0u8; LENGTH_HEADER_LEN];
        header.copy_from_slice(&self.buffer[..LENGTH_HEADER_LEN]);
        let len = u32::from_be_bytes(header) as usize;
        self.check_size(len)?;

        if self.buffer.len() < LENGTH_HEADER_LEN + len {
            return Ok(None);
        }
        self.buffer.advance(LENGTH_HEADER_LEN);
        Ok(Some(self.buffer.split_to(len).freeze()))
    }

    fn decode_stx_etx(&mut self) -> Result<Option<Bytes>, FramingError> {
        let Some(&first) = self.buffer.first() else {
            return Ok(None);
        };
        if first != STX {
            return Err(FramingError::invalid_frame(format!(
                "expected STX (0x02), found 0x{first:02x}"
            )));
        }

        match self.buffer[1..].iter().position(|b| *b == ETX) {
            Some(end) => {
                self.check_size(end)?;
                self.buffer.advance(1);
                let body = self.buffer.split_to(end).freeze();
                self.buffer.advance(1);
                Ok(Some(body))
            }
            None => {
                self.check_size(self.buffer.len() - 1)?;
                Ok(None)
            }
        }
    }

    fn decode_crlf(&mut self) -> Result<Option<Bytes>, FramingError> {
        match find(&self.buffer, CRLF) {
            Some(end) => {
                self.check_size(end)?;
                let body = self.buffer.split_to(end).freeze();
                self.buffer.advance(CRLF.len());
                Ok(Some(body))
            }
            None => {
                // A trailing '\r' may be the first half of the terminator
                let pending = self.buffer.len().saturating_sub(1);
                self.check_size(pending)?;
                Ok(None)
            }
        }
    }

    fn check_size(&self, size: usize) -> Result<(), FramingError> {
        if size > self.max_frame_size {
            return Err(FramingError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

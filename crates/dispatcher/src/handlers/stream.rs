//! ByteStreamHandler - appends payload bytes to a writer

use std::borrow::Cow;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use contracts::{HandlerError, Message, MessageHandler, Payload};
use tracing::trace;

/// Handler that appends each payload to an underlying byte sink
///
/// Byte payloads are written verbatim and text payloads as UTF-8. Structured
/// payloads are rejected before anything is written. The handler only ever
/// appends: whatever else happens to the sink between messages (resets,
/// direct writes by its owner) is left alone.
pub struct ByteStreamHandler<W> {
    name: String,
    writer: Mutex<W>,
    append_newline: bool,
}

impl<W: Write + Send> ByteStreamHandler<W> {
    /// Create a handler writing to `writer`
    pub fn new(writer: W) -> Self {
        Self {
            name: "byte_stream".to_string(),
            writer: Mutex::new(writer),
            append_newline: false,
        }
    }

    /// Override the handler name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Write a `\n` after every payload
    pub fn with_append_newline(mut self, append_newline: bool) -> Self {
        self.append_newline = append_newline;
        self
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn append(&self, bytes: &[u8]) -> std::io::Result<()> {
        // Payload and newline go out in a single write
        let record = if self.append_newline {
            let mut line = Vec::with_capacity(bytes.len() + 1);
            line.extend_from_slice(bytes);
            line.push(b'\n');
            Cow::Owned(line)
        } else {
            Cow::Borrowed(bytes)
        };

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&record)?;
        writer.flush()
    }
}

impl<W: Write + Send> MessageHandler<Payload> for ByteStreamHandler<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, message: &Message<Payload>) -> Result<(), HandlerError> {
        let payload = message.payload();
        let bytes = payload
            .as_bytes()
            .ok_or_else(|| HandlerError::unsupported_payload(&self.name, payload.kind()))?;

        self.append(bytes)
            .map_err(|e| HandlerError::io(&self.name, e))?;

        trace!(handler = %self.name, message_id = %message.id(), bytes = bytes.len(), "Appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    /// Writer that fails on every call
    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Writer that takes the first write whole and fails every later one
    #[derive(Default)]
    struct OneWriteSink {
        data: Vec<u8>,
        writes: usize,
    }

    impl Write for OneWriteSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.writes += 1;
            if self.writes > 1 {
                return Err(std::io::Error::new(std::io::ErrorKind::WriteZero, "full"));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_single_byte_array() {
        let handler = ByteStreamHandler::new(Vec::new());
        handler
            .handle(&Message::new(Payload::from(vec![1u8, 2, 3])))
            .unwrap();
        assert_eq!(handler.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn test_single_string() {
        let handler = ByteStreamHandler::new(Vec::new());
        handler.handle(&Message::new(Payload::from("foo"))).unwrap();
        let result = handler.into_inner();
        assert_eq!(result.len(), 3);
        assert_eq!(String::from_utf8(result).unwrap(), "foo");
    }

    #[test]
    fn test_structured_payload_rejected_without_writing() {
        let handler = ByteStreamHandler::new(Vec::new()).with_name("bytes");
        handler.handle(&Message::new(Payload::from("a"))).unwrap();

        let err = handler
            .handle(&Message::new(Payload::from(serde_json::json!({"k": "v"}))))
            .unwrap_err();
        assert!(matches!(
            err,
            HandlerError::UnsupportedPayload { kind: "json", .. }
        ));
        assert_eq!(handler.into_inner(), b"a".to_vec());
    }

    #[test]
    fn test_append_newline() {
        let handler = ByteStreamHandler::new(Vec::new()).with_append_newline(true);
        handler.handle(&Message::new(Payload::from("one"))).unwrap();
        handler.handle(&Message::new(Payload::from("two"))).unwrap();
        assert_eq!(handler.into_inner(), b"one\ntwo\n".to_vec());
    }

    #[test]
    fn test_newline_written_with_payload() {
        let handler = ByteStreamHandler::new(OneWriteSink::default()).with_append_newline(true);
        handler.handle(&Message::new(Payload::from("one"))).unwrap();

        let err = handler
            .handle(&Message::new(Payload::from("two")))
            .unwrap_err();
        assert!(matches!(err, HandlerError::Io { .. }));

        let sink = handler.into_inner();
        assert_eq!(sink.writes, 2);
        assert_eq!(sink.data, b"one\n".to_vec());
    }

    #[test]
    fn test_io_failure_surfaces() {
        let handler = ByteStreamHandler::new(BrokenWriter);
        let err = handler
            .handle(&Message::new(Payload::from(vec![1u8])))
            .unwrap_err();
        assert!(matches!(err, HandlerError::Io { .. }));
    }

    #[test]
    fn test_file_sink_accumulates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let file = fs::File::create(&path).unwrap();

        let handler = ByteStreamHandler::new(file);
        for chunk in [vec![1u8, 2, 3], vec![4, 5, 6], vec![7, 8, 9]] {
            handler.handle(&Message::new(Payload::from(chunk))).unwrap();
        }
        drop(handler);

        assert_eq!(fs::read(&path).unwrap(), (1..=9).collect::<Vec<u8>>());
    }
}

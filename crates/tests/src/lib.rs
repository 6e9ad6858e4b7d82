//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 通道 -> 轮询器 -> handler 的端到端场景
//! - 配置到运行管道的装配

#[cfg(test)]
mod support {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    /// In-memory sink that the test can inspect, reset and write to directly
    #[derive(Clone, Default)]
    pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }

        pub fn reset(&self) {
            self.0.lock().unwrap().clear();
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod contract_tests {
    use contracts::{Message, MessageBuilder, Payload, Timeout};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(Timeout::from_millis(-1), Timeout::Indefinite);
    }

    #[test]
    fn test_message_json_shape() {
        let message = MessageBuilder::with_payload(Payload::from("x"))
            .header("source", "stdin")
            .build();
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["headers"]["id"], message.id().to_string());
        assert_eq!(value["headers"]["source"], "stdin");
        assert!(value["headers"]["timestamp"].is_i64());
        assert_eq!(value["payload"], "x");

        let plain = Message::new(Payload::from(vec![1u8]));
        assert_ne!(plain.id(), message.id());
    }
}

#[cfg(test)]
mod byte_stream_tests {
    use std::io::Write;
    use std::sync::Arc;

    use channel::QueueChannel;
    use contracts::{Message, MessageHandler, Payload, Timeout};
    use dispatcher::{BroadcastingDispatcher, ByteStreamHandler, PollingDispatcher};

    use crate::support::SharedBuffer;

    /// Channel holding `[1,2,3]`, `[4,5,6]`, `[7,8,9]` and a poller
    /// delivering them to a byte stream over `buffer`
    fn setup(buffer: &SharedBuffer, max_per_poll: i64) -> PollingDispatcher<Payload> {
        let channel = Arc::new(QueueChannel::named("bytes", 10));
        for chunk in [[1u8, 2, 3], [4, 5, 6], [7, 8, 9]] {
            assert!(channel.try_send(Message::new(Payload::from(chunk.to_vec()))).unwrap());
        }

        let mut poller = PollingDispatcher::new(
            channel,
            Arc::new(BroadcastingDispatcher::<Payload>::new()),
        );
        poller.set_max_messages_per_poll(max_per_poll);
        poller.set_receive_timeout(Timeout::Immediate);
        let handler: Arc<dyn MessageHandler<Payload>> =
            Arc::new(ByteStreamHandler::new(buffer.clone()).with_name("bytes-out"));
        assert!(poller.subscribe(handler));
        poller
    }

    #[tokio::test]
    async fn test_three_polls_write_all_bytes() {
        let buffer = SharedBuffer::default();
        let poller = setup(&buffer, 1);

        for _ in 0..3 {
            assert_eq!(poller.run().await.unwrap().delivered, 1);
        }
        assert_eq!(buffer.contents(), (1..=9).collect::<Vec<u8>>());
        assert!(poller.run().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sink_reset_between_polls() {
        let buffer = SharedBuffer::default();
        let poller = setup(&buffer, 1);

        poller.run().await.unwrap();
        assert_eq!(buffer.contents(), vec![1, 2, 3]);
        buffer.reset();

        poller.run().await.unwrap();
        poller.run().await.unwrap();
        assert_eq!(buffer.contents(), vec![4, 5, 6, 7, 8, 9]);
    }

    #[tokio::test]
    async fn test_external_write_between_polls() {
        let buffer = SharedBuffer::default();
        let poller = setup(&buffer, 2);

        assert_eq!(poller.run().await.unwrap().delivered, 2);
        buffer.clone().write_all(&[123]).unwrap();
        assert_eq!(poller.run().await.unwrap().delivered, 1);

        assert_eq!(buffer.contents(), vec![1, 2, 3, 4, 5, 6, 123, 7, 8, 9]);
    }
    #[tokio::test]
    async fn test_single_poll_takes_all_chunks() {
        let buffer = SharedBuffer::default();
        let poller = setup(&buffer, 3);

        assert_eq!(poller.run().await.unwrap().delivered, 3);
        assert_eq!(buffer.contents(), (1..=9).collect::<Vec<u8>>());
    }

    #[tokio::test]
    async fn test_reset_after_two_message_poll() {
        let buffer = SharedBuffer::default();
        let poller = setup(&buffer, 2);

        assert_eq!(poller.run().await.unwrap().delivered, 2);
        assert_eq!(buffer.contents(), vec![1, 2, 3, 4, 5, 6]);
        buffer.reset();

        assert_eq!(poller.run().await.unwrap().delivered, 1);
        assert_eq!(buffer.contents(), vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn test_poll_limit_above_queue_depth() {
        let buffer = SharedBuffer::default();
        let poller = setup(&buffer, 5);

        assert_eq!(poller.run().await.unwrap().delivered, 3);
        assert!(poller.run().await.unwrap().is_empty());
        assert_eq!(buffer.contents().len(), 9);
        assert_eq!(buffer.contents(), (1..=9).collect::<Vec<u8>>());
    }
}

#[cfg(test)]
mod mapper_tests {
    use std::sync::Arc;

    use channel::QueueChannel;
    use contracts::{Message, MessageHandler, Payload, Timeout};
    use dispatcher::{PollingDispatcher, RoundRobinDispatcher, TransformingHandler};
    use mapper::{JsonOutboundMessageMapper, MappingHandler};

    use crate::support::SharedBuffer;

    /// input -> upper-case transformer -> output -> JSON mapper
    #[tokio::test]
    async fn test_history_survives_transform_and_mapping() {
        let input = Arc::new(QueueChannel::<Payload>::named("input", 10));
        let output = Arc::new(QueueChannel::<Payload>::named("output", 10));
        for text in ["a", "b"] {
            input.try_send(Message::new(Payload::from(text))).unwrap();
        }

        let upper: Arc<dyn MessageHandler<Payload>> = Arc::new(TransformingHandler::new(
            "upper",
            Arc::clone(&output),
            |payload: &Payload| match payload {
                Payload::Text(text) => Ok(Payload::from(text.to_uppercase())),
                other => Err(format!("unexpected {}", other.kind())),
            },
        ));
        let mut first = PollingDispatcher::new(
            Arc::clone(&input),
            Arc::new(RoundRobinDispatcher::<Payload>::new()),
        );
        first.set_receive_timeout(Timeout::Immediate);
        first.subscribe(upper);
        assert_eq!(first.run().await.unwrap().delivered, 2);

        let buffer = SharedBuffer::default();
        let json: Arc<dyn MessageHandler<Payload>> = Arc::new(MappingHandler::new(
            "json",
            JsonOutboundMessageMapper::new(),
            buffer.clone(),
        ));
        let mut second = PollingDispatcher::new(
            Arc::clone(&output),
            Arc::new(RoundRobinDispatcher::<Payload>::new()),
        );
        second.set_receive_timeout(Timeout::Immediate);
        second.subscribe(json);
        assert_eq!(second.run().await.unwrap().delivered, 2);

        let text = String::from_utf8(buffer.contents()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["payload"], "A");
        assert_eq!(lines[1]["payload"], "B");
        assert_eq!(lines[0]["headers"]["history"][0]["name"], "upper");
        assert_eq!(lines[0]["headers"]["history"][0]["type"], "transformer");
    }
}

#[cfg(test)]
mod socket_tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use channel::QueueChannel;
    use contracts::{Message, MessageHandler, Payload, Timeout};
    use dispatcher::{BroadcastingDispatcher, PollingDispatcher};
    use ip::{MessageFormat, SocketHandle, StreamSocketReader, StreamSocketWriter};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_poller_to_tcp_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = StreamSocketReader::new(stream, MessageFormat::LengthHeader);
            let mut frames = Vec::new();
            while let Some(frame) = reader.read_frame().await.unwrap() {
                frames.push(frame);
            }
            frames
        });

        let writer = StreamSocketWriter::connect(addr, MessageFormat::LengthHeader)
            .await
            .unwrap();
        let socket = Arc::new(SocketHandle::spawn("tcp-out", writer, 16));

        let channel = Arc::new(QueueChannel::<Payload>::named("input", 10));
        channel.try_send(Message::new(Payload::from("hello"))).unwrap();
        channel.try_send(Message::new(Payload::from(vec![0u8, 1, 2]))).unwrap();

        let mut poller = PollingDispatcher::new(
            Arc::clone(&channel),
            Arc::new(BroadcastingDispatcher::<Payload>::new()),
        );
        poller.set_receive_timeout(Timeout::Immediate);
        let handler: Arc<dyn MessageHandler<Payload>> = socket.clone();
        poller.subscribe(handler);
        assert_eq!(poller.run().await.unwrap().delivered, 2);

        let stats = socket.shutdown().await;
        assert_eq!(stats.written, 2);

        let frames = accept.await.unwrap();
        assert_eq!(frames, vec![Bytes::from("hello"), Bytes::from(vec![0u8, 1, 2])]);
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{DispatchStrategy, HandlerType, Timeout};

    #[test]
    fn test_full_config_round_trip() {
        let toml = r#"
version = "V1"

[channel]
name = "orders"
capacity = 50

[poller]
max_messages_per_poll = 10
receive_timeout_ms = -1
interval_ms = 0
propagate_errors = true

[dispatch]
strategy = "round_robin"

[[handlers]]
name = "primary"
handler_type = "socket"
params = { addr = "127.0.0.1:7000", format = "crlf" }

[[handlers]]
name = "audit"
handler_type = "json"
params = { target = "stderr", extract_payload = "true" }
"#;
        let blueprint = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.channel.name, "orders");
        assert_eq!(blueprint.poller.receive_timeout(), Timeout::Indefinite);
        assert_eq!(blueprint.dispatch.strategy, DispatchStrategy::RoundRobin);
        assert_eq!(blueprint.handlers[0].handler_type, HandlerType::Socket);

        let json = ConfigLoader::to_json(&blueprint).unwrap();
        let reparsed = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(reparsed.handlers.len(), 2);
        assert_eq!(reparsed.poller.max_messages_per_poll, 10);
    }
}

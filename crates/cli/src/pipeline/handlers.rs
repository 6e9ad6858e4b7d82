//! Handler construction from `HandlerConfig`.

use std::fs::OpenOptions;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use contracts::{HandlerConfig, HandlerError, HandlerType, Message, MessageHandler, Payload};
use dispatcher::{ByteStreamHandler, LogHandler};
use ip::{MessageFormat, SocketHandle, StreamSocketWriter};
use mapper::{JsonOutboundMessageMapper, MappingHandler};
use observability::PollStatsAggregator;
use tracing::info;

/// Queue depth of a socket handler when `queue_capacity` is not set
const DEFAULT_SOCKET_QUEUE: usize = 1024;

type Output = Box<dyn Write + Send>;

/// Handlers built for one pipeline run
#[derive(Default)]
pub struct BuiltHandlers {
    /// Handlers to subscribe, in configuration order
    pub handlers: Vec<Arc<dyn MessageHandler<Payload>>>,
    /// Socket handles that need an async shutdown
    pub sockets: Vec<Arc<SocketHandle>>,
}

/// Build every configured handler, wrapping each to record failures
pub async fn build_handlers(
    configs: &[HandlerConfig],
    stats: &Arc<Mutex<PollStatsAggregator>>,
) -> Result<BuiltHandlers> {
    let mut built = BuiltHandlers::default();

    for config in configs {
        let handler: Arc<dyn MessageHandler<Payload>> = match config.handler_type {
            HandlerType::Stream => {
                let append_newline = bool_param(config, "append_newline", true)?;
                Arc::new(
                    ByteStreamHandler::new(open_target(config)?)
                        .with_name(&config.name)
                        .with_append_newline(append_newline),
                )
            }
            HandlerType::Log => Arc::new(LogHandler::new(&config.name)),
            HandlerType::Json => {
                let mut mapper = JsonOutboundMessageMapper::new();
                mapper.set_should_extract_payload(bool_param(config, "extract_payload", false)?);
                Arc::new(MappingHandler::new(&config.name, mapper, open_target(config)?))
            }
            HandlerType::Socket => {
                let socket = Arc::new(connect_socket(config).await?);
                built.sockets.push(Arc::clone(&socket));
                socket
            }
        };

        info!(handler = %config.name, handler_type = ?config.handler_type, "Handler created");
        built.handlers.push(Arc::new(TrackedHandler {
            inner: handler,
            stats: Arc::clone(stats),
        }));
    }

    Ok(built)
}

/// Counts failures of the wrapped handler
struct TrackedHandler {
    inner: Arc<dyn MessageHandler<Payload>>,
    stats: Arc<Mutex<PollStatsAggregator>>,
}

impl MessageHandler<Payload> for TrackedHandler {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn handle(&self, message: &Message<Payload>) -> Result<(), HandlerError> {
        self.inner.handle(message).inspect_err(|_| {
            self.stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record_handler_failure(self.inner.name());
        })
    }
}

async fn connect_socket(config: &HandlerConfig) -> Result<SocketHandle> {
    let addr: SocketAddr = config
        .params
        .get("addr")
        .with_context(|| format!("handler '{}' has no 'addr'", config.name))?
        .parse()
        .with_context(|| format!("handler '{}' has an invalid 'addr'", config.name))?;

    let format = match config.params.get("format") {
        Some(format) => format.parse::<MessageFormat>()?,
        None => MessageFormat::default(),
    };

    let queue_capacity = match config.params.get("queue_capacity") {
        Some(capacity) => capacity
            .parse()
            .with_context(|| format!("handler '{}' has an invalid 'queue_capacity'", config.name))?,
        None => DEFAULT_SOCKET_QUEUE,
    };

    let writer = StreamSocketWriter::connect(addr, format)
        .await
        .with_context(|| format!("Failed to connect handler '{}' to {addr}", config.name))?;

    info!(handler = %config.name, %addr, %format, queue_capacity, "Socket connected");
    Ok(SocketHandle::spawn(&config.name, writer, queue_capacity))
}

/// Open the `target` of a stream or json handler
fn open_target(config: &HandlerConfig) -> Result<Output> {
    let target = config.params.get("target").map_or("stdout", String::as_str);
    match target {
        "stdout" => Ok(Box::new(std::io::stdout())),
        "stderr" => Ok(Box::new(std::io::stderr())),
        "file" => {
            let path = config
                .params
                .get("path")
                .with_context(|| format!("handler '{}' has no 'path'", config.name))?;
            open_append(Path::new(path))
        }
        other => anyhow::bail!("handler '{}' has unknown target '{other}'", config.name),
    }
}

fn open_append(path: &Path) -> Result<Output> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(file))
}

fn bool_param(config: &HandlerConfig, key: &str, default: bool) -> Result<bool> {
    config.params.get(key).map_or(Ok(default), |value| {
        value
            .parse()
            .with_context(|| format!("handler '{}' has an invalid '{key}'", config.name))
    })
}

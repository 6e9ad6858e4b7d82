//! SocketHandle - bridges synchronous handlers to an async socket writer

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use contracts::{HandlerError, Message, MessageHandler, Payload};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::format::{payload_bytes, MessageFormat};
use crate::writer::SocketWriter;

/// Counters for one socket worker
#[derive(Debug, Default)]
struct SocketCounters {
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of socket worker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SocketStats {
    /// Frames written
    pub written: u64,
    /// Frames the writer failed on
    pub failed: u64,
    /// Messages refused because the queue was full or the worker had stopped
    pub dropped: u64,
}

/// Handle to a socket writer running on its own task
///
/// `handle` checks that the payload can be framed, then only enqueues the
/// bytes, so the dispatching poller never waits on the network. Unframeable
/// payloads and a full queue reject the message.
pub struct SocketHandle {
    name: String,
    format: MessageFormat,
    tx: Mutex<Option<mpsc::Sender<Bytes>>>,
    counters: Arc<SocketCounters>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SocketHandle {
    /// Spawn the worker task that owns `writer`
    pub fn spawn<W: SocketWriter + 'static>(
        name: impl Into<String>,
        writer: W,
        queue_capacity: usize,
    ) -> Self {
        let name = name.into();
        let format = writer.message_format();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let counters = Arc::new(SocketCounters::default());

        let worker_counters = Arc::clone(&counters);
        let worker_name = name.clone();
        let worker_handle = tokio::spawn(async move {
            socket_worker(writer, rx, worker_counters, worker_name).await;
        });

        Self {
            name,
            format,
            tx: Mutex::new(Some(tx)),
            counters,
            worker_handle: Mutex::new(Some(worker_handle)),
        }
    }

    /// Framing applied by the worker
    pub fn message_format(&self) -> MessageFormat {
        self.format
    }

    pub fn stats(&self) -> SocketStats {
        SocketStats {
            written: self.counters.written.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting messages, drain the queue and wait for the worker
    #[instrument(name = "socket_handle_shutdown", skip(self), fields(socket = %self.name))]
    pub async fn shutdown(&self) -> SocketStats {
        drop(self.tx.lock().unwrap_or_else(PoisonError::into_inner).take());

        let worker = self
            .worker_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(socket = %self.name, error = ?e, "Worker task panicked");
            }
        }
        debug!(socket = %self.name, "SocketHandle shutdown complete");
        self.stats()
    }

    fn reject(&self, reason: &str) -> HandlerError {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        HandlerError::rejected(&self.name, reason)
    }
}

impl MessageHandler<Payload> for SocketHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, message: &Message<Payload>) -> Result<(), HandlerError> {
        let bytes = payload_bytes(message.payload())
            .map_err(|e| HandlerError::serialization(&self.name, e.to_string()))?;
        self.format
            .validate(&bytes)
            .map_err(|e| HandlerError::rejected(&self.name, e.to_string()))?;

        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return Err(self.reject("socket handle is shut down"));
        };

        match tx.try_send(bytes) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(socket = %self.name, message_id = %message.id(), "Queue full, message dropped");
                Err(self.reject("socket queue full"))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(socket = %self.name, "Socket worker closed unexpectedly");
                Err(self.reject("socket worker stopped"))
            }
        }
    }
}

/// Worker task that owns the writer and writes queued payloads
#[instrument(name = "socket_worker_loop", skip(writer, rx, counters), fields(socket = %name))]
async fn socket_worker<W: SocketWriter>(
    mut writer: W,
    mut rx: mpsc::Receiver<Bytes>,
    counters: Arc<SocketCounters>,
    name: String,
) {
    debug!(format = %writer.message_format(), "Socket worker started");

    while let Some(bytes) = rx.recv().await {
        match writer.write(&bytes).await {
            Ok(()) => {
                counters.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(size = bytes.len(), error = %e, "Socket write failed");
            }
        }
    }

    debug!("Socket worker stopped");
}

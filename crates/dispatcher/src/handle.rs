//! PollerHandle - controls a spawned polling task

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

use crate::metrics::{MetricsSnapshot, PollerMetrics};

/// Handle to a running poller task
///
/// Dropping the handle signals the task to stop after its current cycle.
pub struct PollerHandle {
    /// Poller name
    name: String,
    /// Shutdown signal
    shutdown_tx: watch::Sender<bool>,
    /// Shared metrics
    metrics: Arc<PollerMetrics>,
    /// Poller task handle
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub(crate) fn new(
        name: String,
        shutdown_tx: watch::Sender<bool>,
        metrics: Arc<PollerMetrics>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            shutdown_tx,
            metrics,
            task,
        }
    }

    /// Get poller name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<PollerMetrics> {
        &self.metrics
    }

    /// True once the poller task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the poller and wait for it to exit
    #[instrument(name = "poller_handle_shutdown", skip(self), fields(poller = %self.name))]
    pub async fn shutdown(self) -> MetricsSnapshot {
        // Receiver may already be gone if the poller stopped on its own
        let _ = self.shutdown_tx.send(true);
        self.join().await
    }

    /// Wait for the poller to exit on its own (e.g. its channel was closed)
    pub async fn join(self) -> MetricsSnapshot {
        let Self {
            name,
            shutdown_tx,
            metrics,
            task,
        } = self;

        if let Err(e) = task.await {
            error!(poller = %name, error = ?e, "Poller task panicked");
        }
        drop(shutdown_tx);
        debug!(poller = %name, "PollerHandle shutdown complete");
        metrics.snapshot()
    }
}

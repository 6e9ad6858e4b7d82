//! Pipeline orchestrator - coordinates all components.
//!
//! Input lines flow into a `QueueChannel`, a `PollingDispatcher` drains it on
//! a fixed schedule and fans messages out to the configured handlers.

use std::fs::File;
use std::future::Future;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::{Context, Result};
use channel::QueueChannel;
use contracts::{
    DispatchStrategy, MessageBuilder, MessageDispatcher, MessageHandler, Payload,
    PipelineBlueprint, Timeout,
};
use dispatcher::{BroadcastingDispatcher, PollingDispatcher, PollingSchedule, RoundRobinDispatcher};
use observability::PollStatsAggregator;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::handlers::build_handlers;
use super::PipelineStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The pipeline blueprint
    pub blueprint: PipelineBlueprint,

    /// Input file (None = stdin)
    pub input: Option<PathBuf>,

    /// Maximum number of input messages (None = unlimited)
    pub limit: Option<u64>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the input is exhausted or `shutdown` resolves
    ///
    /// On end of input the channel is closed and drained before returning.
    /// On shutdown the poller stops after its current cycle and whatever is
    /// still queued is discarded.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let channel = Arc::new(QueueChannel::<Payload>::named(
            &blueprint.channel.name,
            blueprint.channel.capacity,
        ));
        let poll_stats = Arc::new(Mutex::new(PollStatsAggregator::new()));

        let built = build_handlers(&blueprint.handlers, &poll_stats).await?;
        let active_handlers = built.handlers.len();

        let strategy: Arc<dyn MessageDispatcher<Payload>> = match blueprint.dispatch.strategy {
            DispatchStrategy::Broadcast => Arc::new(
                BroadcastingDispatcher::new().with_fail_fast(blueprint.dispatch.fail_fast),
            ),
            DispatchStrategy::RoundRobin => Arc::new(RoundRobinDispatcher::new()),
        };

        let hook_stats = Arc::clone(&poll_stats);
        let hook_channel = Arc::clone(&channel);
        let mut poller = PollingDispatcher::new(Arc::clone(&channel), strategy)
            .with_name(format!("{}-poller", blueprint.channel.name))
            .on_cycle(move |outcome, elapsed| {
                let mut stats = hook_stats.lock().unwrap_or_else(PoisonError::into_inner);
                stats.update(outcome, elapsed.as_secs_f64() * 1000.0);
                stats.record_depth(hook_channel.len());
            });
        poller.set_max_messages_per_poll(blueprint.poller.max_messages_per_poll);
        poller.set_receive_timeout(blueprint.poller.receive_timeout());
        poller.set_propagate_errors(blueprint.poller.propagate_errors);
        for handler in built.handlers {
            poller.subscribe(handler);
        }

        let poller_handle = poller.spawn(PollingSchedule::new(blueprint.poller.interval()));
        info!(
            channel = %channel.name(),
            capacity = channel.capacity(),
            strategy = ?blueprint.dispatch.strategy,
            active_handlers,
            "Poller started"
        );

        let messages_sent = Arc::new(AtomicU64::new(0));
        let mut input_done = spawn_input_reader(
            self.config.input.clone(),
            Arc::clone(&channel),
            self.config.limit,
            Arc::clone(&messages_sent),
        )?;

        tokio::pin!(shutdown);
        let interrupted = tokio::select! {
            _ = &mut input_done => false,
            _ = &mut shutdown => true,
        };

        info!(interrupted, "Shutting down pipeline...");
        let poller_snapshot = if interrupted {
            let snapshot = poller_handle.shutdown().await;
            channel.close();
            let discarded = channel.clear().len();
            if discarded > 0 {
                warn!(discarded, "Queued messages discarded on shutdown");
            }
            snapshot
        } else {
            // The poller drains what is left and stops once the channel is empty
            channel.close();
            poller_handle.join().await
        };

        let mut sockets = Vec::with_capacity(built.sockets.len());
        for socket in &built.sockets {
            let stats = socket.shutdown().await;
            sockets.push((socket.name().to_string(), stats));
        }

        let poll_metrics = poll_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let stats = PipelineStats {
            messages_sent: messages_sent.load(Ordering::Relaxed),
            duration: start_time.elapsed(),
            interrupted,
            active_handlers,
            poller: poller_snapshot,
            poll_metrics,
            sockets,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            throughput = format!("{:.2}", stats.throughput()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

/// Read input lines on a dedicated thread
///
/// Blocking reads (stdin in particular) must not hold up runtime shutdown, so
/// the reader is a plain thread that hands messages to the channel through
/// the runtime handle. The returned receiver resolves when input ends.
fn spawn_input_reader(
    input: Option<PathBuf>,
    channel: Arc<QueueChannel<Payload>>,
    limit: Option<u64>,
    sent: Arc<AtomicU64>,
) -> Result<oneshot::Receiver<()>> {
    let (source, reader): (String, Box<dyn BufRead + Send>) = match input {
        Some(path) => {
            let file = File::open(&path)
                .with_context(|| format!("Failed to open input {}", path.display()))?;
            (path.display().to_string(), Box::new(BufReader::new(file)))
        }
        None => ("stdin".to_string(), Box::new(BufReader::new(std::io::stdin()))),
    };

    let runtime = Handle::current();
    let (done_tx, done_rx) = oneshot::channel();

    std::thread::Builder::new()
        .name("input-reader".to_string())
        .spawn(move || {
            read_lines(reader, &source, &channel, limit, &sent, &runtime);
            // Receiver is gone if the pipeline was interrupted
            let _ = done_tx.send(());
        })
        .context("Failed to spawn input reader thread")?;

    Ok(done_rx)
}

fn read_lines(
    reader: Box<dyn BufRead + Send>,
    source: &str,
    channel: &QueueChannel<Payload>,
    limit: Option<u64>,
    sent: &AtomicU64,
    runtime: &Handle,
) {
    info!(source, limit = ?limit, "Input reader started");

    for (index, line) in reader.lines().enumerate() {
        if limit.is_some_and(|limit| sent.load(Ordering::Relaxed) >= limit) {
            info!(limit = ?limit, "Reached input limit");
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(source, error = %e, "Input read failed");
                break;
            }
        };

        let message = MessageBuilder::with_payload(Payload::from(line))
            .header("source", source)
            .header("line", index as u64 + 1)
            .build();

        match runtime.block_on(channel.send(message, Timeout::Indefinite)) {
            Ok(true) => {
                sent.fetch_add(1, Ordering::Relaxed);
            }
            Ok(false) => warn!(source, line = index + 1, "Channel refused message"),
            Err(e) => {
                debug!(error = %e, "Channel closed, input reader stopping");
                break;
            }
        }
    }

    info!(source, sent = sent.load(Ordering::Relaxed), "Input reader finished");
}

//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use ip::SocketStats;
use observability::PollStatsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Messages the input reader put on the channel
    pub messages_sent: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// True if the run was stopped by a shutdown signal
    pub interrupted: bool,

    /// Number of subscribed handlers
    pub active_handlers: usize,

    /// Poller counters at shutdown
    pub poller: MetricsSnapshot,

    /// Per-cycle aggregates
    pub poll_metrics: PollStatsAggregator,

    /// Final counters of each socket handler
    pub sockets: Vec<(String, SocketStats)>,
}

impl PipelineStats {
    /// Delivered messages per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.poller.delivered_count as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Pipeline Statistics                      ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Messages sent: {}", self.messages_sent);
        println!("   ├─ Throughput: {:.2} msg/s", self.throughput());
        println!("   ├─ Active handlers: {}", self.active_handlers);
        println!("   └─ Interrupted: {}", self.interrupted);

        let summary = self.poll_metrics.summary();

        println!("\n📈 Poller");
        println!(
            "   ├─ Poll cycles: {} ({} empty, {:.2}%)",
            summary.total_cycles, summary.empty_cycles, summary.empty_rate
        );
        println!("   ├─ Received: {}", self.poller.received_count);
        println!("   ├─ Delivered: {}", self.poller.delivered_count);
        println!("   ├─ Undelivered: {}", self.poller.undelivered_count);
        println!(
            "   ├─ Failed: {} ({:.2}%)",
            self.poller.failure_count, summary.failure_rate
        );
        println!("   ├─ Batch size: {}", summary.batch_size);
        println!("   ├─ Cycle time (ms): {}", summary.cycle_ms);
        println!("   └─ Channel depth: {}", summary.channel_depth);

        if !summary.handler_failures.is_empty() {
            println!("\n⚠️  Handler Failures");
            let mut failures: Vec<_> = summary.handler_failures.iter().collect();
            failures.sort();
            for (handler, count) in failures {
                println!("   ├─ {}: {}", handler, count);
            }
        }

        if !self.sockets.is_empty() {
            println!("\n🔌 Sockets");
            for (name, stats) in &self.sockets {
                println!(
                    "   ├─ {}: {} written, {} failed, {} dropped",
                    name, stats.written, stats.failed, stats.dropped
                );
            }
        }

        println!();
    }
}

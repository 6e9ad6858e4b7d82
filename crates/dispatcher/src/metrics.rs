//! Poller metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::PollOutcome;
use serde::Serialize;

/// Metrics for a single polling dispatcher
#[derive(Debug, Default)]
pub struct PollerMetrics {
    /// Completed poll cycles
    poll_count: AtomicU64,
    /// Messages taken from the channel
    received_count: AtomicU64,
    /// Messages accepted by at least one handler
    delivered_count: AtomicU64,
    /// Messages received with no subscribed handler
    undelivered_count: AtomicU64,
    /// Messages whose dispatch failed
    failure_count: AtomicU64,
}

impl PollerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one poll cycle into the counters
    pub fn record(&self, outcome: &PollOutcome) {
        self.poll_count.fetch_add(1, Ordering::Relaxed);
        self.received_count
            .fetch_add(outcome.received as u64, Ordering::Relaxed);
        self.delivered_count
            .fetch_add(outcome.delivered as u64, Ordering::Relaxed);
        self.undelivered_count
            .fetch_add(outcome.undelivered as u64, Ordering::Relaxed);
        self.failure_count
            .fetch_add(outcome.failed as u64, Ordering::Relaxed);
    }

    /// Get poll cycle count
    pub fn poll_count(&self) -> u64 {
        self.poll_count.load(Ordering::Relaxed)
    }

    /// Get received count
    pub fn received_count(&self) -> u64 {
        self.received_count.load(Ordering::Relaxed)
    }

    /// Get delivered count
    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    /// Get undelivered count
    pub fn undelivered_count(&self) -> u64 {
        self.undelivered_count.load(Ordering::Relaxed)
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            poll_count: self.poll_count(),
            received_count: self.received_count(),
            delivered_count: self.delivered_count(),
            undelivered_count: self.undelivered_count(),
            failure_count: self.failure_count(),
        }
    }
}

/// Snapshot of poller metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub poll_count: u64,
    pub received_count: u64,
    pub delivered_count: u64,
    pub undelivered_count: u64,
    pub failure_count: u64,
}

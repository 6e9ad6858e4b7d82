//! PollOutcome - result of one poll cycle

use serde::{Deserialize, Serialize};

/// Counters for one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOutcome {
    /// Messages taken from the channel
    pub received: usize,

    /// Messages accepted by at least one handler
    pub delivered: usize,

    /// Messages received while no handler was subscribed
    pub undelivered: usize,

    /// Messages whose dispatch failed
    pub failed: usize,
}

impl PollOutcome {
    /// True if the cycle received nothing
    pub fn is_empty(&self) -> bool {
        self.received == 0
    }
}

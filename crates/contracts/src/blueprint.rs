//! PipelineBlueprint - Config Loader output
//!
//! Describes a complete pipeline: channel, poller, dispatch strategy, handlers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

use crate::Timeout;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PipelineBlueprint {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Source channel
    #[serde(default)]
    #[validate(nested)]
    pub channel: ChannelConfig,

    /// Poll cycle settings
    #[serde(default)]
    #[validate(nested)]
    pub poller: PollerConfig,

    /// Delivery strategy
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Subscribed handlers
    #[validate(length(min = 1, message = "at least one handler is required"), nested)]
    pub handlers: Vec<HandlerConfig>,
}

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChannelConfig {
    /// Channel name (used for logging)
    #[serde(default = "default_channel_name")]
    #[validate(length(min = 1))]
    pub name: String,

    /// Queue capacity (0 = unbounded)
    #[serde(default = "default_capacity")]
    #[validate(range(max = 10_000_000))]
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: default_channel_name(),
            capacity: default_capacity(),
        }
    }
}

fn default_channel_name() -> String {
    "input".to_string()
}

fn default_capacity() -> usize {
    100
}

/// Poller configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PollerConfig {
    /// Max messages per poll cycle (<= 0 = unbounded)
    #[serde(default)]
    pub max_messages_per_poll: i64,

    /// Per-receive timeout in ms (0 = no wait, < 0 = wait indefinitely)
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: i64,

    /// Delay between poll cycles in ms (0 = back-to-back)
    #[serde(default = "default_interval_ms")]
    #[validate(range(max = 86_400_000))]
    pub interval_ms: u64,

    /// Stop a poll cycle on the first failed delivery
    #[serde(default)]
    pub propagate_errors: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_messages_per_poll: 0,
            receive_timeout_ms: default_receive_timeout_ms(),
            interval_ms: default_interval_ms(),
            propagate_errors: false,
        }
    }
}

impl PollerConfig {
    /// Receive timeout as a [`Timeout`]
    pub fn receive_timeout(&self) -> Timeout {
        Timeout::from_millis(self.receive_timeout_ms)
    }

    /// Poll period
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_receive_timeout_ms() -> i64 {
    1000
}

fn default_interval_ms() -> u64 {
    100
}

/// Dispatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Delivery strategy
    #[serde(default)]
    pub strategy: DispatchStrategy,

    /// Stop broadcasting at the first handler failure
    #[serde(default)]
    pub fail_fast: bool,
}

/// Delivery strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStrategy {
    /// Every handler receives every message
    #[default]
    Broadcast,
    /// One handler per message, rotating with failover
    RoundRobin,
}

/// Handler configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HandlerConfig {
    /// Handler name
    #[validate(length(min = 1, message = "handler name cannot be empty"))]
    pub name: String,

    /// Handler type
    pub handler_type: HandlerType,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Handler type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerType {
    /// Append payload bytes to stdout/stderr/file
    Stream,
    /// Log message summary
    Log,
    /// Write JSON-mapped messages, one per line
    Json,
    /// Frame payloads onto a TCP connection
    Socket,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poller_defaults() {
        let poller = PollerConfig::default();
        assert_eq!(poller.max_messages_per_poll, 0);
        assert_eq!(poller.receive_timeout(), Timeout::After(Duration::from_millis(1000)));
        assert_eq!(poller.interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_blueprint_requires_handlers() {
        let blueprint = PipelineBlueprint {
            version: ConfigVersion::V1,
            channel: ChannelConfig::default(),
            poller: PollerConfig::default(),
            dispatch: DispatchConfig::default(),
            handlers: Vec::new(),
        };
        assert!(blueprint.validate().is_err());
    }
}

//! # Dispatcher
//!
//! 消息分发模块。
//!
//! 负责：
//! - 轮询 `QueueChannel`，每个周期最多取 `max_messages_per_poll` 条
//! - 通过分发策略（广播 / 轮询）Fan-out 到订阅的 handlers
//! - 隔离失败的 handler，不中断本轮投递

pub mod broadcast;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod handlers;
pub mod metrics;
pub mod round_robin;

pub use broadcast::BroadcastingDispatcher;
pub use contracts::{MessageDispatcher, MessageHandler, PollOutcome};
pub use dispatcher::{CycleHook, PollingDispatcher, PollingSchedule};
pub use error::DispatcherError;
pub use handle::PollerHandle;
pub use handlers::{ByteStreamHandler, LogHandler, TransformingHandler};
pub use metrics::{MetricsSnapshot, PollerMetrics};
pub use round_robin::RoundRobinDispatcher;

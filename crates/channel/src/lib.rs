//! # Channel
//!
//! Bounded in-memory message queue.
//!
//! Responsibilities:
//! - FIFO buffering of `Message`s between producers and pollers
//! - Blocking send/receive bounded by a `Timeout`
//! - Backpressure through a fixed capacity

mod error;
mod queue;

pub use error::ChannelError;
pub use queue::QueueChannel;

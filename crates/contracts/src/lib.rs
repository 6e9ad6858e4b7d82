//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the messaging core.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Header timestamps are wall-clock epoch milliseconds (UTC)
//! - Message ids are random UUIDs assigned at construction

mod blueprint;
mod dispatch;
mod error;
mod handler;
mod message;
mod payload;
mod poll;
mod timeout;

pub use blueprint::*;
pub use dispatch::{DeliveryFailure, MessageDispatcher};
pub use error::*;
pub use handler::{MessageHandler, NamedComponent};
pub use message::{HistoryEntry, Message, MessageBuilder, MessageHeaders};
pub use payload::Payload;
pub use poll::PollOutcome;
pub use timeout::Timeout;

//! MessageDispatcher trait - delivery policy contract

use std::sync::Arc;

use serde::Serialize;

use crate::{DispatchError, Message, MessageHandler};

/// One handler failure recorded during a dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    /// Failing handler name
    pub handler: String,
    /// Rendered handler error
    pub message: String,
}

impl DeliveryFailure {
    /// Create a failure record
    pub fn new(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            message: message.into(),
        }
    }
}

/// Delivery policy distributing one message to subscribed handlers
///
/// Subscriptions may change concurrently with dispatch. Handler identity is
/// the `Arc` allocation, so the same handler cannot be subscribed twice.
pub trait MessageDispatcher<T>: Send + Sync {
    /// Add a handler; returns false if it was already subscribed
    fn subscribe(&self, handler: Arc<dyn MessageHandler<T>>) -> bool;

    /// Remove a handler; returns false if it was not subscribed
    fn unsubscribe(&self, handler: &Arc<dyn MessageHandler<T>>) -> bool;

    /// Number of subscribed handlers
    fn handler_count(&self) -> usize;

    /// Deliver one message
    ///
    /// Returns `Ok(true)` if at least one handler accepted it and `Ok(false)`
    /// if nobody is subscribed.
    ///
    /// # Errors
    /// Returns [`DispatchError::Delivery`] when no handler accepted the message.
    fn dispatch(&self, message: &Message<T>) -> Result<bool, DispatchError>;
}

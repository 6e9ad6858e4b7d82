//! MessageHandler trait - consumer side of the dispatch contract
//!
//! Defines the abstract interface for message consumers.

use crate::{HandlerError, Message};

/// Message consumer
///
/// Handlers are shared behind `Arc` by dispatch strategies and invoked
/// synchronously, one message at a time. Implementations keep any mutable
/// state behind their own synchronization.
pub trait MessageHandler<T>: Send + Sync {
    /// Handler name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Accept one message
    ///
    /// # Errors
    /// Returns a handler error (should include context). The dispatcher
    /// records it and moves on to the next handler.
    fn handle(&self, message: &Message<T>) -> Result<(), HandlerError>;
}

/// Component that can be recorded in a message history
pub trait NamedComponent {
    /// Component name
    fn component_name(&self) -> &str;

    /// Component type
    fn component_type(&self) -> &str;
}

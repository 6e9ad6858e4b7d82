//! RoundRobinDispatcher - one handler per message, rotating with failover

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{instrument, trace, warn};

use contracts::{DeliveryFailure, DispatchError, Message, MessageDispatcher, MessageHandler};
use observability::{record_handler_failure, record_message_dispatched};

use crate::broadcast::{subscribe_unique, unsubscribe_by_identity};

/// Delivers each message to exactly one handler
///
/// Handlers are kept in subscription order. Each dispatch starts one handler
/// further along the rotation; if that handler fails the next ones are tried
/// in order until one accepts the message.
pub struct RoundRobinDispatcher<T> {
    handlers: RwLock<Vec<Arc<dyn MessageHandler<T>>>>,
    next: AtomicUsize,
}

impl<T> RoundRobinDispatcher<T> {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next: AtomicUsize::new(0),
        }
    }
}

impl<T> Default for RoundRobinDispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync> MessageDispatcher<T> for RoundRobinDispatcher<T> {
    fn subscribe(&self, handler: Arc<dyn MessageHandler<T>>) -> bool {
        subscribe_unique(&self.handlers, handler)
    }

    fn unsubscribe(&self, handler: &Arc<dyn MessageHandler<T>>) -> bool {
        unsubscribe_by_identity(&self.handlers, handler)
    }

    fn handler_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[instrument(
        name = "round_robin_dispatch",
        skip(self, message),
        fields(message_id = %message.id())
    )]
    fn dispatch(&self, message: &Message<T>) -> Result<bool, DispatchError> {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if handlers.is_empty() {
            return Ok(false);
        }

        let start = self.next.fetch_add(1, Ordering::Relaxed) % handlers.len();
        let mut failures = Vec::new();

        for offset in 0..handlers.len() {
            let handler = &handlers[(start + offset) % handlers.len()];
            match handler.handle(message) {
                Ok(()) => {
                    record_message_dispatched(handler.name(), true);
                    trace!(handler = handler.name(), "Delivered");
                    return Ok(true);
                }
                Err(e) => {
                    record_message_dispatched(handler.name(), false);
                    record_handler_failure(handler.name(), e.kind());
                    warn!(handler = handler.name(), error = %e, "Handler failed, trying next");
                    failures.push(DeliveryFailure::new(handler.name(), e.to_string()));
                }
            }
        }

        Err(DispatchError::delivery(message.id(), failures))
    }
}

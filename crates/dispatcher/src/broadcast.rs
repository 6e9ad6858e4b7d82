//! BroadcastingDispatcher - every subscriber receives every message

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{instrument, trace, warn};

use contracts::{DeliveryFailure, DispatchError, Message, MessageDispatcher, MessageHandler};
use observability::{record_handler_failure, record_message_dispatched};

/// Delivers each message to all subscribed handlers
///
/// Handlers run synchronously in subscription order. The subscriber list is
/// snapshotted before delivery, so subscribe/unsubscribe never blocks on a
/// running dispatch and never affects one already in progress.
pub struct BroadcastingDispatcher<T> {
    handlers: RwLock<Vec<Arc<dyn MessageHandler<T>>>>,
    fail_fast: bool,
}

impl<T> BroadcastingDispatcher<T> {
    /// Create a dispatcher that continues past handler failures
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            fail_fast: false,
        }
    }

    /// Stop at the first handler failure instead of continuing
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Whether delivery stops at the first failure
    pub fn fail_fast(&self) -> bool {
        self.fail_fast
    }

    fn snapshot(&self) -> Vec<Arc<dyn MessageHandler<T>>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T> Default for BroadcastingDispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync> MessageDispatcher<T> for BroadcastingDispatcher<T> {
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
        name = "broadcast_dispatch",
        skip(self, message),
        fields(message_id = %message.id())
    )]
    fn dispatch(&self, message: &Message<T>) -> Result<bool, DispatchError> {
        let handlers = self.snapshot();
        if handlers.is_empty() {
            return Ok(false);
        }

        let mut delivered = 0usize;
        let mut failures = Vec::new();

        for handler in &handlers {
            match handler.handle(message) {
                Ok(()) => {
                    delivered += 1;
                    record_message_dispatched(handler.name(), true);
                    trace!(handler = handler.name(), "Delivered");
                }
                Err(e) => {
                    record_message_dispatched(handler.name(), false);
                    record_handler_failure(handler.name(), e.kind());
                    warn!(handler = handler.name(), error = %e, "Handler failed");
                    failures.push(DeliveryFailure::new(handler.name(), e.to_string()));
                    if self.fail_fast {
                        return Err(DispatchError::delivery(message.id(), failures));
                    }
                    // Continue processing - don't abort on single failure
                }
            }
        }

        if delivered == 0 {
            Err(DispatchError::delivery(message.id(), failures))
        } else {
            Ok(true)
        }
    }
}

/// Push `handler` unless the same allocation is already subscribed
pub(crate) fn subscribe_unique<T>(
    handlers: &RwLock<Vec<Arc<dyn MessageHandler<T>>>>,
    handler: Arc<dyn MessageHandler<T>>,
) -> bool {
    let mut handlers = handlers.write().unwrap_or_else(PoisonError::into_inner);
    if handlers.iter().any(|h| same_handler(h, &handler)) {
        return false;
    }
    handlers.push(handler);
    true
}

/// Remove `handler` by allocation identity
pub(crate) fn unsubscribe_by_identity<T>(
    handlers: &RwLock<Vec<Arc<dyn MessageHandler<T>>>>,
    handler: &Arc<dyn MessageHandler<T>>,
) -> bool {
    let mut handlers = handlers.write().unwrap_or_else(PoisonError::into_inner);
    let before = handlers.len();
    handlers.retain(|h| !same_handler(h, handler));
    handlers.len() != before
}

// Compare data pointers only; vtable pointers may differ across codegen units.
fn same_handler<T>(a: &Arc<dyn MessageHandler<T>>, b: &Arc<dyn MessageHandler<T>>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

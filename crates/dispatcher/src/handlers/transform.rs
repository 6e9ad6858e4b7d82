//! TransformingHandler - applies a payload transform and forwards the result

use std::marker::PhantomData;
use std::sync::Arc;

use channel::QueueChannel;
use contracts::{HandlerError, Message, MessageBuilder, MessageHandler, NamedComponent};
use tracing::trace;

/// Handler that maps each payload through an opaque transform and sends the
/// result to an output channel
///
/// The output message gets a fresh id, carries the input's custom headers and
/// history, and records this handler as a `transformer` history entry. The
/// send never waits: a full output channel rejects the message.
pub struct TransformingHandler<T, U, F> {
    name: String,
    transform: F,
    output: Arc<QueueChannel<U>>,
    _input: PhantomData<fn(&T)>,
}

impl<T, U, F> TransformingHandler<T, U, F>
where
    F: Fn(&T) -> Result<U, String> + Send + Sync,
{
    /// Create a transformer forwarding to `output`
    pub fn new(name: impl Into<String>, output: Arc<QueueChannel<U>>, transform: F) -> Self {
        Self {
            name: name.into(),
            transform,
            output,
            _input: PhantomData,
        }
    }
}

impl<T, U, F> NamedComponent for TransformingHandler<T, U, F> {
    fn component_name(&self) -> &str {
        &self.name
    }

    fn component_type(&self) -> &str {
        "transformer"
    }
}

impl<T, U, F> MessageHandler<T> for TransformingHandler<T, U, F>
where
    T: Send + Sync,
    U: Send + Sync,
    F: Fn(&T) -> Result<U, String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, message: &Message<T>) -> Result<(), HandlerError> {
        let payload = (self.transform)(message.payload())
            .map_err(|e| HandlerError::rejected(&self.name, e))?;

        let output = MessageBuilder::with_payload(payload)
            .copy_headers_from(message)
            .build()
            .with_history(self);
        let output_id = output.id();

        match self.output.try_send(output) {
            Ok(true) => {
                trace!(handler = %self.name, input_id = %message.id(), output_id = %output_id, "Transformed");
                Ok(())
            }
            Ok(false) => Err(HandlerError::rejected(
                &self.name,
                format!("output channel '{}' is full", self.output.name()),
            )),
            Err(e) => Err(HandlerError::rejected(&self.name, e.to_string())),
        }
    }
}

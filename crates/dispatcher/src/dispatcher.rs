//! PollingDispatcher - drains a channel in bounded poll cycles

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use channel::QueueChannel;
use contracts::{Message, MessageDispatcher, MessageHandler, PollOutcome, Timeout};
use observability::{record_channel_depth, record_poll_cycle};

use crate::error::DispatcherError;
use crate::handle::PollerHandle;
use crate::metrics::PollerMetrics;

/// Schedule for a spawned poller
///
/// Fixed delay: the period is measured from the end of one poll cycle to the
/// start of the next. A zero period runs cycles back-to-back, yielding to the
/// runtime in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingSchedule {
    period: Duration,
    initial_delay: Duration,
}

impl PollingSchedule {
    /// Create a schedule with the given period
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            initial_delay: Duration::ZERO,
        }
    }

    /// Create a schedule from a period in milliseconds
    pub fn from_millis(period_ms: u64) -> Self {
        Self::new(Duration::from_millis(period_ms))
    }

    /// Delay before the first cycle
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Period between cycles
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Delay before the first cycle
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }
}

/// Callback invoked after every poll cycle with its outcome and duration
pub type CycleHook = Arc<dyn Fn(&PollOutcome, Duration) + Send + Sync>;

/// Polls one channel and hands each message to a dispatch strategy
///
/// `run` performs a single poll cycle and may be called repeatedly; the
/// dispatcher keeps no state between cycles other than metrics. A given
/// instance is meant to be driven by one scheduler at a time.
pub struct PollingDispatcher<T> {
    name: String,
    channel: Arc<QueueChannel<T>>,
    dispatcher: Arc<dyn MessageDispatcher<T>>,
    /// `None` = unbounded within a poll
    max_messages_per_poll: Option<usize>,
    receive_timeout: Timeout,
    propagate_errors: bool,
    metrics: Arc<PollerMetrics>,
    cycle_hook: Option<CycleHook>,
}

impl<T: Send + Sync + 'static> PollingDispatcher<T> {
    /// Create a poller with default settings
    ///
    /// Defaults: unbounded messages per poll, 1000 ms receive timeout,
    /// delivery failures are logged and do not stop the cycle.
    pub fn new(channel: Arc<QueueChannel<T>>, dispatcher: Arc<dyn MessageDispatcher<T>>) -> Self {
        Self {
            name: format!("{}-poller", channel.name()),
            channel,
            dispatcher,
            max_messages_per_poll: None,
            receive_timeout: Timeout::default(),
            propagate_errors: false,
            metrics: Arc::new(PollerMetrics::new()),
            cycle_hook: None,
        }
    }

    /// Override the poller name (used for logging)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Observe every completed poll cycle (including failed ones)
    pub fn on_cycle(mut self, hook: impl Fn(&PollOutcome, Duration) + Send + Sync + 'static) -> Self {
        self.cycle_hook = Some(Arc::new(hook));
        self
    }

    /// Poller name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Limit messages per poll cycle; `max <= 0` means unbounded
    pub fn set_max_messages_per_poll(&mut self, max: i64) {
        self.max_messages_per_poll = usize::try_from(max).ok().filter(|max| *max > 0);
    }

    /// Current per-poll limit (`None` = unbounded)
    pub fn max_messages_per_poll(&self) -> Option<usize> {
        self.max_messages_per_poll
    }

    /// Bound for each receive within a poll cycle
    pub fn set_receive_timeout(&mut self, timeout: Timeout) {
        self.receive_timeout = timeout;
    }

    /// Current receive timeout
    pub fn receive_timeout(&self) -> Timeout {
        self.receive_timeout
    }

    /// Stop a poll cycle and return an error on the first failed delivery
    pub fn set_propagate_errors(&mut self, propagate: bool) {
        self.propagate_errors = propagate;
    }

    /// Subscribe a handler to the underlying strategy
    pub fn subscribe(&self, handler: Arc<dyn MessageHandler<T>>) -> bool {
        self.dispatcher.subscribe(handler)
    }

    /// Unsubscribe a handler from the underlying strategy
    pub fn unsubscribe(&self, handler: &Arc<dyn MessageHandler<T>>) -> bool {
        self.dispatcher.unsubscribe(handler)
    }

    /// Source channel
    pub fn channel(&self) -> &Arc<QueueChannel<T>> {
        &self.channel
    }

    /// Shared metrics
    pub fn metrics(&self) -> &Arc<PollerMetrics> {
        &self.metrics
    }

    /// Run one poll cycle
    ///
    /// Receives until `max_messages_per_poll` messages were taken or a receive
    /// times out, dispatching each message as it arrives.
    ///
    /// # Errors
    /// - [`DispatcherError::Channel`] if the channel is closed and drained
    /// - [`DispatcherError::Delivery`] on a failed delivery when
    ///   error propagation is enabled
    #[instrument(name = "polling_dispatcher_run", skip(self), fields(poller = %self.name))]
    pub async fn run(&self) -> Result<PollOutcome, DispatcherError> {
        let started = Instant::now();
        let mut outcome = PollOutcome::default();

        while self
            .max_messages_per_poll
            .is_none_or(|max| outcome.received < max)
        {
            let message = match self.channel.receive(self.receive_timeout).await {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(e) => {
                    self.finish_cycle(&outcome, started);
                    return Err(e.into());
                }
            };
            outcome.received += 1;

            if let Err(e) = self.deliver(&message, &mut outcome) {
                self.finish_cycle(&outcome, started);
                return Err(e);
            }
        }

        self.finish_cycle(&outcome, started);
        if !outcome.is_empty() {
            debug!(
                received = outcome.received,
                delivered = outcome.delivered,
                failed = outcome.failed,
                "Poll cycle complete"
            );
        }
        Ok(outcome)
    }

    fn finish_cycle(&self, outcome: &PollOutcome, started: Instant) {
        let elapsed = started.elapsed();
        self.metrics.record(outcome);
        record_poll_cycle(self.channel.name(), outcome, elapsed.as_secs_f64() * 1000.0);
        record_channel_depth(self.channel.name(), self.channel.len());
        if let Some(hook) = &self.cycle_hook {
            hook(outcome, elapsed);
        }
    }

    fn deliver(&self, message: &Message<T>, outcome: &mut PollOutcome) -> Result<(), DispatcherError> {
        match self.dispatcher.dispatch(message) {
            Ok(true) => outcome.delivered += 1,
            Ok(false) => {
                outcome.undelivered += 1;
                warn!(message_id = %message.id(), "No subscribed handler, message dropped");
            }
            Err(e) => {
                outcome.failed += 1;
                if self.propagate_errors {
                    return Err(e.into());
                }
                warn!(message_id = %message.id(), error = %e, "Delivery failed");
            }
        }
        Ok(())
    }

    /// Spawn the poller as a background task driven by `schedule`
    ///
    /// The task stops when the handle is shut down (or dropped) or when the
    /// source channel is closed and drained.
    pub fn spawn(self, schedule: PollingSchedule) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let name = self.name.clone();
        let metrics = Arc::clone(&self.metrics);
        let task = tokio::spawn(async move {
            self.poll_loop(schedule, shutdown_rx).await;
        });
        PollerHandle::new(name, shutdown_tx, metrics, task)
    }

    #[instrument(name = "poller_loop", skip_all, fields(poller = %self.name))]
    async fn poll_loop(self, schedule: PollingSchedule, mut shutdown: watch::Receiver<bool>) {
        info!(
            period_ms = schedule.period().as_millis() as u64,
            max_messages_per_poll = ?self.max_messages_per_poll,
            receive_timeout_ms = self.receive_timeout.as_millis(),
            "Poller started"
        );

        if !schedule.initial_delay().is_zero() {
            tokio::select! {
                biased;
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(schedule.initial_delay()) => {}
            }
        }

        let mut cycles: u64 = 0;
        loop {
            // Cancelling `run` is safe: a message is only taken off the queue
            // after its receive future completes, and dispatch is synchronous.
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                result = self.run() => match result {
                    Ok(_) => {
                        cycles += 1;
                        if cycles % 100 == 0 {
                            debug!(cycles, "Poller progress");
                        }
                    }
                    Err(e) if e.is_channel_closed() => {
                        info!("Source channel closed, poller stopping");
                        break;
                    }
                    Err(e) => error!(error = %e, "Poll cycle failed"),
                }
            }

            if schedule.period().is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(schedule.period()) => {}
                }
            }
        }

        info!(cycles, "Poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastingDispatcher;
    use contracts::HandlerError;
    use std::sync::Mutex;
    use std::time::Instant;

    struct RecordingHandler {
        seen: Mutex<Vec<u32>>,
        should_fail: bool,
    }

    impl RecordingHandler {
        fn new(should_fail: bool) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                should_fail,
            })
        }

        fn seen(&self) -> Vec<u32> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl MessageHandler<u32> for RecordingHandler {
        fn name(&self) -> &str {
            "recording"
        }

        fn handle(&self, message: &Message<u32>) -> Result<(), HandlerError> {
            if self.should_fail {
                return Err(HandlerError::rejected("recording", "mock failure"));
            }
            self.seen.lock().unwrap().push(*message.payload());
            Ok(())
        }
    }

    fn setup(count: u32) -> (Arc<QueueChannel<u32>>, PollingDispatcher<u32>) {
        let channel = Arc::new(QueueChannel::named("test", 10));
        for i in 1..=count {
            assert!(channel.try_send(Message::new(i)).unwrap());
        }
        let poller = PollingDispatcher::new(
            Arc::clone(&channel),
            Arc::new(BroadcastingDispatcher::<u32>::new()),
        );
        (channel, poller)
    }

    #[tokio::test]
    async fn test_max_same_as_message_count() {
        let (channel, mut poller) = setup(3);
        poller.set_max_messages_per_poll(3);
        // Long timeout: reaching the limit must not incur an extra wait
        poller.set_receive_timeout(Timeout::After(Duration::from_secs(10)));
        let handler = RecordingHandler::new(false);
        poller.subscribe(handler.clone());

        let started = Instant::now();
        let outcome = poller.run().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));

        assert_eq!(outcome.received, 3);
        assert_eq!(outcome.delivered, 3);
        assert_eq!(handler.seen(), vec![1, 2, 3]);
        assert!(channel.is_empty());
    }

    #[tokio::test]
    async fn test_max_less_than_message_count_resumes_in_order() {
        let (channel, mut poller) = setup(5);
        poller.set_max_messages_per_poll(2);
        poller.set_receive_timeout(Timeout::Immediate);
        let handler = RecordingHandler::new(false);
        poller.subscribe(handler.clone());

        assert_eq!(poller.run().await.unwrap().delivered, 2);
        assert_eq!(handler.seen(), vec![1, 2]);
        assert_eq!(channel.len(), 3);

        assert_eq!(poller.run().await.unwrap().delivered, 2);
        assert_eq!(poller.run().await.unwrap().delivered, 1);
        assert_eq!(poller.run().await.unwrap().delivered, 0);
        assert_eq!(handler.seen(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_max_exceeds_message_count_with_immediate_timeout() {
        let (_channel, mut poller) = setup(3);
        poller.set_max_messages_per_poll(5);
        poller.set_receive_timeout(Timeout::Immediate);
        let handler = RecordingHandler::new(false);
        poller.subscribe(handler.clone());

        let outcome = poller.run().await.unwrap();
        assert_eq!(outcome.received, 3);
        assert_eq!(handler.seen(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_timeout_ends_cycle_early() {
        let (_channel, mut poller) = setup(2);
        poller.set_max_messages_per_poll(5);
        poller.set_receive_timeout(Timeout::After(Duration::from_millis(20)));
        poller.subscribe(RecordingHandler::new(false));

        let started = Instant::now();
        let outcome = poller.run().await.unwrap();
        assert_eq!(outcome.received, 2);
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn test_unbounded_drains_everything() {
        let (_channel, mut poller) = setup(7);
        poller.set_max_messages_per_poll(0);
        poller.set_receive_timeout(Timeout::Immediate);
        assert_eq!(poller.max_messages_per_poll(), None);
        let handler = RecordingHandler::new(false);
        poller.subscribe(handler.clone());

        assert_eq!(poller.run().await.unwrap().delivered, 7);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_cycle() {
        let (channel, mut poller) = setup(3);
        poller.set_receive_timeout(Timeout::Immediate);
        poller.subscribe(RecordingHandler::new(true));

        let outcome = poller.run().await.unwrap();
        assert_eq!(outcome.received, 3);
        assert_eq!(outcome.failed, 3);
        assert!(channel.is_empty());
        assert_eq!(poller.metrics().failure_count(), 3);
    }

    #[tokio::test]
    async fn test_propagate_errors_stops_cycle() {
        let (channel, mut poller) = setup(3);
        poller.set_receive_timeout(Timeout::Immediate);
        poller.set_propagate_errors(true);
        poller.subscribe(RecordingHandler::new(true));

        let err = poller.run().await.unwrap_err();
        assert!(matches!(err, DispatcherError::Delivery(_)));
        assert_eq!(channel.len(), 2);
    }

    #[tokio::test]
    async fn test_no_subscribers_counts_undelivered() {
        let (_channel, mut poller) = setup(2);
        poller.set_receive_timeout(Timeout::Immediate);

        let outcome = poller.run().await.unwrap();
        assert_eq!(outcome.undelivered, 2);
        assert_eq!(outcome.delivered, 0);
    }

    #[tokio::test]
    async fn test_closed_channel_is_surfaced() {
        let (channel, mut poller) = setup(1);
        poller.set_receive_timeout(Timeout::Indefinite);
        let handler = RecordingHandler::new(false);
        poller.subscribe(handler.clone());
        channel.close();

        let err = poller.run().await.unwrap_err();
        assert!(err.is_channel_closed());
        assert_eq!(handler.seen(), vec![1]);
    }

    #[tokio::test]
    async fn test_spawned_poller_delivers_and_shuts_down() {
        let (channel, mut poller) = setup(0);
        poller.set_max_messages_per_poll(2);
        poller.set_receive_timeout(Timeout::Immediate);
        let handler = RecordingHandler::new(false);
        poller.subscribe(handler.clone());

        let handle = poller.spawn(PollingSchedule::from_millis(5));
        for i in 1..=6 {
            channel.send(Message::new(i), Timeout::Indefinite).await.unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while handler.seen().len() < 6 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let snapshot = handle.shutdown().await;
        assert_eq!(handler.seen(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(snapshot.delivered_count, 6);
        assert!(snapshot.poll_count >= 3);
    }

    #[tokio::test]
    async fn test_spawned_poller_stops_on_channel_close() {
        let (channel, mut poller) = setup(2);
        poller.set_receive_timeout(Timeout::Indefinite);
        let handler = RecordingHandler::new(false);
        poller.subscribe(handler.clone());

        let handle = poller.spawn(PollingSchedule::from_millis(0));
        channel.close();

        let snapshot = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("poller should stop after channel close");
        assert_eq!(snapshot.delivered_count, 2);
        assert_eq!(handler.seen(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_cycle_hook_sees_every_cycle() {
        let (_channel, poller) = setup(3);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook_seen = Arc::clone(&seen);
        let mut poller = poller.on_cycle(move |outcome, _elapsed| {
            hook_seen.lock().unwrap().push(outcome.received);
        });
        poller.set_max_messages_per_poll(2);
        poller.set_receive_timeout(Timeout::Immediate);

        poller.run().await.unwrap();
        poller.run().await.unwrap();
        poller.run().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![2, 1, 0]);
    }
}

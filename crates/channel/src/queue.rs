//! QueueChannel - bounded FIFO of messages
//!
//! The buffer is a mutex-guarded `VecDeque`. Two fair semaphores track
//! queued items and free slots, so blocked producers and consumers are woken
//! in arrival order without sleep-and-poll loops. The mutex is never held
//! across an await point.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{Semaphore, TryAcquireError};
use tracing::{debug, trace};

use contracts::{Message, Timeout};

use crate::error::ChannelError;

/// Outcome of waiting on one of the channel semaphores
enum Acquired {
    Permit,
    TimedOut,
    Closed,
}

/// Bounded, multi-producer multi-consumer message queue
///
/// `capacity == 0` means unbounded: sends never wait for space.
pub struct QueueChannel<T> {
    name: String,
    capacity: usize,
    buffer: Mutex<VecDeque<Message<T>>>,
    /// One permit per queued message
    items: Semaphore,
    /// One permit per free slot (`None` when unbounded)
    slots: Option<Semaphore>,
    closed: AtomicBool,
}

impl<T> QueueChannel<T> {
    /// Create an anonymous channel
    pub fn new(capacity: usize) -> Self {
        Self::named("queue", capacity)
    }

    /// Create a channel with a name used in logs and errors
    pub fn named(name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.min(Semaphore::MAX_PERMITS);
        Self {
            name: name.into(),
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            items: Semaphore::new(0),
            slots: (capacity > 0).then(|| Semaphore::new(capacity)),
            closed: AtomicBool::new(false),
        }
    }

    /// Channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured capacity (0 = unbounded)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Free slots (`None` when unbounded)
    pub fn remaining_capacity(&self) -> Option<usize> {
        self.slots
            .as_ref()
            .map(|_| self.capacity.saturating_sub(self.len()))
    }

    /// True once [`QueueChannel::close`] was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Enqueue a message, waiting up to `timeout` for a free slot
    ///
    /// Returns `Ok(false)` if no slot became free in time; the message is dropped.
    ///
    /// # Errors
    /// [`ChannelError::Closed`] if the channel is closed.
    pub async fn send(&self, message: Message<T>, timeout: Timeout) -> Result<bool, ChannelError> {
        self.ensure_open()?;
        if let Some(slots) = &self.slots {
            match acquire(slots, timeout).await {
                Acquired::Permit => {}
                Acquired::TimedOut => {
                    trace!(channel = %self.name, message_id = %message.id(), "Send timed out, queue full");
                    return Ok(false);
                }
                Acquired::Closed => return Err(self.closed_error()),
            }
        }
        self.enqueue(message)
    }

    /// Enqueue a message only if a slot is free right now
    ///
    /// Synchronous form of `send(message, Timeout::Immediate)`.
    ///
    /// # Errors
    /// [`ChannelError::Closed`] if the channel is closed.
    pub fn try_send(&self, message: Message<T>) -> Result<bool, ChannelError> {
        self.ensure_open()?;
        if let Some(slots) = &self.slots {
            match try_acquire(slots) {
                Acquired::Permit => {}
                Acquired::TimedOut => return Ok(false),
                Acquired::Closed => return Err(self.closed_error()),
            }
        }
        self.enqueue(message)
    }

    /// Take the oldest message, waiting up to `timeout` for one to arrive
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    ///
    /// # Errors
    /// [`ChannelError::Closed`] once the channel is closed and fully drained.
    pub async fn receive(&self, timeout: Timeout) -> Result<Option<Message<T>>, ChannelError> {
        match acquire(&self.items, timeout).await {
            Acquired::Permit => self.dequeue(),
            Acquired::TimedOut => Ok(None),
            Acquired::Closed => self.drain_after_close(),
        }
    }

    /// Take the oldest message only if one is queued right now
    ///
    /// # Errors
    /// [`ChannelError::Closed`] once the channel is closed and fully drained.
    pub fn try_receive(&self) -> Result<Option<Message<T>>, ChannelError> {
        match try_acquire(&self.items) {
            Acquired::Permit => self.dequeue(),
            Acquired::TimedOut => Ok(None),
            Acquired::Closed => self.drain_after_close(),
        }
    }

    /// Remove and return everything currently queued
    pub fn clear(&self) -> Vec<Message<T>> {
        std::iter::from_fn(|| self.try_receive().ok().flatten()).collect()
    }

    /// Close the channel
    ///
    /// Pending and future sends fail; receivers keep draining queued messages
    /// and then see [`ChannelError::Closed`]. Blocked waiters are woken.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.items.close();
        if let Some(slots) = &self.slots {
            slots.close();
        }
        debug!(channel = %self.name, queued = self.len(), "Channel closed");
    }

    fn enqueue(&self, message: Message<T>) -> Result<bool, ChannelError> {
        // A close racing with a slot wait must not let the message in.
        self.ensure_open()?;
        self.lock().push_back(message);
        self.items.add_permits(1);
        Ok(true)
    }

    fn dequeue(&self) -> Result<Option<Message<T>>, ChannelError> {
        let message = self.lock().pop_front();
        match message {
            Some(message) => {
                if let Some(slots) = &self.slots {
                    slots.add_permits(1);
                }
                Ok(Some(message))
            }
            None if self.is_closed() => Err(self.closed_error()),
            None => Ok(None),
        }
    }

    fn drain_after_close(&self) -> Result<Option<Message<T>>, ChannelError> {
        self.lock()
            .pop_front()
            .map(Some)
            .ok_or_else(|| self.closed_error())
    }

    fn ensure_open(&self) -> Result<(), ChannelError> {
        if self.is_closed() {
            Err(self.closed_error())
        } else {
            Ok(())
        }
    }

    fn closed_error(&self) -> ChannelError {
        ChannelError::closed(&self.name)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Message<T>>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for QueueChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueChannel")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn acquire(semaphore: &Semaphore, timeout: Timeout) -> Acquired {
    let result = match timeout {
        Timeout::Immediate => return try_acquire(semaphore),
        Timeout::After(duration) => {
            match tokio::time::timeout(duration, semaphore.acquire()).await {
                Ok(result) => result,
                Err(_elapsed) => return Acquired::TimedOut,
            }
        }
        Timeout::Indefinite => semaphore.acquire().await,
    };
    match result {
        Ok(permit) => {
            permit.forget();
            Acquired::Permit
        }
        Err(_) => Acquired::Closed,
    }
}

fn try_acquire(semaphore: &Semaphore) -> Acquired {
    match semaphore.try_acquire() {
        Ok(permit) => {
            permit.forget();
            Acquired::Permit
        }
        Err(TryAcquireError::NoPermits) => Acquired::TimedOut,
        Err(TryAcquireError::Closed) => Acquired::Closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn payloads(messages: &[Message<u32>]) -> Vec<u32> {
        messages.iter().map(|m| *m.payload()).collect()
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let channel = QueueChannel::new(10);
        for i in 0..5u32 {
            assert!(channel.send(Message::new(i), Timeout::Immediate).await.unwrap());
        }
        let mut received = Vec::new();
        while let Some(message) = channel.receive(Timeout::Immediate).await.unwrap() {
            received.push(message);
        }
        assert_eq!(payloads(&received), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_send_declines_when_full() {
        let channel = QueueChannel::new(2);
        assert!(channel.try_send(Message::new(1u32)).unwrap());
        assert!(channel.try_send(Message::new(2u32)).unwrap());
        assert!(!channel.try_send(Message::new(3u32)).unwrap());
        assert_eq!(channel.len(), 2);
        assert_eq!(channel.remaining_capacity(), Some(0));

        let started = Instant::now();
        let sent = channel
            .send(Message::new(3u32), Timeout::After(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(!sent);
        assert!(started.elapsed() >= Duration::from_millis(15));

        channel.try_receive().unwrap();
        assert!(channel.try_send(Message::new(4u32)).unwrap());
        assert_eq!(payloads(&channel.clear()), vec![2, 4]);
    }

    #[tokio::test]
    async fn test_receive_timeout_returns_none() {
        let channel = QueueChannel::<u32>::new(1);
        assert!(channel.receive(Timeout::Immediate).await.unwrap().is_none());

        let started = Instant::now();
        let received = channel
            .receive(Timeout::After(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(received.is_none());
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn test_blocked_receive_wakes_on_send() {
        let channel = Arc::new(QueueChannel::new(1));
        let producer = Arc::clone(&channel);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.send(Message::new(7u32), Timeout::Immediate).await.unwrap();
        });

        let received = channel
            .receive(Timeout::After(Duration::from_secs(5)))
            .await
            .unwrap()
            .expect("message should arrive before timeout");
        assert_eq!(*received.payload(), 7);
    }

    #[tokio::test]
    async fn test_blocked_send_wakes_on_receive() {
        let channel = Arc::new(QueueChannel::new(1));
        channel.try_send(Message::new(1u32)).unwrap();

        let consumer = Arc::clone(&channel);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            consumer.try_receive().unwrap();
        });

        let sent = channel
            .send(Message::new(2u32), Timeout::Indefinite)
            .await
            .unwrap();
        assert!(sent);
        assert_eq!(payloads(&channel.clear()), vec![2]);
    }

    #[tokio::test]
    async fn test_unbounded_capacity() {
        let channel = QueueChannel::new(0);
        for i in 0..1000u32 {
            assert!(channel.try_send(Message::new(i)).unwrap());
        }
        assert_eq!(channel.len(), 1000);
        assert_eq!(channel.remaining_capacity(), None);
    }

    #[tokio::test]
    async fn test_close_drains_then_errors() {
        let channel = QueueChannel::named("closing", 4);
        channel.try_send(Message::new(1u32)).unwrap();
        channel.try_send(Message::new(2u32)).unwrap();
        channel.close();

        assert_eq!(
            channel.try_send(Message::new(3u32)),
            Err(ChannelError::closed("closing"))
        );
        assert_eq!(*channel.receive(Timeout::Immediate).await.unwrap().unwrap().payload(), 1);
        assert_eq!(*channel.receive(Timeout::Indefinite).await.unwrap().unwrap().payload(), 2);
        assert!(channel.receive(Timeout::Indefinite).await.is_err());
    }

    #[tokio::test]
    async fn test_close_wakes_indefinite_receiver() {
        let channel = Arc::new(QueueChannel::<u32>::new(1));
        let closer = Arc::clone(&channel);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            closer.close();
        });

        let result = channel.receive(Timeout::Indefinite).await;
        assert!(matches!(result, Err(ChannelError::Closed { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_producers_keep_per_producer_order() {
        let channel = Arc::new(QueueChannel::new(8));
        let mut producers = Vec::new();
        for producer_id in 0..4u32 {
            let channel = Arc::clone(&channel);
            producers.push(tokio::spawn(async move {
                for seq in 0..50u32 {
                    let sent = channel
                        .send(Message::new((producer_id, seq)), Timeout::Indefinite)
                        .await
                        .unwrap();
                    assert!(sent);
                }
            }));
        }

        let mut last_seen = [None::<u32>; 4];
        let mut total = 0;
        while total < 200 {
            let message = channel
                .receive(Timeout::After(Duration::from_secs(5)))
                .await
                .unwrap()
                .expect("producers should keep the queue fed");
            let (producer_id, seq) = *message.payload();
            let slot = &mut last_seen[producer_id as usize];
            assert!(slot.is_none_or(|last| last < seq));
            *slot = Some(seq);
            total += 1;
        }

        for producer in producers {
            producer.await.unwrap();
        }
        assert!(channel.is_empty());
    }
}

//! Event publishing/subscription abstraction (mechanics only).
//!
//! The engine publishes a fact after each ledger mutation, pickup and booking
//! status change. The records in the stores remain the source of truth; the bus
//! only distributes notifications (audit trails, notification senders, caches).
//!
//! - **Transport-agnostic**: in-memory channels in tests, a broker in production
//! - **At-least-once delivery**: consumers must tolerate duplicates

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to an event stream.
///
/// Each subscription gets a copy of every message published after it was
/// created (broadcast semantics). Use it from a single consumer thread.
///
/// ```ignore
/// let subscription = bus.subscribe();
/// while let Ok(envelope) = subscription.recv_timeout(Duration::from_secs(1)) {
///     audit_log.append(envelope)?;
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// ```text
/// Service → Store (mutate record) → EventBus (publish) → Consumers
/// ```
///
/// Records are stored first and published second. `publish()` may fail; the
/// engine logs the failure and keeps the stored state, since the mutation
/// already happened and cannot be un-published.
///
/// Implementations must be `Send + Sync`: allocation requests publish from many
/// request threads concurrently.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}

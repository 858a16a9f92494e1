//! Process-local bus behind the engine's event publisher.
//!
//! Allocation, pickup and booking services hand their envelopes to the
//! publisher once the owning record is stored; this bus copies each envelope to
//! every live subscriber. Integration tests and the benches subscribe to it to
//! see which facts an operation emitted.

use std::sync::{Mutex, mpsc};

use crate::bus::{EventBus, Subscription};

#[derive(Debug, PartialEq, Eq)]
pub enum InMemoryBusError {
    /// A thread panicked while holding the subscriber list.
    SubscribersPoisoned,
}

impl core::fmt::Display for InMemoryBusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InMemoryBusError::SubscribersPoisoned => f.write_str("subscriber list poisoned"),
        }
    }
}

/// Broadcast bus over unbounded channels.
///
/// Every subscriber gets every envelope published after it subscribed, in
/// publish order. Subscribers whose receiving end is gone are dropped on the
/// next publish.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribers still listening as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|subs| subs.len()).unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| InMemoryBusError::SubscribersPoisoned)?;
        subs.retain(|tx| tx.send(message.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        match self.subscribers.lock() {
            Ok(mut subs) => subs.push(tx),
            // The returned subscription stays silent; publishing reports the poisoning.
            Err(_) => drop(tx),
        }
        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_envelopes_in_publish_order() {
        let bus = InMemoryEventBus::new();
        let audit = bus.subscribe();
        let cache = bus.subscribe();

        bus.publish("stock.unit.reserved").unwrap();
        bus.publish("stock.job.status_changed").unwrap();

        for sub in [&audit, &cache] {
            assert_eq!(sub.try_recv().unwrap(), "stock.unit.reserved");
            assert_eq!(sub.try_recv().unwrap(), "stock.job.status_changed");
            assert!(sub.try_recv().is_err());
        }
    }

    #[test]
    fn late_subscribers_miss_earlier_envelopes() {
        let bus = InMemoryEventBus::new();
        bus.publish("stock.pickup.recorded").unwrap();

        let late = bus.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = InMemoryEventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(1u32).unwrap();

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.try_recv().unwrap(), 1);
    }

    #[test]
    fn errors_read_as_plain_text() {
        assert_eq!(InMemoryBusError::SubscribersPoisoned.to_string(), "subscriber list poisoned");
    }
}

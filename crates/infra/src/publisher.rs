//! Event publication after state changes.
//!
//! Services store first and publish second. A failed publish is logged and
//! swallowed: the records are already written and remain the source of truth.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use freightops_core::{AggregateId, TenantId};
use freightops_events::{Event, EventBus, EventEnvelope};

/// Object-safe view of an event bus carrying JSON envelopes.
pub trait EventSink: Send + Sync {
    fn publish(&self, envelope: EventEnvelope<JsonValue>) -> Result<(), String>;
}

impl<B> EventSink for B
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn publish(&self, envelope: EventEnvelope<JsonValue>) -> Result<(), String> {
        EventBus::publish(self, envelope).map_err(|e| format!("{e:?}"))
    }
}

/// Wraps domain events in envelopes with per-stream sequence numbers.
pub struct EventPublisher {
    sink: Arc<dyn EventSink>,
    sequences: Mutex<HashMap<(TenantId, AggregateId), u64>>,
}

impl EventPublisher {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            sequences: Mutex::new(HashMap::new()),
        }
    }

    pub fn publish<E>(&self, event: &E)
    where
        E: Event + Serialize,
    {
        let payload = match serde_json::to_value(event) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(event_type = event.event_type(), error = %e, "failed to serialize event");
                return;
            }
        };

        let Some(sequence_number) = self.next_sequence(event.tenant_id(), event.stream_id()) else {
            tracing::warn!(event_type = event.event_type(), "sequence counter lock poisoned; event dropped");
            return;
        };

        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            event.tenant_id(),
            event.stream_id(),
            event.stream_type(),
            event.event_type(),
            sequence_number,
            event.occurred_at(),
            payload,
        );

        if let Err(e) = self.sink.publish(envelope) {
            tracing::warn!(
                event_type = event.event_type(),
                stream_id = %event.stream_id(),
                error = %e,
                "event publication failed; state change is kept"
            );
        }
    }

    pub fn publish_all<'a, E, I>(&self, events: I)
    where
        E: Event + Serialize + 'a,
        I: IntoIterator<Item = &'a E>,
    {
        for event in events {
            self.publish(event);
        }
    }

    fn next_sequence(&self, tenant_id: TenantId, stream_id: AggregateId) -> Option<u64> {
        let mut sequences = self.sequences.lock().ok()?;
        let next = sequences.entry((tenant_id, stream_id)).or_insert(0);
        *next += 1;
        Some(*next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use freightops_core::{JobId, UserId};
    use freightops_events::InMemoryEventBus;
    use freightops_stock::{JobStatus, JobStatusChanged, StockEvent};

    fn status_changed(tenant_id: TenantId, job_id: JobId) -> StockEvent {
        StockEvent::JobStatusChanged(JobStatusChanged {
            tenant_id,
            job_id,
            from: JobStatus::Draft,
            to: JobStatus::Allocated,
            actor: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn sequence_numbers_are_per_stream() {
        let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let publisher = EventPublisher::new(bus.clone());
        let tenant_id = TenantId::new();
        let job_a = JobId::new();
        let job_b = JobId::new();

        publisher.publish(&status_changed(tenant_id, job_a));
        publisher.publish(&status_changed(tenant_id, job_a));
        publisher.publish(&status_changed(tenant_id, job_b));

        let seqs: Vec<(AggregateId, u64)> = (0..3)
            .map(|_| {
                let env = sub.try_recv().unwrap();
                (env.stream_id(), env.sequence_number())
            })
            .collect();
        assert_eq!(
            seqs,
            vec![(job_a.into(), 1), (job_a.into(), 2), (job_b.into(), 1)]
        );
    }

    #[test]
    fn envelopes_carry_the_event_metadata() {
        let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let publisher = EventPublisher::new(bus.clone());
        let tenant_id = TenantId::new();

        publisher.publish(&status_changed(tenant_id, JobId::new()));

        let env = sub.try_recv().unwrap();
        assert_eq!(env.tenant_id(), tenant_id);
        assert_eq!(env.event_type(), "stock.job.status_changed");
        assert_eq!(env.stream_type(), "stock.job");
        assert!(env.payload().get("JobStatusChanged").is_some());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use freightops_core::{AggregateId, TenantId};

/// Envelope for a published event, carrying tenant + stream metadata.
///
/// - **Multi-tenancy** is carried explicitly via `tenant_id`.
/// - `sequence_number` increases by one per (tenant, stream) pair.
/// - `payload` is the serialized domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,

    stream_id: AggregateId,
    stream_type: String,
    event_type: String,

    sequence_number: u64,
    occurred_at: DateTime<Utc>,

    payload: E,
}

impl<E> EventEnvelope<E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: Uuid,
        tenant_id: TenantId,
        stream_id: AggregateId,
        stream_type: impl Into<String>,
        event_type: impl Into<String>,
        sequence_number: u64,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id,
            stream_id,
            stream_type: stream_type.into(),
            event_type: event_type.into(),
            sequence_number,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn stream_id(&self) -> AggregateId {
        self.stream_id
    }

    pub fn stream_type(&self) -> &str {
        &self.stream_type
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freightops_core::{AggregateId, ContainerId, StockAllocationId, TenantId, UserId};
use freightops_events::Event;

use crate::allocation::AllocationStage;
use crate::booking::BookingStatus;
use crate::container::ContainerStatus;
use crate::owner::BookingRef;

/// Event: BookingStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingStatusChanged {
    pub tenant_id: TenantId,
    pub booking: BookingRef,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ContainerStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatusChanged {
    pub tenant_id: TenantId,
    pub booking: BookingRef,
    pub container_id: ContainerId,
    pub from: ContainerStatus,
    pub to: ContainerStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AllocationStageChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationStageChanged {
    pub tenant_id: TenantId,
    pub booking: BookingRef,
    pub allocation_id: StockAllocationId,
    pub from: AllocationStage,
    pub to: AllocationStage,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingEvent {
    StatusChanged(BookingStatusChanged),
    ContainerStatusChanged(ContainerStatusChanged),
    AllocationStageChanged(AllocationStageChanged),
}

impl BookingEvent {
    fn booking(&self) -> BookingRef {
        match self {
            BookingEvent::StatusChanged(e) => e.booking,
            BookingEvent::ContainerStatusChanged(e) => e.booking,
            BookingEvent::AllocationStageChanged(e) => e.booking,
        }
    }
}

impl Event for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::StatusChanged(_) => "booking.status.changed",
            BookingEvent::ContainerStatusChanged(_) => "booking.container.status_changed",
            BookingEvent::AllocationStageChanged(_) => "booking.allocation.stage_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BookingEvent::StatusChanged(e) => e.occurred_at,
            BookingEvent::ContainerStatusChanged(e) => e.occurred_at,
            BookingEvent::AllocationStageChanged(e) => e.occurred_at,
        }
    }

    fn tenant_id(&self) -> TenantId {
        match self {
            BookingEvent::StatusChanged(e) => e.tenant_id,
            BookingEvent::ContainerStatusChanged(e) => e.tenant_id,
            BookingEvent::AllocationStageChanged(e) => e.tenant_id,
        }
    }

    fn stream_id(&self) -> AggregateId {
        self.booking().id.into()
    }

    fn stream_type(&self) -> &'static str {
        match self.booking().kind {
            crate::owner::BookingKind::Import => "booking.import",
            crate::owner::BookingKind::Export => "booking.export",
        }
    }
}

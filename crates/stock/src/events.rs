use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freightops_core::{AggregateId, JobId, Lpn, PickupId, TenantId, UserId};
use freightops_events::Event;

use crate::demand::JobStatus;
use crate::pickup::PickupTarget;
use crate::unit::{DemandOwner, DemandRef};

/// Event: UnitReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReserved {
    pub tenant_id: TenantId,
    pub lpn: Lpn,
    pub demand: DemandRef,
    pub quantity: i64,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UnitReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReleased {
    pub tenant_id: TenantId,
    pub lpn: Lpn,
    /// The demand the unit was held for before release.
    pub demand: DemandRef,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UnitPicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPicked {
    pub tenant_id: TenantId,
    pub lpn: Lpn,
    pub demand: DemandRef,
    pub quantity: i64,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PickupRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupRecorded {
    pub tenant_id: TenantId,
    pub pickup_id: PickupId,
    pub target: PickupTarget,
    pub picked_qty: i64,
    pub final_qty: i64,
    pub warnings: usize,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JobStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusChanged {
    pub tenant_id: TenantId,
    pub job_id: JobId,
    pub from: JobStatus,
    pub to: JobStatus,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    UnitReserved(UnitReserved),
    UnitReleased(UnitReleased),
    UnitPicked(UnitPicked),
    PickupRecorded(PickupRecorded),
    JobStatusChanged(JobStatusChanged),
}

impl StockEvent {
    fn owner(&self) -> DemandOwner {
        match self {
            StockEvent::UnitReserved(e) => e.demand.owner,
            StockEvent::UnitReleased(e) => e.demand.owner,
            StockEvent::UnitPicked(e) => e.demand.owner,
            StockEvent::PickupRecorded(e) => e.target.owner(),
            StockEvent::JobStatusChanged(e) => DemandOwner::Job(e.job_id),
        }
    }
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::UnitReserved(_) => "stock.unit.reserved",
            StockEvent::UnitReleased(_) => "stock.unit.released",
            StockEvent::UnitPicked(_) => "stock.unit.picked",
            StockEvent::PickupRecorded(_) => "stock.pickup.recorded",
            StockEvent::JobStatusChanged(_) => "stock.job.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::UnitReserved(e) => e.occurred_at,
            StockEvent::UnitReleased(e) => e.occurred_at,
            StockEvent::UnitPicked(e) => e.occurred_at,
            StockEvent::PickupRecorded(e) => e.occurred_at,
            StockEvent::JobStatusChanged(e) => e.occurred_at,
        }
    }

    fn tenant_id(&self) -> TenantId {
        match self {
            StockEvent::UnitReserved(e) => e.tenant_id,
            StockEvent::UnitReleased(e) => e.tenant_id,
            StockEvent::UnitPicked(e) => e.tenant_id,
            StockEvent::PickupRecorded(e) => e.tenant_id,
            StockEvent::JobStatusChanged(e) => e.tenant_id,
        }
    }

    fn stream_id(&self) -> AggregateId {
        self.owner().stream_id()
    }

    fn stream_type(&self) -> &'static str {
        self.owner().stream_type()
    }
}

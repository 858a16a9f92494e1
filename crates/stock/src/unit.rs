use core::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freightops_core::{
    AggregateId, DemandLineId, DomainError, DomainResult, Entity, JobId, Lpn, SkuId,
    StockAllocationId, TenantId, UserId,
};

/// Reservation lifecycle of a stock unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Available,
    Allocated,
    Picked,
}

impl AllocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStatus::Available => "available",
            AllocationStatus::Allocated => "allocated",
            AllocationStatus::Picked => "picked",
        }
    }
}

impl core::fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record a demand line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DemandOwner {
    /// A line of an outbound job.
    Job(JobId),
    /// A product line embedded in an export container stock allocation.
    Allocation(StockAllocationId),
}

impl DemandOwner {
    pub fn stream_id(&self) -> AggregateId {
        match self {
            DemandOwner::Job(id) => (*id).into(),
            DemandOwner::Allocation(id) => (*id).into(),
        }
    }

    pub fn stream_type(&self) -> &'static str {
        match self {
            DemandOwner::Job(_) => "stock.job",
            DemandOwner::Allocation(_) => "booking.stock_allocation",
        }
    }
}

/// Reference from a stock unit to the demand line it is reserved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DemandRef {
    pub owner: DemandOwner,
    pub line_id: DemandLineId,
}

impl DemandRef {
    pub fn job_line(job_id: JobId, line_id: DemandLineId) -> Self {
        Self {
            owner: DemandOwner::Job(job_id),
            line_id,
        }
    }

    pub fn allocation_line(allocation_id: StockAllocationId, line_id: DemandLineId) -> Self {
        Self {
            owner: DemandOwner::Allocation(allocation_id),
            line_id,
        }
    }
}

/// Filter for eligible stock: same SKU, optionally the same batch and warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockQuery {
    pub sku_id: SkuId,
    pub batch_number: Option<String>,
    pub warehouse: Option<String>,
}

impl StockQuery {
    pub fn matches(&self, unit: &StockUnit) -> bool {
        unit.sku_id == self.sku_id
            && self
                .batch_number
                .as_deref()
                .is_none_or(|batch| unit.batch_number == batch)
            && self
                .warehouse
                .as_deref()
                .is_none_or(|wh| unit.warehouse.as_deref() == Some(wh))
    }
}

/// Input for putting a unit into stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutAway {
    pub tenant_id: TenantId,
    pub lpn: Lpn,
    pub sku_id: SkuId,
    pub batch_number: String,
    pub quantity: i64,
    pub location: String,
    pub warehouse: Option<String>,
    pub putaway_at: DateTime<Utc>,
}

/// A license-plate-numbered unit of put-away stock.
///
/// Reservation fields are private: `status` is `Available` exactly when no
/// demand reference is held, and the transition methods keep it that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUnit {
    lpn: Lpn,
    tenant_id: TenantId,
    pub sku_id: SkuId,
    pub batch_number: String,
    pub quantity: i64,
    pub location: String,
    pub warehouse: Option<String>,
    /// FIFO key: when the unit became eligible for reservation.
    pub putaway_at: DateTime<Utc>,
    status: AllocationStatus,
    demand: Option<DemandRef>,
    reserved_at: Option<DateTime<Utc>>,
    reserved_by: Option<UserId>,
}

impl StockUnit {
    pub fn put_away(input: PutAway) -> DomainResult<Self> {
        if input.quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        if input.location.trim().is_empty() {
            return Err(DomainError::validation("location cannot be empty"));
        }

        Ok(Self {
            lpn: input.lpn,
            tenant_id: input.tenant_id,
            sku_id: input.sku_id,
            batch_number: input.batch_number,
            quantity: input.quantity,
            location: input.location,
            warehouse: input.warehouse,
            putaway_at: input.putaway_at,
            status: AllocationStatus::Available,
            demand: None,
            reserved_at: None,
            reserved_by: None,
        })
    }

    pub fn lpn(&self) -> &Lpn {
        &self.lpn
    }

    pub fn status(&self) -> AllocationStatus {
        self.status
    }

    pub fn demand(&self) -> Option<&DemandRef> {
        self.demand.as_ref()
    }

    pub fn reserved_at(&self) -> Option<DateTime<Utc>> {
        self.reserved_at
    }

    pub fn reserved_by(&self) -> Option<UserId> {
        self.reserved_by
    }

    pub fn is_available(&self) -> bool {
        self.status == AllocationStatus::Available
    }

    pub fn is_reserved_for(&self, demand: &DemandRef) -> bool {
        self.demand.as_ref() == Some(demand)
    }

    /// `Available` exactly when no demand reference is held.
    pub fn is_consistent(&self) -> bool {
        (self.status == AllocationStatus::Available) == self.demand.is_none()
    }

    /// available → allocated.
    pub fn reserve(&mut self, demand: DemandRef, actor: UserId, at: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            AllocationStatus::Available => {
                self.status = AllocationStatus::Allocated;
                self.demand = Some(demand);
                self.reserved_at = Some(at);
                self.reserved_by = Some(actor);
                Ok(())
            }
            AllocationStatus::Allocated => Err(DomainError::AlreadyReserved {
                lpn: self.lpn.to_string(),
            }),
            AllocationStatus::Picked => Err(DomainError::state_conflict(format!(
                "stock unit {} is picked, not available",
                self.lpn
            ))),
        }
    }

    /// allocated → picked, only for the demand holding the reservation.
    pub fn mark_picked(&mut self, demand: &DemandRef) -> DomainResult<()> {
        if self.status != AllocationStatus::Allocated {
            return Err(DomainError::state_conflict(format!(
                "stock unit {} is {}, not allocated",
                self.lpn, self.status
            )));
        }
        if !self.is_reserved_for(demand) {
            return Err(DomainError::state_conflict(format!(
                "stock unit {} is reserved for a different demand",
                self.lpn
            )));
        }
        self.status = AllocationStatus::Picked;
        Ok(())
    }

    /// picked → allocated, undoing a pick that could not be recorded.
    pub fn unpick(&mut self, demand: &DemandRef) -> DomainResult<()> {
        if self.status != AllocationStatus::Picked || !self.is_reserved_for(demand) {
            return Err(DomainError::state_conflict(format!(
                "stock unit {} is not picked for this demand",
                self.lpn
            )));
        }
        self.status = AllocationStatus::Allocated;
        Ok(())
    }

    /// Back to available with the demand reference cleared. Returns whether anything changed.
    pub fn release(&mut self) -> bool {
        if self.status == AllocationStatus::Available {
            return false;
        }
        self.status = AllocationStatus::Available;
        self.demand = None;
        self.reserved_at = None;
        self.reserved_by = None;
        true
    }
}

impl Entity for StockUnit {
    type Id = Lpn;

    fn id(&self) -> &Self::Id {
        &self.lpn
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Oldest stock first; LPN breaks ties so the order is total.
pub fn fifo_order(a: &StockUnit, b: &StockUnit) -> Ordering {
    a.putaway_at
        .cmp(&b.putaway_at)
        .then_with(|| a.lpn.cmp(&b.lpn))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn unit(lpn: &str, qty: i64) -> StockUnit {
        StockUnit::put_away(PutAway {
            tenant_id: TenantId::new(),
            lpn: Lpn::parse(lpn).unwrap(),
            sku_id: SkuId::new(),
            batch_number: "B1".into(),
            quantity: qty,
            location: "A-01-01".into(),
            warehouse: Some("WH1".into()),
            putaway_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        })
        .unwrap()
    }

    fn demand() -> DemandRef {
        DemandRef::job_line(JobId::new(), DemandLineId::new())
    }

    #[test]
    fn reserve_pick_release_keeps_status_and_demand_in_step() {
        let mut u = unit("LPN-1", 10);
        let d = demand();
        assert!(u.is_consistent());

        u.reserve(d, UserId::new(), Utc::now()).unwrap();
        assert_eq!(u.status(), AllocationStatus::Allocated);
        assert!(u.is_reserved_for(&d));
        assert!(u.is_consistent());

        u.mark_picked(&d).unwrap();
        assert_eq!(u.status(), AllocationStatus::Picked);
        assert!(u.is_consistent());

        assert!(u.release());
        assert_eq!(u.status(), AllocationStatus::Available);
        assert!(u.demand().is_none());
        assert!(u.reserved_by().is_none());
        assert!(u.is_consistent());
        assert!(!u.release());
    }

    #[test]
    fn second_reservation_is_rejected() {
        let mut u = unit("LPN-1", 10);
        u.reserve(demand(), UserId::new(), Utc::now()).unwrap();

        let err = u.reserve(demand(), UserId::new(), Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::AlreadyReserved { lpn: "LPN-1".into() });
    }

    #[test]
    fn picking_requires_matching_demand() {
        let mut u = unit("LPN-1", 10);
        u.reserve(demand(), UserId::new(), Utc::now()).unwrap();

        assert!(matches!(u.mark_picked(&demand()), Err(DomainError::StateConflict(_))));
        assert_eq!(u.status(), AllocationStatus::Allocated);
    }

    #[test]
    fn unpick_returns_the_unit_to_its_reservation() {
        let mut u = unit("LPN-1", 10);
        let d = demand();
        u.reserve(d, UserId::new(), Utc::now()).unwrap();
        assert!(u.unpick(&d).is_err());

        u.mark_picked(&d).unwrap();
        assert!(matches!(u.unpick(&demand()), Err(DomainError::StateConflict(_))));
        u.unpick(&d).unwrap();
        assert_eq!(u.status(), AllocationStatus::Allocated);
        assert!(u.is_reserved_for(&d));
        assert!(u.is_consistent());
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let err = StockUnit::put_away(PutAway {
            tenant_id: TenantId::new(),
            lpn: Lpn::parse("X").unwrap(),
            sku_id: SkuId::new(),
            batch_number: String::new(),
            quantity: -1,
            location: "A".into(),
            warehouse: None,
            putaway_at: Utc::now(),
        })
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn query_matches_sku_batch_and_warehouse() {
        let u = unit("LPN-1", 1);
        let mut q = StockQuery {
            sku_id: u.sku_id,
            batch_number: Some("B1".into()),
            warehouse: Some("WH1".into()),
        };
        assert!(q.matches(&u));

        q.batch_number = None;
        assert!(q.matches(&u));

        q.warehouse = Some("WH2".into());
        assert!(!q.matches(&u));
    }
}

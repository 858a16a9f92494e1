use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freightops_core::{DemandLineId, DomainError, DomainResult, Entity, JobId, Lpn, SkuId, TenantId, Versioned};

use crate::coverage::{Coverage, Progress};
use crate::sku::Sku;
use crate::unit::{StockQuery, StockUnit, fifo_order};

/// One SKU + batch requirement of an outbound job or a container stock allocation.
///
/// The `allocated_*`, `units` and `location` fields are derived: they are only
/// ever written by [`DemandLine::recompute_allocation`] from the set of units the
/// ledger reports as reserved against this line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandLine {
    pub id: DemandLineId,
    pub sku_id: SkuId,
    /// `None` accepts any batch of the SKU.
    pub batch_number: Option<String>,
    pub warehouse: Option<String>,
    pub required_qty: i64,
    pub required_weight_kg: f64,
    pub allocated_qty: i64,
    pub allocated_weight_kg: f64,
    pub allocated_volume_m3: f64,
    pub units: Vec<Lpn>,
    /// Location of the first reserved unit.
    pub location: Option<String>,
    /// Quantity confirmed by pickups (including operator buffers).
    pub picked_qty: i64,
}

impl DemandLine {
    pub fn new(
        id: DemandLineId,
        sku_id: SkuId,
        batch_number: Option<String>,
        required_qty: i64,
    ) -> DomainResult<Self> {
        if required_qty < 0 {
            return Err(DomainError::validation("required_qty cannot be negative"));
        }

        Ok(Self {
            id,
            sku_id,
            batch_number: batch_number.filter(|b| !b.trim().is_empty()),
            warehouse: None,
            required_qty,
            required_weight_kg: 0.0,
            allocated_qty: 0,
            allocated_weight_kg: 0.0,
            allocated_volume_m3: 0.0,
            units: Vec::new(),
            location: None,
            picked_qty: 0,
        })
    }

    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    pub fn with_required_weight(mut self, kg: f64) -> Self {
        self.required_weight_kg = kg;
        self
    }

    /// Ledger filter for units eligible to fill this line.
    pub fn query(&self) -> StockQuery {
        StockQuery {
            sku_id: self.sku_id,
            batch_number: self.batch_number.clone(),
            warehouse: self.warehouse.clone(),
        }
    }

    pub fn outstanding_qty(&self) -> i64 {
        (self.required_qty - self.allocated_qty).max(0)
    }

    pub fn is_over_allocated(&self) -> bool {
        self.allocated_qty > self.required_qty
    }

    pub fn allocation_progress(&self) -> Progress {
        Progress::new(self.allocated_qty, self.required_qty)
    }

    pub fn pickup_progress(&self) -> Progress {
        Progress::new(self.picked_qty, self.required_qty)
    }

    /// Rebuild derived allocation fields from the units currently reserved for this line.
    ///
    /// Weight scales with quantity. Volume is the SKU's per-unit cubic measure and
    /// is taken once per line, not accumulated per unit.
    pub fn recompute_allocation(&mut self, reserved: &[StockUnit], sku: &Sku) {
        let mut ordered: Vec<&StockUnit> = reserved.iter().collect();
        ordered.sort_by(|a, b| fifo_order(a, b));

        self.allocated_qty = ordered.iter().map(|u| u.quantity).sum();
        self.units = ordered.iter().map(|u| u.lpn().clone()).collect();
        self.location = ordered.first().map(|u| u.location.clone());
        self.allocated_weight_kg = sku.weight_for(self.allocated_qty);
        self.allocated_volume_m3 = if self.allocated_qty > 0 {
            sku.unit_cubic_m3
        } else {
            0.0
        };
    }

    /// Forget everything derived from held units once they are all back in stock.
    pub fn clear_allocation(&mut self) {
        self.allocated_qty = 0;
        self.allocated_weight_kg = 0.0;
        self.allocated_volume_m3 = 0.0;
        self.units.clear();
        self.location = None;
        self.picked_qty = 0;
    }
}

/// Outbound job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Draft,
    PartiallyAllocated,
    Allocated,
    PartiallyPicked,
    Picked,
    Cancelled,
}

impl JobStatus {
    fn is_picking(&self) -> bool {
        matches!(self, JobStatus::PartiallyPicked | JobStatus::Picked)
    }
}

/// Outbound job: the demand side of allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundJob {
    pub id: JobId,
    pub tenant_id: TenantId,
    pub reference: String,
    status: JobStatus,
    lines: Vec<DemandLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    version: u64,
}

impl OutboundJob {
    /// A draft job. Lines arrive as requirements only: any allocation or
    /// pickup state they carry is dropped, since only the ledger can back it.
    pub fn new(
        tenant_id: TenantId,
        id: JobId,
        reference: impl Into<String>,
        mut lines: Vec<DemandLine>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let reference = reference.into();
        if reference.trim().is_empty() {
            return Err(DomainError::validation("job reference cannot be empty"));
        }
        let mut seen = std::collections::HashSet::new();
        if !lines.iter().all(|l| seen.insert(l.id)) {
            return Err(DomainError::validation("duplicate demand line id"));
        }
        lines.iter_mut().for_each(DemandLine::clear_allocation);

        Ok(Self {
            id,
            tenant_id,
            reference,
            status: JobStatus::Draft,
            lines,
            created_at: at,
            updated_at: at,
            version: 0,
        })
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn lines(&self) -> &[DemandLine] {
        &self.lines
    }

    pub fn line(&self, line_id: DemandLineId) -> DomainResult<&DemandLine> {
        self.lines
            .iter()
            .find(|l| l.id == line_id)
            .ok_or_else(|| DomainError::not_found(format!("demand line {line_id} on job {}", self.id)))
    }

    pub fn line_mut(&mut self, line_id: DemandLineId) -> DomainResult<&mut DemandLine> {
        let job_id = self.id;
        self.lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or_else(|| DomainError::not_found(format!("demand line {line_id} on job {job_id}")))
    }

    /// Allocation requires a job that is neither cancelled nor fully picked.
    pub fn ensure_allocatable(&self) -> DomainResult<()> {
        match self.status {
            JobStatus::Cancelled | JobStatus::Picked => Err(DomainError::state_conflict(format!(
                "job {} is {:?} and cannot take new allocations",
                self.id, self.status
            ))),
            _ => Ok(()),
        }
    }

    pub fn allocation_coverage(&self) -> Coverage {
        Coverage::assess(self.lines.iter().map(DemandLine::allocation_progress))
    }

    pub fn pickup_coverage(&self) -> Coverage {
        Coverage::assess(self.lines.iter().map(DemandLine::pickup_progress))
    }

    /// Re-derive the status after a line's allocation changed.
    ///
    /// Picking and cancelled jobs keep their status. Returns `(from, to)` when it changed.
    pub fn refresh_allocation_status(&mut self, at: DateTime<Utc>) -> Option<(JobStatus, JobStatus)> {
        if self.status == JobStatus::Cancelled || self.status.is_picking() {
            return None;
        }
        let next = match self.allocation_coverage() {
            Coverage::Full => JobStatus::Allocated,
            Coverage::Partial => JobStatus::PartiallyAllocated,
            Coverage::None => JobStatus::Draft,
        };
        self.set_status(next, at)
    }

    /// Re-derive the status after a pickup was recorded.
    pub fn refresh_pickup_status(&mut self, at: DateTime<Utc>) -> Option<(JobStatus, JobStatus)> {
        if self.status == JobStatus::Cancelled {
            return None;
        }
        match self.pickup_coverage() {
            Coverage::Full => self.set_status(JobStatus::Picked, at),
            Coverage::Partial => self.set_status(JobStatus::PartiallyPicked, at),
            Coverage::None => None,
        }
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) -> Option<(JobStatus, JobStatus)> {
        self.set_status(JobStatus::Cancelled, at)
    }

    fn set_status(&mut self, next: JobStatus, at: DateTime<Utc>) -> Option<(JobStatus, JobStatus)> {
        if self.status == next {
            return None;
        }
        let previous = self.status;
        self.status = next;
        self.updated_at = at;
        Some((previous, next))
    }
}

impl Entity for OutboundJob {
    type Id = JobId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Versioned for OutboundJob {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

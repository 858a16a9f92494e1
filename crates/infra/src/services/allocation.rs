//! Allocation Algorithm: reserve stock units against a demand line.
//!
//! ```text
//! allocate(demand, mode)
//!   ↓
//! 1. Load the owning job / stock allocation and the line's SKU
//!   ↓
//! 2. Select candidates (manual LPN list, or FIFO over available stock)
//!   ↓
//! 3. Reserve each candidate through the ledger (per-unit CAS)
//!      └─ a failure part-way releases what this call reserved, then aborts
//!   ↓
//! 4. Recompute the line from the ledger's reserved set, refresh job status,
//!    store the owner if it is unchanged since loading
//!      └─ a concurrent write reloads and recomputes; giving up releases this call's units
//!   ↓
//! 5. Publish events
//! ```
//!
//! Both modes are all-or-nothing per call. Calls are additive: units reserved
//! by earlier calls stay with the line and count towards its totals.
//!
//! A failed reserve is never skipped over in favour of the next candidate,
//! since that would break oldest-first ordering. The caller retries with a
//! fresh call, which re-reads the available pool.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use freightops_booking::BookingStatus;
use freightops_core::{DomainError, DomainResult, EngineConfig, JobId, Lpn, OperationContext};
use freightops_stock::{
    Coverage, DemandLine, DemandOwner, DemandRef, JobStatus, JobStatusChanged, StockEvent, StockUnit, UnitReleased,
    UnitReserved, select_fifo, select_manual,
};

use crate::ledger::StockLedger;
use crate::publisher::EventPublisher;
use crate::repositories::Repositories;
use crate::resolver::OwnerResolver;
use crate::services::holder::{DemandHolder, resync_lines};

/// How candidates are chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AllocationMode {
    /// Reserve exactly these units.
    Manual { lpns: Vec<Lpn> },
    /// Reserve the oldest whole units covering `quantity`; `None` means the
    /// line's outstanding quantity.
    Automatic { quantity: Option<i64> },
}

/// Non-fatal observations about a successful allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllocationWarning {
    /// Whole units pushed the line past its required quantity.
    OverAllocated { allocated: i64, required: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationResult {
    pub demand: DemandRef,
    /// The line after recomputation.
    pub line: DemandLine,
    /// Units reserved by this call, oldest first.
    pub reserved: Vec<StockUnit>,
    /// Allocation coverage of the owning job / stock allocation.
    pub coverage: Coverage,
    pub job_status: Option<JobStatus>,
    pub warnings: Vec<AllocationWarning>,
    /// Statuses the owning booking can move to now (stock allocation lines only).
    pub booking_next_statuses: Option<Vec<BookingStatus>>,
}

/// Units returned to stock by a release or cancellation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseOutcome {
    pub released: Vec<Lpn>,
    pub job_status: Option<JobStatus>,
}

pub struct AllocationService<L> {
    ledger: L,
    repos: Repositories,
    resolver: OwnerResolver,
    publisher: Arc<EventPublisher>,
    config: EngineConfig,
}

impl<L> AllocationService<L>
where
    L: StockLedger,
{
    pub fn new(ledger: L, repos: Repositories, publisher: Arc<EventPublisher>, config: EngineConfig) -> Self {
        Self {
            ledger,
            resolver: OwnerResolver::new(repos.clone()),
            repos,
            publisher,
            config,
        }
    }

    pub fn allocate(
        &self,
        ctx: &OperationContext,
        demand: DemandRef,
        mode: AllocationMode,
    ) -> DomainResult<AllocationResult> {
        let tenant_id = ctx.tenant_id();
        let holder = DemandHolder::load(&self.repos, tenant_id, demand.owner)?;
        holder.ensure_open()?;
        let line = holder.line(demand.line_id)?.clone();
        self.repos.sku(tenant_id, line.sku_id)?;

        let selected = match &mode {
            AllocationMode::Manual { lpns } => self.select_manual(ctx, &line, lpns)?,
            AllocationMode::Automatic { quantity } => self.select_fifo(ctx, &line, *quantity)?,
        };

        let reserved = self.reserve_all(ctx, demand, &selected)?;

        let committed = DemandHolder::commit(&self.repos, tenant_id, demand.owner, |holder| {
            holder.ensure_open()?;
            let updated = holder.recompute_line(&self.ledger, &self.repos, tenant_id, &demand)?;
            Ok((updated, holder.refresh_allocation_status(ctx.occurred_at())))
        });
        let (holder, (updated, status_change)) = match committed {
            Ok(committed) => committed,
            Err(e) => {
                tracing::warn!(line_id = %demand.line_id, error = %e, "owner not stored; releasing this call's units");
                self.roll_back(ctx, &reserved);
                resync_lines(&self.ledger, &self.repos, ctx, &[demand]);
                return Err(e);
            }
        };

        let mut warnings = Vec::new();
        if updated.is_over_allocated() {
            tracing::warn!(
                line_id = %updated.id,
                allocated = updated.allocated_qty,
                required = updated.required_qty,
                "line is over-allocated"
            );
            warnings.push(AllocationWarning::OverAllocated {
                allocated: updated.allocated_qty,
                required: updated.required_qty,
            });
        }

        let mut events: Vec<StockEvent> = reserved
            .iter()
            .map(|unit| {
                StockEvent::UnitReserved(UnitReserved {
                    tenant_id,
                    lpn: unit.lpn().clone(),
                    demand,
                    quantity: unit.quantity,
                    actor: ctx.actor_id(),
                    occurred_at: ctx.occurred_at(),
                })
            })
            .collect();
        if let (Some((from, to)), DemandHolder::Job(job)) = (status_change, &holder) {
            events.push(job_status_changed(ctx, job.id, from, to));
        }
        self.publisher.publish_all(&events);

        let booking_next_statuses = match &holder {
            DemandHolder::Allocation(allocation) => {
                match self.resolver.load_aggregate(ctx, allocation.owner) {
                    Ok(aggregate) => Some(aggregate.next_valid_statuses()),
                    Err(e) => {
                        tracing::warn!(booking = %allocation.owner, error = %e, "could not evaluate booking transitions");
                        None
                    }
                }
            }
            DemandHolder::Job(_) => None,
        };

        tracing::info!(
            tenant_id = %tenant_id,
            line_id = %demand.line_id,
            units = reserved.len(),
            allocated = updated.allocated_qty,
            required = updated.required_qty,
            "stock allocated"
        );

        Ok(AllocationResult {
            demand,
            line: updated,
            reserved,
            coverage: holder.allocation_coverage(),
            job_status: holder.job_status(),
            warnings,
            booking_next_statuses,
        })
    }

    /// Return every unit a line holds to stock (line deleted or emptied).
    pub fn release_demand(&self, ctx: &OperationContext, demand: DemandRef) -> DomainResult<ReleaseOutcome> {
        let tenant_id = ctx.tenant_id();
        let mut released = Vec::new();
        let (holder, status_change) = DemandHolder::commit(&self.repos, tenant_id, demand.owner, |holder| {
            holder.line(demand.line_id)?;
            for lpn in self.release_units(ctx, &demand)? {
                if !released.contains(&lpn) {
                    released.push(lpn);
                }
            }
            holder.line_mut(demand.line_id)?.clear_allocation();
            // Picks up anything reserved for the line after the release above.
            holder.recompute_line(&self.ledger, &self.repos, tenant_id, &demand)?;
            Ok(holder.refresh_allocation_status(ctx.occurred_at()))
        })?;

        let mut events = released_events(ctx, &demand, &released);
        if let (Some((from, to)), DemandHolder::Job(job)) = (status_change, &holder) {
            events.push(job_status_changed(ctx, job.id, from, to));
        }
        self.publisher.publish_all(&events);

        tracing::info!(line_id = %demand.line_id, units = released.len(), "demand line released");

        Ok(ReleaseOutcome {
            released,
            job_status: holder.job_status(),
        })
    }

    /// Release every line of a job and mark it cancelled.
    pub fn cancel_job(&self, ctx: &OperationContext, job_id: JobId) -> DomainResult<ReleaseOutcome> {
        let mut released: Vec<(DemandRef, Lpn)> = Vec::new();
        let (_, status_change) = DemandHolder::commit(&self.repos, ctx.tenant_id(), DemandOwner::Job(job_id), |holder| {
            let DemandHolder::Job(job) = holder else {
                return Err(DomainError::invariant(format!("job {job_id} resolved to a stock allocation")));
            };
            if job.status() == JobStatus::Cancelled {
                return Err(DomainError::state_conflict(format!("job {job_id} is already cancelled")));
            }

            let line_ids: Vec<_> = job.lines().iter().map(|l| l.id).collect();
            for line_id in line_ids {
                let demand = DemandRef::job_line(job_id, line_id);
                for lpn in self.release_units(ctx, &demand)? {
                    if !released.iter().any(|(_, seen)| *seen == lpn) {
                        released.push((demand, lpn));
                    }
                }
                job.line_mut(line_id)?.clear_allocation();
            }
            Ok(job.cancel(ctx.occurred_at()))
        })?;

        let mut events: Vec<StockEvent> = released
            .iter()
            .flat_map(|(demand, lpn)| released_events(ctx, demand, std::slice::from_ref(lpn)))
            .collect();
        if let Some((from, to)) = status_change {
            events.push(job_status_changed(ctx, job_id, from, to));
        }
        self.publisher.publish_all(&events);

        tracing::info!(job_id = %job_id, units = released.len(), "job cancelled");

        Ok(ReleaseOutcome {
            released: released.into_iter().map(|(_, lpn)| lpn).collect(),
            job_status: Some(JobStatus::Cancelled),
        })
    }

    fn select_manual(&self, ctx: &OperationContext, line: &DemandLine, lpns: &[Lpn]) -> DomainResult<Vec<StockUnit>> {
        let found = self.ledger.get_many(ctx.tenant_id(), lpns)?;
        let selected = select_manual(line, lpns, &found)?;

        let projected = line.allocated_qty + selected.iter().map(|u| u.quantity).sum::<i64>();
        if projected > line.required_qty && !self.config.allow_manual_over_allocation {
            return Err(DomainError::validation(format!(
                "selected units bring line {} to {projected}, above the required {}",
                line.id, line.required_qty
            )));
        }
        Ok(selected)
    }

    fn select_fifo(
        &self,
        ctx: &OperationContext,
        line: &DemandLine,
        quantity: Option<i64>,
    ) -> DomainResult<Vec<StockUnit>> {
        let required = match quantity {
            Some(q) if q <= 0 => return Err(DomainError::validation("quantity must be positive")),
            Some(q) => q,
            None if line.outstanding_qty() == 0 => {
                return Err(DomainError::validation(format!(
                    "line {} has no outstanding quantity",
                    line.id
                )));
            }
            None => line.outstanding_qty(),
        };

        let candidates = self.ledger.find_available(ctx.tenant_id(), &line.query())?;
        tracing::debug!(line_id = %line.id, candidates = candidates.len(), required, "fifo candidates listed");

        Ok(select_fifo(&candidates, required)?.into_iter().cloned().collect())
    }

    fn reserve_all(
        &self,
        ctx: &OperationContext,
        demand: DemandRef,
        selected: &[StockUnit],
    ) -> DomainResult<Vec<StockUnit>> {
        let mut reserved = Vec::with_capacity(selected.len());
        for unit in selected {
            match self
                .ledger
                .reserve(ctx.tenant_id(), unit.lpn(), demand, ctx.actor_id(), ctx.occurred_at())
            {
                Ok(unit) => reserved.push(unit),
                Err(e) => {
                    tracing::warn!(
                        lpn = %unit.lpn(),
                        reserved = reserved.len(),
                        error = %e,
                        "reservation lost part-way; releasing this attempt's units"
                    );
                    self.roll_back(ctx, &reserved);
                    if !reserved.is_empty() {
                        resync_lines(&self.ledger, &self.repos, ctx, &[demand]);
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(reserved)
    }

    fn roll_back(&self, ctx: &OperationContext, reserved: &[StockUnit]) {
        for unit in reserved {
            if let Err(e) = self.ledger.release(ctx.tenant_id(), unit.lpn()) {
                tracing::error!(lpn = %unit.lpn(), error = %e, "failed to release unit during rollback");
            }
        }
    }

    fn release_units(&self, ctx: &OperationContext, demand: &DemandRef) -> DomainResult<Vec<Lpn>> {
        let held = self.ledger.find_by_demand(ctx.tenant_id(), demand)?;
        let mut released = Vec::with_capacity(held.len());
        for unit in held {
            self.ledger.release(ctx.tenant_id(), unit.lpn())?;
            released.push(unit.lpn().clone());
        }
        Ok(released)
    }
}

fn released_events(ctx: &OperationContext, demand: &DemandRef, lpns: &[Lpn]) -> Vec<StockEvent> {
    lpns.iter()
        .map(|lpn| {
            StockEvent::UnitReleased(UnitReleased {
                tenant_id: ctx.tenant_id(),
                lpn: lpn.clone(),
                demand: *demand,
                actor: ctx.actor_id(),
                occurred_at: ctx.occurred_at(),
            })
        })
        .collect()
}

pub(crate) fn job_status_changed(ctx: &OperationContext, job_id: JobId, from: JobStatus, to: JobStatus) -> StockEvent {
    StockEvent::JobStatusChanged(JobStatusChanged {
        tenant_id: ctx.tenant_id(),
        job_id,
        from,
        to,
        actor: ctx.actor_id(),
        occurred_at: ctx.occurred_at(),
    })
}

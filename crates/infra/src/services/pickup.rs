//! Pickup Recorder.
//!
//! A pickup names its target explicitly: one demand line, or every line of one
//! export stock allocation. Requested units that do not belong to the target,
//! are not reserved, or were already picked are skipped with a warning; the
//! call fails only when no unit at all can be picked.
//!
//! After the units are marked picked, the record is stored, line quantities are bumped and the
//! owner's completion is re-derived with the same full/partial/none rule that
//! allocation uses: a job moves to `partially_picked` / `picked`, a stock
//! allocation moves to the `picked` stage and its container to
//! `partially_picked_up` / `picked_up`. If the record or the owner cannot be
//! stored, the picks are undone before the error is returned.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use freightops_booking::{
    AllocationStage, AllocationStageChanged, BookingEvent, ContainerStatus, ContainerStatusChanged, ExportStage,
    StockAllocation,
};
use freightops_core::{
    DomainError, DomainResult, EngineConfig, Entity, ExpectedVersion, Lpn, OperationContext, PickupId,
};
use freightops_stock::{
    AllocationStatus, Coverage, DemandRef, JobStatus, PickupRecord, PickupRecorded, PickupTarget, PickupWarning,
    Screening, StockEvent, StockUnit, UnitPicked, UnitReleased, screen_units,
};

use crate::ledger::StockLedger;
use crate::publisher::EventPublisher;
use crate::repositories::Repositories;
use crate::services::allocation::job_status_changed;
use crate::services::holder::{DemandHolder, MAX_COMMIT_ATTEMPTS, resync_lines};
use crate::store::{StoreError, TenantStore, VersionedStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupRequest {
    pub target: PickupTarget,
    pub lpns: Vec<Lpn>,
    /// Operator-entered correction added to the picked quantity.
    #[serde(default)]
    pub buffer_qty: i64,
    /// Release the target's reservations that were not picked.
    #[serde(default)]
    pub close_line: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickupOutcome {
    pub record: PickupRecord,
    pub warnings: Vec<PickupWarning>,
    /// Pickup coverage of the owning job / stock allocation.
    pub coverage: Coverage,
    pub job_status: Option<JobStatus>,
    pub allocation_stage: Option<AllocationStage>,
    pub container_status: Option<ContainerStatus>,
    /// Reservations given back because of `close_line`.
    pub released: Vec<Lpn>,
}

pub struct PickupService<L> {
    ledger: L,
    repos: Repositories,
    publisher: Arc<EventPublisher>,
    config: EngineConfig,
}

impl<L> PickupService<L>
where
    L: StockLedger,
{
    pub fn new(ledger: L, repos: Repositories, publisher: Arc<EventPublisher>, config: EngineConfig) -> Self {
        Self {
            ledger,
            repos,
            publisher,
            config,
        }
    }

    pub fn record_pickup(&self, ctx: &OperationContext, request: PickupRequest) -> DomainResult<PickupOutcome> {
        let tenant_id = ctx.tenant_id();
        if request.lpns.is_empty() {
            return Err(DomainError::validation("at least one lpn is required"));
        }
        self.check_buffer(request.buffer_qty)?;

        let holder = DemandHolder::load(&self.repos, tenant_id, request.target.owner())?;
        holder.ensure_open()?;
        if let PickupTarget::Line { demand } = &request.target {
            holder.line(demand.line_id)?;
        }

        let found = self.ledger.get_many(tenant_id, &request.lpns)?;
        let Screening { accepted, mut warnings } =
            screen_units(&request.target, &request.lpns, |lpn| found.get(lpn).cloned());

        let accepted_qty: i64 = accepted.iter().map(|u| u.quantity).sum();
        if !accepted.is_empty() && accepted_qty + request.buffer_qty < 0 {
            return Err(DomainError::validation(format!(
                "buffer {} would make the picked quantity negative",
                request.buffer_qty
            )));
        }

        let picked = self.mark_all(ctx, &request.target, accepted, &mut warnings)?;
        for warning in &warnings {
            tracing::warn!(lpn = %warning.lpn, reason = ?warning.reason, "unit skipped during pickup");
        }
        if picked.is_empty() {
            let detail: Vec<String> = warnings.iter().map(ToString::to_string).collect();
            return Err(DomainError::validation(format!(
                "none of the requested units can be picked: {}",
                detail.join(", ")
            )));
        }

        let mut released = Vec::new();
        let (record, holder, applied) = match self.settle(ctx, &request, &picked, &mut released) {
            Ok(settled) => settled,
            Err(e) => {
                self.compensate(ctx, &picked, &released);
                return Err(e);
            }
        };

        let mut stock_events: Vec<StockEvent> = Vec::new();
        let mut booking_events: Vec<BookingEvent> = Vec::new();
        if let (Some((from, to)), DemandHolder::Job(job)) = (applied.job_change, &holder) {
            stock_events.push(job_status_changed(ctx, job.id, from, to));
        }

        let mut allocation_stage = None;
        let mut container_status = None;
        if let DemandHolder::Allocation(allocation) = &holder {
            if let Some((from, to)) = applied.stage_change {
                booking_events.push(BookingEvent::AllocationStageChanged(AllocationStageChanged {
                    tenant_id,
                    booking: allocation.owner,
                    allocation_id: allocation.id,
                    from,
                    to,
                    occurred_at: ctx.occurred_at(),
                }));
            }
            allocation_stage = Some(allocation.stage());
            // The pickup is already stored; the container catches up on the next one.
            container_status = match self.update_container(ctx, allocation, &mut booking_events) {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(container_id = %allocation.container_id, error = %e, "container status not updated");
                    None
                }
            };
        }

        stock_events.extend(picked.iter().filter_map(|unit| {
            unit.demand().map(|demand| {
                StockEvent::UnitPicked(UnitPicked {
                    tenant_id,
                    lpn: unit.lpn().clone(),
                    demand: *demand,
                    quantity: unit.quantity,
                    actor: ctx.actor_id(),
                    occurred_at: ctx.occurred_at(),
                })
            })
        }));
        stock_events.extend(released.iter().map(|(lpn, demand)| {
            StockEvent::UnitReleased(UnitReleased {
                tenant_id,
                lpn: lpn.clone(),
                demand: *demand,
                actor: ctx.actor_id(),
                occurred_at: ctx.occurred_at(),
            })
        }));
        stock_events.push(StockEvent::PickupRecorded(PickupRecorded {
            tenant_id,
            pickup_id: *record.id(),
            target: request.target,
            picked_qty: record.picked_qty(),
            final_qty: record.final_qty(),
            warnings: warnings.len(),
            actor: ctx.actor_id(),
            occurred_at: ctx.occurred_at(),
        }));
        self.publisher.publish_all(&stock_events);
        self.publisher.publish_all(&booking_events);

        tracing::info!(
            pickup_id = %record.id(),
            units = record.units().len(),
            picked_qty = record.picked_qty(),
            final_qty = record.final_qty(),
            warnings = warnings.len(),
            "pickup recorded"
        );

        Ok(PickupOutcome {
            record,
            warnings,
            coverage: applied.coverage,
            job_status: holder.job_status(),
            allocation_stage,
            container_status,
            released: released.into_iter().map(|(lpn, _)| lpn).collect(),
        })
    }

    fn check_buffer(&self, buffer_qty: i64) -> DomainResult<()> {
        match self.config.max_pickup_buffer {
            Some(max) if buffer_qty.abs() > max => Err(DomainError::validation(format!(
                "buffer quantity {buffer_qty} exceeds the configured maximum of {max}"
            ))),
            _ => Ok(()),
        }
    }

    /// Mark screened units picked. A unit that changed hands since screening is
    /// re-screened and reported as a warning instead.
    fn mark_all(
        &self,
        ctx: &OperationContext,
        target: &PickupTarget,
        accepted: Vec<StockUnit>,
        warnings: &mut Vec<PickupWarning>,
    ) -> DomainResult<Vec<StockUnit>> {
        let mut picked = Vec::with_capacity(accepted.len());
        for unit in accepted {
            let Some(demand) = unit.demand().copied() else {
                continue;
            };
            match self.ledger.mark_picked(ctx.tenant_id(), unit.lpn(), &demand) {
                Ok(unit) => picked.push(unit),
                Err(e) => {
                    tracing::debug!(lpn = %unit.lpn(), error = %e, "unit changed since screening");
                    let fresh = match self.ledger.get(ctx.tenant_id(), unit.lpn()) {
                        Ok(fresh) => fresh,
                        Err(e) => {
                            self.compensate(ctx, &picked, &[]);
                            return Err(e.into());
                        }
                    };
                    let late = screen_units(target, std::slice::from_ref(unit.lpn()), |_| fresh.clone());
                    warnings.extend(late.warnings);
                }
            }
        }
        Ok(picked)
    }

    /// Store the pickup record and the owner's new totals. `released` collects
    /// the reservations given back on close, also when this fails part-way.
    fn settle(
        &self,
        ctx: &OperationContext,
        request: &PickupRequest,
        picked: &[StockUnit],
        released: &mut Vec<(Lpn, DemandRef)>,
    ) -> DomainResult<(PickupRecord, DemandHolder, Applied)> {
        let tenant_id = ctx.tenant_id();
        let record = PickupRecord::new(
            tenant_id,
            PickupId::new(),
            request.target,
            picked,
            request.buffer_qty,
            ctx.actor_id(),
            ctx.occurred_at(),
        )?;
        self.repos.pickups.insert(record.clone())?;

        let committed = DemandHolder::commit(&self.repos, tenant_id, request.target.owner(), |holder| {
            self.apply(ctx, request, picked, holder, released)
        });
        match committed {
            Ok((holder, applied)) => Ok((record, holder, applied)),
            Err(e) => {
                if let Err(undo) = self.repos.pickups.remove(tenant_id, record.id()) {
                    tracing::error!(pickup_id = %record.id(), error = %undo, "orphaned pickup record not removed");
                }
                Err(e)
            }
        }
    }

    /// Bump picked quantities on a freshly loaded owner and re-derive its completion.
    fn apply(
        &self,
        ctx: &OperationContext,
        request: &PickupRequest,
        picked: &[StockUnit],
        holder: &mut DemandHolder,
        released: &mut Vec<(Lpn, DemandRef)>,
    ) -> DomainResult<Applied> {
        if let PickupTarget::Line { demand } = &request.target {
            holder.line(demand.line_id)?;
        }
        for unit in picked {
            if let Some(demand) = unit.demand() {
                holder.line_mut(demand.line_id)?.picked_qty += unit.quantity;
            }
        }
        if let PickupTarget::Line { demand } = &request.target {
            holder.line_mut(demand.line_id)?.picked_qty += request.buffer_qty;
        }
        if request.close_line {
            self.close_remaining(ctx, &request.target, holder, released)?;
        }

        let coverage = holder.pickup_coverage();
        let mut applied = Applied {
            coverage,
            job_change: None,
            stage_change: None,
        };
        match holder {
            DemandHolder::Job(job) => applied.job_change = job.refresh_pickup_status(ctx.occurred_at()),
            DemandHolder::Allocation(allocation) => {
                let to = AllocationStage::Export(ExportStage::Picked);
                let from = allocation.stage();
                if coverage == Coverage::Full && from != to {
                    allocation.set_stage(to)?;
                    applied.stage_change = Some((from, to));
                }
            }
        }
        Ok(applied)
    }

    /// Release the target's still-allocated units and recompute the affected lines.
    fn close_remaining(
        &self,
        ctx: &OperationContext,
        target: &PickupTarget,
        holder: &mut DemandHolder,
        released: &mut Vec<(Lpn, DemandRef)>,
    ) -> DomainResult<()> {
        let tenant_id = ctx.tenant_id();
        let held = match target {
            PickupTarget::Line { demand } => self.ledger.find_by_demand(tenant_id, demand)?,
            PickupTarget::Allocation { .. } => self.ledger.find_by_owner(tenant_id, &target.owner())?,
        };

        let before = released.len();
        for unit in held.into_iter().filter(|u| u.status() == AllocationStatus::Allocated) {
            let Some(demand) = unit.demand().copied() else {
                continue;
            };
            self.ledger.release(tenant_id, unit.lpn())?;
            released.push((unit.lpn().clone(), demand));
        }

        // Earlier attempts may have released units whose lines this copy has not seen yet.
        let touched: HashSet<_> = released.iter().map(|(_, demand)| *demand).collect();
        for demand in touched {
            holder.recompute_line(&self.ledger, &self.repos, tenant_id, &demand)?;
        }

        if released.len() > before {
            tracing::info!(units = released.len() - before, "unpicked reservations released on close");
        }
        Ok(())
    }

    /// Undo a pickup that could not be stored: picked units go back to their
    /// reservation and units released on close are reserved again.
    fn compensate(&self, ctx: &OperationContext, picked: &[StockUnit], released: &[(Lpn, DemandRef)]) {
        let tenant_id = ctx.tenant_id();
        for unit in picked {
            let Some(demand) = unit.demand() else {
                continue;
            };
            if let Err(e) = self.ledger.unpick(tenant_id, unit.lpn(), demand) {
                tracing::error!(lpn = %unit.lpn(), error = %e, "failed to undo pick");
            }
        }
        for (lpn, demand) in released {
            if let Err(e) = self.ledger.reserve(tenant_id, lpn, *demand, ctx.actor_id(), ctx.occurred_at()) {
                tracing::error!(lpn = %lpn, error = %e, "reservation released on close could not be restored");
            }
        }
        if !released.is_empty() {
            let touched: Vec<DemandRef> = released
                .iter()
                .map(|(_, demand)| *demand)
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            resync_lines(&self.ledger, &self.repos, ctx, &touched);
        }
        tracing::warn!(units = picked.len(), restored = released.len(), "pickup not stored; picks undone");
    }

    /// Move the container with the allocation's pickup coverage, read fresh on every attempt.
    fn update_container(
        &self,
        ctx: &OperationContext,
        allocation: &StockAllocation,
        events: &mut Vec<BookingEvent>,
    ) -> DomainResult<Option<ContainerStatus>> {
        let tenant_id = ctx.tenant_id();
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let Some(mut container) = self.repos.containers.get(tenant_id, &allocation.container_id)? else {
                tracing::warn!(
                    container_id = %allocation.container_id,
                    "stock allocation points at a missing container"
                );
                return Ok(None);
            };
            let coverage = self
                .repos
                .allocations
                .get(tenant_id, &allocation.id)?
                .map_or_else(|| allocation.pickup_coverage(), |current| current.pickup_coverage());

            let next = match coverage {
                Coverage::Full => ContainerStatus::PickedUp,
                Coverage::Partial => ContainerStatus::PartiallyPickedUp,
                Coverage::None => return Ok(Some(container.status)),
            };
            if container.status == next {
                return Ok(Some(next));
            }

            let from = container.status;
            let expected = ExpectedVersion::of(&container);
            container.status = next;
            match self.repos.containers.update(container, expected) {
                Ok(stored) => {
                    events.push(BookingEvent::ContainerStatusChanged(ContainerStatusChanged {
                        tenant_id,
                        booking: allocation.owner,
                        container_id: stored.id,
                        from,
                        to: next,
                        occurred_at: ctx.occurred_at(),
                    }));
                    return Ok(Some(next));
                }
                Err(StoreError::Concurrency(msg)) => {
                    tracing::debug!(container_id = %allocation.container_id, %msg, "container changed concurrently");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(DomainError::state_conflict(format!(
            "container {} kept changing concurrently",
            allocation.container_id
        )))
    }
}

/// What a pickup changed on the owner, from the attempt that was stored.
struct Applied {
    coverage: Coverage,
    job_change: Option<(JobStatus, JobStatus)>,
    stage_change: Option<(AllocationStage, AllocationStage)>,
}

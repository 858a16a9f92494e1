//! The record that owns a demand line: an outbound job or an export stock allocation.
//!
//! Writes go through [`DemandHolder::commit`]: reload, apply, then store only if
//! nobody else stored the record in between. A concurrent write sends the change
//! round again on the fresh copy, so changes must be derived from the reloaded
//! record and the ledger, never from values read before the call.

use chrono::{DateTime, Utc};

use freightops_booking::StockAllocation;
use freightops_core::{DemandLineId, DomainError, DomainResult, ExpectedVersion, OperationContext, TenantId};
use freightops_stock::{Coverage, DemandLine, DemandOwner, DemandRef, JobStatus, OutboundJob};

use crate::ledger::StockLedger;
use crate::repositories::Repositories;
use crate::store::{StoreError, VersionedStore};

/// Conditional writes attempted before a concurrent change is reported to the caller.
pub(crate) const MAX_COMMIT_ATTEMPTS: usize = 16;

pub(crate) enum DemandHolder {
    Job(OutboundJob),
    Allocation(StockAllocation),
}

impl DemandHolder {
    pub(crate) fn load(repos: &Repositories, tenant_id: TenantId, owner: DemandOwner) -> DomainResult<Self> {
        match owner {
            DemandOwner::Job(id) => repos
                .jobs
                .get(tenant_id, &id)?
                .map(DemandHolder::Job)
                .ok_or_else(|| DomainError::not_found(format!("outbound job {id}"))),
            DemandOwner::Allocation(id) => repos
                .allocations
                .get(tenant_id, &id)?
                .map(DemandHolder::Allocation)
                .ok_or_else(|| DomainError::not_found(format!("stock allocation {id}"))),
        }
    }

    /// Store the record if it is still at the version it was loaded with.
    fn save(&self, repos: &Repositories) -> Result<Self, StoreError> {
        Ok(match self {
            DemandHolder::Job(job) => DemandHolder::Job(repos.jobs.update(job.clone(), ExpectedVersion::of(job))?),
            DemandHolder::Allocation(allocation) => DemandHolder::Allocation(
                repos
                    .allocations
                    .update(allocation.clone(), ExpectedVersion::of(allocation))?,
            ),
        })
    }

    /// Load `owner`, run `change` on it and store the result conditionally.
    ///
    /// Returns the stored record and whatever `change` returned on the attempt
    /// that stuck. An error from `change` aborts without writing.
    pub(crate) fn commit<T, F>(
        repos: &Repositories,
        tenant_id: TenantId,
        owner: DemandOwner,
        mut change: F,
    ) -> DomainResult<(Self, T)>
    where
        F: FnMut(&mut DemandHolder) -> DomainResult<T>,
    {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let mut holder = Self::load(repos, tenant_id, owner)?;
            let outcome = change(&mut holder)?;
            match holder.save(repos) {
                Ok(stored) => return Ok((stored, outcome)),
                Err(StoreError::Concurrency(msg)) => {
                    tracing::debug!(
                        owner = %owner.stream_id(),
                        attempt,
                        %msg,
                        "owner changed concurrently; reapplying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(DomainError::state_conflict(format!(
            "{} kept changing concurrently; retry the request",
            owner.stream_id()
        )))
    }

    /// Whether new stock may be reserved against (or picked for) this record.
    pub(crate) fn ensure_open(&self) -> DomainResult<()> {
        match self {
            DemandHolder::Job(job) => job.ensure_allocatable(),
            DemandHolder::Allocation(allocation) => allocation.ensure_accepts_stock(),
        }
    }

    pub(crate) fn line(&self, line_id: DemandLineId) -> DomainResult<&DemandLine> {
        match self {
            DemandHolder::Job(job) => job.line(line_id),
            DemandHolder::Allocation(allocation) => allocation.line(line_id),
        }
    }

    pub(crate) fn line_mut(&mut self, line_id: DemandLineId) -> DomainResult<&mut DemandLine> {
        match self {
            DemandHolder::Job(job) => job.line_mut(line_id),
            DemandHolder::Allocation(allocation) => allocation.line_mut(line_id),
        }
    }

    pub(crate) fn allocation_coverage(&self) -> Coverage {
        match self {
            DemandHolder::Job(job) => job.allocation_coverage(),
            DemandHolder::Allocation(allocation) => allocation.allocation_coverage(),
        }
    }

    pub(crate) fn pickup_coverage(&self) -> Coverage {
        match self {
            DemandHolder::Job(job) => job.pickup_coverage(),
            DemandHolder::Allocation(allocation) => allocation.pickup_coverage(),
        }
    }

    pub(crate) fn job_status(&self) -> Option<JobStatus> {
        match self {
            DemandHolder::Job(job) => Some(job.status()),
            DemandHolder::Allocation(_) => None,
        }
    }

    /// Re-derive the job status from allocation coverage. Allocations have no status of their own.
    pub(crate) fn refresh_allocation_status(&mut self, at: DateTime<Utc>) -> Option<(JobStatus, JobStatus)> {
        match self {
            DemandHolder::Job(job) => job.refresh_allocation_status(at),
            DemandHolder::Allocation(_) => None,
        }
    }

    /// Rebuild one line's allocation totals from the units the ledger says it holds.
    pub(crate) fn recompute_line<L: StockLedger>(
        &mut self,
        ledger: &L,
        repos: &Repositories,
        tenant_id: TenantId,
        demand: &DemandRef,
    ) -> DomainResult<DemandLine> {
        let sku_id = self.line(demand.line_id)?.sku_id;
        let sku = repos.sku(tenant_id, sku_id)?;
        let held = ledger.find_by_demand(tenant_id, demand)?;
        let line = self.line_mut(demand.line_id)?;
        line.recompute_allocation(&held, &sku);
        Ok(line.clone())
    }
}

/// Bring stored line totals back in step with the ledger after a failed call
/// gave units back. Best effort: a failure here is logged, not returned.
pub(crate) fn resync_lines<L: StockLedger>(
    ledger: &L,
    repos: &Repositories,
    ctx: &OperationContext,
    demands: &[DemandRef],
) {
    let tenant_id = ctx.tenant_id();
    for demand in demands {
        let result = DemandHolder::commit(repos, tenant_id, demand.owner, |holder| {
            holder.recompute_line(ledger, repos, tenant_id, demand)?;
            Ok(holder.refresh_allocation_status(ctx.occurred_at()))
        });
        if let Err(e) = result {
            tracing::error!(
                line_id = %demand.line_id,
                error = %e,
                "line totals could not be resynced with the ledger"
            );
        }
    }
}

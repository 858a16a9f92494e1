//! Registration of booking sub-records (containers, stock allocations).
//!
//! Owner references arrive raw from the caller and are resolved to a tagged
//! [`freightops_booking::BookingRef`] before anything is stored.

use std::sync::Arc;

use freightops_booking::{
    AllocationStage, AllocationStageChanged, BookingEvent, ContainerDetail, ContainerSize, RawOwnerRef,
    StockAllocation,
};
use freightops_core::{ContainerId, DomainError, DomainResult, ExpectedVersion, OperationContext, StockAllocationId};
use freightops_stock::DemandLine;

use crate::publisher::EventPublisher;
use crate::repositories::Repositories;
use crate::resolver::OwnerResolver;

pub struct BookingRecordsService {
    repos: Repositories,
    resolver: OwnerResolver,
    publisher: Arc<EventPublisher>,
}

impl BookingRecordsService {
    pub fn new(repos: Repositories, publisher: Arc<EventPublisher>) -> Self {
        Self {
            resolver: OwnerResolver::new(repos.clone()),
            repos,
            publisher,
        }
    }

    pub fn register_container(
        &self,
        ctx: &OperationContext,
        owner: &RawOwnerRef,
        container_number: &str,
        size: ContainerSize,
    ) -> DomainResult<ContainerDetail> {
        let owner = self.resolver.resolve(ctx, owner)?;
        let container = ContainerDetail::new(ctx.tenant_id(), ContainerId::new(), owner, container_number, size)?;
        self.repos.containers.insert(container.clone())?;

        tracing::info!(booking = %owner, container_id = %container.id, "container registered");
        Ok(container)
    }

    /// Bind product lines to one container of the same booking.
    pub fn register_allocation(
        &self,
        ctx: &OperationContext,
        owner: &RawOwnerRef,
        container_id: ContainerId,
        lines: Vec<DemandLine>,
    ) -> DomainResult<StockAllocation> {
        let owner = self.resolver.resolve(ctx, owner)?;
        let container = self
            .repos
            .containers
            .get(ctx.tenant_id(), &container_id)?
            .ok_or_else(|| DomainError::not_found(format!("container {container_id}")))?;
        if container.owner != owner {
            return Err(DomainError::validation(format!(
                "container {container_id} belongs to booking {}, not {owner}",
                container.owner
            )));
        }
        for line in &lines {
            self.repos.sku(ctx.tenant_id(), line.sku_id)?;
        }

        let allocation = StockAllocation::new(ctx.tenant_id(), StockAllocationId::new(), owner, container_id, lines)?;
        self.repos.allocations.insert(allocation.clone())?;

        tracing::info!(booking = %owner, allocation_id = %allocation.id, "stock allocation registered");
        Ok(allocation)
    }

    /// Move an allocation along its direction's workflow (received, put away, dispatched, ...).
    pub fn set_allocation_stage(
        &self,
        ctx: &OperationContext,
        allocation_id: StockAllocationId,
        stage: AllocationStage,
    ) -> DomainResult<StockAllocation> {
        let mut allocation = self
            .repos
            .allocations
            .get(ctx.tenant_id(), &allocation_id)?
            .ok_or_else(|| DomainError::not_found(format!("stock allocation {allocation_id}")))?;

        let from = allocation.stage();
        let expected = ExpectedVersion::of(&allocation);
        allocation.set_stage(stage)?;
        let allocation = self.repos.allocations.update(allocation, expected)?;

        if from != stage {
            self.publisher.publish(&BookingEvent::AllocationStageChanged(AllocationStageChanged {
                tenant_id: ctx.tenant_id(),
                booking: allocation.owner,
                allocation_id,
                from,
                to: stage,
                occurred_at: ctx.occurred_at(),
            }));
        }
        Ok(allocation)
    }
}

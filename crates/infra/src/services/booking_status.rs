//! Booking status transitions against stored bookings.
//!
//! Guards only read; the booking record is the one thing a transition writes.

use std::sync::Arc;

use freightops_booking::{BookingEvent, BookingStatus, BookingStatusChanged, RawOwnerRef};
use freightops_core::{DomainResult, OperationContext};

use crate::publisher::EventPublisher;
use crate::repositories::Repositories;
use crate::resolver::OwnerResolver;

pub struct BookingStatusService {
    repos: Repositories,
    resolver: OwnerResolver,
    publisher: Arc<EventPublisher>,
}

impl BookingStatusService {
    pub fn new(repos: Repositories, publisher: Arc<EventPublisher>) -> Self {
        Self {
            resolver: OwnerResolver::new(repos.clone()),
            repos,
            publisher,
        }
    }

    /// `Ok(())` if `to` is reachable now, otherwise the unmet precondition.
    pub fn check_transition(&self, ctx: &OperationContext, booking: &RawOwnerRef, to: BookingStatus) -> DomainResult<()> {
        let owner = self.resolver.resolve(ctx, booking)?;
        self.resolver.load_aggregate(ctx, owner)?.check_transition(to)
    }

    pub fn next_valid_statuses(&self, ctx: &OperationContext, booking: &RawOwnerRef) -> DomainResult<Vec<BookingStatus>> {
        let owner = self.resolver.resolve(ctx, booking)?;
        Ok(self.resolver.load_aggregate(ctx, owner)?.next_valid_statuses())
    }

    pub fn transition(
        &self,
        ctx: &OperationContext,
        booking: &RawOwnerRef,
        to: BookingStatus,
    ) -> DomainResult<BookingStatusChanged> {
        let owner = self.resolver.resolve(ctx, booking)?;
        let mut aggregate = self.resolver.load_aggregate(ctx, owner)?;

        let changed = match aggregate.transition(to, ctx.actor_id(), ctx.occurred_at()) {
            Ok(changed) => changed,
            Err(e) => {
                tracing::info!(booking = %owner, to = %to, reason = %e, "booking transition refused");
                return Err(e);
            }
        };
        self.repos.save_booking(&aggregate.booking)?;

        self.publisher.publish(&BookingEvent::StatusChanged(changed.clone()));
        tracing::info!(booking = %owner, from = %changed.from, to = %changed.to, "booking status changed");

        Ok(changed)
    }
}

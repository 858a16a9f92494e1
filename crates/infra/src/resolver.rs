//! Polymorphic Relationship Resolver.
//!
//! Containers and stock allocations point at their booking through an owner
//! reference that may arrive as a bare id, an `{ id }` object or a tagged
//! `{ collection, value }` pair. The resolver turns any of these into a tagged
//! [`BookingRef`] before business logic runs:
//!
//! - tagged references are verified against their own collection only
//! - untagged references are tried against the import collection, then the
//!   export collection, and nothing else
//! - a hit in another tenant is a [`DomainError::TenantMismatch`], never a
//!   silent fallback to the next collection

use freightops_booking::{Booking, BookingAggregate, BookingKind, BookingRef, OwnerLookup, RawOwnerRef};
use freightops_core::{BookingId, DomainError, DomainResult, OperationContext};

use crate::repositories::Repositories;

#[derive(Clone)]
pub struct OwnerResolver {
    repos: Repositories,
}

impl OwnerResolver {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Normalise `raw` and confirm the booking exists in the caller's tenant.
    pub fn resolve(&self, ctx: &OperationContext, raw: &RawOwnerRef) -> DomainResult<BookingRef> {
        match raw.normalize()? {
            OwnerLookup::Tagged(owner) => {
                self.load_owner(ctx, owner)?;
                Ok(owner)
            }
            OwnerLookup::Untagged(id) => self.find_untagged(ctx, id),
        }
    }

    /// Load the booking a tagged reference points at.
    pub fn load_owner(&self, ctx: &OperationContext, owner: BookingRef) -> DomainResult<Booking> {
        let booking = self
            .repos
            .bookings(owner.kind)
            .get(ctx.tenant_id(), &owner.id)?
            .ok_or_else(|| DomainError::not_found(format!("booking {owner}")))?;

        if booking.kind != owner.kind {
            return Err(DomainError::invariant(format!(
                "booking {} is stored as {} but is an {} booking",
                booking.id, owner.kind, booking.kind
            )));
        }
        Ok(booking)
    }

    /// The booking with every container and stock allocation that references it.
    pub fn load_aggregate(&self, ctx: &OperationContext, owner: BookingRef) -> DomainResult<BookingAggregate> {
        let booking = self.load_owner(ctx, owner)?;
        Ok(BookingAggregate {
            booking,
            containers: self.repos.containers_of(ctx.tenant_id(), owner)?,
            allocations: self.repos.allocations_of(ctx.tenant_id(), owner)?,
        })
    }

    fn find_untagged(&self, ctx: &OperationContext, id: BookingId) -> DomainResult<BookingRef> {
        for kind in BookingKind::ALL {
            if self.repos.bookings(kind).get(ctx.tenant_id(), &id)?.is_some() {
                tracing::debug!(booking_id = %id, collection = kind.collection(), "resolved untagged owner reference");
                return Ok(BookingRef { kind, id });
            }
        }
        Err(DomainError::not_found(format!("booking {id} in any booking collection")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use freightops_core::{TenantId, UserId};

    fn setup() -> (OwnerResolver, Repositories, OperationContext) {
        let repos = Repositories::in_memory();
        let resolver = OwnerResolver::new(repos.clone());
        let ctx = OperationContext::new(TenantId::new(), UserId::new());
        (resolver, repos, ctx)
    }

    fn store_booking(repos: &Repositories, ctx: &OperationContext, kind: BookingKind) -> BookingRef {
        let booking = Booking::draft(ctx.tenant_id(), BookingId::new(), kind, Utc::now());
        repos.add_booking(&booking).unwrap();
        booking.booking_ref()
    }

    #[test]
    fn untagged_ids_fall_back_to_the_export_collection() {
        let (resolver, repos, ctx) = setup();
        let export = store_booking(&repos, &ctx, BookingKind::Export);

        assert_eq!(resolver.resolve(&ctx, &RawOwnerRef::Id(export.id)).unwrap(), export);
        assert_eq!(
            resolver.resolve(&ctx, &RawOwnerRef::Object { id: export.id }).unwrap(),
            export
        );
    }

    #[test]
    fn tagged_references_only_consult_their_collection() {
        let (resolver, repos, ctx) = setup();
        let import = store_booking(&repos, &ctx, BookingKind::Import);

        assert_eq!(resolver.resolve(&ctx, &import.into()).unwrap(), import);

        let mislabelled: RawOwnerRef = BookingRef::export(import.id).into();
        assert!(matches!(
            resolver.resolve(&ctx, &mislabelled),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn bookings_of_other_tenants_are_a_tenant_mismatch() {
        let (resolver, repos, ctx) = setup();
        let import = store_booking(&repos, &ctx, BookingKind::Import);
        let intruder = OperationContext::new(TenantId::new(), UserId::new());

        let err = resolver.resolve(&intruder, &RawOwnerRef::Id(import.id)).unwrap_err();
        assert!(matches!(err, DomainError::TenantMismatch(_)));
        assert!(err.is_authorization_failure());

        let err = resolver.load_owner(&intruder, import).unwrap_err();
        assert!(matches!(err, DomainError::TenantMismatch(_)));
    }

    #[test]
    fn unknown_ids_and_collections_are_reported() {
        let (resolver, _repos, ctx) = setup();
        assert!(matches!(
            resolver.resolve(&ctx, &RawOwnerRef::Id(BookingId::new())),
            Err(DomainError::NotFound(_))
        ));

        let raw = RawOwnerRef::Tagged {
            collection: "invoices".into(),
            value: freightops_booking::RawOwnerValue::Id(BookingId::new()),
        };
        assert!(matches!(resolver.resolve(&ctx, &raw), Err(DomainError::Validation(_))));
    }
}

//! Record stores for everything except stock units.

use std::sync::Arc;

use freightops_booking::{Booking, BookingKind, BookingRef, ContainerDetail, StockAllocation};
use freightops_core::{DomainError, DomainResult, ExpectedVersion, SkuId, TenantId};
use freightops_stock::{OutboundJob, PickupRecord, Sku};

use crate::store::{InMemoryTenantStore, TenantStore, VersionedStore};

pub type Store<V> = Arc<dyn TenantStore<V>>;
pub type VersionedStoreRef<V> = Arc<dyn VersionedStore<V>>;

/// The set of tenant-isolated stores the services read and write.
///
/// Import and export bookings live in separate collections; a [`BookingRef`]
/// picks the collection and [`crate::resolver::OwnerResolver`] turns untagged
/// references into tagged ones.
///
/// Records that services load, change and write back live in versioned
/// stores; write-once records (SKUs, pickups) do not.
#[derive(Clone)]
pub struct Repositories {
    pub skus: Store<Sku>,
    pub jobs: VersionedStoreRef<OutboundJob>,
    pub import_bookings: VersionedStoreRef<Booking>,
    pub export_bookings: VersionedStoreRef<Booking>,
    pub containers: VersionedStoreRef<ContainerDetail>,
    pub allocations: VersionedStoreRef<StockAllocation>,
    pub pickups: Store<PickupRecord>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            skus: InMemoryTenantStore::<Sku>::arc(),
            jobs: InMemoryTenantStore::<OutboundJob>::arc(),
            import_bookings: InMemoryTenantStore::<Booking>::arc(),
            export_bookings: InMemoryTenantStore::<Booking>::arc(),
            containers: InMemoryTenantStore::<ContainerDetail>::arc(),
            allocations: InMemoryTenantStore::<StockAllocation>::arc(),
            pickups: InMemoryTenantStore::<PickupRecord>::arc(),
        }
    }

    pub fn bookings(&self, kind: BookingKind) -> &VersionedStoreRef<Booking> {
        match kind {
            BookingKind::Import => &self.import_bookings,
            BookingKind::Export => &self.export_bookings,
        }
    }

    /// Store a new booking in the collection matching its direction.
    pub fn add_booking(&self, booking: &Booking) -> DomainResult<()> {
        Ok(self.bookings(booking.kind).insert(booking.clone())?)
    }

    /// Write back a loaded booking; fails with a retryable conflict if it
    /// changed since it was loaded.
    pub fn save_booking(&self, booking: &Booking) -> DomainResult<Booking> {
        Ok(self
            .bookings(booking.kind)
            .update(booking.clone(), ExpectedVersion::of(booking))?)
    }

    /// SKUs referenced by a line must exist; a missing one is caller error.
    pub fn sku(&self, tenant_id: TenantId, sku_id: SkuId) -> DomainResult<Sku> {
        self.skus
            .get(tenant_id, &sku_id)?
            .ok_or_else(|| DomainError::validation(format!("unknown SKU {sku_id}")))
    }

    pub fn containers_of(&self, tenant_id: TenantId, owner: BookingRef) -> DomainResult<Vec<ContainerDetail>> {
        let mut found: Vec<_> = self
            .containers
            .list(tenant_id)?
            .into_iter()
            .filter(|c| c.owner == owner)
            .collect();
        found.sort_by_key(|c| c.id);
        Ok(found)
    }

    pub fn allocations_of(&self, tenant_id: TenantId, owner: BookingRef) -> DomainResult<Vec<StockAllocation>> {
        let mut found: Vec<_> = self
            .allocations
            .list(tenant_id)?
            .into_iter()
            .filter(|a| a.owner == owner)
            .collect();
        found.sort_by_key(|a| a.id);
        Ok(found)
    }
}

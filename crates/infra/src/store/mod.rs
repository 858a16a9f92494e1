//! Tenant-isolated record storage abstractions.

pub mod tenant_store;

pub use tenant_store::{InMemoryTenantStore, StoreError, TenantStore, VersionedStore};

//! Entity trait: identity + continuity across state changes.

use crate::id::TenantId;

/// Entity marker + minimal interface.
///
/// Every persisted record in the engine is tenant-owned; stores use
/// `tenant_id()` to enforce isolation on reads and writes.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Returns the owning tenant.
    fn tenant_id(&self) -> TenantId;
}

//! Stock Ledger Accessor: the only component that reads and writes stock units.
//!
//! Every mutation is a single-unit, conditional state transition. In
//! particular [`StockLedger::reserve`] is a compare-and-swap: it succeeds only
//! if the unit is `available` at the moment of the write. The allocation
//! service relies on nothing stronger than this; it sequences the per-unit calls
//! itself and rolls back when one fails part-way.
//!
//! All operations are scoped by tenant. A unit of another tenant is invisible
//! (reported as not found).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use freightops_core::{DomainError, Lpn, TenantId, UserId};
use freightops_stock::{DemandOwner, DemandRef, StockQuery, StockUnit};

pub mod in_memory;

pub use in_memory::InMemoryStockLedger;

/// Ledger error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("stock unit not found: {0}")]
    NotFound(Lpn),
    #[error("stock unit already exists: {0}")]
    AlreadyExists(Lpn),
    /// The unit exists but refused the transition (already reserved, picked, ...).
    #[error(transparent)]
    Rejected(#[from] DomainError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<LedgerError> for DomainError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::NotFound(lpn) => DomainError::not_found(format!("stock unit {lpn}")),
            LedgerError::AlreadyExists(lpn) => {
                DomainError::state_conflict(format!("stock unit {lpn} already exists"))
            }
            LedgerError::Rejected(err) => err,
            LedgerError::Storage(msg) => DomainError::Storage(msg),
        }
    }
}

pub trait StockLedger: Send + Sync {
    /// Register a freshly put-away unit.
    fn put_away(&self, unit: StockUnit) -> Result<(), LedgerError>;

    fn get(&self, tenant_id: TenantId, lpn: &Lpn) -> Result<Option<StockUnit>, LedgerError>;

    /// Look up several units at once; unknown LPNs are simply absent from the map.
    fn get_many(
        &self,
        tenant_id: TenantId,
        lpns: &[Lpn],
    ) -> Result<HashMap<Lpn, StockUnit>, LedgerError>;

    /// Available units matching `query`, oldest first.
    fn find_available(
        &self,
        tenant_id: TenantId,
        query: &StockQuery,
    ) -> Result<Vec<StockUnit>, LedgerError>;

    /// Units (allocated or picked) held by one demand line, oldest first.
    fn find_by_demand(
        &self,
        tenant_id: TenantId,
        demand: &DemandRef,
    ) -> Result<Vec<StockUnit>, LedgerError>;

    /// Units held by any line of one job or stock allocation, oldest first.
    fn find_by_owner(
        &self,
        tenant_id: TenantId,
        owner: &DemandOwner,
    ) -> Result<Vec<StockUnit>, LedgerError>;

    /// available → allocated, atomically.
    fn reserve(
        &self,
        tenant_id: TenantId,
        lpn: &Lpn,
        demand: DemandRef,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<StockUnit, LedgerError>;

    /// Back to available. Releasing an available unit is a no-op.
    fn release(&self, tenant_id: TenantId, lpn: &Lpn) -> Result<StockUnit, LedgerError>;

    /// allocated → picked, only for the demand holding the reservation.
    fn mark_picked(
        &self,
        tenant_id: TenantId,
        lpn: &Lpn,
        demand: &DemandRef,
    ) -> Result<StockUnit, LedgerError>;

    /// picked → allocated for the same demand; undoes a pick that could not be recorded.
    fn unpick(
        &self,
        tenant_id: TenantId,
        lpn: &Lpn,
        demand: &DemandRef,
    ) -> Result<StockUnit, LedgerError>;
}

impl<S> StockLedger for Arc<S>
where
    S: StockLedger + ?Sized,
{
    fn put_away(&self, unit: StockUnit) -> Result<(), LedgerError> {
        (**self).put_away(unit)
    }

    fn get(&self, tenant_id: TenantId, lpn: &Lpn) -> Result<Option<StockUnit>, LedgerError> {
        (**self).get(tenant_id, lpn)
    }

    fn get_many(
        &self,
        tenant_id: TenantId,
        lpns: &[Lpn],
    ) -> Result<HashMap<Lpn, StockUnit>, LedgerError> {
        (**self).get_many(tenant_id, lpns)
    }

    fn find_available(
        &self,
        tenant_id: TenantId,
        query: &StockQuery,
    ) -> Result<Vec<StockUnit>, LedgerError> {
        (**self).find_available(tenant_id, query)
    }

    fn find_by_demand(
        &self,
        tenant_id: TenantId,
        demand: &DemandRef,
    ) -> Result<Vec<StockUnit>, LedgerError> {
        (**self).find_by_demand(tenant_id, demand)
    }

    fn find_by_owner(
        &self,
        tenant_id: TenantId,
        owner: &DemandOwner,
    ) -> Result<Vec<StockUnit>, LedgerError> {
        (**self).find_by_owner(tenant_id, owner)
    }

    fn reserve(
        &self,
        tenant_id: TenantId,
        lpn: &Lpn,
        demand: DemandRef,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<StockUnit, LedgerError> {
        (**self).reserve(tenant_id, lpn, demand, actor, at)
    }

    fn release(&self, tenant_id: TenantId, lpn: &Lpn) -> Result<StockUnit, LedgerError> {
        (**self).release(tenant_id, lpn)
    }

    fn mark_picked(
        &self,
        tenant_id: TenantId,
        lpn: &Lpn,
        demand: &DemandRef,
    ) -> Result<StockUnit, LedgerError> {
        (**self).mark_picked(tenant_id, lpn, demand)
    }

    fn unpick(
        &self,
        tenant_id: TenantId,
        lpn: &Lpn,
        demand: &DemandRef,
    ) -> Result<StockUnit, LedgerError> {
        (**self).unpick(tenant_id, lpn, demand)
    }
}

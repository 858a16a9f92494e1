use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use freightops_core::{DomainError, Entity, ExpectedVersion, TenantId, Versioned};

/// Record store error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("tenant isolation violation")]
    TenantIsolation,
    #[error("record already exists: {0}")]
    AlreadyExists(String),
    /// A conditional write found the record at another version.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => DomainError::NotFound(what),
            StoreError::TenantIsolation => {
                DomainError::tenant_mismatch("record belongs to another tenant")
            }
            StoreError::AlreadyExists(what) => {
                DomainError::state_conflict(format!("{what} already exists"))
            }
            StoreError::Concurrency(msg) => DomainError::state_conflict(msg),
            StoreError::Storage(msg) => DomainError::Storage(msg),
        }
    }
}

/// Tenant-isolated store for the engine's records (jobs, bookings, containers, ...).
///
/// Ids are unique across tenants. Reading a record that exists under another
/// tenant is reported as [`StoreError::TenantIsolation`], never as "not found",
/// so callers can surface it as an authorization failure.
pub trait TenantStore<V: Entity>: Send + Sync {
    fn get(&self, tenant_id: TenantId, id: &V::Id) -> Result<Option<V>, StoreError>;

    /// Add a new record; fails if the id is taken.
    fn insert(&self, value: V) -> Result<(), StoreError>;

    fn list(&self, tenant_id: TenantId) -> Result<Vec<V>, StoreError>;

    fn remove(&self, tenant_id: TenantId, id: &V::Id) -> Result<Option<V>, StoreError>;
}

impl<V, S> TenantStore<V> for Arc<S>
where
    V: Entity,
    S: TenantStore<V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, id: &V::Id) -> Result<Option<V>, StoreError> {
        (**self).get(tenant_id, id)
    }

    fn insert(&self, value: V) -> Result<(), StoreError> {
        (**self).insert(value)
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<V>, StoreError> {
        (**self).list(tenant_id)
    }

    fn remove(&self, tenant_id: TenantId, id: &V::Id) -> Result<Option<V>, StoreError> {
        (**self).remove(tenant_id, id)
    }
}

/// Store for records that are loaded, changed and written back.
///
/// `update` is the only way to change a stored record: it replaces the record
/// only if the stored version still matches, and returns it with the version
/// bumped.
pub trait VersionedStore<V: Versioned>: TenantStore<V> {
    fn update(&self, value: V, expected: ExpectedVersion) -> Result<V, StoreError>;
}

impl<V, S> VersionedStore<V> for Arc<S>
where
    V: Versioned,
    S: VersionedStore<V> + ?Sized,
{
    fn update(&self, value: V, expected: ExpectedVersion) -> Result<V, StoreError> {
        (**self).update(value, expected)
    }
}

/// In-memory tenant-isolated store for tests/dev.
pub struct InMemoryTenantStore<V: Entity> {
    inner: RwLock<HashMap<V::Id, V>>,
}

impl<V: Entity> InMemoryTenantStore<V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl<V: Entity> Default for InMemoryTenantStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("record store lock poisoned".to_string())
}

impl<V> TenantStore<V> for InMemoryTenantStore<V>
where
    V: Entity + Clone + Send + Sync + 'static,
    V::Id: Clone + Eq + Hash + Display + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, id: &V::Id) -> Result<Option<V>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        match map.get(id) {
            Some(v) if v.tenant_id() == tenant_id => Ok(Some(v.clone())),
            Some(_) => Err(StoreError::TenantIsolation),
            None => Ok(None),
        }
    }

    fn insert(&self, value: V) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        if map.contains_key(value.id()) {
            return Err(StoreError::AlreadyExists(value.id().to_string()));
        }
        map.insert(value.id().clone(), value);
        Ok(())
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<V>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        Ok(map
            .values()
            .filter(|v| v.tenant_id() == tenant_id)
            .cloned()
            .collect())
    }

    fn remove(&self, tenant_id: TenantId, id: &V::Id) -> Result<Option<V>, StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        match map.get(id).map(|v| v.tenant_id()) {
            Some(owner) if owner != tenant_id => Err(StoreError::TenantIsolation),
            Some(_) => Ok(map.remove(id)),
            None => Ok(None),
        }
    }
}

impl<V> VersionedStore<V> for InMemoryTenantStore<V>
where
    V: Versioned + Clone + Send + Sync + 'static,
    V::Id: Clone + Eq + Hash + Display + Send + Sync + 'static,
{
    fn update(&self, mut value: V, expected: ExpectedVersion) -> Result<V, StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        let current = match map.get(value.id()) {
            Some(existing) if existing.tenant_id() != value.tenant_id() => {
                return Err(StoreError::TenantIsolation);
            }
            Some(existing) => existing.version(),
            None => return Err(StoreError::NotFound(value.id().to_string())),
        };
        if !expected.matches(current) {
            return Err(StoreError::Concurrency(format!(
                "record {} expected {expected:?}, found version {current}",
                value.id()
            )));
        }

        value.set_version(current + 1);
        map.insert(value.id().clone(), value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use freightops_core::JobId;
    use freightops_stock::OutboundJob;

    fn job(tenant_id: TenantId) -> OutboundJob {
        OutboundJob::new(tenant_id, JobId::new(), "JOB-1", Vec::new(), Utc::now()).unwrap()
    }

    #[test]
    fn reads_are_scoped_to_the_owning_tenant() {
        let store = InMemoryTenantStore::<OutboundJob>::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let record = job(tenant_a);
        let id = record.id;
        store.insert(record).unwrap();

        assert!(store.get(tenant_a, &id).unwrap().is_some());
        assert_eq!(store.get(tenant_b, &id), Err(StoreError::TenantIsolation));
        assert!(store.list(tenant_b).unwrap().is_empty());
        assert_eq!(store.remove(tenant_b, &id), Err(StoreError::TenantIsolation));
    }

    #[test]
    fn insert_rejects_duplicates() {
        let store = InMemoryTenantStore::<OutboundJob>::new();
        let record = job(TenantId::new());
        store.insert(record.clone()).unwrap();

        assert!(matches!(
            store.insert(record),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn update_bumps_the_version() {
        let store = InMemoryTenantStore::<OutboundJob>::new();
        let tenant_id = TenantId::new();
        let mut record = job(tenant_id);
        store.insert(record.clone()).unwrap();

        record.reference = "JOB-1-REV".into();
        let written = store.update(record.clone(), ExpectedVersion::of(&record)).unwrap();
        assert_eq!(written.version(), 1);

        let stored = store.get(tenant_id, &record.id).unwrap().unwrap();
        assert_eq!(stored.reference, "JOB-1-REV");
        assert_eq!(stored.version(), 1);
    }

    #[test]
    fn stale_writes_are_rejected() {
        let store = InMemoryTenantStore::<OutboundJob>::new();
        let tenant_id = TenantId::new();
        let record = job(tenant_id);
        store.insert(record.clone()).unwrap();

        let mut first = store.get(tenant_id, &record.id).unwrap().unwrap();
        let mut second = first.clone();
        first.reference = "FIRST".into();
        second.reference = "SECOND".into();

        store.update(first.clone(), ExpectedVersion::of(&first)).unwrap();
        let err = store.update(second.clone(), ExpectedVersion::of(&second)).unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
        assert!(DomainError::from(err).is_retryable());

        let stored = store.get(tenant_id, &record.id).unwrap().unwrap();
        assert_eq!(stored.reference, "FIRST");

        // Unconditional writes still land.
        store.update(second, ExpectedVersion::Any).unwrap();
        assert_eq!(store.get(tenant_id, &record.id).unwrap().unwrap().version(), 2);
    }

    #[test]
    fn update_requires_an_existing_record_of_the_same_tenant() {
        let store = InMemoryTenantStore::<OutboundJob>::new();
        let record = job(TenantId::new());
        assert!(matches!(
            store.update(record.clone(), ExpectedVersion::Any),
            Err(StoreError::NotFound(_))
        ));

        store.insert(record.clone()).unwrap();
        let mut foreign = record;
        foreign.tenant_id = TenantId::new();
        assert_eq!(
            store.update(foreign, ExpectedVersion::Any),
            Err(StoreError::TenantIsolation)
        );
    }

    #[test]
    fn isolation_maps_to_an_authorization_failure() {
        let err: DomainError = StoreError::TenantIsolation.into();
        assert!(err.is_authorization_failure());
    }
}

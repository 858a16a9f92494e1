//! Explicit per-operation context.
//!
//! Tenant and actor identity are resolved by the caller (HTTP middleware, jobs)
//! and passed to every engine operation. Nothing in the engine reads them from
//! process-wide state.

use chrono::{DateTime, Utc};

use crate::id::{TenantId, UserId};

/// Who is acting, on behalf of which tenant, and at what business time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OperationContext {
    tenant_id: TenantId,
    actor_id: UserId,
    occurred_at: DateTime<Utc>,
}

impl OperationContext {
    pub fn new(tenant_id: TenantId, actor_id: UserId) -> Self {
        Self {
            tenant_id,
            actor_id,
            occurred_at: Utc::now(),
        }
    }

    /// Pin the business time (deterministic tests, replays).
    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn actor_id(&self) -> UserId {
        self.actor_id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

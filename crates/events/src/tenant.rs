use freightops_core::TenantId;

use crate::EventEnvelope;

/// Helper trait for tenant-scoped messages.
///
/// Subscribers use it to drop messages that belong to a tenant they were not
/// started for.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}

impl<E> TenantScoped for EventEnvelope<E> {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use freightops_core::AggregateId;
    use uuid::Uuid;

    use super::*;

    fn envelope(tenant_id: TenantId) -> EventEnvelope<u32> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            AggregateId::new(),
            "stock.job",
            "stock.job.status_changed",
            1,
            Utc::now(),
            7,
        )
    }

    #[test]
    fn subscribers_can_filter_by_tenant() {
        let mine = TenantId::new();
        let theirs = TenantId::new();
        let received = [envelope(mine), envelope(theirs), envelope(mine)];

        let kept = received.iter().filter(|m| TenantScoped::tenant_id(*m) == mine).count();
        assert_eq!(kept, 2);
    }
}

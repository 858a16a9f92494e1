use chrono::{DateTime, Utc};

use freightops_core::{AggregateId, TenantId};

/// A domain-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
/// - designed to be **append-only**
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "stock.unit.reserved").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Tenant that owns the affected records.
    fn tenant_id(&self) -> TenantId;

    /// Stream key the event is sequenced under (job, booking, ...).
    fn stream_id(&self) -> AggregateId;

    /// Stream type name (e.g. "stock.job").
    fn stream_type(&self) -> &'static str;
}

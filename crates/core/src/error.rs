//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Storage adapters have their own error types which are
/// mapped into this one at the service boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Caller input was malformed (missing field, unknown SKU, bad quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found within the caller's tenant.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stock unit (or other record) was not in the state the operation required.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// A stock unit was reserved by another demand between listing and reserving.
    #[error("stock unit {lpn} is already reserved")]
    AlreadyReserved { lpn: String },

    /// Automatic allocation ran out of eligible stock.
    #[error("insufficient stock: {available} available, {required} required")]
    InsufficientStock { available: i64, required: i64 },

    /// Manual allocation named units that are missing or not available.
    #[error("stock units unavailable: {}", missing.join(", "))]
    PartialAvailability { missing: Vec<String> },

    /// A resolved reference belongs to a different tenant than the caller.
    #[error("tenant mismatch: {0}")]
    TenantMismatch(String),

    /// A status transition guard failed; the message names the unmet precondition.
    #[error("transition not allowed: {0}")]
    TransitionNotAllowed(String),

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn state_conflict(msg: impl Into<String>) -> Self {
        Self::StateConflict(msg.into())
    }

    pub fn tenant_mismatch(msg: impl Into<String>) -> Self {
        Self::TenantMismatch(msg.into())
    }

    pub fn transition_not_allowed(reason: impl Into<String>) -> Self {
        Self::TransitionNotAllowed(reason.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Lost ledger races; the caller may retry with a fresh candidate set.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StateConflict(_) | Self::AlreadyReserved { .. })
    }

    /// Errors that must surface as authorization failures, never as server errors.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, Self::TenantMismatch(_) | Self::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_availability_lists_missing_units() {
        let err = DomainError::PartialAvailability {
            missing: vec!["LPN-1".into(), "LPN-7".into()],
        };
        assert_eq!(err.to_string(), "stock units unavailable: LPN-1, LPN-7");
    }

    #[test]
    fn classifies_retryable_and_authorization_errors() {
        assert!(DomainError::AlreadyReserved { lpn: "A".into() }.is_retryable());
        assert!(DomainError::state_conflict("picked").is_retryable());
        assert!(!DomainError::InsufficientStock { available: 1, required: 2 }.is_retryable());

        assert!(DomainError::tenant_mismatch("booking").is_authorization_failure());
        assert!(!DomainError::not_found("booking").is_authorization_failure());
    }
}

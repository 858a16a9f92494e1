//! Optimistic concurrency for records that are read, changed and written back.

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};

/// A record carrying the number of writes committed for it.
///
/// Stores compare this number on every conditional write and bump it on
/// success; domain code never changes it.
pub trait Versioned: Entity {
    /// 0 for a record that has not been rewritten since it was created.
    fn version(&self) -> u64;

    fn set_version(&mut self, version: u64);
}

/// Optimistic concurrency expectation for a conditional write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (seeding, administrative overrides).
    Any,
    /// Require the stored record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    /// Expect whatever version `record` was loaded at.
    pub fn of<V: Versioned>(record: &V) -> Self {
        ExpectedVersion::Exact(record.version())
    }

    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::state_conflict(format!(
                "record changed concurrently (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_expectation_must_match() {
        assert!(ExpectedVersion::Any.matches(7));
        assert!(ExpectedVersion::Exact(3).matches(3));
        assert!(!ExpectedVersion::Exact(3).matches(4));

        let err = ExpectedVersion::Exact(3).check(4).unwrap_err();
        assert!(err.is_retryable());
    }
}

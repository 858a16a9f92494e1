//! Engine configuration loaded from environment variables.

use crate::error::{DomainError, DomainResult};

pub const ENV_ALLOW_MANUAL_OVER_ALLOCATION: &str = "FREIGHTOPS_ALLOW_MANUAL_OVER_ALLOCATION";
pub const ENV_MAX_PICKUP_BUFFER: &str = "FREIGHTOPS_MAX_PICKUP_BUFFER";

/// Tunables for the allocation and pickup services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Manual LPN selection may exceed the required quantity (reported as a warning).
    pub allow_manual_over_allocation: bool,
    /// Absolute cap on the operator-entered pickup buffer. `None` means uncapped.
    pub max_pickup_buffer: Option<i64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_manual_over_allocation: true,
            max_pickup_buffer: None,
        }
    }
}

impl EngineConfig {
    /// Load from the process environment, falling back to defaults for unset keys.
    pub fn from_env() -> DomainResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> DomainResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_ALLOW_MANUAL_OVER_ALLOCATION) {
            config.allow_manual_over_allocation = parse_bool(ENV_ALLOW_MANUAL_OVER_ALLOCATION, &raw)?;
        }

        if let Some(raw) = lookup(ENV_MAX_PICKUP_BUFFER) {
            let value: i64 = raw.trim().parse().map_err(|_| {
                DomainError::validation(format!("{ENV_MAX_PICKUP_BUFFER} must be an integer, got {raw:?}"))
            })?;
            if value < 0 {
                return Err(DomainError::validation(format!(
                    "{ENV_MAX_PICKUP_BUFFER} cannot be negative"
                )));
            }
            config.max_pickup_buffer = Some(value);
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, raw: &str) -> DomainResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DomainError::validation(format!("{key} must be a boolean, got {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = EngineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.allow_manual_over_allocation);
    }

    #[test]
    fn reads_both_keys() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (ENV_ALLOW_MANUAL_OVER_ALLOCATION, "off"),
            (ENV_MAX_PICKUP_BUFFER, " 25 "),
        ]))
        .unwrap();
        assert!(!config.allow_manual_over_allocation);
        assert_eq!(config.max_pickup_buffer, Some(25));
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = EngineConfig::from_lookup(lookup_from(&[(ENV_MAX_PICKUP_BUFFER, "lots")])).unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains(ENV_MAX_PICKUP_BUFFER)),
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(EngineConfig::from_lookup(lookup_from(&[(ENV_MAX_PICKUP_BUFFER, "-1")])).is_err());
        assert!(EngineConfig::from_lookup(lookup_from(&[(ENV_ALLOW_MANUAL_OVER_ALLOCATION, "maybe")])).is_err());
    }
}

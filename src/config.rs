//! Configuration management for the turnstile engine.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TurnstileError};

/// Tunables for a [`RateLimitEngine`](crate::limit::RateLimitEngine).
///
/// The original deployment hardcoded these as constants; here they are
/// explicit parameters with the same defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Kill switch: a disabled engine admits everything
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Lifetime of an idle token bucket, in milliseconds
    #[serde(default = "default_bucket_ttl_ms")]
    pub bucket_ttl_ms: u64,

    /// Lifetime of a deny-list entry, in milliseconds
    #[serde(default = "default_denylist_ttl_ms")]
    pub denylist_ttl_ms: u64,

    /// Maximum entries per store before the cleanup sweep sheds overflow
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            bucket_ttl_ms: default_bucket_ttl_ms(),
            denylist_ttl_ms: default_denylist_ttl_ms(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_bucket_ttl_ms() -> u64 {
    60 * 1000
}

fn default_denylist_ttl_ms() -> u64 {
    24 * 60 * 60 * 1000
}

fn default_max_entries() -> usize {
    1000
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every parameter is usable.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_ttl_ms == 0 {
            return Err(TurnstileError::InvalidConfiguration(
                "bucket_ttl_ms must be greater than zero".to_string(),
            ));
        }
        if self.denylist_ttl_ms == 0 {
            return Err(TurnstileError::InvalidConfiguration(
                "denylist_ttl_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_entries == 0 {
            return Err(TurnstileError::InvalidConfiguration(
                "max_entries must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.enabled);
        assert_eq!(config.bucket_ttl_ms, 60_000);
        assert_eq!(config.denylist_ttl_ms, 86_400_000);
        assert_eq!(config.max_entries, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml_uses_defaults() {
        let config = EngineConfig::from_yaml("bucket_ttl_ms: 5000").unwrap();
        assert_eq!(config.bucket_ttl_ms, 5000);
        assert_eq!(config.denylist_ttl_ms, 86_400_000);
        assert_eq!(config.max_entries, 1000);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let config = EngineConfig {
            bucket_ttl_ms: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TurnstileError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let yaml = "max_entries: 0";
        assert!(EngineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        let result = EngineConfig::from_yaml("bucket_ttl_ms: [not, a, number]");
        assert!(matches!(result, Err(TurnstileError::Config(_))));
    }
}

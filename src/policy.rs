//! Per-operation admission policies.
//!
//! The original deployment attached limits to call sites through runtime
//! metadata; here a policy is an explicit record the interception layer
//! hands to the engine, loadable in bulk from YAML.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{Result, TurnstileError};
use crate::limit::DEFAULT_KEY;

/// Admission policy for one guarded operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitPolicy {
    /// Key template: the aggregate sentinel `"all"`, or the name of the
    /// argument field the interception layer extracts per-identity keys from
    #[serde(default = "default_key_template")]
    pub key: String,

    /// Sustained requests per second; also the burst capacity
    pub qps: f64,

    /// Rejections tolerated per deny-list window before a key is blocked;
    /// 0 disables the deny-list for this operation
    #[serde(default)]
    pub blacklist_threshold: u64,

    /// Name of the fallback invoked for rejected calls
    #[serde(default)]
    pub fallback: Option<String>,
}

fn default_key_template() -> String {
    DEFAULT_KEY.to_string()
}

impl LimitPolicy {
    /// Aggregate policy: sentinel key, deny-list disabled, no fallback.
    pub fn new(qps: f64) -> Result<Self> {
        let policy = Self {
            key: default_key_template(),
            qps,
            blacklist_threshold: 0,
            fallback: None,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check that the policy is usable.
    ///
    /// Invalid parameters are rejected here, at construction time; the
    /// decision path never fails.
    pub fn validate(&self) -> Result<()> {
        if !self.qps.is_finite() || self.qps <= 0.0 {
            return Err(TurnstileError::InvalidConfiguration(format!(
                "qps must be a positive finite number, got {}",
                self.qps
            )));
        }
        if self.key.is_empty() {
            return Err(TurnstileError::InvalidConfiguration(
                "key template must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether rejections of `key` feed the deny-list under this policy.
    ///
    /// The aggregate sentinel never does, regardless of the threshold.
    pub(crate) fn tracks_denylist(&self, key: &str) -> bool {
        key != DEFAULT_KEY && self.blacklist_threshold != 0
    }
}

/// A named collection of policies, typically one per guarded operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySet {
    /// Map of operation name to its admission policy
    #[serde(default)]
    pub policies: HashMap<String, LimitPolicy>,
}

impl PolicySet {
    /// Create an empty policy set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a policy set from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading admission policies");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load a policy set from a YAML string.
    ///
    /// Every policy is validated on load, so a set that parses is safe to
    /// use for the process lifetime.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let set: PolicySet = serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(format!("Failed to parse policy set: {}", e)))?;

        for (name, policy) in &set.policies {
            policy
                .validate()
                .map_err(|e| TurnstileError::Config(format!("Policy '{}': {}", name, e)))?;
        }

        Ok(set)
    }

    /// Policy for the named operation.
    pub fn get(&self, operation: &str) -> Option<&LimitPolicy> {
        self.policies.get(operation)
    }

    /// Number of policies in the set.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether the set holds no policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_policy_validates() {
        let policy = LimitPolicy::new(10.0).unwrap();
        assert_eq!(policy.key, DEFAULT_KEY);
        assert_eq!(policy.blacklist_threshold, 0);
        assert!(policy.fallback.is_none());
    }

    #[test]
    fn test_zero_qps_rejected() {
        assert!(matches!(
            LimitPolicy::new(0.0),
            Err(TurnstileError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_negative_qps_rejected() {
        assert!(LimitPolicy::new(-3.0).is_err());
    }

    #[test]
    fn test_nan_qps_rejected() {
        assert!(LimitPolicy::new(f64::NAN).is_err());
        assert!(LimitPolicy::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_empty_key_rejected() {
        let policy = LimitPolicy {
            key: String::new(),
            qps: 1.0,
            blacklist_threshold: 0,
            fallback: None,
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_sentinel_never_tracks_denylist() {
        let policy = LimitPolicy {
            key: "user_id".to_string(),
            qps: 1.0,
            blacklist_threshold: 5,
            fallback: None,
        };
        assert!(policy.tracks_denylist("mallory"));
        assert!(!policy.tracks_denylist(DEFAULT_KEY));
    }

    #[test]
    fn test_zero_threshold_never_tracks_denylist() {
        let policy = LimitPolicy::new(1.0).unwrap();
        assert!(!policy.tracks_denylist("mallory"));
    }

    #[test]
    fn test_parse_policy_set() {
        let yaml = r#"
policies:
  search:
    key: user_id
    qps: 50
    blacklist_threshold: 10
    fallback: search_degraded
  health:
    qps: 1000
"#;
        let set = PolicySet::from_yaml(yaml).unwrap();
        assert_eq!(set.len(), 2);

        let search = set.get("search").unwrap();
        assert_eq!(search.key, "user_id");
        assert_eq!(search.qps, 50.0);
        assert_eq!(search.blacklist_threshold, 10);
        assert_eq!(search.fallback.as_deref(), Some("search_degraded"));

        // Omitted fields fall back to the aggregate defaults
        let health = set.get("health").unwrap();
        assert_eq!(health.key, DEFAULT_KEY);
        assert_eq!(health.blacklist_threshold, 0);
        assert!(health.fallback.is_none());
    }

    #[test]
    fn test_invalid_policy_in_set_rejected() {
        let yaml = r#"
policies:
  broken:
    qps: 0
"#;
        assert!(matches!(
            PolicySet::from_yaml(yaml),
            Err(TurnstileError::Config(_))
        ));
    }

    #[test]
    fn test_negative_threshold_fails_to_parse() {
        let yaml = r#"
policies:
  broken:
    qps: 1
    blacklist_threshold: -1
"#;
        assert!(PolicySet::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_unknown_operation_absent() {
        let set = PolicySet::new();
        assert!(set.get("nope").is_none());
        assert!(set.is_empty());
    }
}

//! Core admission decision engine.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::policy::LimitPolicy;

use super::bucket::TokenBucket;
use super::clock::{Clock, SystemClock};
use super::store::ExpiringStore;

/// Sentinel key for aggregate limiting with no per-identity distinction.
///
/// The sentinel is exempt from deny-list accounting: it stands for every
/// caller at once, and deny-listing an aggregate would block them all.
pub const DEFAULT_KEY: &str = "all";

/// Outcome of an admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed
    Allow,
    /// The request must be rejected; the caller diverts to its fallback
    Deny(DenyReason),
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The key's token bucket is empty
    RateExceeded,
    /// The key crossed its deny-list threshold and is blocked for the
    /// deny-list TTL window, without consulting the bucket
    Blacklisted,
}

/// The admission engine: token buckets keyed by request label, plus a
/// longer-lived deny-list of rejection counts.
///
/// Construct one engine at process start and hold it for the process
/// lifetime, injecting it into call sites. All state is in memory and lost
/// on restart; rate limiting here is a soft, best-effort control.
///
/// The engine is stateless across calls except through its two stores, and
/// every operation is safe under unbounded concurrent access.
pub struct RateLimitEngine {
    /// Kill switch; a disabled engine admits everything
    enabled: bool,
    /// Per-key token buckets; an evicted key gets a fresh full bucket on its
    /// next request
    buckets: ExpiringStore<String, Arc<TokenBucket>>,
    /// Per-key rejection counts backing the deny-list
    denylist: ExpiringStore<String, u64>,
    clock: Arc<dyn Clock>,
}

impl RateLimitEngine {
    /// Create an engine with the given tunables, on the system clock.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an engine with a custom time source.
    ///
    /// This is primarily useful for testing and deterministic scenarios.
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            enabled: config.enabled,
            buckets: ExpiringStore::new(
                config.bucket_ttl_ms,
                config.max_entries,
                Arc::clone(&clock),
            ),
            denylist: ExpiringStore::new(
                config.denylist_ttl_ms,
                config.max_entries,
                Arc::clone(&clock),
            ),
            clock,
        })
    }

    /// Decide whether the request labeled `key` may proceed under `policy`.
    ///
    /// Never fails: every call resolves to [`Decision::Allow`] or
    /// [`Decision::Deny`]. Exactly `blacklist_threshold` rejections are
    /// tolerated per deny-list window; the next one flips the key to
    /// [`DenyReason::Blacklisted`] until the entry expires.
    pub fn decide(&self, key: &str, policy: &LimitPolicy) -> Decision {
        if !self.enabled {
            return Decision::Allow;
        }

        trace!(key = %key, qps = policy.qps, "checking admission");

        if policy.tracks_denylist(key) {
            if let Some(count) = self.denylist.get(key) {
                if count > policy.blacklist_threshold {
                    debug!(key = %key, count = count, "deny-listed key blocked");
                    return Decision::Deny(DenyReason::Blacklisted);
                }
            }
        }

        // Get-or-create is deliberately not atomic: two concurrent first
        // requests for an unseen key may each store a fresh bucket, and the
        // last put wins. The overwritten bucket forfeits at most `capacity`
        // tokens, recovered within one refill cycle.
        let bucket = match self.buckets.get(key) {
            Some(bucket) => bucket,
            None => {
                debug!(key = %key, qps = policy.qps, "creating token bucket");
                let bucket = Arc::new(TokenBucket::new(policy.qps, Arc::clone(&self.clock)));
                self.buckets.put(key.to_string(), Arc::clone(&bucket));
                bucket
            }
        };

        if !bucket.try_acquire() {
            if policy.tracks_denylist(key) {
                // Read-modify-write without atomicity: concurrent rejections
                // may under-count. The deny-list is a threshold crossing,
                // not an exact tally.
                let count = self.denylist.get(key).unwrap_or(0);
                self.denylist.put(key.to_string(), count + 1);
            }
            debug!(key = %key, "rate limit exceeded");
            return Decision::Deny(DenyReason::RateExceeded);
        }

        Decision::Allow
    }

    /// Number of live token buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of live deny-list entries.
    pub fn denylist_count(&self) -> usize {
        self.denylist.len()
    }

    /// Drop all buckets and deny-list entries.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.buckets.clear();
        self.denylist.clear();
    }
}

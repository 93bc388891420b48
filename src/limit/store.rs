//! Expiring key-value store with lazy expiry and opportunistic cleanup.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::clock::Clock;

/// Write operations between cleanup attempts.
const CLEANUP_WRITE_INTERVAL: u64 = 64;

/// A stored value together with its absolute expiry instant.
///
/// Entries are immutable: a `put` for an existing key replaces the whole
/// entry with a fresh expiry window rather than extending the old one.
struct Entry<V> {
    value: V,
    expires_at: u64,
}

/// Concurrent map whose entries expire a fixed `ttl` after they are written.
///
/// Reads treat expired entries as absent and remove them on the spot; writes
/// opportunistically trigger a bounded cleanup sweep so abandoned keys cannot
/// grow the map without bound. There is no background thread: maintenance
/// cost rides on caller activity, and an idle store costs nothing.
///
/// `get` and `put` run on the lock-free map directly. Only the sweep takes a
/// lock, and only via `try_lock`: a writer that loses the race skips the
/// sweep and returns immediately, so cleanup is never on the critical path
/// of more than one caller at a time.
pub struct ExpiringStore<K, V> {
    data: DashMap<K, Entry<V>>,
    /// Entry lifetime in milliseconds
    ttl_ms: u64,
    /// Size bound enforced by the sweep
    max_entries: usize,
    /// Writes since construction; every 64th attempts a sweep
    writes: AtomicU64,
    /// Timestamp of the last completed sweep; doubles as the sweep lock
    last_clean: Mutex<u64>,
    clock: Arc<dyn Clock>,
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a store whose entries live for `ttl_ms` milliseconds.
    pub fn new(ttl_ms: u64, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_millis();
        Self {
            data: DashMap::new(),
            ttl_ms,
            max_entries,
            writes: AtomicU64::new(0),
            last_clean: Mutex::new(now),
            clock,
        }
    }

    /// Look up a live entry.
    ///
    /// An expired entry is physically removed as a side effect and reported
    /// as absent. Absence is a normal result, not a failure.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_millis();
        let hit = self.data.get(key).map(|entry| {
            if now <= entry.expires_at {
                Some(entry.value.clone())
            } else {
                None
            }
        })?;

        match hit {
            Some(value) => Some(value),
            None => {
                // Lazy expiry. The predicate re-checks under the shard lock
                // so a concurrent re-put of a fresh entry survives.
                self.data.remove_if(key, |_, entry| entry.expires_at < now);
                trace!("removed expired entry on read");
                None
            }
        }
    }

    /// Insert or replace `key`, giving it a fresh TTL window.
    ///
    /// Always succeeds. Every 64th write attempts an opportunistic cleanup
    /// sweep.
    pub fn put(&self, key: K, value: V) {
        let now = self.clock.now_millis();
        let expires_at = now.saturating_add(self.ttl_ms);
        self.data.insert(key, Entry { value, expires_at });

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % CLEANUP_WRITE_INTERVAL == 0 {
            self.clean(now);
        }
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drop every entry.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.data.clear();
    }

    /// Opportunistic sweep: drop expired entries, then shed overflow.
    ///
    /// Runs only if the sweep lock is free and at least `ttl / 4` has passed
    /// since the last completed sweep, which bounds sweep frequency
    /// independent of traffic volume.
    fn clean(&self, now: u64) {
        let mut last_clean = match self.last_clean.try_lock() {
            Some(guard) => guard,
            None => return, // another writer is already sweeping
        };
        if now.saturating_sub(*last_clean) < self.ttl_ms / 4 {
            return;
        }

        self.data.retain(|_, entry| now <= entry.expires_at);

        // Expiry alone cannot bound a store full of live keys. Shed down to
        // 80% of capacity in map iteration order: arbitrary, not LRU.
        if self.data.len() > self.max_entries {
            let target = self.max_entries * 4 / 5;
            let excess = self.data.len() - target;
            let doomed: Vec<K> = self
                .data
                .iter()
                .take(excess)
                .map(|entry| entry.key().clone())
                .collect();
            for key in doomed {
                self.data.remove(&key);
            }
            debug!(len = self.data.len(), "shed overflow entries");
        }

        *last_clean = now;
        trace!(len = self.data.len(), "cleanup sweep completed");
    }
}

//! Token bucket rate counter.

use std::sync::Arc;

use parking_lot::Mutex;

use super::clock::Clock;

/// Mutable bucket state, guarded by a single mutex.
struct BucketState {
    /// Current token balance, within `[0, capacity]`
    tokens: f64,
    /// Timestamp of the last refill, in clock milliseconds; never rewinds
    last_refill: u64,
}

/// A token bucket admitting whole-request units.
///
/// The bucket starts full and refills continuously at `refill_rate` tokens
/// per second, capped at `capacity`. Both are set to the configured qps, so a
/// key sustains qps requests per second with bursts up to qps after an idle
/// period.
///
/// [`try_acquire`](TokenBucket::try_acquire) is the only mutating entry point
/// and is safe under unsynchronized concurrent calls: the whole
/// refill-then-acquire step runs inside one critical section.
pub struct TokenBucket {
    /// Maximum token balance
    capacity: f64,
    /// Tokens added per second
    refill_rate: f64,
    /// Balance and refill timestamp
    state: Mutex<BucketState>,
    /// Time source, shared with the owning engine
    clock: Arc<dyn Clock>,
}

impl TokenBucket {
    /// Create a bucket sized for `qps` requests per second, starting full.
    pub fn new(qps: f64, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_millis();
        Self {
            capacity: qps,
            refill_rate: qps,
            state: Mutex::new(BucketState {
                tokens: qps,
                last_refill: now,
            }),
            clock,
        }
    }

    /// Try to take one token.
    ///
    /// Returns `true` if a whole token was available. The refill step runs on
    /// every call, so `last_refill` advances even when the call is rejected.
    pub fn try_acquire(&self) -> bool {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();

        // Elapsed time saturates at zero, so a rewound system clock pauses
        // refill instead of draining the balance.
        let elapsed_secs = now.saturating_sub(state.last_refill) as f64 / 1000.0;
        state.tokens = (state.tokens + elapsed_secs * self.refill_rate).min(self.capacity);
        if now > state.last_refill {
            state.last_refill = now;
        }

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Current token balance.
    pub fn tokens(&self) -> f64 {
        self.state.lock().tokens
    }

    /// Maximum token balance.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}

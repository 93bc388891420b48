//! The function-call boundary between guarded operations and the engine.
//!
//! The mechanism that intercepts a call is host-specific and stays outside
//! this crate; what it owes the engine is a key, a policy, and a way to
//! divert rejected calls. [`Interceptor`] packages that contract: key
//! extraction is an injected function, and fallbacks are plain handlers
//! registered by name.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Result, TurnstileError};
use crate::limit::{Decision, RateLimitEngine};
use crate::policy::LimitPolicy;

/// A registered fallback handler.
type FallbackFn<A, R> = Box<dyn Fn(&A) -> R + Send + Sync>;

/// Dispatches guarded calls: allowed calls run their action, rejected calls
/// run the fallback named by their policy.
///
/// `A` is the argument type the host hands every guarded call and every
/// fallback; `R` is what both produce.
pub struct Interceptor<A, R> {
    engine: Arc<RateLimitEngine>,
    fallbacks: HashMap<String, FallbackFn<A, R>>,
}

impl<A, R> Interceptor<A, R> {
    /// Create an interceptor around a shared engine.
    pub fn new(engine: Arc<RateLimitEngine>) -> Self {
        Self {
            engine,
            fallbacks: HashMap::new(),
        }
    }

    /// Register a fallback handler under `name`.
    ///
    /// A later registration under the same name replaces the earlier one.
    pub fn register_fallback<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        self.fallbacks.insert(name.into(), Box::new(handler));
    }

    /// Shared engine handle.
    pub fn engine(&self) -> &Arc<RateLimitEngine> {
        &self.engine
    }

    /// Run a guarded call.
    ///
    /// `extract_key` derives the admission key from the call's arguments; it
    /// is injected because argument shapes are host-specific and the engine
    /// never inspects them. Allowed calls run `action`; rejected calls run
    /// the policy's fallback. A rejection with no usable fallback is the one
    /// failure this layer can produce — the engine itself never fails.
    pub fn intercept<E, F>(
        &self,
        policy: &LimitPolicy,
        args: &A,
        extract_key: E,
        action: F,
    ) -> Result<R>
    where
        E: Fn(&A) -> String,
        F: FnOnce(&A) -> R,
    {
        let key = extract_key(args);
        debug!(key = %key, "guarding call");

        match self.engine.decide(&key, policy) {
            Decision::Allow => Ok(action(args)),
            Decision::Deny(reason) => {
                warn!(key = %key, reason = ?reason, "call rejected, diverting to fallback");

                let name = policy
                    .fallback
                    .as_deref()
                    .filter(|name| !name.trim().is_empty())
                    .ok_or_else(|| TurnstileError::FallbackNotConfigured(key.clone()))?;
                let handler = self
                    .fallbacks
                    .get(name)
                    .ok_or_else(|| TurnstileError::FallbackNotFound(name.to_string()))?;

                Ok(handler(args))
            }
        }
    }
}

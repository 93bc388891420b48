//! Turnstile - Per-Key Request Admission Control
//!
//! This crate decides, for a stream of labeled requests, whether each request
//! may proceed or must be rejected, and escalates repeat offenders into a
//! temporary deny-list. Every key gets an independent token bucket; buckets
//! and deny-list counts live in self-cleaning expiring stores that are safe
//! under unbounded concurrent access and need no background thread.

pub mod config;
pub mod error;
pub mod intercept;
pub mod limit;
pub mod policy;

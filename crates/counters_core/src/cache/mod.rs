//! Read-through cache seam for registry lookups.
//!
//! # Responsibility
//! - Define the cache contract consulted by `Counters::get`.
//! - Provide an in-process implementation with per-entry expiry.
//!
//! # Invariants
//! - The cache is an accelerator only; registry correctness never depends on
//!   an entry being present.
//! - Entries are invalidated by every successful registry mutation; the TTL
//!   only bounds staleness when invalidation was skipped.

mod memory;

pub use memory::MemoryCache;

use crate::model::counter::Counter;
use std::time::Duration;

/// Key-value cache with TTL for counter rows.
///
/// Implementations must tolerate concurrent callers.
pub trait CounterCache: Send + Sync {
    /// Returns the cached counter when present and not expired.
    fn get(&self, name: &str) -> Option<Counter>;

    /// Stores `counter` under `name` for at most `ttl`.
    fn put(&self, name: &str, counter: &Counter, ttl: Duration);

    /// Drops any entry stored under `name`.
    fn invalidate(&self, name: &str);
}

//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use tokio::time::Instant;

// == Entry State ==
/// Lifecycle state of a key in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// An origin fetch for the key is in flight
    Pending,
    /// A value is populated
    Ready,
}

// == Cache Entry ==
/// A populated cache value with its freshness window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The stored value
    pub value: String,
    /// When the value was produced
    pub created_at: Instant,
    /// Stale at or after this instant
    pub expires_at: Instant,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry that stays fresh for `ttl`.
    pub fn new(value: String, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of `now`.
    ///
    /// An entry is expired once `now` is greater than or equal to the
    /// expiration time.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    // == Time To Live ==
    /// Returns the remaining freshness, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Remaining freshness in whole seconds, rounded up.
    pub fn ttl_remaining_secs(&self) -> u64 {
        let remaining = self.ttl_remaining();
        let secs = remaining.as_secs();
        if remaining.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

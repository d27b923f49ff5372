//! Cache Statistics Module
//!
//! Counters for lookups, origin fetches, and evictions.

use serde::Serialize;

// == Cache Stats ==
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups served from a Ready entry
    pub hits: u64,
    /// Lookups that found nothing fresh
    pub misses: u64,
    /// Lookups that waited on another request's fetch
    pub coalesced: u64,
    /// Origin fetches started
    pub fetches: u64,
    /// Origin fetches that failed or timed out
    pub fetch_errors: u64,
    /// Ready entries dropped to make room
    pub evictions: u64,
    /// Entries currently held, Pending included
    pub total_entries: usize,
    /// Entries with a fetch in flight
    pub pending: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Share of lookups that did not reach the origin themselves.
    ///
    /// Returns 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.coalesced;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_coalesced(&mut self) {
        self.coalesced += 1;
    }

    pub fn record_fetch(&mut self) {
        self.fetches += 1;
    }

    pub fn record_fetch_error(&mut self) {
        self.fetch_errors += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }
}

//! Cache Module
//!
//! In-memory read-through cache with TTL freshness, LRU eviction, and
//! coalescing of concurrent origin fetches.

mod entry;
mod flight;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, EntryState};
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::{CacheStore, EvictionPolicy, Lookup, Outcome};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

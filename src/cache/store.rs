//! Cache Store Module
//!
//! Read-through cache engine: HashMap storage with TTL freshness, LRU
//! eviction, and coalescing of concurrent misses into one origin fetch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::flight::{self, Flight, FlightOutcome};
use crate::cache::{CacheEntry, CacheStats, EntryState, LruTracker};
use crate::error::{CacheError, Result};

// == Eviction Policy ==
/// What to do when a new key arrives at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Drop the least recently used Ready entry
    #[default]
    Lru,
    /// Refuse the new key with `CapacityExceeded`
    Reject,
}

impl EvictionPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lru" => Some(Self::Lru),
            "reject" | "none" => Some(Self::Reject),
            _ => None,
        }
    }
}

// == Lookup ==
/// How a read-through lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Served from a fresh Ready entry
    Hit,
    /// This caller fetched from the origin
    Miss,
    /// Served by another caller's in-flight fetch
    Coalesced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub entry: CacheEntry,
    pub outcome: Outcome,
}

impl Lookup {
    /// True unless this caller went to the origin itself.
    pub fn is_cached(&self) -> bool {
        self.outcome != Outcome::Miss
    }
}

// == Slot ==
#[derive(Debug)]
enum Slot {
    Pending(Flight),
    Ready(CacheEntry),
}

impl Slot {
    fn state(&self) -> EntryState {
        match self {
            Slot::Pending(_) => EntryState::Pending,
            Slot::Ready(_) => EntryState::Ready,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    slots: HashMap<String, Slot>,
    /// Tracks Ready keys only
    lru: LruTracker,
    stats: CacheStats,
    next_flight: u64,
}

impl Inner {
    /// Whether `key` is still the Pending slot opened by flight `id`.
    fn owns(&self, key: &str, id: u64) -> bool {
        matches!(self.slots.get(key), Some(Slot::Pending(flight)) if flight.id == id)
    }

    fn remove_ready(&mut self, key: &str) -> bool {
        if matches!(self.slots.get(key), Some(Slot::Ready(_))) {
            self.slots.remove(key);
            self.lru.remove(key);
            true
        } else {
            false
        }
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(entry) if entry.is_expired_at(now)))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.slots.remove(key);
            self.lru.remove(key);
        }
        expired.len()
    }
}

enum Join<'a> {
    Hit(CacheEntry),
    Wait(watch::Receiver<FlightOutcome>),
    Lead(FlightGuard<'a>),
}

// == Cache Store ==
/// Shared read-through cache.
///
/// All map access goes through one mutex that is never held across an
/// await point; origin fetches run outside it.
#[derive(Debug)]
pub struct CacheStore {
    inner: Mutex<Inner>,
    /// Maximum number of entries, Pending included. 0 = unbounded
    max_entries: usize,
    policy: EvictionPolicy,
    /// Bound on a leader's fetch and on a waiter's wait
    fetch_timeout: Duration,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store holding at most `max_entries` keys (0 = unbounded),
    /// with fetches and waits bounded by `fetch_timeout`.
    pub fn new(max_entries: usize, fetch_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_entries,
            policy: EvictionPolicy::default(),
            fetch_timeout,
        }
    }

    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // No invariant spans a panic point inside the critical sections.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Get ==
    /// Returns the entry for `key` if it is Ready and unexpired.
    ///
    /// A Pending key counts as a miss. An expired entry is removed.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let now = Instant::now();

        let fresh = match inner.slots.get(key) {
            Some(Slot::Ready(entry)) if !entry.is_expired_at(now) => Some(entry.clone()),
            _ => None,
        };

        match fresh {
            Some(entry) => {
                inner.lru.touch(key);
                inner.stats.record_hit();
                Some(entry)
            }
            None => {
                if matches!(inner.slots.get(key), Some(Slot::Ready(_))) {
                    inner.remove_ready(key);
                }
                inner.stats.record_miss();
                None
            }
        }
    }

    // == Get Or Fetch ==
    /// Read-through lookup.
    ///
    /// Returns a fresh entry if one exists, waits on an in-flight fetch for
    /// the same key if there is one, and otherwise runs `fetch` as the
    /// leader and stores its value for `ttl`. Concurrent callers for one key
    /// share a single invocation of `fetch`.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<Lookup>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let mut fetch = Some(fetch);

        loop {
            match self.join(key)? {
                Join::Hit(entry) => {
                    return Ok(Lookup {
                        entry,
                        outcome: Outcome::Hit,
                    })
                }
                Join::Wait(rx) => {
                    if let Some(entry) = flight::wait(rx, self.fetch_timeout).await? {
                        self.lock().stats.record_coalesced();
                        return Ok(Lookup {
                            entry,
                            outcome: Outcome::Coalesced,
                        });
                    }
                    // Leader was cancelled; look again.
                    debug!(key, "in-flight fetch abandoned, retrying lookup");
                }
                Join::Lead(guard) => {
                    let fetch = fetch
                        .take()
                        .ok_or_else(|| CacheError::Internal("fetch already consumed".into()))?;
                    return self.lead(guard, ttl, fetch).await;
                }
            }
        }
    }

    /// Classifies `key` and, on a miss, claims it with a Pending slot.
    /// Check and claim happen under one lock acquisition.
    fn join(&self, key: &str) -> Result<Join<'_>> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let now = Instant::now();

        match inner.slots.get(key) {
            Some(Slot::Ready(entry)) if !entry.is_expired_at(now) => {
                let entry = entry.clone();
                inner.lru.touch(key);
                inner.stats.record_hit();
                return Ok(Join::Hit(entry));
            }
            Some(Slot::Pending(flight)) => {
                return Ok(Join::Wait(flight.subscribe()));
            }
            // Stale: the Pending slot replaces it in place
            Some(Slot::Ready(_)) => {
                inner.lru.remove(key);
            }
            None => self.make_room(inner, now)?,
        }

        inner.next_flight += 1;
        let id = inner.next_flight;
        let (flight, tx) = Flight::open(id);
        inner.slots.insert(key.to_string(), Slot::Pending(flight));
        inner.stats.record_miss();
        inner.stats.record_fetch();

        Ok(Join::Lead(FlightGuard {
            store: self,
            key: key.to_string(),
            id,
            tx: Some(tx),
        }))
    }

    async fn lead<F, Fut>(&self, guard: FlightGuard<'_>, ttl: Duration, fetch: F) -> Result<Lookup>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let fetched = match tokio::time::timeout(self.fetch_timeout, fetch()).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(flight::millis(self.fetch_timeout))),
        };

        match fetched {
            Ok(value) => {
                let entry = CacheEntry::new(value, ttl);
                guard.complete(entry.clone());
                Ok(Lookup {
                    entry,
                    outcome: Outcome::Miss,
                })
            }
            Err(err) => {
                warn!(key = %guard.key, error = %err, "origin fetch failed");
                guard.fail(err.clone());
                Err(err)
            }
        }
    }

    /// Frees a slot for a new key, or reports `CapacityExceeded`.
    fn make_room(&self, inner: &mut Inner, now: Instant) -> Result<()> {
        if self.max_entries == 0 || inner.slots.len() < self.max_entries {
            return Ok(());
        }

        let purged = inner.purge_expired(now);
        if purged > 0 {
            debug!(purged, "dropped expired entries to make room");
        }

        if self.policy == EvictionPolicy::Lru {
            while inner.slots.len() >= self.max_entries {
                let Some(victim) = inner.lru.pop_least_recent() else {
                    break;
                };
                if matches!(inner.slots.get(&victim), Some(Slot::Ready(_))) {
                    inner.slots.remove(&victim);
                    inner.stats.record_eviction();
                    debug!(key = %victim, "evicted least recently used entry");
                }
            }
        }

        if inner.slots.len() >= self.max_entries {
            warn!(max_entries = self.max_entries, "cache capacity exceeded");
            return Err(CacheError::CapacityExceeded(self.max_entries));
        }
        Ok(())
    }

    // == Invalidate ==
    /// Removes a Ready entry. In-flight fetches are left alone.
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().remove_ready(key)
    }

    /// State of `key`, if the store holds it.
    pub fn state(&self, key: &str) -> Option<EntryState> {
        self.lock().slots.get(key).map(Slot::state)
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let mut stats = inner.stats.clone();
        stats.total_entries = inner.slots.len();
        stats.pending = inner
            .slots
            .values()
            .filter(|slot| slot.state() == EntryState::Pending)
            .count();
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired Ready entries, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        self.lock().purge_expired(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().slots.is_empty()
    }
}

// == Flight Guard ==
/// Leader's claim on a Pending slot.
///
/// Dropping the guard without resolving it (the leader's future was
/// cancelled) releases the slot and wakes waiters so they can retry.
struct FlightGuard<'a> {
    store: &'a CacheStore,
    key: String,
    id: u64,
    tx: Option<watch::Sender<FlightOutcome>>,
}

impl FlightGuard<'_> {
    fn complete(mut self, entry: CacheEntry) {
        let mut guard = self.store.lock();
        let inner = &mut *guard;
        if inner.owns(&self.key, self.id) {
            inner.slots.insert(self.key.clone(), Slot::Ready(entry.clone()));
            inner.lru.touch(&self.key);
        }
        if let Some(tx) = self.tx.take() {
            tx.send_replace(Some(Ok(entry)));
        }
    }

    fn fail(mut self, err: CacheError) {
        let mut inner = self.store.lock();
        if inner.owns(&self.key, self.id) {
            inner.slots.remove(&self.key);
        }
        inner.stats.record_fetch_error();
        if let Some(tx) = self.tx.take() {
            tx.send_replace(Some(Err(err)));
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let mut inner = self.store.lock();
        if inner.owns(&self.key, self.id) {
            inner.slots.remove(&self.key);
        }
        debug!(key = %self.key, "leader cancelled, released pending entry");
        drop(tx);
    }
}

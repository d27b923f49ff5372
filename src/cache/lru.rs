//! LRU Tracker Module
//!
//! Access ordering for Ready entries. Pending keys are never tracked, so
//! they can never be chosen for eviction.

use std::collections::VecDeque;

// == LRU Tracker ==
/// Tracks access order of Ready keys.
///
/// Front = most recently used, back = least recently used.
#[derive(Debug, Default)]
pub struct LruTracker {
    order: VecDeque<String>,
}

impl LruTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used, tracking it if it was not yet.
    pub fn touch(&mut self, key: &str) {
        if self.order.front().is_some_and(|k| k == key) {
            return;
        }
        self.remove(key);
        self.order.push_front(key.to_string());
    }

    // == Remove ==
    /// Stops tracking a key. Returns whether it was tracked.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.order.iter().position(|k| k == key) {
            Some(idx) => {
                self.order.remove(idx);
                true
            }
            None => false,
        }
    }

    // == Pop Least Recent ==
    /// Removes and returns the least recently used key.
    pub fn pop_least_recent(&mut self) -> Option<String> {
        self.order.pop_back()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

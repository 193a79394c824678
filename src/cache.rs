//! Bounded memoization of detection results.
//!
//! Keyed by line text plus the active pattern-set fingerprint, so a newly
//! registered plugin can never be masked by a "no match" cached before it
//! existed. Eviction is generational: when full, the oldest half of the
//! entries goes at once. Good enough for a short-lived interactive session;
//! not a strict LRU.

use std::collections::{HashMap, VecDeque};

use crate::detect::DetectedCommand;

pub const DEFAULT_CACHE_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    line: String,
    fingerprint: u64,
}

pub struct DetectCache {
    map: HashMap<CacheKey, Option<Vec<DetectedCommand>>>,
    order: VecDeque<CacheKey>,
    capacity: usize,
}

impl DetectCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(2),
        }
    }

    /// Cached answer for `(line, fingerprint)`. The outer `Option` is
    /// hit/miss; the inner one is the stored detection result, where `None`
    /// is the explicit "nothing detected" sentinel.
    pub fn get(&self, line: &str, fingerprint: u64) -> Option<Option<Vec<DetectedCommand>>> {
        let key = CacheKey {
            line: line.to_string(),
            fingerprint,
        };
        self.map.get(&key).cloned()
    }

    pub fn insert(&mut self, line: &str, fingerprint: u64, value: Option<Vec<DetectedCommand>>) {
        let key = CacheKey {
            line: line.to_string(),
            fingerprint,
        };
        if self.map.contains_key(&key) {
            self.map.insert(key, value);
            return;
        }
        if self.map.len() >= self.capacity {
            self.evict_oldest_half();
        }
        self.order.push_back(key.clone());
        self.map.insert(key, value);
    }

    fn evict_oldest_half(&mut self) {
        let count = (self.capacity / 2).max(1);
        for _ in 0..count {
            match self.order.pop_front() {
                Some(key) => {
                    self.map.remove(&key);
                }
                None => break,
            }
        }
        crate::trace!("detect cache evicted {count} oldest entries");
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

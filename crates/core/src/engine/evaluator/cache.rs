//! Memoization for candidate scores.
//! Keys are xxh3 digests of the quantized baseline and candidate delta;
//! entries are evicted least-recently-used past a fixed capacity. Reads
//! share a lock; inserts, recency bumps, and eviction take it exclusively.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::CacheStats;

#[derive(Clone, Copy, Debug)]
struct CacheEntry {
    score: f64,
    last_access: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: BTreeMap<u64, CacheEntry>,
    clock: u64,
}

pub struct EvalCache {
    inner: RwLock<CacheInner>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EvalCache {
    pub fn new(capacity: usize) -> EvalCache {
        assert!(capacity > 0, "cache capacity must be positive");
        EvalCache {
            inner: RwLock::new(CacheInner::default()),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: u64) -> Option<f64> {
        let score = {
            let inner = self.inner.read().expect("cache lock poisoned");
            inner.entries.get(&key).map(|entry| entry.score)
        };
        match score {
            Some(score) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                let mut inner = self.inner.write().expect("cache lock poisoned");
                inner.clock += 1;
                let clock = inner.clock;
                if let Some(entry) = inner.entries.get_mut(&key) {
                    entry.last_access = clock;
                }
                Some(score)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: u64, score: f64) {
        let mut inner = self.inner.write().expect("cache lock poisoned");
        inner.clock += 1;
        let clock = inner.clock;
        inner.entries.insert(key, CacheEntry { score, last_access: clock });
        while inner.entries.len() > self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| *key)
                .expect("non-empty cache must have an oldest entry");
            inner.entries.remove(&oldest);
        }
    }

    /// Drops every entry and returns how many were dropped. Counters are
    /// preserved; they describe lifetime behavior, not the current level.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.write().expect("cache lock poisoned");
        let dropped = inner.entries.len();
        inner.entries.clear();
        dropped
    }

    pub fn stats(&self) -> CacheStats {
        let size = self.inner.read().expect("cache lock poisoned").entries.len();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_and_miss_counters_track_lookups() {
        let cache = EvalCache::new(8);
        assert_eq!(cache.get(1), None);
        cache.insert(1, 4.5);
        assert_eq!(cache.get(1), Some(4.5));
        assert_eq!(cache.get(2), None);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn eviction_removes_the_least_recently_used_entry() {
        let cache = EvalCache::new(2);
        cache.insert(1, 1.0);
        cache.insert(2, 2.0);
        assert_eq!(cache.get(1), Some(1.0));
        cache.insert(3, 3.0);
        assert_eq!(cache.stats().size, 2);
        assert_eq!(cache.get(2), None, "entry 2 was least recently used");
        assert_eq!(cache.get(1), Some(1.0));
        assert_eq!(cache.get(3), Some(3.0));
    }

    #[test]
    fn clear_reports_dropped_entries_and_empties_the_cache() {
        let cache = EvalCache::new(8);
        cache.insert(1, 1.0);
        cache.insert(2, 2.0);
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.stats().size, 0);
        assert_eq!(cache.get(1), None);
    }
}

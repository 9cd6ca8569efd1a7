//! Generic per-key TTL cache backing the subject/resource/derived fact caches.

use dashmap::DashMap;
use std::time::{Duration, Instant};

struct CacheEntry<T> {
    value: T,
    expires_at: Instant,
}

/// A concurrent map from `key -> T` where each entry expires `ttl` after insertion.
/// Reads that observe an expired entry drop it and report a miss; nothing sweeps the
/// map proactively, which keeps hot-path reads lock-free (`dashmap`'s sharded locking
/// aside) at the cost of stale entries lingering until the next read or eviction pass.
pub struct TtlCache<T: Clone> {
    entries: DashMap<String, CacheEntry<T>>,
    ttl: Duration,
    max_entries: usize,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { entries: DashMap::new(), ttl, max_entries }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove(key);
        None
    }

    pub fn insert(&self, key: String, value: T) {
        if self.entries.len() >= self.max_entries {
            self.evict_expired();
        }
        self.entries.insert(key, CacheEntry { value, expires_at: Instant::now() + self.ttl });
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry. Called opportunistically when the cache is at
    /// capacity, and also invoked by `FactsProvider`'s optional background sweeper so
    /// a cache that stops being read still bounds its memory.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    fn evict_expired(&self) {
        self.sweep_expired();
    }
}

// Sat Oct 17 2026 - Alex

use crate::cache::clock::{Clock, SystemClock};
use crate::cache::entry::{CacheEntry, SharedComputeData};
use log::debug;
use parking_lot::RwLock;
use serde::Serialize;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fraction of `max_cache_size` kept after an over-capacity cleanup.
const EVICTION_TARGET_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct AtomicCacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

struct CacheMap {
    entries: HashMap<String, CacheEntry>,
    next_sequence: u64,
}

/// Thread-safe key/value store for computation results of any type.
///
/// Values are stored behind `Arc` and handed out as `Arc<T>`; readers never
/// hold the map lock while using a value. When the entry count goes over
/// `max_cache_size`, expired entries are dropped first and then the lowest
/// LRU scores until the count is back at 80% of the limit.
pub struct SharedResultCache {
    map: RwLock<CacheMap>,
    max_cache_size: usize,
    expiration: Duration,
    clock: Arc<dyn Clock>,
    stats: AtomicCacheStats,
}

impl SharedResultCache {
    pub fn new(max_cache_size: usize, expiration: Duration) -> Self {
        Self::with_clock(max_cache_size, expiration, Arc::new(SystemClock))
    }

    pub fn with_clock(max_cache_size: usize, expiration: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            map: RwLock::new(CacheMap {
                entries: HashMap::new(),
                next_sequence: 0,
            }),
            max_cache_size,
            expiration,
            clock,
            stats: AtomicCacheStats::default(),
        }
    }

    /// Insert or replace `key`. Memory usage is recorded as `size_of::<T>()`.
    pub fn set_shared_data<K, T>(&self, key: K, value: T)
    where
        K: Into<String>,
        T: Send + Sync + 'static,
    {
        self.set_shared_data_sized(key, value, std::mem::size_of::<T>());
    }

    pub fn set_shared_data_sized<K, T>(&self, key: K, value: T, memory_usage: usize)
    where
        K: Into<String>,
        T: Send + Sync + 'static,
    {
        let now = self.clock.now();
        let mut map = self.map.write();
        let sequence = map.next_sequence;
        map.next_sequence += 1;
        map.entries.insert(key.into(), CacheEntry::new(value, memory_usage, now, sequence));

        if map.entries.len() > self.max_cache_size {
            self.cleanup_locked(&mut map);
        }
    }

    /// `None` if the key is missing or holds a different type. A hit bumps
    /// the entry's access count and last access time.
    pub fn get_shared_data<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let now = self.clock.now();
        let mut map = self.map.write();

        let value = map.entries.get_mut(key).and_then(|entry| {
            let value = entry.downcast::<T>()?;
            entry.touch(now);
            Some(value)
        });

        if value.is_some() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Typed snapshot of an entry and its bookkeeping. Does not count as an access.
    pub fn entry_info<T>(&self, key: &str) -> Option<SharedComputeData<T>>
    where
        T: Send + Sync + 'static,
    {
        self.map.read().entries.get(key).and_then(SharedComputeData::from_entry)
    }

    pub fn remove_shared_data(&self, key: &str) -> bool {
        self.map.write().entries.remove(key).is_some()
    }

    pub fn has_shared_data(&self, key: &str) -> bool {
        self.map.read().entries.contains_key(key)
    }

    /// Drop expired entries, then trim by LRU score if still over capacity.
    pub fn cleanup_expired_cache(&self) {
        let mut map = self.map.write();
        self.cleanup_locked(&mut map);
    }

    fn cleanup_locked(&self, map: &mut CacheMap) {
        let now = self.clock.now();

        let before = map.entries.len();
        let expiration = self.expiration;
        map.entries.retain(|_, entry| entry.age(now) <= expiration);
        let expired = before - map.entries.len();
        if expired > 0 {
            self.stats.expirations.fetch_add(expired as u64, Ordering::Relaxed);
            debug!("Cache dropped {} expired entries", expired);
        }

        let count = map.entries.len();
        if count <= self.max_cache_size {
            return;
        }

        let target = EVICTION_TARGET_RATIO * self.max_cache_size as f64;
        let to_remove = (count as f64 - target).floor() as usize;

        let mut ranked: Vec<(f64, u64, String)> = map
            .entries
            .iter()
            .map(|(key, entry)| (entry.lru_score(now), entry.sequence, key.clone()))
            .collect();
        ranked.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(CmpOrdering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });

        for (_, _, key) in ranked.into_iter().take(to_remove) {
            map.entries.remove(&key);
        }

        self.stats.evictions.fetch_add(to_remove as u64, Ordering::Relaxed);
        debug!("Cache evicted {} entries, {} remain", to_remove, map.entries.len());
    }

    pub fn len(&self) -> usize {
        self.map.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn memory_usage(&self) -> usize {
        self.map.read().entries.values().map(|entry| entry.memory_usage).sum()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.map.read().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn clear(&self) {
        self.map.write().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            expirations: self.stats.expirations.load(Ordering::Relaxed),
        }
    }

    pub fn max_cache_size(&self) -> usize {
        self.max_cache_size
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }
}

impl std::fmt::Debug for SharedResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedResultCache")
            .field("entries", &self.len())
            .field("max_cache_size", &self.max_cache_size)
            .field("expiration", &self.expiration)
            .finish()
    }
}

// Sat Oct 17 2026 - Alex

use std::any::{Any, TypeId};
use std::sync::Arc;
use std::time::Instant;

const RECENCY_WEIGHT: f64 = 0.7;
const FREQUENCY_WEIGHT: f64 = 0.3;
const FREQUENCY_SATURATION: f64 = 10.0;

/// Type-erased cache slot.
#[derive(Clone)]
pub struct CacheEntry {
    data: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
    pub create_time: Instant,
    pub last_access_time: Instant,
    pub access_count: u64,
    pub memory_usage: usize,
    pub sequence: u64,
    /// Values are stored fully computed, so a live entry is always ready.
    pub ready: bool,
}

impl CacheEntry {
    pub fn new<T>(value: T, memory_usage: usize, now: Instant, sequence: u64) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            data: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            create_time: now,
            last_access_time: now,
            access_count: 0,
            memory_usage,
            sequence,
            ready: true,
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_access_time = now;
        self.access_count += 1;
    }

    pub fn holds<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// `None` if the stored value is not a `T`.
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        if !self.holds::<T>() {
            return None;
        }
        self.data.clone().downcast::<T>().ok()
    }

    /// Lower means more evictable.
    pub fn lru_score(&self, now: Instant) -> f64 {
        let minutes_idle = now.saturating_duration_since(self.last_access_time).as_secs_f64() / 60.0;
        let recency = 1.0 / (1.0 + minutes_idle);
        let frequency = (self.access_count as f64 / FREQUENCY_SATURATION).min(1.0);
        RECENCY_WEIGHT * recency + FREQUENCY_WEIGHT * frequency
    }

    pub fn age(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.create_time)
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("type", &self.type_name)
            .field("access_count", &self.access_count)
            .field("memory_usage", &self.memory_usage)
            .field("sequence", &self.sequence)
            .field("ready", &self.ready)
            .finish()
    }
}

/// Typed view over a [`CacheEntry`], handed out by
/// `SharedResultCache::entry_info`.
#[derive(Debug, Clone)]
pub struct SharedComputeData<T> {
    pub data: Arc<T>,
    pub create_time: Instant,
    pub last_access_time: Instant,
    pub access_count: u64,
    pub memory_usage: usize,
    pub ready: bool,
}

impl<T> SharedComputeData<T>
where
    T: Send + Sync + 'static,
{
    pub fn from_entry(entry: &CacheEntry) -> Option<Self> {
        let data = entry.downcast::<T>()?;
        Some(Self {
            data,
            create_time: entry.create_time,
            last_access_time: entry.last_access_time,
            access_count: entry.access_count,
            memory_usage: entry.memory_usage,
            ready: entry.ready,
        })
    }
}

// Fri Oct 16 2026 - Alex

use crate::cache::SharedResultCache;
use crate::engine::progress::{EventBus, GlobalProgressCallback};
use crate::engine::registry::ActiveTaskRegistry;
use crate::engine::stats::StatisticsCollector;
use parking_lot::RwLock;
use std::sync::Arc;

/// Everything a worker needs to run a job, shared by the engine facade and
/// every worker thread. Passed explicitly; there is no process-wide state.
pub struct EngineContext {
    stats: StatisticsCollector,
    registry: ActiveTaskRegistry,
    cache: Arc<SharedResultCache>,
    events: Arc<EventBus>,
    global_progress: RwLock<Option<GlobalProgressCallback>>,
    cache_results: bool,
}

impl EngineContext {
    pub fn new(cache: Arc<SharedResultCache>, cache_results: bool) -> Self {
        Self {
            stats: StatisticsCollector::new(),
            registry: ActiveTaskRegistry::new(),
            cache,
            events: Arc::new(EventBus::new()),
            global_progress: RwLock::new(None),
            cache_results,
        }
    }

    pub fn stats(&self) -> &StatisticsCollector {
        &self.stats
    }

    pub fn registry(&self) -> &ActiveTaskRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<SharedResultCache> {
        &self.cache
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn cache_results(&self) -> bool {
        self.cache_results
    }

    pub fn global_progress(&self) -> Option<GlobalProgressCallback> {
        self.global_progress.read().clone()
    }

    pub fn set_global_progress(&self, callback: Option<GlobalProgressCallback>) {
        *self.global_progress.write() = callback;
    }
}

// Fri Oct 16 2026 - Alex

use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskStatistics {
    pub queued_tasks: usize,
    pub running_tasks: usize,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub cancelled_tasks: u64,
    pub total_processed_tasks: u64,
    pub avg_execution_time_ms: f64,
}

impl TaskStatistics {
    pub fn success_rate(&self) -> f64 {
        if self.total_processed_tasks == 0 {
            0.0
        } else {
            self.completed_tasks as f64 / self.total_processed_tasks as f64
        }
    }

    pub fn is_quiescent(&self) -> bool {
        self.queued_tasks == 0 && self.running_tasks == 0
    }
}

/// Counters updated from worker threads under one short-lived lock.
///
/// Cancelled tasks are tracked on their own and are not part of
/// `total_processed_tasks`, so `completed + failed == total_processed`
/// holds whenever nothing is queued or running.
#[derive(Debug, Default)]
pub struct StatisticsCollector {
    inner: Mutex<TaskStatistics>,
}

impl StatisticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_queued(&self) {
        self.inner.lock().queued_tasks += 1;
    }

    pub fn record_started(&self) {
        let mut stats = self.inner.lock();
        stats.queued_tasks = stats.queued_tasks.saturating_sub(1);
        stats.running_tasks += 1;
    }

    pub fn record_completion(&self, duration: Duration) {
        let mut stats = self.inner.lock();
        stats.running_tasks = stats.running_tasks.saturating_sub(1);
        stats.completed_tasks += 1;
        Self::record_processed(&mut stats, duration);
    }

    pub fn record_failure(&self, duration: Duration) {
        let mut stats = self.inner.lock();
        stats.running_tasks = stats.running_tasks.saturating_sub(1);
        stats.failed_tasks += 1;
        Self::record_processed(&mut stats, duration);
    }

    /// A task that was pulled by a worker and then ended cancelled.
    pub fn record_cancellation(&self) {
        let mut stats = self.inner.lock();
        stats.running_tasks = stats.running_tasks.saturating_sub(1);
        stats.cancelled_tasks += 1;
    }

    /// A task dropped from the queue without ever being pulled.
    pub fn record_discarded(&self) {
        let mut stats = self.inner.lock();
        stats.queued_tasks = stats.queued_tasks.saturating_sub(1);
        stats.cancelled_tasks += 1;
    }

    pub fn snapshot(&self) -> TaskStatistics {
        self.inner.lock().clone()
    }

    pub fn reset(&self) {
        *self.inner.lock() = TaskStatistics::default();
    }

    fn record_processed(stats: &mut TaskStatistics, duration: Duration) {
        stats.total_processed_tasks += 1;

        let n = stats.total_processed_tasks as f64;
        let duration_ms = duration.as_secs_f64() * 1000.0;
        stats.avg_execution_time_ms = ((n - 1.0) * stats.avg_execution_time_ms + duration_ms) / n;
    }
}

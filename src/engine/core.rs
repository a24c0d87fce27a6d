// Fri Oct 16 2026 - Alex

use crate::cache::{CacheStats, Clock, SharedResultCache, SystemClock};
use crate::config::{ConfigError, EngineConfig};
use crate::engine::context::EngineContext;
use crate::engine::job::TaskJob;
use crate::engine::progress::TaskEvent;
use crate::engine::registry::TaskHandle;
use crate::engine::scheduler::{PriorityScheduler, SchedulerError};
use crate::engine::stats::TaskStatistics;
use crate::engine::task::{GenericTask, Task, TaskPriority, TaskState};
use crate::engine::worker::WorkerPool;
use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Facade over the scheduler, worker pool, result cache and statistics.
///
/// Workers start in [`Engine::new`] and stop in [`Engine::shutdown`] (or on
/// drop). Callbacks that need to call back into the engine should hold a
/// `Weak<Engine>`; no engine lock is held while a callback runs.
pub struct Engine {
    config: EngineConfig,
    scheduler: Arc<PriorityScheduler>,
    context: Arc<EngineContext>,
    pool: Mutex<Option<WorkerPool>>,
    worker_count: usize,
    running: AtomicBool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`Engine::new`] with the cache driven by `clock`.
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, EngineError> {
        config.validate()?;

        let cache = Arc::new(SharedResultCache::with_clock(
            config.max_cache_size,
            config.cache_expiration_time,
            clock,
        ));
        let context = Arc::new(EngineContext::new(cache, config.enable_result_cache));
        let scheduler = Arc::new(PriorityScheduler::new(config.max_queue_size));

        let worker_count = config.resolved_worker_threads();
        let pool = WorkerPool::start(worker_count, scheduler.clone(), context.clone())?;

        info!(
            "Engine started with {} workers (queue limit {}, cache limit {})",
            worker_count, config.max_queue_size, config.max_cache_size
        );

        Ok(Self {
            config,
            scheduler,
            context,
            pool: Mutex::new(Some(pool)),
            worker_count,
            running: AtomicBool::new(true),
        })
    }

    /// Queue a task. Never blocks.
    pub fn submit_task<In, Out>(&self, task: Task<In, Out>) -> Result<(), EngineError>
    where
        In: Send + 'static,
        Out: Send + 'static,
    {
        if !self.is_running() {
            return Err(EngineError::ShutDown);
        }

        let id = task.id().to_string();
        let priority = task.priority();
        let handle = TaskHandle {
            token: task.token().clone(),
            state: task.state_cell().clone(),
            priority,
        };

        if !self.context.registry().register(&id, handle) {
            return Err(EngineError::DuplicateTaskId(id));
        }

        let stats = self.context.stats();
        let events = self.context.events();
        let pushed = self.scheduler.try_push(Box::new(TaskJob::new(task)), || {
            stats.record_queued();
            events.publish(TaskEvent::Queued {
                task_id: id.clone(),
                priority,
            });
        });

        match pushed {
            Ok(()) => {
                debug!("Task {} queued with {} priority", id, priority);
                Ok(())
            }
            Err((err, _rejected)) => {
                self.context.registry().remove(&id);
                match err {
                    SchedulerError::QueueFull { capacity } => {
                        warn!("Rejected task {}: queue full ({} tasks)", id, capacity);
                        Err(EngineError::QueueFull { capacity })
                    }
                    SchedulerError::Closed => Err(EngineError::ShutDown),
                }
            }
        }
    }

    /// Queue untyped work. `on_complete` receives `true` only on success.
    pub fn submit_generic_task(
        &self,
        task: GenericTask,
        on_complete: Option<Box<dyn FnOnce(bool) + Send>>,
    ) -> Result<(), EngineError> {
        self.submit_task(task.into_task(on_complete))
    }

    /// Signal cancellation. Unknown or finished ids are ignored.
    pub fn cancel_task(&self, id: &str) -> bool {
        let found = self.context.registry().cancel(id);
        if found {
            debug!("Cancellation requested for {}", id);
        }
        found
    }

    pub fn cancel_all_tasks(&self) -> usize {
        let count = self.context.registry().cancel_all();
        info!("Cancellation requested for {} live tasks", count);
        count
    }

    /// Workers stop pulling new tasks; running ones continue.
    pub fn pause(&self) {
        self.scheduler.pause();
        info!("Engine paused");
    }

    pub fn resume(&self) {
        self.scheduler.resume();
        info!("Engine resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.scheduler.is_paused()
    }

    /// Cancel everything, wait for running compute functions to return,
    /// then clear the queue, registry and cache. Queued tasks are dropped
    /// without their completion callback. Idempotent.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Shutting down engine");
        self.context.registry().cancel_all();

        let drained = self.scheduler.close();
        let discarded = drained.len();
        for job in drained {
            job.discard(&self.context);
        }

        if let Some(mut pool) = self.pool.lock().take() {
            pool.stop();
        }

        self.context.registry().clear();
        self.context.cache().clear();
        info!("Engine stopped ({} queued tasks discarded)", discarded);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn statistics(&self) -> TaskStatistics {
        self.context.stats().snapshot()
    }

    pub fn get_shared_data<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.context.cache().get_shared_data(key)
    }

    pub fn set_shared_data<K, T>(&self, key: K, value: T)
    where
        K: Into<String>,
        T: Send + Sync + 'static,
    {
        self.context.cache().set_shared_data(key, value);
    }

    pub fn remove_shared_data(&self, key: &str) -> bool {
        self.context.cache().remove_shared_data(key)
    }

    pub fn cache(&self) -> &Arc<SharedResultCache> {
        self.context.cache()
    }

    pub fn cache_size(&self) -> usize {
        self.context.cache().len()
    }

    pub fn cache_memory_usage(&self) -> usize {
        self.context.cache().memory_usage()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.context.cache().stats()
    }

    pub fn queue_size(&self) -> usize {
        self.scheduler.len()
    }

    /// Tasks submitted and not yet terminal.
    pub fn active_task_count(&self) -> usize {
        self.context.registry().len()
    }

    pub fn task_state(&self, id: &str) -> Option<TaskState> {
        self.context.registry().state(id)
    }

    pub fn task_priority(&self, id: &str) -> Option<TaskPriority> {
        self.context.registry().priority(id)
    }

    pub fn set_global_progress_callback<F>(&self, callback: F)
    where
        F: Fn(&str, u8, &str) + Send + Sync + 'static,
    {
        self.context.set_global_progress(Some(Arc::new(callback)));
    }

    pub fn clear_global_progress_callback(&self) {
        self.context.set_global_progress(None);
    }

    pub fn subscribe(&self) -> Receiver<TaskEvent> {
        self.context.events().subscribe()
    }

    /// Block until nothing is queued or running, or `timeout` passes.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        self.scheduler.wait_for_idle(timeout)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Task queue is full ({capacity} tasks)")]
    QueueFull { capacity: usize },
    #[error("A live task already uses id {0:?}")]
    DuplicateTaskId(String),
    #[error("Engine has been shut down")]
    ShutDown,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::engine::cancel::CancellationToken;
    use crate::engine::progress::Progress;
    use crate::engine::result::ComputeResult;
    use crate::engine::task::TaskError;
    use crossbeam_channel::unbounded;
    use std::thread;

    const WAIT: Duration = Duration::from_secs(10);

    fn engine(workers: usize) -> Engine {
        Engine::new(EngineConfig::new().with_worker_threads(workers)).unwrap()
    }

    fn recording_task(id: &str, order: &Arc<Mutex<Vec<String>>>) -> Task<(), ()> {
        let order = order.clone();
        let name = id.to_string();
        Task::new(id, (), move |_, _, _| {
            order.lock().push(name);
            Ok(())
        })
    }

    #[test]
    fn test_priority_order_with_single_worker() {
        let engine = engine(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        engine.pause();
        engine
            .submit_task(recording_task("low", &order).with_priority(TaskPriority::Low))
            .unwrap();
        engine
            .submit_task(recording_task("critical", &order).with_priority(TaskPriority::Critical))
            .unwrap();
        engine
            .submit_task(recording_task("normal", &order).with_priority(TaskPriority::Normal))
            .unwrap();
        assert_eq!(engine.queue_size(), 3);
        assert!(engine.is_paused());

        engine.resume();
        assert!(engine.wait_for_idle(WAIT));
        assert_eq!(*order.lock(), vec!["critical", "normal", "low"]);
    }

    #[test]
    fn test_cancel_before_pull_never_succeeds() {
        let engine = engine(1);
        let (tx, rx) = unbounded();

        engine.pause();
        let task: Task<u32, u32> = Task::new("doomed", 1, |x, _, _| Ok(x)).on_complete(move |result| {
            let _ = tx.send(result);
        });
        engine.submit_task(task).unwrap();
        assert_eq!(engine.task_state("doomed"), Some(TaskState::Pending));

        assert!(engine.cancel_task("doomed"));
        engine.resume();

        let result: ComputeResult<u32> = rx.recv_timeout(WAIT).unwrap();
        assert!(result.is_cancelled());
        assert!(engine.wait_for_idle(WAIT));

        let stats = engine.statistics();
        assert_eq!(stats.cancelled_tasks, 1);
        assert_eq!(stats.completed_tasks, 0);
        assert_eq!(engine.task_state("doomed"), None);
    }

    #[test]
    fn test_statistics_balance_at_quiescence() {
        let engine = engine(4);
        for i in 0..10u64 {
            engine
                .submit_task(Task::new(format!("ok-{}", i), i, |x, _, _: &Progress<u64>| Ok(x + 1)))
                .unwrap();
        }
        for i in 0..5 {
            let task: Task<(), ()> =
                Task::new(format!("bad-{}", i), (), |_, _, _| Err(TaskError::InvalidInput("empty".into())));
            engine.submit_task(task).unwrap();
        }

        assert!(engine.wait_for_idle(WAIT));
        let stats = engine.statistics();
        assert!(stats.is_quiescent());
        assert_eq!(stats.completed_tasks, 10);
        assert_eq!(stats.failed_tasks, 5);
        assert_eq!(stats.completed_tasks + stats.failed_tasks, stats.total_processed_tasks);
        assert_eq!(engine.active_task_count(), 0);
    }

    #[test]
    fn test_queue_full_fails_fast() {
        let engine = Engine::new(EngineConfig::new().with_worker_threads(1).with_max_queue_size(2)).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        engine.pause();
        engine.submit_task(recording_task("a", &order)).unwrap();
        engine.submit_task(recording_task("b", &order)).unwrap();

        let err = engine.submit_task(recording_task("c", &order)).unwrap_err();
        assert!(matches!(err, EngineError::QueueFull { capacity: 2 }));
        assert_eq!(engine.statistics().queued_tasks, 2);
        assert_eq!(engine.active_task_count(), 2);
        assert_eq!(engine.task_state("c"), None);

        engine.resume();
        assert!(engine.wait_for_idle(WAIT));
        assert_eq!(order.lock().len(), 2);
    }

    #[test]
    fn test_duplicate_live_id_rejected() {
        let engine = engine(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        engine.pause();
        engine.submit_task(recording_task("same", &order)).unwrap();
        let err = engine.submit_task(recording_task("same", &order)).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateTaskId(ref id) if id == "same"));

        engine.resume();
        assert!(engine.wait_for_idle(WAIT));
        engine.submit_task(recording_task("same", &order)).unwrap();
        assert!(engine.wait_for_idle(WAIT));
        assert_eq!(order.lock().len(), 2);
    }

    #[test]
    fn test_cancel_is_idempotent_and_ignores_unknown() {
        let engine = engine(1);
        assert!(!engine.cancel_task("nobody"));

        let task: Task<(), u8> = Task::new("quick", (), |_, _, _| Ok(1));
        engine.submit_task(task).unwrap();
        assert!(engine.wait_for_idle(WAIT));

        let before = engine.statistics();
        assert!(!engine.cancel_task("quick"));
        assert!(!engine.cancel_task("quick"));
        assert_eq!(engine.statistics(), before);
        assert_eq!(before.completed_tasks, 1);
    }

    #[test]
    fn test_cooperative_cancel_of_running_task() {
        let engine = engine(1);
        let events = engine.subscribe();
        let (tx, rx) = unbounded();

        let task: Task<(), u32> = Task::new("spinner", (), |_, token: &CancellationToken, _| {
            loop {
                token.check()?;
                thread::sleep(Duration::from_millis(2));
            }
        })
        .on_complete(move |result| {
            let _ = tx.send(result.is_cancelled());
        });
        engine.submit_task(task).unwrap();

        loop {
            match events.recv_timeout(WAIT).unwrap() {
                TaskEvent::Started { .. } => break,
                _ => continue,
            }
        }
        assert_eq!(engine.task_state("spinner"), Some(TaskState::Running));
        assert_eq!(engine.cancel_all_tasks(), 1);

        assert!(rx.recv_timeout(WAIT).unwrap());
        assert!(engine.wait_for_idle(WAIT));
        assert_eq!(engine.statistics().cancelled_tasks, 1);
    }

    #[test]
    fn test_panic_does_not_kill_worker() {
        let engine = engine(1);
        let (tx, rx) = unbounded();

        let bad: Task<(), u32> = Task::new("panics", (), |_, _, _| panic!("bad vertex index"));
        let tx_bad = tx.clone();
        engine
            .submit_task(bad.on_complete(move |r| {
                let _ = tx_bad.send(r.is_failure());
            }))
            .unwrap();

        let good: Task<(), u32> = Task::new("after", (), |_, _, _| Ok(7));
        engine
            .submit_task(good.on_complete(move |r| {
                let _ = tx.send(r.is_success());
            }))
            .unwrap();

        assert!(rx.recv_timeout(WAIT).unwrap());
        assert!(rx.recv_timeout(WAIT).unwrap());
        assert!(engine.wait_for_idle(WAIT));
        assert_eq!(engine.statistics().failed_tasks, 1);
    }

    #[test]
    fn test_reentrant_submit_from_callback() {
        let engine = Arc::new(engine(2));
        let weak = Arc::downgrade(&engine);
        let order = Arc::new(Mutex::new(Vec::new()));
        let follow_up = recording_task("second", &order);

        let first = recording_task("first", &order).on_complete(move |_| {
            if let Some(engine) = weak.upgrade() {
                engine.submit_task(follow_up).unwrap();
            }
        });
        engine.submit_task(first).unwrap();

        assert!(engine.wait_for_idle(WAIT));
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_shutdown_from_callback() {
        let engine = Arc::new(engine(2));
        let weak = Arc::downgrade(&engine);
        let (tx, rx) = unbounded();

        let task: Task<(), ()> = Task::new("last", (), |_, _, _| Ok(())).on_complete(move |_| {
            if let Some(engine) = weak.upgrade() {
                engine.shutdown();
            }
            let _ = tx.send(());
        });
        engine.submit_task(task).unwrap();

        rx.recv_timeout(WAIT).unwrap();
        assert!(!engine.is_running());
        assert!(matches!(
            engine.submit_task(Task::new("late", (), |_, _, _: &Progress<()>| Ok(()))),
            Err(EngineError::ShutDown)
        ));
    }

    #[test]
    fn test_shutdown_waits_for_running_task() {
        let engine = engine(1);
        let events = engine.subscribe();
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = delivered.clone();

        let task: Task<(), u32> = Task::new("long-scan", (), |_, token: &CancellationToken, _| {
            loop {
                token.check()?;
                thread::sleep(Duration::from_millis(2));
            }
        })
        .on_complete(move |result| {
            thread::sleep(Duration::from_millis(50));
            sink.lock().push(result.state());
        });
        engine.submit_task(task).unwrap();

        loop {
            match events.recv_timeout(WAIT).unwrap() {
                TaskEvent::Started { .. } => break,
                _ => continue,
            }
        }

        engine.shutdown();

        assert_eq!(*delivered.lock(), vec![TaskState::Cancelled]);
        assert!(!engine.is_running());
        assert_eq!(engine.statistics().cancelled_tasks, 1);
        assert_eq!(engine.active_task_count(), 0);
    }

    #[test]
    fn test_task_priority_of_live_task() {
        let engine = engine(1);
        engine.pause();
        engine
            .submit_task(recording_task("urgent", &Arc::default()).with_priority(TaskPriority::High))
            .unwrap();

        assert_eq!(engine.task_priority("urgent"), Some(TaskPriority::High));
        assert_eq!(engine.task_priority("missing"), None);

        engine.resume();
        assert!(engine.wait_for_idle(WAIT));
        assert_eq!(engine.task_priority("urgent"), None);
    }

    #[test]
    fn test_shutdown_discards_queued_tasks() {
        let engine = engine(1);
        let called = Arc::new(Mutex::new(0));

        engine.pause();
        for i in 0..3 {
            let called = called.clone();
            let task: Task<(), ()> =
                Task::new(format!("q-{}", i), (), |_, _, _| Ok(())).on_complete(move |_| *called.lock() += 1);
            engine.submit_task(task).unwrap();
        }
        engine.set_shared_data("scratch", 1u32);

        engine.shutdown();
        engine.shutdown();

        assert_eq!(*called.lock(), 0);
        let stats = engine.statistics();
        assert_eq!(stats.queued_tasks, 0);
        assert_eq!(stats.cancelled_tasks, 3);
        assert_eq!(engine.queue_size(), 0);
        assert_eq!(engine.active_task_count(), 0);
        assert_eq!(engine.cache_size(), 0);
        assert!(matches!(engine.submit_task(recording_task("x", &Arc::default())), Err(EngineError::ShutDown)));
    }

    #[test]
    fn test_result_auto_cached() {
        let engine = engine(2);
        let task: Task<Vec<u32>, u32> =
            Task::new("sum", vec![1, 2, 3], |v, _, _| Ok(v.iter().sum())).with_cache_key("sum:1-3");
        engine.submit_task(task).unwrap();
        assert!(engine.wait_for_idle(WAIT));

        assert_eq!(engine.get_shared_data::<u32>("sum:1-3").as_deref(), Some(&6));
        assert_eq!(engine.cache_size(), 1);
        assert_eq!(engine.cache_memory_usage(), 4);
        assert_eq!(engine.cache_stats().hits, 1);
        assert!(engine.remove_shared_data("sum:1-3"));
    }

    #[test]
    fn test_result_cache_disabled() {
        let engine = Engine::new(EngineConfig::new().with_worker_threads(1).with_result_cache(false)).unwrap();
        let task: Task<(), u32> = Task::new("uncached", (), |_, _, _| Ok(1)).with_cache_key("uncached");
        engine.submit_task(task).unwrap();
        assert!(engine.wait_for_idle(WAIT));
        assert_eq!(engine.cache_size(), 0);
    }

    #[test]
    fn test_cache_expiry_through_engine_clock() {
        let clock = Arc::new(ManualClock::new());
        let config = EngineConfig::new()
            .with_worker_threads(1)
            .with_max_cache_size(2)
            .with_cache_expiration(Duration::from_secs(60));
        let engine = Engine::with_clock(config, clock.clone()).unwrap();

        engine.set_shared_data("old", 1u8);
        clock.advance(Duration::from_secs(120));
        engine.set_shared_data("a", 2u8);
        engine.set_shared_data("b", 3u8);

        assert!(engine.get_shared_data::<u8>("old").is_none());
        assert_eq!(engine.cache_size(), 2);
        assert_eq!(engine.cache_stats().expirations, 1);
    }

    #[test]
    fn test_progress_and_events() {
        let engine = engine(1);
        let events = engine.subscribe();
        let global = Arc::new(Mutex::new(Vec::new()));
        let sink = global.clone();
        engine.set_global_progress_callback(move |id, pct, _| sink.lock().push((id.to_string(), pct)));

        let partials = Arc::new(Mutex::new(Vec::new()));
        let partial_sink = partials.clone();
        let task: Task<u32, u32> = Task::new("stepper", 3, |n, _, progress: &Progress<u32>| {
            for i in 1..=n {
                progress.partial(i);
                progress.report_fraction(i as usize, n as usize, "step");
            }
            Ok(n)
        })
        .with_priority(TaskPriority::High)
        .on_partial_result(move |v| partial_sink.lock().push(v));
        engine.submit_task(task).unwrap();
        assert!(engine.wait_for_idle(WAIT));

        assert_eq!(*partials.lock(), vec![1, 2, 3]);
        assert_eq!(global.lock().last(), Some(&("stepper".to_string(), 100)));

        let seen: Vec<TaskEvent> = events.try_iter().collect();
        assert_eq!(
            seen.first(),
            Some(&TaskEvent::Queued {
                task_id: "stepper".to_string(),
                priority: TaskPriority::High
            })
        );
        assert!(matches!(seen[1], TaskEvent::Started { .. }));
        assert_eq!(seen.iter().filter(|e| matches!(e, TaskEvent::Progress { .. })).count(), 3);
        assert!(matches!(
            seen.last(),
            Some(TaskEvent::Finished {
                state: TaskState::Completed,
                ..
            })
        ));
    }

    #[test]
    fn test_generic_task() {
        let engine = engine(2);
        let (tx, rx) = unbounded();

        let tx_ok = tx.clone();
        engine
            .submit_generic_task(
                GenericTask::new("warmup", |_, progress| {
                    progress.report(100, "warm");
                    Ok(())
                }),
                Some(Box::new(move |ok: bool| {
                    let _ = tx_ok.send(("warmup", ok));
                })),
            )
            .unwrap();
        engine
            .submit_generic_task(
                GenericTask::new("flush", |_, _| Err(TaskError::execution("disk full"))),
                Some(Box::new(move |ok: bool| {
                    let _ = tx.send(("flush", ok));
                })),
            )
            .unwrap();

        assert!(engine.wait_for_idle(WAIT));
        let mut outcomes: Vec<(&str, bool)> = rx.try_iter().collect();
        outcomes.sort();
        assert_eq!(outcomes, vec![("flush", false), ("warmup", true)]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = Engine::new(EngineConfig::new().with_max_cache_size(0)).err().unwrap();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn test_auto_worker_count() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        assert_eq!(engine.worker_count(), num_cpus::get().max(1));
        assert!(engine.is_running());
    }
}

// Fri Oct 16 2026 - Alex

use crate::engine::task::{PartialResultCallback, ProgressCallback, TaskPriority, TaskState};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub type GlobalProgressCallback = Arc<dyn Fn(&str, u8, &str) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Queued {
        task_id: String,
        priority: TaskPriority,
    },
    Started {
        task_id: String,
    },
    Progress {
        task_id: String,
        percent: u8,
        message: String,
    },
    Finished {
        task_id: String,
        state: TaskState,
        execution_time: Duration,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::Queued { task_id, .. } => task_id,
            TaskEvent::Started { task_id } => task_id,
            TaskEvent::Progress { task_id, .. } => task_id,
            TaskEvent::Finished { task_id, .. } => task_id,
        }
    }
}

/// Fan-out of task lifecycle events to any number of subscribers.
///
/// Channels are unbounded so a slow consumer never stalls a worker. A
/// subscriber that dropped its receiver is pruned on the next publish.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<TaskEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<TaskEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: TaskEvent) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Reporter handed to a compute function.
///
/// Each report goes to the task's own progress callback, the engine-wide
/// callback, and the event bus, in that order, on the calling (worker)
/// thread.
pub struct Progress<Out> {
    task_id: Arc<str>,
    on_progress: Option<ProgressCallback>,
    on_partial: Option<PartialResultCallback<Out>>,
    global: Option<GlobalProgressCallback>,
    events: Option<Arc<EventBus>>,
    last_percent: AtomicU8,
}

impl<Out> Progress<Out> {
    pub(crate) fn new(
        task_id: &str,
        on_progress: Option<ProgressCallback>,
        on_partial: Option<PartialResultCallback<Out>>,
        global: Option<GlobalProgressCallback>,
        events: Option<Arc<EventBus>>,
    ) -> Self {
        Self {
            task_id: Arc::from(task_id),
            on_progress,
            on_partial,
            global,
            events,
            last_percent: AtomicU8::new(0),
        }
    }

    /// A reporter wired to nothing, for calling compute functions directly.
    pub fn detached(task_id: &str) -> Self {
        Self::new(task_id, None, None, None, None)
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Percent is clamped to 100.
    pub fn report(&self, percent: u8, message: &str) {
        let percent = percent.min(100);
        self.last_percent.store(percent, Ordering::Relaxed);

        if let Some(ref callback) = self.on_progress {
            callback(percent, message);
        }

        if let Some(ref callback) = self.global {
            callback(&self.task_id, percent, message);
        }

        if let Some(ref events) = self.events {
            events.publish(TaskEvent::Progress {
                task_id: self.task_id.to_string(),
                percent,
                message: message.to_string(),
            });
        }
    }

    pub fn report_fraction(&self, done: usize, total: usize, message: &str) {
        let percent = if total == 0 {
            100
        } else {
            ((done.min(total) * 100) / total) as u8
        };
        self.report(percent, message);
    }

    pub fn partial(&self, value: Out) {
        if let Some(ref callback) = self.on_partial {
            callback(value);
        }
    }

    pub fn has_partial_listener(&self) -> bool {
        self.on_partial.is_some()
    }

    pub fn last_percent(&self) -> u8 {
        self.last_percent.load(Ordering::Relaxed)
    }
}

// Fri Oct 16 2026 - Alex

use crate::engine::cancel::CancellationToken;
use crate::engine::task::{TaskPriority, TaskState, TaskStateCell};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct TaskHandle {
    pub token: CancellationToken,
    pub state: TaskStateCell,
    pub priority: TaskPriority,
}

/// Live tasks by id, from submission until they reach a terminal state.
///
/// Only cancel handles and state cells live here; the lock is never held
/// while user code runs.
#[derive(Debug, Default)]
pub struct ActiveTaskRegistry {
    tasks: Mutex<HashMap<String, TaskHandle>>,
}

impl ActiveTaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when a live task already uses `id`.
    pub fn register(&self, id: &str, handle: TaskHandle) -> bool {
        let mut tasks = self.tasks.lock();
        if tasks.contains_key(id) {
            return false;
        }
        tasks.insert(id.to_string(), handle);
        true
    }

    pub fn remove(&self, id: &str) -> Option<TaskHandle> {
        self.tasks.lock().remove(id)
    }

    /// Unknown ids are ignored. Returns whether a live task was signalled.
    pub fn cancel(&self, id: &str) -> bool {
        match self.tasks.lock().get(id) {
            Some(handle) => {
                handle.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) -> usize {
        let tasks = self.tasks.lock();
        for handle in tasks.values() {
            handle.token.cancel();
        }
        tasks.len()
    }

    pub fn state(&self, id: &str) -> Option<TaskState> {
        self.tasks.lock().get(id).map(|handle| handle.state.get())
    }

    pub fn priority(&self, id: &str) -> Option<TaskPriority> {
        self.tasks.lock().get(id).map(|handle| handle.priority)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.lock().contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.tasks.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.tasks.lock().clear();
    }
}

// Fri Oct 16 2026 - Alex

use crate::engine::task::TaskState;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    Success(T),
    Failed(String),
    Cancelled,
}

impl<T> TaskOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskOutcome::Cancelled)
    }

    pub fn terminal_state(&self) -> TaskState {
        match self {
            TaskOutcome::Success(_) => TaskState::Completed,
            TaskOutcome::Failed(_) => TaskState::Failed,
            TaskOutcome::Cancelled => TaskState::Cancelled,
        }
    }
}

/// Envelope handed to a task's completion callback.
#[derive(Debug, Clone)]
pub struct ComputeResult<T> {
    pub task_id: String,
    pub outcome: TaskOutcome<T>,
    pub execution_time: Duration,
}

impl<T> ComputeResult<T> {
    pub fn success(task_id: impl Into<String>, data: T, execution_time: Duration) -> Self {
        Self {
            task_id: task_id.into(),
            outcome: TaskOutcome::Success(data),
            execution_time,
        }
    }

    pub fn failure(task_id: impl Into<String>, message: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            task_id: task_id.into(),
            outcome: TaskOutcome::Failed(message.into()),
            execution_time,
        }
    }

    pub fn cancelled(task_id: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            task_id: task_id.into(),
            outcome: TaskOutcome::Cancelled,
            execution_time,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_failure()
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome.is_cancelled()
    }

    pub fn data(&self) -> Option<&T> {
        match &self.outcome {
            TaskOutcome::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self.outcome {
            TaskOutcome::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn state(&self) -> TaskState {
        self.outcome.terminal_state()
    }

    pub fn execution_time_ms(&self) -> f64 {
        self.execution_time.as_secs_f64() * 1000.0
    }
}

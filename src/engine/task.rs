// Fri Oct 16 2026 - Alex

use crate::cache::SharedResultCache;
use crate::engine::cancel::CancellationToken;
use crate::engine::progress::Progress;
use crate::engine::result::ComputeResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Body of a task. Consumes the input, may poll the token and report
/// progress, and returns the output or an error.
pub type ComputeFn<In, Out> =
    Box<dyn FnOnce(In, &CancellationToken, &Progress<Out>) -> Result<Out, TaskError> + Send>;

pub type ProgressCallback = Arc<dyn Fn(u8, &str) + Send + Sync>;
pub type PartialResultCallback<Out> = Arc<dyn Fn(Out) + Send + Sync>;
pub type CompletionCallback<Out> = Box<dyn FnOnce(ComputeResult<Out>) + Send>;

pub(crate) type CacheStore<Out> = Box<dyn FnOnce(&Out, &SharedResultCache) + Send>;

pub type GenericWork = Box<dyn FnOnce(&CancellationToken, &Progress<()>) -> Result<(), TaskError> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskPriority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl TaskPriority {
    pub fn name(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Normal
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Pending = 0,
    Running = 1,
    Completed = 2,
    Failed = 3,
    Cancelled = 4,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed | TaskState::Cancelled)
    }

    pub fn can_transition_to(&self, next: TaskState) -> bool {
        match (self, next) {
            (TaskState::Pending, TaskState::Running) => true,
            (TaskState::Pending, TaskState::Cancelled) => true,
            (TaskState::Running, TaskState::Completed) => true,
            (TaskState::Running, TaskState::Failed) => true,
            (TaskState::Running, TaskState::Cancelled) => true,
            _ => false,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Pending,
            1 => TaskState::Running,
            2 => TaskState::Completed,
            3 => TaskState::Failed,
            _ => TaskState::Cancelled,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Shared, lock-free view of a task's state. The worker writes it, the
/// registry hands out reads.
#[derive(Debug, Clone)]
pub struct TaskStateCell {
    state: Arc<AtomicU8>,
}

impl TaskStateCell {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(TaskState::Pending as u8)),
        }
    }

    pub fn get(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves to `next` if the state machine allows it. Backward or
    /// post-terminal transitions are rejected and leave the cell untouched.
    pub fn transition(&self, next: TaskState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if !TaskState::from_u8(current).can_transition_to(next) {
                return false;
            }
            match self.state.compare_exchange(current, next as u8, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for TaskStateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Task was cancelled")]
    Cancelled,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Execution error: {0}")]
    ExecutionError(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    pub fn execution<S: Into<String>>(msg: S) -> Self {
        TaskError::ExecutionError(msg.into())
    }
}

/// A unit of work submitted to the engine.
///
/// Built with [`Task::new`] and the `with_*` / `on_*` methods, then handed
/// to `Engine::submit_task`. The input is moved into the compute function
/// on the worker thread; the only other state shared with the submitter is
/// the cancellation token and the state cell.
pub struct Task<In, Out> {
    id: String,
    input: In,
    priority: TaskPriority,
    compute: ComputeFn<In, Out>,
    progress_callback: Option<ProgressCallback>,
    partial_result_callback: Option<PartialResultCallback<Out>>,
    completion_callback: Option<CompletionCallback<Out>>,
    cache_store: Option<(String, CacheStore<Out>)>,
    token: CancellationToken,
    state: TaskStateCell,
}

impl<In, Out> Task<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    pub fn new<S, F>(id: S, input: In, compute: F) -> Self
    where
        S: Into<String>,
        F: FnOnce(In, &CancellationToken, &Progress<Out>) -> Result<Out, TaskError> + Send + 'static,
    {
        Self {
            id: id.into(),
            input,
            priority: TaskPriority::Normal,
            compute: Box::new(compute),
            progress_callback: None,
            partial_result_callback: None,
            completion_callback: None,
            cache_store: None,
            token: CancellationToken::new(),
            state: TaskStateCell::new(),
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Replace the task's token, e.g. with a `child()` of a batch token so
    /// a whole group can be cancelled at once.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u8, &str) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn on_partial_result<F>(mut self, callback: F) -> Self
    where
        F: Fn(Out) + Send + Sync + 'static,
    {
        self.partial_result_callback = Some(Arc::new(callback));
        self
    }

    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(ComputeResult<Out>) + Send + 'static,
    {
        self.completion_callback = Some(Box::new(callback));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn state(&self) -> TaskState {
        self.state.get()
    }

    pub fn state_cell(&self) -> &TaskStateCell {
        &self.state
    }

    pub fn cache_key(&self) -> Option<&str> {
        self.cache_store.as_ref().map(|(key, _)| key.as_str())
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub(crate) fn into_parts(self) -> TaskParts<In, Out> {
        TaskParts {
            id: self.id,
            input: self.input,
            compute: self.compute,
            progress_callback: self.progress_callback,
            partial_result_callback: self.partial_result_callback,
            completion_callback: self.completion_callback,
            cache_store: self.cache_store,
            token: self.token,
            state: self.state,
        }
    }
}

impl<In, Out> Task<In, Out>
where
    In: Send + 'static,
    Out: Clone + Send + Sync + 'static,
{
    /// Store a clone of a successful output in the shared cache under `key`.
    pub fn with_cache_key<S: Into<String>>(mut self, key: S) -> Self {
        let key = key.into();
        let store_key = key.clone();
        let store: CacheStore<Out> = Box::new(move |output: &Out, cache: &SharedResultCache| {
            cache.set_shared_data(store_key, output.clone());
        });
        self.cache_store = Some((key, store));
        self
    }
}

impl<In, Out> fmt::Debug for Task<In, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("state", &self.state.get())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

pub(crate) struct TaskParts<In, Out> {
    pub id: String,
    pub input: In,
    pub compute: ComputeFn<In, Out>,
    pub progress_callback: Option<ProgressCallback>,
    pub partial_result_callback: Option<PartialResultCallback<Out>>,
    pub completion_callback: Option<CompletionCallback<Out>>,
    pub cache_store: Option<(String, CacheStore<Out>)>,
    pub token: CancellationToken,
    pub state: TaskStateCell,
}

/// Untyped work item for fire-and-forget jobs that only care whether they
/// succeeded.
pub struct GenericTask {
    id: String,
    priority: TaskPriority,
    work: GenericWork,
    token: CancellationToken,
    progress_callback: Option<ProgressCallback>,
}

impl GenericTask {
    pub fn new<S, F>(id: S, work: F) -> Self
    where
        S: Into<String>,
        F: FnOnce(&CancellationToken, &Progress<()>) -> Result<(), TaskError> + Send + 'static,
    {
        Self {
            id: id.into(),
            priority: TaskPriority::Normal,
            work: Box::new(work),
            token: CancellationToken::new(),
            progress_callback: None,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u8, &str) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Wrap into a typed task; `on_complete` receives `true` only on success.
    pub fn into_task(self, on_complete: Option<Box<dyn FnOnce(bool) + Send>>) -> Task<(), ()> {
        let work = self.work;
        let mut task = Task::new(self.id, (), move |_: (), token: &CancellationToken, progress: &Progress<()>| {
            work(token, progress)
        })
        .with_priority(self.priority)
        .with_token(self.token);

        task.progress_callback = self.progress_callback;

        if let Some(callback) = on_complete {
            task = task.on_complete(move |result: ComputeResult<()>| callback(result.is_success()));
        }

        task
    }
}

impl fmt::Debug for GenericTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericTask")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Critical > TaskPriority::High);
        assert!(TaskPriority::High > TaskPriority::Normal);
        assert!(TaskPriority::Normal > TaskPriority::Low);
        assert_eq!(TaskPriority::default(), TaskPriority::Normal);
    }

    #[test]
    fn test_state_machine_forward_only() {
        let cell = TaskStateCell::new();
        assert_eq!(cell.get(), TaskState::Pending);

        assert!(cell.transition(TaskState::Running));
        assert!(!cell.transition(TaskState::Pending));
        assert!(cell.transition(TaskState::Completed));

        assert!(!cell.transition(TaskState::Cancelled));
        assert!(!cell.transition(TaskState::Running));
        assert_eq!(cell.get(), TaskState::Completed);
    }

    #[test]
    fn test_pending_can_be_cancelled_directly() {
        let cell = TaskStateCell::new();
        assert!(cell.transition(TaskState::Cancelled));
        assert!(cell.get().is_terminal());
        assert!(!cell.transition(TaskState::Running));
    }

    #[test]
    fn test_pending_cannot_complete_without_running() {
        let cell = TaskStateCell::new();
        assert!(!cell.transition(TaskState::Completed));
        assert!(!cell.transition(TaskState::Failed));
        assert_eq!(cell.get(), TaskState::Pending);
    }

    #[test]
    fn test_task_builder() {
        let task: Task<u32, u32> = Task::new("double", 21, |x, _, _| Ok(x * 2))
            .with_priority(TaskPriority::High)
            .with_cache_key("double:21");

        assert_eq!(task.id(), "double");
        assert_eq!(task.priority(), TaskPriority::High);
        assert_eq!(task.cache_key(), Some("double:21"));
        assert_eq!(task.state(), TaskState::Pending);

        task.cancel();
        assert!(task.token().is_cancelled());
    }

    #[test]
    fn test_with_token_links_to_batch() {
        let batch = CancellationToken::new();
        let task: Task<(), ()> = Task::new("member", (), |_, _, _| Ok(())).with_token(batch.child());

        batch.cancel();
        assert!(task.token().is_cancelled());
    }

    #[test]
    fn test_task_error_messages() {
        assert_eq!(TaskError::Cancelled.to_string(), "Task was cancelled");
        assert_eq!(TaskError::execution("boom").to_string(), "Execution error: boom");

        let wrapped: TaskError = anyhow::anyhow!("disk on fire").into();
        assert_eq!(wrapped.to_string(), "disk on fire");
    }
}

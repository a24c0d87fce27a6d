// Fri Oct 16 2026 - Alex

use crate::engine::context::EngineContext;
use crate::engine::progress::{Progress, TaskEvent};
use crate::engine::result::{ComputeResult, TaskOutcome};
use crate::engine::task::{CompletionCallback, Task, TaskError, TaskParts, TaskPriority, TaskState};
use log::{debug, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Type-erased unit the scheduler queues and workers run.
pub trait Job: Send {
    fn id(&self) -> &str;

    fn priority(&self) -> TaskPriority;

    /// Execute on the current (worker) thread and deliver the completion
    /// callback. Must not unwind.
    fn run(self: Box<Self>, ctx: &EngineContext);

    /// Drop a job that will never run. Its completion callback is not called.
    fn discard(self: Box<Self>, ctx: &EngineContext);
}

pub(crate) struct TaskJob<In, Out> {
    parts: TaskParts<In, Out>,
    priority: TaskPriority,
}

impl<In, Out> TaskJob<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    pub fn new(task: Task<In, Out>) -> Self {
        let priority = task.priority();
        Self {
            parts: task.into_parts(),
            priority,
        }
    }
}

impl<In, Out> Job for TaskJob<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    fn id(&self) -> &str {
        &self.parts.id
    }

    fn priority(&self) -> TaskPriority {
        self.priority
    }

    fn run(self: Box<Self>, ctx: &EngineContext) {
        let TaskParts {
            id,
            input,
            compute,
            progress_callback,
            partial_result_callback,
            completion_callback,
            cache_store,
            token,
            state,
        } = self.parts;

        ctx.stats().record_started();

        if token.is_cancelled() {
            debug!("Task {} cancelled before start", id);
            state.transition(TaskState::Cancelled);
            ctx.stats().record_cancellation();
            deliver(ctx, &id, ComputeResult::cancelled(id.as_str(), Duration::ZERO), completion_callback);
            return;
        }

        state.transition(TaskState::Running);
        ctx.events().publish(TaskEvent::Started { task_id: id.clone() });
        debug!("Task {} started", id);

        let progress = Progress::new(
            &id,
            progress_callback,
            partial_result_callback,
            ctx.global_progress(),
            Some(ctx.events().clone()),
        );

        let start = Instant::now();
        let raw = panic::catch_unwind(AssertUnwindSafe(|| compute(input, &token, &progress)));
        let elapsed = start.elapsed();
        drop(progress);

        let outcome = match raw {
            Ok(Ok(output)) => TaskOutcome::Success(output),
            Ok(Err(TaskError::Cancelled)) => TaskOutcome::Cancelled,
            Ok(Err(e)) => {
                warn!("Task {} failed: {}", id, e);
                TaskOutcome::Failed(e.to_string())
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                warn!("Task {} panicked: {}", id, msg);
                TaskOutcome::Failed(format!("compute function panicked: {}", msg))
            }
        };

        // Last token check before the result leaves the worker.
        let outcome = if token.is_cancelled() {
            TaskOutcome::Cancelled
        } else {
            outcome
        };

        if let (TaskOutcome::Success(output), Some((key, store))) = (&outcome, cache_store) {
            if ctx.cache_results() {
                debug!("Caching result of {} under {}", id, key);
                store(output, &**ctx.cache());
            }
        }

        state.transition(outcome.terminal_state());
        match outcome {
            TaskOutcome::Success(_) => ctx.stats().record_completion(elapsed),
            TaskOutcome::Failed(_) => ctx.stats().record_failure(elapsed),
            TaskOutcome::Cancelled => ctx.stats().record_cancellation(),
        }

        let result = ComputeResult {
            task_id: id.clone(),
            outcome,
            execution_time: elapsed,
        };
        deliver(ctx, &id, result, completion_callback);
    }

    fn discard(self: Box<Self>, ctx: &EngineContext) {
        let TaskParts { id, state, .. } = self.parts;
        state.transition(TaskState::Cancelled);
        ctx.stats().record_discarded();
        ctx.registry().remove(&id);
        ctx.events().publish(TaskEvent::Finished {
            task_id: id.clone(),
            state: TaskState::Cancelled,
            execution_time: Duration::ZERO,
        });
        debug!("Task {} discarded without running", id);
    }
}

/// Unregisters the task, then hands the result to its callback with no
/// engine lock held.
fn deliver<Out>(
    ctx: &EngineContext,
    id: &str,
    result: ComputeResult<Out>,
    callback: Option<CompletionCallback<Out>>,
) {
    ctx.registry().remove(id);
    ctx.events().publish(TaskEvent::Finished {
        task_id: id.to_string(),
        state: result.state(),
        execution_time: result.execution_time,
    });

    if let Some(callback) = callback {
        if panic::catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
            warn!("Completion callback for {} panicked", id);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

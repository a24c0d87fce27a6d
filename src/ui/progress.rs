// Sat Oct 17 2026 - Alex

use crate::engine::{TaskEvent, TaskState};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const BAR_TEMPLATE: &str = "{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {prefix:.bold} {msg}";

#[derive(Debug, Clone, PartialEq)]
pub struct FinishedTask {
    pub task_id: String,
    pub state: TaskState,
    pub execution_time: Duration,
}

/// One progress bar per task, driven by engine events.
pub struct ProgressManager {
    multi: Arc<MultiProgress>,
    bars: Arc<Mutex<HashMap<String, ProgressBar>>>,
    enabled: bool,
}

impl ProgressManager {
    pub fn new() -> Self {
        Self {
            multi: Arc::new(MultiProgress::new()),
            bars: Arc::new(Mutex::new(HashMap::new())),
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        if !enabled {
            self.multi.set_draw_target(ProgressDrawTarget::hidden());
        }
        self
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░ ")
    }

    fn bar_for(&self, task_id: &str) -> ProgressBar {
        let mut bars = self.bars.lock();
        if let Some(pb) = bars.get(task_id) {
            return pb.clone();
        }

        let pb = if self.enabled {
            self.multi.add(ProgressBar::new(100))
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(Self::bar_style());
        pb.set_prefix(task_id.to_string());
        bars.insert(task_id.to_string(), pb.clone());
        pb
    }

    /// Update the bars for one event. Returns the summary of a finished task.
    pub fn apply(&self, event: &TaskEvent) -> Option<FinishedTask> {
        match event {
            TaskEvent::Queued { task_id, priority } => {
                self.bar_for(task_id).set_message(format!("queued ({})", priority));
                None
            }
            TaskEvent::Started { task_id } => {
                let pb = self.bar_for(task_id);
                pb.set_message("running");
                pb.enable_steady_tick(Duration::from_millis(100));
                None
            }
            TaskEvent::Progress {
                task_id,
                percent,
                message,
            } => {
                let pb = self.bar_for(task_id);
                pb.set_position(u64::from(*percent));
                pb.set_message(message.clone());
                None
            }
            TaskEvent::Finished {
                task_id,
                state,
                execution_time,
            } => {
                let pb = self.bar_for(task_id);
                if *state == TaskState::Completed {
                    pb.set_position(100);
                }
                pb.finish_with_message(state.to_string());

                Some(FinishedTask {
                    task_id: task_id.clone(),
                    state: *state,
                    execution_time: *execution_time,
                })
            }
        }
    }

    /// Consume events until `expected` tasks have finished or nothing
    /// arrives for `idle_timeout`.
    pub fn track(&self, events: Receiver<TaskEvent>, expected: usize, idle_timeout: Duration) -> Vec<FinishedTask> {
        let mut finished = Vec::with_capacity(expected);

        while finished.len() < expected {
            match events.recv_timeout(idle_timeout) {
                Ok(event) => {
                    if let Some(done) = self.apply(&event) {
                        finished.push(done);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!("No engine events for {:?}; {} of {} tasks reported", idle_timeout, finished.len(), expected);
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        finished
    }

    pub fn println(&self, message: &str) {
        if self.enabled {
            let _ = self.multi.println(message);
        } else {
            println!("{}", message);
        }
    }

    pub fn clear(&self) {
        let mut bars = self.bars.lock();
        for (_, pb) in bars.drain() {
            pb.finish_and_clear();
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.lock().len()
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ProgressManager {
    fn clone(&self) -> Self {
        Self {
            multi: self.multi.clone(),
            bars: self.bars.clone(),
            enabled: self.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TaskPriority;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_track_collects_finished_tasks() {
        let manager = ProgressManager::new().with_enabled(false);
        let (tx, rx) = unbounded();

        tx.send(TaskEvent::Queued {
            task_id: "a".into(),
            priority: TaskPriority::High,
        })
        .unwrap();
        tx.send(TaskEvent::Started { task_id: "a".into() }).unwrap();
        tx.send(TaskEvent::Progress {
            task_id: "a".into(),
            percent: 60,
            message: "working".into(),
        })
        .unwrap();
        tx.send(TaskEvent::Finished {
            task_id: "a".into(),
            state: TaskState::Failed,
            execution_time: Duration::from_millis(3),
        })
        .unwrap();

        let finished = manager.track(rx, 1, Duration::from_secs(1));
        assert_eq!(
            finished,
            vec![FinishedTask {
                task_id: "a".into(),
                state: TaskState::Failed,
                execution_time: Duration::from_millis(3),
            }]
        );
        assert_eq!(manager.bar_count(), 1);
    }

    #[test]
    fn test_track_stops_when_idle() {
        let manager = ProgressManager::new().with_enabled(false);
        let (_tx, rx) = unbounded();
        assert!(manager.track(rx, 3, Duration::from_millis(20)).is_empty());
    }
}

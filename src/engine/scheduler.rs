// Fri Oct 16 2026 - Alex

use crate::engine::job::Job;
use crate::engine::task::TaskPriority;
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Task queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error("Scheduler is closed")]
    Closed,
}

pub struct PrioritizedTask {
    pub job: Box<dyn Job>,
    pub priority: TaskPriority,
    pub sequence: u64,
}

impl PartialEq for PrioritizedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for PrioritizedTask {}

impl PartialOrd for PrioritizedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PrioritizedTask {
    // Max-heap: higher priority first, then lower sequence (FIFO).
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct QueueState {
    heap: BinaryHeap<PrioritizedTask>,
    outstanding: usize,
    paused: bool,
    closed: bool,
    next_sequence: u64,
}

/// Bounded priority queue shared by the engine and its workers.
///
/// `outstanding` counts jobs that are queued or being run; it drops only
/// when a worker calls [`finish`](Self::finish), which is what
/// [`wait_for_idle`](Self::wait_for_idle) waits on.
pub struct PriorityScheduler {
    state: Mutex<QueueState>,
    available: Condvar,
    idle: Condvar,
    max_queue_size: usize,
}

impl PriorityScheduler {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                outstanding: 0,
                paused: false,
                closed: false,
                next_sequence: 0,
            }),
            available: Condvar::new(),
            idle: Condvar::new(),
            max_queue_size,
        }
    }

    /// Queue a job. `on_accept` runs under the queue lock once the job is
    /// admitted, so a worker can never observe the job before it.
    pub fn try_push<F>(&self, job: Box<dyn Job>, on_accept: F) -> Result<(), (SchedulerError, Box<dyn Job>)>
    where
        F: FnOnce(),
    {
        let mut state = self.state.lock();
        if state.closed {
            return Err((SchedulerError::Closed, job));
        }
        if state.outstanding >= self.max_queue_size {
            return Err((
                SchedulerError::QueueFull {
                    capacity: self.max_queue_size,
                },
                job,
            ));
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.outstanding += 1;
        let priority = job.priority();
        state.heap.push(PrioritizedTask { job, priority, sequence });
        on_accept();
        drop(state);

        self.available.notify_one();
        Ok(())
    }

    /// Block until a job is available and the queue is not paused.
    /// Returns `None` once the scheduler is closed.
    pub fn pop_blocking(&self) -> Option<Box<dyn Job>> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if !state.paused {
                if let Some(next) = state.heap.pop() {
                    return Some(next.job);
                }
            }
            self.available.wait(&mut state);
        }
    }

    /// Mark one popped job as done.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        if state.outstanding == 0 {
            self.idle.notify_all();
        }
    }

    pub fn pause(&self) {
        self.state.lock().paused = true;
    }

    pub fn resume(&self) {
        self.state.lock().paused = false;
        self.available.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Stop handing out jobs and return whatever was still queued.
    pub fn close(&self) -> Vec<Box<dyn Job>> {
        let mut state = self.state.lock();
        state.closed = true;
        let drained: Vec<Box<dyn Job>> = state.heap.drain().map(|pt| pt.job).collect();
        state.outstanding = state.outstanding.saturating_sub(drained.len());
        if state.outstanding == 0 {
            self.idle.notify_all();
        }
        drop(state);

        self.available.notify_all();
        drained
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Wait until nothing is queued or running. Returns `false` on timeout.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.outstanding > 0 {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return state.outstanding == 0;
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn running(&self) -> usize {
        let state = self.state.lock();
        state.outstanding - state.heap.len()
    }

    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    pub fn capacity(&self) -> usize {
        self.max_queue_size
    }
}

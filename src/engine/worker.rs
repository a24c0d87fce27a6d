// Fri Oct 16 2026 - Alex

use crate::engine::context::EngineContext;
use crate::engine::scheduler::PriorityScheduler;
use log::{debug, warn};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct Worker {
    id: usize,
    thread_handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(id: usize, scheduler: Arc<PriorityScheduler>, context: Arc<EngineContext>) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("compute-worker-{}", id))
            .spawn(move || Worker::worker_loop(id, scheduler, context))?;

        Ok(Self {
            id,
            thread_handle: Some(handle),
        })
    }

    fn worker_loop(id: usize, scheduler: Arc<PriorityScheduler>, context: Arc<EngineContext>) {
        debug!("Worker {} started", id);

        while let Some(job) = scheduler.pop_blocking() {
            debug!("Worker {} picked up {} ({})", id, job.id(), job.priority());
            job.run(&context);
            scheduler.finish();
        }

        debug!("Worker {} stopped", id);
    }

    /// Join the thread unless it is the calling thread, which happens when
    /// a completion callback shuts the engine down.
    pub fn stop(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.thread().id() == thread::current().id() {
                debug!("Worker {} is shutting down its own engine; not joining", self.id);
                return;
            }
            if handle.join().is_err() {
                warn!("Worker {} exited abnormally", self.id);
            }
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct WorkerPool {
    workers: Vec<Worker>,
}

impl WorkerPool {
    /// Start `size` workers pulling from `scheduler`. If any thread fails to
    /// spawn, the ones already started are stopped with the scheduler.
    pub fn start(size: usize, scheduler: Arc<PriorityScheduler>, context: Arc<EngineContext>) -> io::Result<Self> {
        let mut workers = Vec::with_capacity(size);

        for i in 0..size {
            match Worker::spawn(i, scheduler.clone(), context.clone()) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    scheduler.close();
                    for worker in &mut workers {
                        worker.stop();
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self { workers })
    }

    /// Callers close the scheduler first so blocked workers wake up.
    pub fn stop(&mut self) {
        for worker in &mut self.workers {
            worker.stop();
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn active_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_running()).count()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

// Fri Oct 16 2026 - Alex

pub mod cancel;
pub mod context;
pub mod core;
pub mod job;
pub mod progress;
pub mod registry;
pub mod result;
pub mod scheduler;
pub mod stats;
pub mod task;
pub mod worker;

pub use self::core::{Engine, EngineError};
pub use cancel::CancellationToken;
pub use progress::{EventBus, GlobalProgressCallback, Progress, TaskEvent};
pub use result::{ComputeResult, TaskOutcome};
pub use scheduler::PriorityScheduler;
pub use stats::{StatisticsCollector, TaskStatistics};
pub use task::{GenericTask, Task, TaskError, TaskPriority, TaskState};
pub use worker::{Worker, WorkerPool};

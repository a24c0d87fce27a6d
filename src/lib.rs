// Sat Oct 17 2026 - Alex

pub mod cache;
pub mod config;
pub mod engine;
pub mod ui;
pub mod utils;
pub mod workloads;

pub use cache::{CacheStats, SharedComputeData, SharedResultCache};
pub use config::{ConfigError, EngineConfig};
pub use engine::{
    CancellationToken, ComputeResult, Engine, EngineError, GenericTask, Progress, Task, TaskError, TaskPriority,
    TaskState,
};

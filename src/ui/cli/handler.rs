// Sat Oct 17 2026 - Alex

use super::args::{Args, Command, ConfigArgs, RunArgs};
use crate::config::EngineConfig;
use crate::engine::{ComputeResult, Engine, TaskPriority, TaskState};
use crate::ui::progress::{FinishedTask, ProgressManager};
use crate::utils::logging::{LoggingUtils, ScopedTimer};
use crate::utils::{format_bytes, format_duration};
use crate::workloads::{self, BoundingBox, MeshSummary};
use anyhow::Context;
use colored::Colorize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const BBOX_TASK: &str = "bounding-box";
const MESH_TASK: &str = "chunked-mesh";
const EMPTY_TASK: &str = "empty-cloud";
const SLOW_TASK: &str = "slow-scan";

pub struct CommandHandler {
    quiet: bool,
}

impl CommandHandler {
    pub fn new() -> Self {
        Self { quiet: false }
    }

    pub fn execute(&mut self, args: Args) -> anyhow::Result<()> {
        self.quiet = args.quiet;
        if args.no_color {
            colored::control::set_override(false);
        }

        self.setup_logging(&args)?;

        match args.command {
            Command::Run(run_args) => self.handle_run(run_args),
            Command::Config(config_args) => self.handle_config(config_args),
        }
    }

    fn setup_logging(&self, args: &Args) -> anyhow::Result<()> {
        let level = if self.quiet {
            log::LevelFilter::Error
        } else {
            LoggingUtils::level_from_str(&args.log_level)
        };

        LoggingUtils::init_logger(level).context("logger already initialised")?;
        Ok(())
    }

    fn load_config(&self, args: &RunArgs) -> anyhow::Result<EngineConfig> {
        let mut config = match &args.config {
            Some(path) => EngineConfig::load(path).with_context(|| format!("loading {:?}", path))?,
            None => EngineConfig::default(),
        };

        if let Some(threads) = args.threads {
            config = config.with_worker_threads(threads);
        }
        if let Some(size) = args.max_queue_size {
            config = config.with_max_queue_size(size);
        }
        if args.no_cache {
            config = config.with_result_cache(false);
        }

        config.validate()?;
        Ok(config)
    }

    fn handle_run(&self, args: RunArgs) -> anyhow::Result<()> {
        args.validate().map_err(|e| anyhow::anyhow!(e))?;
        let _timer = ScopedTimer::new("demo run");

        let config = self.load_config(&args)?;
        let cache_enabled = config.enable_result_cache;
        let engine = Arc::new(Engine::new(config)?);

        self.status(&format!(
            "Engine up with {} workers, {} points, {} mesh chunks",
            engine.worker_count(),
            args.points,
            args.chunks
        ));

        let progress = ProgressManager::new().with_enabled(!self.quiet);
        let events = engine.subscribe();
        let tracker = {
            let progress = progress.clone();
            let idle = Duration::from_secs(args.timeout_secs);
            thread::Builder::new()
                .name("progress".to_string())
                .spawn(move || progress.track(events, 4, idle))?
        };

        let points = workloads::generate_point_cloud(args.points, args.seed);
        let bbox_key = format!("bbox:{}:{}", args.seed, args.points);

        let bbox = workloads::bounding_box_task(BBOX_TASK, points.clone())
            .with_priority(TaskPriority::High)
            .with_cache_key(bbox_key.clone())
            .on_complete(|result: ComputeResult<BoundingBox>| {
                if let Some(bounds) = result.data() {
                    log::info!("Bounding box volume {:.4}", bounds.volume());
                }
            });

        let mesh_progress = progress.clone();
        let mesh = workloads::mesh_task(MESH_TASK, points, args.chunks)
            .on_partial_result(move |partial: MeshSummary| {
                log::debug!("Mesh partial: {} chunks, {} triangles", partial.chunks_done, partial.triangles);
                if partial.chunks_done == 1 {
                    mesh_progress.println(&format!("{} first mesh chunk ready", "[~]".blue()));
                }
            });

        let empty = workloads::bounding_box_task(EMPTY_TASK, Arc::from(Vec::new())).with_priority(TaskPriority::Low);

        let slow = workloads::slow_task(SLOW_TASK, 1000, Duration::from_millis(10)).with_priority(TaskPriority::Low);

        engine.submit_task(bbox)?;
        engine.submit_task(mesh)?;
        engine.submit_task(empty)?;
        engine.submit_task(slow)?;

        thread::sleep(Duration::from_millis(args.cancel_after_ms));
        if engine.cancel_task(SLOW_TASK) {
            log::info!("Cancelled {}", SLOW_TASK);
        }

        if !engine.wait_for_idle(Duration::from_secs(args.timeout_secs)) {
            log::warn!("Timed out waiting for tasks; cancelling the rest");
            engine.cancel_all_tasks();
        }

        let finished = tracker
            .join()
            .map_err(|_| anyhow::anyhow!("progress thread panicked"))?;
        progress.clear();

        self.print_summary(&engine, &finished, &bbox_key, cache_enabled, args.json)?;
        engine.shutdown();
        Ok(())
    }

    fn print_summary(
        &self,
        engine: &Engine,
        finished: &[FinishedTask],
        bbox_key: &str,
        cache_enabled: bool,
        json: bool,
    ) -> anyhow::Result<()> {
        let stats = engine.statistics();

        if json {
            let report = serde_json::json!({
                "statistics": stats,
                "cache": engine.cache_stats(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        if self.quiet {
            return Ok(());
        }

        println!();
        println!("{}", "Tasks".cyan().bold());
        for task in finished {
            let state = match task.state {
                TaskState::Completed => "completed".green(),
                TaskState::Failed => "failed".red(),
                TaskState::Cancelled => "cancelled".yellow(),
                other => other.to_string().as_str().normal(),
            };
            println!("  {:<14} {:<10} {}", task.task_id, state, format_duration(task.execution_time));
        }

        println!();
        println!("{}", "Statistics".cyan().bold());
        println!("  completed: {}", stats.completed_tasks);
        println!("  failed:    {}", stats.failed_tasks);
        println!("  cancelled: {}", stats.cancelled_tasks);
        println!("  avg time:  {:.2}ms", stats.avg_execution_time_ms);
        println!("  success:   {:.0}%", stats.success_rate() * 100.0);

        println!();
        println!("{}", "Cache".cyan().bold());
        println!(
            "  {} entries, {}",
            engine.cache_size(),
            format_bytes(engine.cache_memory_usage() as u64)
        );
        match engine.get_shared_data::<BoundingBox>(bbox_key) {
            Some(bounds) => {
                let e = bounds.extent();
                println!("  {} -> extent {:.3} x {:.3} x {:.3}", bbox_key, e.x, e.y, e.z);
            }
            None if cache_enabled => println!("  {} {}", bbox_key, "missing".yellow()),
            None => println!("  result caching disabled"),
        }

        Ok(())
    }

    fn handle_config(&self, args: ConfigArgs) -> anyhow::Result<()> {
        let config = match &args.input {
            Some(path) => EngineConfig::load(path).with_context(|| format!("loading {:?}", path))?,
            None => EngineConfig::default(),
        };

        match &args.output {
            Some(path) => {
                config.save(path).with_context(|| format!("writing {:?}", path))?;
                self.status(&format!("Configuration written to {}", path.display()));
            }
            None => println!("{}", serde_json::to_string_pretty(&config)?),
        }

        Ok(())
    }

    fn status(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", "[*]".blue(), message);
        }
    }
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

// Sat Oct 17 2026 - Alex

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "compute-engine")]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "Prioritised, cancellable compute engine with a shared result cache", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the demo geometry workloads through the engine.
    Run(RunArgs),
    /// Print or write an engine configuration file.
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// JSON engine configuration; command line flags override it.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Worker threads (0 = one per CPU).
    #[arg(short, long)]
    pub threads: Option<usize>,

    #[arg(long)]
    pub max_queue_size: Option<usize>,

    #[arg(long)]
    pub no_cache: bool,

    #[arg(long, default_value = "200000")]
    pub points: usize,

    #[arg(long, default_value = "42")]
    pub seed: u64,

    #[arg(long, default_value = "8")]
    pub chunks: usize,

    /// Cancel the slow job after this many milliseconds.
    #[arg(long, default_value = "250")]
    pub cancel_after_ms: u64,

    #[arg(long, default_value = "60")]
    pub timeout_secs: u64,

    /// Print final statistics as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.points == 0 {
            return Err("--points must be greater than 0".to_string());
        }
        if self.chunks == 0 {
            return Err("--chunks must be greater than 0".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("--timeout-secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Write the configuration here instead of printing it.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Start from an existing file instead of the defaults.
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let args = Args::parse_from(["compute-engine", "run", "--threads", "2"]);
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.threads, Some(2));
                assert_eq!(run.points, 200_000);
                assert!(!run.no_cache);
                assert!(run.validate().is_ok());
            }
            Command::Config(_) => panic!("expected run"),
        }
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["compute-engine", "config", "--quiet", "--log-level", "debug"]);
        assert!(args.quiet);
        assert_eq!(args.log_level, "debug");
        assert!(matches!(args.command, Command::Config(_)));
    }
}

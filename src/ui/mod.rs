// Sat Oct 17 2026 - Alex

pub mod cli;
pub mod progress;

pub use cli::{Args, Command, CommandHandler};
pub use progress::{FinishedTask, ProgressManager};

pub fn print_error(message: &str) {
    use colored::Colorize;
    eprintln!("{} {}", "[ERROR]".red(), message);
}

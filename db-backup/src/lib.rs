//! Database backup runner
//!
//! Runs the configured backup tool, compresses the result and applies the
//! short-term and long-term retention policy to the backup directory.

pub mod config;
pub mod daemon;
pub mod executor;
pub mod fs;
pub mod notify;
pub mod runner;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use runner::{run, RunOptions, RunOutcome};
pub use utils::errors::RunnerError;
pub type Result<T> = std::result::Result<T, RunnerError>;

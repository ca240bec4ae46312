//! Custom error types for the backup runner.

use backup_retention::RetentionError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Retention error: {0}")]
    Retention(#[from] RetentionError),

    #[error("Lock {} is held by pid {pid} on {host}", path.display())]
    LockHeld {
        path: PathBuf,
        pid: u32,
        host: String,
    },

    #[error("Backup command failed: {0}")]
    Backup(String),

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Run cancelled by signal")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, RunnerError>;

//! Error types for the retention engine.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetentionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to scan {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to delete {id} ({}): {source}", path.display())]
    Delete {
        id: String,
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, RetentionError>;

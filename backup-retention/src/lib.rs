//! Backup Retention Library
//!
//! Decides which timestamped database backups to keep. Three policies
//! compete: an age window for short-term copies, a cap on the total number
//! of copies, and a fixed number of monthly long-term snapshots.
//!
//! A run goes scanner → dedup → classifier → planner → executor, see
//! [`RetentionEngine::run`].

pub mod classifier;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod item;
pub mod planner;
pub mod policy;
pub mod scanner;

// Re-export commonly used types
pub use engine::{RetentionEngine, RetentionReport};
pub use error::RetentionError;
pub use events::{EventSink, RetentionEvent};
pub use executor::{ArtifactRemover, FsRemover, PassReport};
pub use item::{BackupId, BackupItem, BackupKind, BackupSet, Compression};
pub use planner::{Decision, DeleteReason, ItemState, KeepReason, Tier};
pub use policy::RetentionPolicy;
pub type Result<T> = std::result::Result<T, RetentionError>;

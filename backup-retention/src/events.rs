//! Structured events emitted while the engine runs.
//!
//! Per-item outcomes are reported only through an [`EventSink`] (the runner
//! forwards them to `tracing`); the engine itself logs run-level summaries.

use crate::item::BackupId;
use crate::planner::{Decision, Tier};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum RetentionEvent {
    /// A same-period long-term candidate lost its flag
    Demoted { id: BackupId, period: String },

    /// An entry lost its id to an earlier entry and is left untouched
    Shadowed { id: BackupId, path: PathBuf },

    /// An item was evaluated by a pass
    Considered {
        tier: Tier,
        id: BackupId,
        decision: Decision,
    },

    Deleted {
        tier: Tier,
        id: BackupId,
        path: PathBuf,
    },

    /// Dry run: the item would have been deleted
    WouldDelete {
        tier: Tier,
        id: BackupId,
        path: PathBuf,
    },

    DeletionFailed {
        tier: Tier,
        id: BackupId,
        path: PathBuf,
        error: String,
    },

    PassFinished {
        tier: Tier,
        deleted: usize,
        kept: usize,
        success: bool,
    },
}

pub trait EventSink {
    fn emit(&mut self, event: RetentionEvent);
}

/// Records events in order; handy for audits and tests.
impl EventSink for Vec<RetentionEvent> {
    fn emit(&mut self, event: RetentionEvent) {
        self.push(event);
    }
}

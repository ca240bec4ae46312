//! Pass execution: physical removal of planned deletions.
//!
//! A pass deletes oldest first and stops at the first failure. Deletions
//! already performed are not rolled back; the remaining requests are left
//! untouched in `DeleteRequested`.

use crate::error::RetentionError;
use crate::events::{EventSink, RetentionEvent};
use crate::item::BackupKind;
use crate::planner::{Decision, ItemState, PassPlan, PlannedItem, Tier};
use std::fs;

/// Removes one backup artifact.
pub trait ArtifactRemover {
    fn remove(&mut self, item: &PlannedItem) -> std::io::Result<()>;
}

/// Filesystem remover: `remove_file` for archives, `remove_dir_all` for
/// directories.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsRemover;

impl ArtifactRemover for FsRemover {
    fn remove(&mut self, item: &PlannedItem) -> std::io::Result<()> {
        match item.kind {
            BackupKind::Archive(_) => fs::remove_file(&item.path),
            BackupKind::Directory => fs::remove_dir_all(&item.path),
        }
    }
}

/// Outcome of one pass.
#[derive(Debug)]
pub struct PassReport {
    pub tier: Tier,
    pub items: Vec<PlannedItem>,
    /// First removal failure; the pass stopped there
    pub failure: Option<RetentionError>,
    pub dry_run: bool,
}

impl PassReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    fn ids_in<F>(&self, pred: F) -> Vec<String>
    where
        F: Fn(&ItemState) -> bool,
    {
        self.items
            .iter()
            .filter(|i| pred(&i.state))
            .map(|i| i.id.to_string())
            .collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.ids_in(|s| matches!(s, ItemState::Deleted(_)))
    }

    pub fn kept(&self) -> Vec<String> {
        self.ids_in(|s| matches!(s, ItemState::Kept(_)))
    }

    /// Deletions that were requested but never attempted (dry run, or after a
    /// failure).
    pub fn not_attempted(&self) -> Vec<String> {
        self.ids_in(ItemState::is_delete_requested)
    }
}

/// Execute a planned pass.
pub fn execute_pass(
    plan: PassPlan,
    remover: &mut dyn ArtifactRemover,
    sink: &mut dyn EventSink,
    dry_run: bool,
) -> PassReport {
    let PassPlan { tier, mut items } = plan;

    for item in &items {
        let decision = match item.state {
            ItemState::Kept(reason) => Decision::Keep(reason),
            ItemState::DeleteRequested(reason) => Decision::Delete(reason),
            _ => continue,
        };
        sink.emit(RetentionEvent::Considered {
            tier,
            id: item.id.clone(),
            decision,
        });
    }

    let mut failure = None;

    for item in items.iter_mut().filter(|i| i.state.is_delete_requested()) {
        if dry_run {
            sink.emit(RetentionEvent::WouldDelete {
                tier,
                id: item.id.clone(),
                path: item.path.clone(),
            });
            continue;
        }

        match remover.remove(item) {
            Ok(()) => {
                item.state.finish_delete(true);
                sink.emit(RetentionEvent::Deleted {
                    tier,
                    id: item.id.clone(),
                    path: item.path.clone(),
                });
            }
            Err(e) => {
                item.state.finish_delete(false);
                sink.emit(RetentionEvent::DeletionFailed {
                    tier,
                    id: item.id.clone(),
                    path: item.path.clone(),
                    error: e.to_string(),
                });
                failure = Some(RetentionError::Delete {
                    id: item.id.to_string(),
                    path: item.path.clone(),
                    source: e,
                });
                break;
            }
        }
    }

    let report = PassReport {
        tier,
        items,
        failure,
        dry_run,
    };

    sink.emit(RetentionEvent::PassFinished {
        tier,
        deleted: report.deleted().len(),
        kept: report.kept().len(),
        success: report.is_success(),
    });

    report
}

//! One retention run: scan, deduplicate, classify, plan, execute.

use crate::classifier::classify;
use crate::dedup::dedup_long_term;
use crate::error::Result;
use crate::events::{EventSink, RetentionEvent};
use crate::executor::{execute_pass, ArtifactRemover, PassReport};
use crate::item::{BackupId, BackupSet};
use crate::planner::{plan_long_term, plan_short_term};
use crate::policy::RetentionPolicy;
use crate::scanner::{scan_backups, Scan};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of both passes.
#[derive(Debug)]
pub struct RetentionReport {
    pub short_term: PassReport,
    pub long_term: PassReport,
    /// Entries hidden behind another entry with the same id; never rotated
    pub shadowed: Vec<PathBuf>,
}

impl RetentionReport {
    /// Success iff neither pass hit a removal failure.
    pub fn is_success(&self) -> bool {
        self.short_term.is_success() && self.long_term.is_success()
    }

    pub fn deleted(&self) -> Vec<String> {
        let mut deleted = self.short_term.deleted();
        deleted.extend(self.long_term.deleted());
        deleted
    }

    pub fn failures(&self) -> impl Iterator<Item = &crate::RetentionError> {
        self.short_term
            .failure
            .iter()
            .chain(self.long_term.failure.iter())
    }
}

/// Retention engine bound to a validated policy.
///
/// The engine holds no state between runs; every run re-scans storage.
#[derive(Debug, Clone)]
pub struct RetentionEngine {
    policy: RetentionPolicy,
    anchor_day: u32,
}

impl RetentionEngine {
    /// Validate `policy` and build an engine. Fails before any I/O on an
    /// invalid policy.
    pub fn new(policy: RetentionPolicy) -> Result<Self> {
        policy.validate()?;
        let anchor_day = policy.anchor_day()?;
        Ok(Self { policy, anchor_day })
    }

    /// Scan `root` and compute every item's flags, without deleting anything.
    pub fn classify(
        &self,
        root: &Path,
        current: Option<&BackupId>,
        sink: &mut dyn EventSink,
    ) -> Result<BackupSet> {
        Ok(self.prepare(root, current, sink)?.items)
    }

    fn prepare(
        &self,
        root: &Path,
        current: Option<&BackupId>,
        sink: &mut dyn EventSink,
    ) -> Result<Scan> {
        let mut scan = scan_backups(root, self.anchor_day)?;

        for (id, path) in &scan.shadowed {
            sink.emit(RetentionEvent::Shadowed {
                id: id.clone(),
                path: path.clone(),
            });
        }

        for (id, period) in dedup_long_term(&mut scan.items) {
            sink.emit(RetentionEvent::Demoted { id, period });
        }

        classify(&mut scan.items, &self.policy, current);
        Ok(scan)
    }

    /// Run both passes against `root`.
    ///
    /// Only a scan failure returns `Err`. Removal failures abort the pass
    /// they occur in and are reported through [`RetentionReport`]; the
    /// long-term pass runs even when the short-term pass failed.
    pub fn run(
        &self,
        root: &Path,
        current: Option<&BackupId>,
        now: DateTime<Local>,
        remover: &mut dyn ArtifactRemover,
        sink: &mut dyn EventSink,
    ) -> Result<RetentionReport> {
        let Scan { items: set, shadowed } = self.prepare(root, current, sink)?;

        info!(
            root = %root.display(),
            items = set.len(),
            long_term = set.values().filter(|i| i.is_long_term()).count(),
            dry_run = self.policy.dry_run,
            "Applying retention"
        );

        let short_plan = plan_short_term(&set, &self.policy, now);
        let long_plan = plan_long_term(&set, &self.policy);

        let short_term = execute_pass(short_plan, remover, sink, self.policy.dry_run);
        if !short_term.is_success() {
            warn!("Short-term pass failed, continuing with long-term pass");
        }
        let long_term = execute_pass(long_plan, remover, sink, self.policy.dry_run);

        Ok(RetentionReport {
            short_term,
            long_term,
            shadowed: shadowed.into_iter().map(|(_, path)| path).collect(),
        })
    }
}

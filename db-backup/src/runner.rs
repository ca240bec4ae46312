//! One complete run: jitter, lock, backup, retention.

use crate::config::Config;
use crate::daemon::jitter::wait_start_delay;
use crate::daemon::lock::{local_hostname, RunLock};
use crate::executor::{BackupExecutor, BackupJob, BackupResult};
use crate::notify::{RunState, RunStatus};
use crate::utils::logger::TracingSink;
use crate::utils::{Result, RunnerError};
use backup_retention::{BackupId, FsRemover, RetentionEngine, RetentionReport};
use chrono::{Local, Utc};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Command-line switches affecting a run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Skip the backup step and only apply retention
    pub prune_only: bool,
    /// Report deletions without performing them
    pub dry_run: bool,
    /// Skip the randomized start delay
    pub no_delay: bool,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub backup: Option<BackupResult>,
    pub retention: Option<RetentionReport>,
    pub error: Option<RunnerError>,
    pub duration: Duration,
}

impl RunOutcome {
    fn new(run_id: String) -> Self {
        Self {
            run_id,
            backup: None,
            retention: None,
            error: None,
            duration: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.retention.as_ref().map_or(true, RetentionReport::is_success)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.retention
            .as_ref()
            .map(RetentionReport::deleted)
            .unwrap_or_default()
    }

    pub fn message(&self) -> String {
        if let Some(e) = &self.error {
            return e.to_string();
        }

        if let Some(report) = &self.retention {
            let failures: Vec<String> = report.failures().map(|e| e.to_string()).collect();
            if !failures.is_empty() {
                return format!("retention failed: {}", failures.join("; "));
            }
        }

        let deleted = self.deleted().len();
        match &self.backup {
            Some(backup) => format!(
                "backup {} complete ({} bytes), {} deleted",
                backup.id, backup.bytes, deleted
            ),
            None => format!("prune complete, {} deleted", deleted),
        }
    }

    /// Build the notification payload for this run
    pub fn status(&self) -> RunStatus {
        RunStatus {
            run_id: self.run_id.clone(),
            host: local_hostname(),
            backup_id: self.backup.as_ref().map(|b| b.id.to_string()),
            status: if self.is_success() {
                RunState::Success
            } else {
                RunState::Failure
            },
            message: self.message(),
            backup_bytes: self.backup.as_ref().map(|b| b.bytes),
            deleted: self.deleted(),
            duration_secs: self.duration.as_secs(),
            finished_at: Utc::now(),
        }
    }
}

/// Execute one run. Never returns an error; failures are carried in the
/// outcome so they can still be reported.
pub async fn run(config: &Config, options: RunOptions, cancel: CancellationToken) -> RunOutcome {
    let started = Instant::now();
    let mut outcome = RunOutcome::new(Uuid::new_v4().to_string());

    info!(
        run_id = %outcome.run_id,
        root = %config.storage.root.display(),
        prune_only = options.prune_only,
        dry_run = options.dry_run,
        "Starting run"
    );

    if let Err(e) = execute(config, options, &cancel, &mut outcome).await {
        error!(run_id = %outcome.run_id, error = %e, "Run failed");
        outcome.error = Some(e);
    }

    outcome.duration = started.elapsed();

    if outcome.is_success() {
        info!(
            run_id = %outcome.run_id,
            duration_secs = outcome.duration.as_secs(),
            deleted = outcome.deleted().len(),
            "Run complete"
        );
    } else if outcome.error.is_none() {
        warn!(run_id = %outcome.run_id, "Run finished with retention failures");
    }

    outcome
}

async fn execute(
    config: &Config,
    options: RunOptions,
    cancel: &CancellationToken,
    outcome: &mut RunOutcome,
) -> Result<()> {
    if !options.no_delay && !wait_start_delay(config.schedule.max_start_delay_secs, cancel).await {
        return Err(RunnerError::Cancelled);
    }

    let _lock = RunLock::acquire(
        &config.lock.path,
        Duration::from_secs(config.lock.stale_after_secs),
        &outcome.run_id,
    )?;

    let current = if options.prune_only {
        info!(run_id = %outcome.run_id, "Prune-only run, skipping backup");
        None
    } else {
        let id = BackupId::from_datetime(Local::now().naive_local());
        let job = BackupJob::from_config(id.clone(), &config.storage.root, &config.backup);
        let result = BackupExecutor::new(cancel.clone()).execute(&job).await?;
        outcome.backup = Some(result);
        Some(id)
    };

    if cancel.is_cancelled() {
        return Err(RunnerError::Cancelled);
    }

    let mut policy = config.retention.clone();
    policy.dry_run |= options.dry_run;
    let engine = RetentionEngine::new(policy)?;
    let root = config.storage.root.clone();

    let report = tokio::task::spawn_blocking(move || {
        engine.run(
            &root,
            current.as_ref(),
            Local::now(),
            &mut FsRemover,
            &mut TracingSink,
        )
    })
    .await??;

    outcome.retention = Some(report);
    Ok(())
}

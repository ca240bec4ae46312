//! Run-level lock file.
//!
//! Exclusion comes from an advisory `flock` on the lock file. The kernel
//! drops it when the holder exits, so a crashed run never blocks the next
//! one. The file also carries JSON metadata about its holder, used only to
//! report who holds the lock. The file is never unlinked: removing a path
//! that another process may already have opened would let two runs lock
//! different inodes.

use crate::utils::{Result, RunnerError};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Lock metadata, written into the lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockMetadata {
    pub pid: u32,
    pub host: String,
    pub run_id: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockMetadata {
    fn current(run_id: &str) -> Self {
        Self {
            pid: std::process::id(),
            host: local_hostname(),
            run_id: run_id.to_string(),
            acquired_at: Utc::now(),
        }
    }
}

/// Held lock; released when dropped.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    file: File,
}

impl RunLock {
    /// Take the lock at `path` without blocking.
    ///
    /// A holder older than `stale_after` is reported as stale but still
    /// blocks: it is alive, or the kernel would have released its lock.
    pub fn acquire(path: &Path, stale_after: Duration, run_id: &str) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // No truncate: the current holder's metadata must survive our open
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() != fs2::lock_contended_error().kind() {
                return Err(e.into());
            }
            return Err(held_error(path, &mut file, stale_after));
        }

        if let Some(previous) = read_metadata(&mut file) {
            info!(
                path = %path.display(),
                previous_pid = previous.pid,
                previous_run_id = %previous.run_id,
                "Previous run exited without releasing its lock file"
            );
        }

        write_metadata(&mut file, &LockMetadata::current(run_id))?;
        info!(path = %path.display(), run_id, "Lock acquired");

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Clear metadata while still holding the lock, then unlock
        if let Err(e) = self.file.set_len(0) {
            warn!(path = %self.path.display(), error = %e, "Failed to clear lock metadata");
        }
        match FileExt::unlock(&self.file) {
            Ok(()) => info!(path = %self.path.display(), "Lock released"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to release lock"),
        }
    }
}

fn held_error(path: &Path, file: &mut File, stale_after: Duration) -> RunnerError {
    let Some(holder) = read_metadata(file) else {
        return RunnerError::LockHeld {
            path: path.to_path_buf(),
            pid: 0,
            host: "unknown".to_string(),
        };
    };

    let age = Utc::now().signed_duration_since(holder.acquired_at);
    if age.num_seconds() > stale_after.as_secs() as i64 {
        warn!(
            path = %path.display(),
            holder_pid = holder.pid,
            holder_host = %holder.host,
            held_secs = age.num_seconds(),
            "Lock holder has been running longer than the staleness limit"
        );
    }

    RunnerError::LockHeld {
        path: path.to_path_buf(),
        pid: holder.pid,
        host: holder.host,
    }
}

fn read_metadata(file: &mut File) -> Option<LockMetadata> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut content).ok()?;
    serde_json::from_str(&content).ok()
}

fn write_metadata(file: &mut File, metadata: &LockMetadata) -> Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(serde_json::to_string_pretty(metadata)?.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

//! Backup step executor - runs the external backup tool.
//!
//! The tool writes into `root/<id>`. A failed, timed-out or cancelled run
//! leaves nothing behind: the partial target is removed before the error is
//! returned, so the next retention scan never sees it.

pub mod compress;

use crate::config::{BackupConfig, TARGET_PLACEHOLDER};
use crate::fs::walker::artifact_size;
use crate::utils::{Result, RunnerError};
use backup_retention::{BackupId, Compression};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Placeholder replaced by the backup id in command arguments.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Backup job configuration
#[derive(Debug, Clone)]
pub struct BackupJob {
    pub id: BackupId,
    pub root: PathBuf,
    pub program: String,
    pub args: Vec<String>,
    pub compression: Option<Compression>,
    pub timeout: Option<Duration>,
}

impl BackupJob {
    pub fn from_config(id: BackupId, root: &Path, config: &BackupConfig) -> Self {
        Self {
            id,
            root: root.to_path_buf(),
            program: config.program.clone(),
            args: config.args.clone(),
            compression: config.compression.compression(),
            timeout: config.timeout(),
        }
    }

    /// Directory the backup tool writes into
    pub fn target(&self) -> PathBuf {
        self.root.join(self.id.as_str())
    }

    fn command_args(&self) -> Vec<String> {
        let target = self.target();
        let target = target.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(TARGET_PLACEHOLDER, &target)
                    .replace(ID_PLACEHOLDER, self.id.as_str())
            })
            .collect()
    }
}

/// Backup execution result
#[derive(Debug, Clone)]
pub struct BackupResult {
    pub id: BackupId,
    pub artifact: PathBuf,
    pub bytes: u64,
    pub duration_secs: u64,
}

/// Main backup executor
pub struct BackupExecutor {
    cancel_token: CancellationToken,
}

impl BackupExecutor {
    /// Create a new backup executor with cancellation support
    pub fn new(cancel_token: CancellationToken) -> Self {
        Self { cancel_token }
    }

    /// Execute a backup job
    pub async fn execute(&self, job: &BackupJob) -> Result<BackupResult> {
        let start_time = Instant::now();
        let target = job.target();

        if tokio::fs::try_exists(&target).await? {
            return Err(RunnerError::Backup(format!(
                "target {} already exists",
                target.display()
            )));
        }
        tokio::fs::create_dir(&target).await?;

        info!(id = %job.id, program = %job.program, target = %target.display(), "Starting backup");

        let artifact = match self.produce(job).await {
            Ok(artifact) => artifact,
            Err(e) => {
                error!(id = %job.id, error = %e, "Backup failed, removing partial output");
                remove_partial(&target).await;
                return Err(e);
            }
        };

        let bytes = artifact_size(&artifact)?;
        let duration_secs = start_time.elapsed().as_secs();

        info!(
            id = %job.id,
            artifact = %artifact.display(),
            bytes,
            duration_secs,
            "Backup complete"
        );

        Ok(BackupResult {
            id: job.id.clone(),
            artifact,
            bytes,
            duration_secs,
        })
    }

    async fn produce(&self, job: &BackupJob) -> Result<PathBuf> {
        self.run_tool(job).await?;

        match job.compression {
            Some(compression) => {
                compress::compress_directory(&job.root, &job.id, compression, &self.cancel_token).await
            }
            None => Ok(job.target()),
        }
    }

    async fn run_tool(&self, job: &BackupJob) -> Result<()> {
        let mut child = Command::new(&job.program)
            .args(job.command_args())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunnerError::Backup(format!("failed to spawn {}: {}", job.program, e)))?;

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(RunnerError::Backup(format!("{} exited with {}", job.program, status)))
                }
            }
            _ = deadline(job.timeout) => {
                let _ = child.kill().await;
                Err(RunnerError::Backup(format!(
                    "{} timed out after {}s",
                    job.program,
                    job.timeout.map(|t| t.as_secs()).unwrap_or_default()
                )))
            }
            _ = self.cancel_token.cancelled() => {
                info!(id = %job.id, "Backup cancelled, stopping {}", job.program);
                let _ = child.kill().await;
                Err(RunnerError::Cancelled)
            }
        }
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

async fn remove_partial(target: &Path) {
    match tokio::fs::remove_dir_all(target).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(target = %target.display(), error = %e, "Failed to remove partial backup"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn job(root: &Path, script: &str, compression: Option<Compression>) -> BackupJob {
        BackupJob {
            id: BackupId::parse("2024-01-15_02-00-00").unwrap(),
            root: root.to_path_buf(),
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            compression,
            timeout: None,
        }
    }

    #[test]
    fn test_placeholders_are_substituted() {
        let mut job = job(Path::new("/backups"), "", None);
        job.args = vec!["--target-dir={target}".to_string(), "--tag={id}".to_string()];

        assert_eq!(
            job.command_args(),
            vec![
                "--target-dir=/backups/2024-01-15_02-00-00".to_string(),
                "--tag=2024-01-15_02-00-00".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_successful_directory_backup() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let job = job(temp_dir.path(), "printf 'hello' > {target}/dump.sql", None);

        let result = BackupExecutor::new(CancellationToken::new())
            .execute(&job)
            .await
            .unwrap();

        assert_eq!(result.artifact, temp_dir.path().join("2024-01-15_02-00-00"));
        assert_eq!(result.bytes, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_successful_compressed_backup() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let job = job(temp_dir.path(), "echo data > {target}/dump.sql", Some(Compression::Gzip));

        let result = BackupExecutor::new(CancellationToken::new())
            .execute(&job)
            .await
            .unwrap();

        assert_eq!(result.artifact, temp_dir.path().join("2024-01-15_02-00-00.tar.gz"));
        assert!(result.bytes > 0);
        assert!(!temp_dir.path().join("2024-01-15_02-00-00").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_tool_removes_target() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let job = job(temp_dir.path(), "echo partial > {target}/dump.sql; exit 3", None);

        let result = BackupExecutor::new(CancellationToken::new()).execute(&job).await;

        assert!(matches!(result, Err(RunnerError::Backup(_))));
        assert!(!job.target().exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_existing_target_is_refused() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let job = job(temp_dir.path(), "true {target}", None);
        std::fs::create_dir(job.target())?;
        std::fs::write(job.target().join("keep.me"), b"x")?;

        let result = BackupExecutor::new(CancellationToken::new()).execute(&job).await;

        assert!(matches!(result, Err(RunnerError::Backup(_))));
        assert!(job.target().join("keep.me").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_timeout_kills_tool() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let mut job = job(temp_dir.path(), "sleep 30 # {target}", None);
        job.timeout = Some(Duration::from_millis(200));

        let started = Instant::now();
        let result = BackupExecutor::new(CancellationToken::new()).execute(&job).await;

        assert!(matches!(result, Err(RunnerError::Backup(_))));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!job.target().exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_stops_tool() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let job = job(temp_dir.path(), "sleep 30 # {target}", None);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let result = BackupExecutor::new(token).execute(&job).await;

        assert!(matches!(result, Err(RunnerError::Cancelled)));
        assert!(!job.target().exists());
        Ok(())
    }
}

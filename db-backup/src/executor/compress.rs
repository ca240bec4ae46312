//! Tarball creation for finished backups.

use crate::utils::{Result, RunnerError};
use backup_retention::{BackupId, Compression};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Pack `root/<id>` into `root/<id>.tar.<ext>` and remove the directory.
///
/// On failure the partial archive is removed and the directory is left in
/// place for the caller to clean up.
pub async fn compress_directory(
    root: &Path,
    id: &BackupId,
    compression: Compression,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let archive = root.join(format!("{}{}", id, compression.suffix()));
    let directory = root.join(id.as_str());

    info!(archive = %archive.display(), "Compressing backup");

    // tar resolves -f against the working directory, not -C
    let archive_arg = std::path::absolute(&archive)?;

    let mut child = Command::new("tar")
        .arg("-C")
        .arg(root)
        .arg(format!("-c{}", compression.tar_flag()))
        .arg("-f")
        .arg(&archive_arg)
        .arg(id.as_str())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| RunnerError::Compression(format!("failed to spawn tar: {e}")))?;

    let outcome = tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(RunnerError::Compression(format!("tar exited with {status}"))),
            Err(e) => Err(RunnerError::Compression(format!("failed to wait for tar: {e}"))),
        },
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            Err(RunnerError::Cancelled)
        }
    };

    if let Err(e) = outcome {
        if let Err(rm) = tokio::fs::remove_file(&archive).await {
            if rm.kind() != std::io::ErrorKind::NotFound {
                warn!(archive = %archive.display(), error = %rm, "Failed to remove partial archive");
            }
        }
        return Err(e);
    }

    tokio::fs::remove_dir_all(&directory).await?;
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_compress_replaces_directory() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        let id = BackupId::parse("2024-01-01_02-00-00").unwrap();
        fs::create_dir(root.join(id.as_str()))?;
        fs::write(root.join(id.as_str()).join("dump.sql"), b"CREATE TABLE t (id INT);")?;

        let archive = compress_directory(root, &id, Compression::Gzip, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(archive, root.join("2024-01-01_02-00-00.tar.gz"));
        assert!(archive.is_file());
        assert!(!root.join(id.as_str()).exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_archive_lands_in_root_not_working_directory() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        let id = BackupId::parse("2024-02-01_02-00-00").unwrap();
        fs::create_dir(root.join(id.as_str()))?;
        fs::write(root.join(id.as_str()).join("dump.sql"), b"data")?;

        compress_directory(root, &id, Compression::Xz, &CancellationToken::new())
            .await
            .unwrap();

        let entries: Vec<String> = fs::read_dir(root)?
            .map(|e| e.map(|e| e.file_name().to_string_lossy().to_string()))
            .collect::<std::io::Result<_>>()?;
        assert_eq!(entries, vec!["2024-02-01_02-00-00.tar.xz".to_string()]);
        assert!(!std::env::current_dir()?
            .join("2024-02-01_02-00-00.tar.xz")
            .exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_directory_fails_cleanly() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let id = BackupId::parse("2024-01-01_02-00-00").unwrap();

        let result = compress_directory(temp_dir.path(), &id, Compression::Gzip, &CancellationToken::new()).await;

        assert!(matches!(result, Err(RunnerError::Compression(_))));
        assert!(!temp_dir.path().join("2024-01-01_02-00-00.tar.gz").exists());
        Ok(())
    }
}

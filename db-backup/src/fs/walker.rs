//! Artifact size calculation.

use std::path::Path;
use walkdir::WalkDir;

/// Total size in bytes of a backup artifact.
///
/// Archives report their file size; directories the sum of every regular
/// file below them. Symlinks are not followed.
///
/// # Example
/// ```no_run
/// use db_backup::fs::walker::artifact_size;
/// use std::path::Path;
///
/// let bytes = artifact_size(Path::new("/var/backups/db/2024-01-01_02-00-00.tar.gz")).unwrap();
/// println!("{bytes} bytes");
/// ```
pub fn artifact_size(path: &Path) -> std::io::Result<u64> {
    let metadata = std::fs::symlink_metadata(path)?;
    if !metadata.is_dir() {
        return Ok(metadata.len());
    }

    let mut total_size = 0u64;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total_size += entry.metadata()?.len();
        }
    }

    Ok(total_size)
}

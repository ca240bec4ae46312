//! Storage root scanning.
//!
//! Lists the storage root once and turns every entry that follows the
//! naming convention into a [`BackupItem`]. Other entries are ignored.

use crate::error::{Result, RetentionError};
use crate::item::{BackupId, BackupItem, BackupSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Result of one scan.
#[derive(Debug, Default)]
pub struct Scan {
    pub items: BackupSet,
    /// Entries whose id was already taken by an earlier entry. They are never
    /// planned, so they stay on disk until removed by hand.
    pub shadowed: Vec<(BackupId, PathBuf)>,
}

/// Scan `root` into a fresh [`BackupSet`].
///
/// Entries are visited in file-name order. When two entries map to the same
/// id (a directory next to its archive, for instance) the first one wins and
/// the other is reported in [`Scan::shadowed`].
/// Any I/O error while listing fails the whole scan.
pub fn scan_backups(root: &Path, anchor_day: u32) -> Result<Scan> {
    let scan_err = |source| RetentionError::Scan {
        path: root.to_path_buf(),
        source,
    };

    let mut entries = Vec::new();
    for entry in fs::read_dir(root).map_err(scan_err)? {
        let entry = entry.map_err(scan_err)?;
        entries.push((entry.file_name(), entry.path()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut set = BackupSet::new();
    let mut shadowed = Vec::new();
    for (file_name, path) in entries {
        let Some(name) = file_name.to_str() else {
            trace!(path = %path.display(), "Ignoring non UTF-8 entry");
            continue;
        };

        let Some(item) = BackupItem::from_entry_name(name, path.clone(), anchor_day) else {
            trace!(name, "Ignoring entry outside the naming convention");
            continue;
        };

        if let Some(existing) = set.get(&item.id) {
            warn!(
                id = %item.id,
                kept = %existing.path.display(),
                ignored = %path.display(),
                "Duplicate backup id"
            );
            shadowed.push((item.id, path));
            continue;
        }

        set.insert(item.id.clone(), item);
    }

    debug!(root = %root.display(), items = set.len(), "Scanned storage root");
    Ok(Scan {
        items: set,
        shadowed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{BackupKind, Compression};
    use tempfile::TempDir;

    #[test]
    fn test_scan_empty_directory() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let set = scan_backups(temp_dir.path(), 1).unwrap().items;
        assert!(set.is_empty());
        Ok(())
    }

    #[test]
    fn test_scan_mixed_entries() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        fs::create_dir(root.join("2024-01-10_02-00-00"))?;
        fs::write(root.join("2024-01-11_02-00-00.tar.gz"), b"gz")?;
        fs::write(root.join("2024-01-12_02-00-00.tar.bz2"), b"bz2")?;
        fs::write(root.join("2024-01-13_02-00-00.tar.xz"), b"xz")?;
        fs::write(root.join("README"), b"not a backup")?;
        fs::create_dir(root.join("lost+found"))?;
        fs::write(root.join("2024-02-30_02-00-00.tar.gz"), b"bad date")?;

        let set = scan_backups(root, 1).unwrap().items;
        assert_eq!(set.len(), 4);

        let kinds: Vec<_> = set.values().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BackupKind::Directory,
                BackupKind::Archive(Compression::Gzip),
                BackupKind::Archive(Compression::Bzip2),
                BackupKind::Archive(Compression::Xz),
            ]
        );

        let first = set.values().next().unwrap();
        assert_eq!(first.path, root.join("2024-01-10_02-00-00"));
        assert!(!first.is_current && !first.do_not_delete && !first.force_delete);
        Ok(())
    }

    #[test]
    fn test_scan_marks_anchor_day() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        fs::create_dir(temp_dir.path().join("2024-05-01_02-00-00"))?;
        fs::create_dir(temp_dir.path().join("2024-05-02_02-00-00"))?;

        let set = scan_backups(temp_dir.path(), 1).unwrap().items;
        let periods: Vec<_> = set.values().map(|i| i.long_term_period.clone()).collect();
        assert_eq!(periods, vec![Some("202405".to_string()), None]);
        Ok(())
    }

    #[test]
    fn test_duplicate_id_keeps_first_entry() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        fs::create_dir(temp_dir.path().join("2024-01-10_02-00-00"))?;
        fs::write(temp_dir.path().join("2024-01-10_02-00-00.tar.gz"), b"gz")?;

        let scan = scan_backups(temp_dir.path(), 1).unwrap();
        assert_eq!(scan.items.len(), 1);
        assert_eq!(scan.items.values().next().unwrap().kind, BackupKind::Directory);
        assert_eq!(
            scan.shadowed,
            vec![(
                BackupId::parse("2024-01-10_02-00-00").unwrap(),
                temp_dir.path().join("2024-01-10_02-00-00.tar.gz"),
            )]
        );
        Ok(())
    }

    #[test]
    fn test_missing_root_is_scan_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(matches!(
            scan_backups(&missing, 1),
            Err(RetentionError::Scan { .. })
        ));
    }
}

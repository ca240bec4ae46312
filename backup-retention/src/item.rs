//! Backup artifact naming and the per-run item model.
//!
//! Artifacts are named after the moment their backup started:
//! `YYYY-MM-DD_HH-MM-SS`, optionally followed by `.tar.gz`, `.tar.bz2` or
//! `.tar.xz`. The name is the only metadata; nothing else is persisted.

use chrono::{Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Length of `YYYY-MM-DD_HH-MM-SS`.
pub const ID_LEN: usize = 19;

const ID_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Canonical, sortable backup identifier.
///
/// The format is fixed width, so lexicographic order equals chronological
/// order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackupId(String);

impl BackupId {
    pub fn from_datetime(timestamp: NaiveDateTime) -> Self {
        Self(timestamp.format(ID_FORMAT).to_string())
    }

    /// Parse an exact `YYYY-MM-DD_HH-MM-SS` string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != ID_LEN {
            return None;
        }
        parse_timestamp(s).map(|_| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Archive compression, determined by the `.tar.<ext>` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
    Xz,
}

impl Compression {
    pub const ALL: [Compression; 3] = [Compression::Gzip, Compression::Bzip2, Compression::Xz];

    pub fn extension(self) -> &'static str {
        match self {
            Compression::Gzip => "gz",
            Compression::Bzip2 => "bz2",
            Compression::Xz => "xz",
        }
    }

    /// Full artifact suffix, e.g. `.tar.gz`.
    pub fn suffix(self) -> String {
        format!(".tar.{}", self.extension())
    }

    /// The `tar` short option selecting this compressor.
    pub fn tar_flag(self) -> char {
        match self {
            Compression::Gzip => 'z',
            Compression::Bzip2 => 'j',
            Compression::Xz => 'J',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    /// Single compressed tarball.
    Archive(Compression),
    /// Uncompressed backup directory.
    Directory,
}

/// One backup artifact found on disk, with the flags computed for this run.
#[derive(Debug, Clone)]
pub struct BackupItem {
    pub id: BackupId,

    /// Local civil time the backup started, decoded from `id`.
    pub timestamp: NaiveDateTime,

    pub kind: BackupKind,

    /// Directory entry the item was scanned from
    pub path: PathBuf,

    /// `YYYYMM` when the item is the long-term candidate of that month
    pub long_term_period: Option<String>,

    pub is_current: bool,
    pub do_not_delete: bool,
    pub force_delete: bool,
}

/// All items of one storage root, keyed (and therefore ordered) by id.
pub type BackupSet = BTreeMap<BackupId, BackupItem>;

impl BackupItem {
    /// Build an item from a directory entry name.
    ///
    /// Returns `None` when the name does not follow the naming convention.
    /// `anchor_day` is the day of month whose backups are long-term
    /// candidates.
    pub fn from_entry_name(name: &str, path: PathBuf, anchor_day: u32) -> Option<Self> {
        let (id, timestamp, kind) = parse_entry_name(name)?;

        let long_term_period = (timestamp.day() == anchor_day)
            .then(|| format!("{:04}{:02}", timestamp.year(), timestamp.month()));

        Some(Self {
            id,
            timestamp,
            kind,
            path,
            long_term_period,
            is_current: false,
            do_not_delete: false,
            force_delete: false,
        })
    }

    pub fn is_long_term(&self) -> bool {
        self.long_term_period.is_some()
    }

    /// Seconds since the Unix epoch, interpreting `timestamp` in local time.
    pub fn started_at_epoch(&self) -> i64 {
        local_epoch(self.timestamp)
    }
}

/// Split an entry name into id, decoded timestamp and kind.
///
/// Grammar: `timestamp [ ".tar." extension ] [ anything ]`. A name whose
/// timestamp is followed by anything other than a known archive suffix is a
/// directory backup.
pub fn parse_entry_name(name: &str) -> Option<(BackupId, NaiveDateTime, BackupKind)> {
    let head = name.get(..ID_LEN)?;
    let timestamp = parse_timestamp(head)?;
    let rest = &name[ID_LEN..];

    let kind = rest
        .strip_prefix(".tar.")
        .and_then(|ext| {
            Compression::ALL
                .into_iter()
                .find(|c| ext.starts_with(c.extension()))
        })
        .map(BackupKind::Archive)
        .unwrap_or(BackupKind::Directory);

    Some((BackupId(head.to_string()), timestamp, kind))
}

/// Decode the literal fields of `YYYY-MM-DD_HH-MM-SS`.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let bytes = s.as_bytes();
    if bytes.len() < ID_LEN {
        return None;
    }

    for (i, b) in bytes[..ID_LEN].iter().enumerate() {
        let ok = match i {
            4 | 7 | 13 | 16 => *b == b'-',
            10 => *b == b'_',
            _ => b.is_ascii_digit(),
        };
        if !ok {
            return None;
        }
    }

    let field = |range: std::ops::Range<usize>| s[range].parse::<u32>().ok();

    let year = i32::try_from(field(0..4)?).ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(5..7)?, field(8..10)?)?;
    date.and_hms_opt(field(11..13)?, field(14..16)?, field(17..19)?)
}

/// Local-time epoch seconds of a civil timestamp.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant; times in a
/// DST gap use the offset in effect just before the gap.
pub fn local_epoch(timestamp: NaiveDateTime) -> i64 {
    match chrono::Local.from_local_datetime(&timestamp) {
        LocalResult::Single(dt) => dt.timestamp(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp(),
        LocalResult::None => chrono::Local
            .from_local_datetime(&(timestamp - Duration::hours(1)))
            .earliest()
            .map(|dt| dt.timestamp() + 3600)
            .unwrap_or_else(|| timestamp.and_utc().timestamp()),
    }
}

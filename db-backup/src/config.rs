//! Configuration management for the backup runner.
//!
//! Loads configuration from a TOML file with environment variable overrides.

use crate::utils::{Result, RunnerError};
use backup_retention::{Compression, RetentionPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder replaced by the backup target directory in command arguments.
pub const TARGET_PLACEHOLDER: &str = "{target}";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub backup: BackupConfig,
    #[serde(default)]
    pub retention: RetentionPolicy,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the backup artifacts
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Backup tool to run (mariabackup, pg_basebackup, ...)
    pub program: String,

    /// Arguments; `{target}` and `{id}` are substituted
    #[serde(default)]
    pub args: Vec<String>,

    /// Compression of the finished backup (none, gzip, bzip2, xz)
    #[serde(default)]
    pub compression: CompressionMode,

    /// Kill the backup tool after this many seconds (0 = no limit)
    #[serde(default)]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    None,
    #[default]
    Gzip,
    Bzip2,
    Xz,
}

impl CompressionMode {
    pub fn compression(self) -> Option<Compression> {
        match self {
            CompressionMode::None => None,
            CompressionMode::Gzip => Some(Compression::Gzip),
            CompressionMode::Bzip2 => Some(Compression::Bzip2),
            CompressionMode::Xz => Some(Compression::Xz),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lock file location
    #[serde(default = "default_lock_path")]
    pub path: PathBuf,

    /// A holder older than this is reported as stale
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Upper bound of the random delay applied to non-interactive runs
    #[serde(default = "default_max_start_delay_secs")]
    pub max_start_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// JSON webhook receiving the run status
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Command run after each run; `{status}`, `{host}` and `{id}` are substituted
    #[serde(default)]
    pub command: Vec<String>,

    /// Timeout for each notification
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_lock_path() -> PathBuf {
    PathBuf::from("/run/lock/db-backup.lock")
}

fn default_stale_after_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_start_delay_secs() -> u64 {
    300
}

fn default_notify_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            path: default_lock_path(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            max_start_delay_secs: default_max_start_delay_secs(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            command: Vec::new(),
            timeout_secs: default_notify_timeout_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl BackupConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RunnerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `DB_BACKUP_ROOT` and `DB_BACKUP_LOG_LEVEL` from the environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("DB_BACKUP_ROOT").filter(|v| !v.is_empty()) {
            self.storage.root = PathBuf::from(root);
        }
        if let Some(level) = lookup("DB_BACKUP_LOG_LEVEL").filter(|v| !v.is_empty()) {
            self.log.level = level;
        }
    }

    /// Check everything that must hold before a run may start
    pub fn validate(&self) -> Result<()> {
        self.retention.validate()?;

        if self.backup.program.trim().is_empty() {
            return Err(RunnerError::Config("backup.program is empty".into()));
        }

        if !self.backup.args.iter().any(|a| a.contains(TARGET_PLACEHOLDER)) {
            return Err(RunnerError::Config(format!(
                "backup.args must reference {TARGET_PLACEHOLDER}"
            )));
        }

        if !self.storage.root.is_dir() {
            return Err(RunnerError::Config(format!(
                "storage root {} does not exist or is not a directory",
                self.storage.root.display()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
        [storage]
        root = "/var/backups/db"

        [backup]
        program = "mariabackup"
        args = ["--backup", "--target-dir={target}"]
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();

        assert_eq!(config.storage.root, PathBuf::from("/var/backups/db"));
        assert_eq!(config.backup.compression, CompressionMode::Gzip);
        assert_eq!(config.backup.timeout(), None);
        assert_eq!(config.retention, RetentionPolicy::default());
        assert_eq!(config.lock.stale_after_secs, 86_400);
        assert_eq!(config.schedule.max_start_delay_secs, 300);
        assert!(config.notify.webhook_url.is_none());
        assert!(config.notify.command.is_empty());
        assert_eq!(config.notify.timeout_secs, 10);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            [storage]
            root = "/srv/backup"

            [backup]
            program = "pg_basebackup"
            args = ["-D", "{target}", "-Ft"]
            compression = "none"
            timeout_secs = 3600

            [retention]
            retention_days = 14
            long_term_backups = 12
            long_term_anchor_day = "15"
            min_backups = 2
            max_backups = 0
            dry_run = true

            [lock]
            path = "/tmp/db-backup.lock"
            stale_after_secs = 600

            [schedule]
            max_start_delay_secs = 0

            [notify]
            webhook_url = "https://monitoring.example/hook"
            command = ["zabbix_sender", "-o", "{status}"]

            [log]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.backup.compression.compression(), None);
        assert_eq!(config.backup.timeout(), Some(Duration::from_secs(3600)));
        assert_eq!(config.retention.retention_days, 14);
        assert_eq!(config.retention.anchor_day().unwrap(), 15);
        assert!(config.retention.dry_run);
        assert_eq!(config.lock.path, PathBuf::from("/tmp/db-backup.lock"));
        assert_eq!(config.notify.timeout_secs, 10);
        assert_eq!(config.notify.command.len(), 3);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_unknown_compression_is_rejected() {
        let toml = MINIMAL.replace(
            "args = [",
            "compression = \"zip\"\n        args = [",
        );
        assert!(matches!(
            Config::from_toml(&toml),
            Err(RunnerError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::from_toml(MINIMAL).unwrap();
        config.apply_overrides(|key| match key {
            "DB_BACKUP_ROOT" => Some("/mnt/other".to_string()),
            "DB_BACKUP_LOG_LEVEL" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.storage.root, PathBuf::from("/mnt/other"));
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_validate() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::from_toml(MINIMAL).unwrap();
        config.storage.root = temp_dir.path().to_path_buf();
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.retention.min_backups = 40;
        assert!(matches!(bad.validate(), Err(RunnerError::Retention(_))));

        let mut bad = config.clone();
        bad.backup.args = vec!["--backup".to_string()];
        assert!(matches!(bad.validate(), Err(RunnerError::Config(_))));

        let mut bad = config.clone();
        bad.backup.program = " ".to_string();
        assert!(bad.validate().is_err());

        let mut bad = config;
        bad.storage.root = temp_dir.path().join("missing");
        assert!(bad.validate().is_err());
    }
}

//! Retention policy values.
//!
//! The policy is an immutable value handed to every component; it is
//! deserialized from the `[retention]` section of the runner's config file.

use crate::error::{Result, RetentionError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Age in days after which short-term backups expire
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Number of long-term (monthly) backups to keep
    #[serde(default = "default_long_term_backups")]
    pub long_term_backups: u32,

    /// Day of month ("01".."31") whose first backup becomes long-term
    #[serde(default = "default_long_term_anchor_day")]
    pub long_term_anchor_day: String,

    /// The newest `min_backups` items are never deleted for age
    #[serde(default = "default_min_backups")]
    pub min_backups: u32,

    /// Cap on the total number of items (0 = unlimited)
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,

    /// Report deletions without removing anything
    #[serde(default)]
    pub dry_run: bool,
}

fn default_retention_days() -> u32 {
    7
}

fn default_long_term_backups() -> u32 {
    6
}

fn default_long_term_anchor_day() -> String {
    "01".to_string()
}

fn default_min_backups() -> u32 {
    3
}

fn default_max_backups() -> u32 {
    30
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            long_term_backups: default_long_term_backups(),
            long_term_anchor_day: default_long_term_anchor_day(),
            min_backups: default_min_backups(),
            max_backups: default_max_backups(),
            dry_run: false,
        }
    }
}

impl RetentionPolicy {
    /// Check the policy before any scan takes place.
    pub fn validate(&self) -> Result<()> {
        if self.max_backups != 0 && self.min_backups >= self.max_backups {
            return Err(RetentionError::Config(format!(
                "min_backups ({}) must be lower than max_backups ({})",
                self.min_backups, self.max_backups
            )));
        }
        self.anchor_day()?;
        Ok(())
    }

    /// The anchor day as a number.
    pub fn anchor_day(&self) -> Result<u32> {
        let raw = self.long_term_anchor_day.as_str();
        let day = (raw.len() == 2 && raw.bytes().all(|b| b.is_ascii_digit()))
            .then(|| raw.parse::<u32>().ok())
            .flatten()
            .filter(|d| (1..=31).contains(d));

        day.ok_or_else(|| {
            RetentionError::Config(format!(
                "long_term_anchor_day must be a two-digit day of month (01-31), got {raw:?}"
            ))
        })
    }

    /// Maximum age in seconds of a short-term item.
    pub fn max_age_secs(&self) -> i64 {
        i64::from(self.retention_days) * 86_400
    }
}

//! Long-term candidate deduplication.
//!
//! Every backup taken on the anchor day is a long-term candidate. Only the
//! first one of each period keeps the flag; later same-period backups (retries,
//! manual runs) fall back to ordinary short-term accounting.

use crate::item::{BackupId, BackupSet};
use std::collections::HashSet;

/// Strip the long-term flag from every candidate that is not the earliest of
/// its period. Returns the demoted ids, oldest first.
pub fn dedup_long_term(set: &mut BackupSet) -> Vec<(BackupId, String)> {
    let mut seen = HashSet::new();
    let mut demoted = Vec::new();

    // BackupSet iterates by id, which is chronological.
    for item in set.values_mut() {
        let Some(period) = item.long_term_period.clone() else {
            continue;
        };

        if seen.contains(&period) {
            item.long_term_period = None;
            demoted.push((item.id.clone(), period));
        } else {
            seen.insert(period);
        }
    }

    demoted
}

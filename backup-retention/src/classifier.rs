//! Global recency ranking and lifecycle flags.
//!
//! Ranking spans both tiers: `min_backups` and `max_backups` bound the total
//! number of visible backups, not the size of a single tier.

use crate::item::{BackupId, BackupItem, BackupSet};
use crate::policy::RetentionPolicy;

/// Items sorted newest first. Equal timestamps are ordered by id, descending.
pub fn recency_order<'a, I>(items: I) -> Vec<&'a BackupItem>
where
    I: IntoIterator<Item = &'a BackupItem>,
{
    let mut ordered: Vec<&BackupItem> = items.into_iter().collect();
    ordered.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.id.cmp(&a.id))
    });
    ordered
}

/// Assign `is_current`, `do_not_delete` and `force_delete` to every item.
///
/// Flags are recomputed from scratch, so classifying an unchanged set twice
/// yields the same result.
pub fn classify(set: &mut BackupSet, policy: &RetentionPolicy, current: Option<&BackupId>) {
    let order: Vec<BackupId> = recency_order(set.values())
        .into_iter()
        .map(|item| item.id.clone())
        .collect();

    let min_backups = policy.min_backups as usize;
    let max_backups = policy.max_backups as usize;

    for (index, id) in order.iter().enumerate() {
        let rank = index + 1;
        let Some(item) = set.get_mut(id) else {
            continue;
        };

        item.is_current = current == Some(&item.id);
        item.do_not_delete = rank <= min_backups;
        item.force_delete = max_backups != 0 && rank > max_backups && !item.is_current;
    }
}

//! Keep/delete decisions for the two retention passes.
//!
//! Planning is pure: it reads the classified [`BackupSet`] and produces one
//! [`PassPlan`] per tier without touching the filesystem. Every item moves
//! through [`ItemState`]:
//!
//! ```text
//! Pending -> Evaluated -> Kept
//!                      -> DeleteRequested -> Deleted
//!                                         -> DeleteFailed
//! ```

use crate::classifier::recency_order;
use crate::item::{BackupId, BackupItem, BackupKind, BackupSet};
use crate::policy::RetentionPolicy;
use chrono::{DateTime, Local, NaiveDateTime};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    ShortTerm,
    LongTerm,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::ShortTerm => f.write_str("short-term"),
            Tier::LongTerm => f.write_str("long-term"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepReason {
    /// Produced by this run
    Current,
    /// Expired, but among the newest `min_backups`
    Protected,
    WithinRetention,
    WithinLongTermCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteReason {
    /// Older than `retention_days`
    Expired,
    /// Ranked beyond `max_backups`
    OverCountCap,
    /// Ranked beyond `long_term_backups` within the long-term tier
    BeyondLongTermCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep(KeepReason),
    Delete(DeleteReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Evaluated(Decision),
    Kept(KeepReason),
    DeleteRequested(DeleteReason),
    Deleted(DeleteReason),
    DeleteFailed(DeleteReason),
}

impl ItemState {
    /// `Pending -> Evaluated`. No-op from any other state.
    pub fn evaluate(&mut self, decision: Decision) {
        if *self == ItemState::Pending {
            *self = ItemState::Evaluated(decision);
        }
    }

    /// `Evaluated -> Kept | DeleteRequested`. No-op from any other state.
    pub fn settle(&mut self) {
        if let ItemState::Evaluated(decision) = *self {
            *self = match decision {
                Decision::Keep(reason) => ItemState::Kept(reason),
                Decision::Delete(reason) => ItemState::DeleteRequested(reason),
            };
        }
    }

    /// `DeleteRequested -> Deleted | DeleteFailed`. No-op from any other state.
    pub fn finish_delete(&mut self, removed: bool) {
        if let ItemState::DeleteRequested(reason) = *self {
            *self = if removed {
                ItemState::Deleted(reason)
            } else {
                ItemState::DeleteFailed(reason)
            };
        }
    }

    pub fn is_delete_requested(&self) -> bool {
        matches!(self, ItemState::DeleteRequested(_))
    }
}

/// One item of a pass, detached from the set.
#[derive(Debug, Clone)]
pub struct PlannedItem {
    pub id: BackupId,
    pub timestamp: NaiveDateTime,
    pub kind: BackupKind,
    pub path: PathBuf,
    pub state: ItemState,
}

impl PlannedItem {
    fn pending(item: &BackupItem) -> Self {
        Self {
            id: item.id.clone(),
            timestamp: item.timestamp,
            kind: item.kind,
            path: item.path.clone(),
            state: ItemState::Pending,
        }
    }
}

/// Decisions for one tier, oldest item first (the deletion order).
#[derive(Debug, Clone)]
pub struct PassPlan {
    pub tier: Tier,
    pub items: Vec<PlannedItem>,
}

impl PassPlan {
    fn from_decisions(tier: Tier, mut decided: Vec<(&BackupItem, Decision)>) -> Self {
        decided.sort_by(|a, b| {
            a.0.timestamp
                .cmp(&b.0.timestamp)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });

        let items = decided
            .into_iter()
            .map(|(item, decision)| {
                let mut planned = PlannedItem::pending(item);
                planned.state.evaluate(decision);
                planned.state.settle();
                planned
            })
            .collect();

        Self { tier, items }
    }

    pub fn deletions(&self) -> impl Iterator<Item = &PlannedItem> {
        self.items.iter().filter(|i| i.state.is_delete_requested())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Short-term decision for a single item.
///
/// The count cap overrides recency protection; the current item is always
/// kept.
pub fn decide_short_term(item: &BackupItem, policy: &RetentionPolicy, now: DateTime<Local>) -> Decision {
    if item.is_current {
        return Decision::Keep(KeepReason::Current);
    }
    if item.force_delete {
        return Decision::Delete(DeleteReason::OverCountCap);
    }

    let age_secs = now.timestamp() - item.started_at_epoch();
    if age_secs > policy.max_age_secs() {
        if item.do_not_delete {
            Decision::Keep(KeepReason::Protected)
        } else {
            Decision::Delete(DeleteReason::Expired)
        }
    } else {
        Decision::Keep(KeepReason::WithinRetention)
    }
}

/// Plan the short-term pass: every item without a long-term period.
pub fn plan_short_term(set: &BackupSet, policy: &RetentionPolicy, now: DateTime<Local>) -> PassPlan {
    let decided = set
        .values()
        .filter(|item| !item.is_long_term())
        .map(|item| (item, decide_short_term(item, policy, now)))
        .collect();

    PassPlan::from_decisions(Tier::ShortTerm, decided)
}

/// Plan the long-term pass: keep the newest `long_term_backups` holders.
pub fn plan_long_term(set: &BackupSet, policy: &RetentionPolicy) -> PassPlan {
    let keep = policy.long_term_backups as usize;

    let decided = recency_order(set.values().filter(|item| item.is_long_term()))
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let decision = if index < keep {
                Decision::Keep(KeepReason::WithinLongTermCount)
            } else if item.is_current {
                Decision::Keep(KeepReason::Current)
            } else {
                Decision::Delete(DeleteReason::BeyondLongTermCount)
            };
            (item, decision)
        })
        .collect();

    PassPlan::from_decisions(Tier::LongTerm, decided)
}

//! Logging configuration using tracing.

use backup_retention::{Decision, EventSink, RetentionEvent};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with the specified level
pub fn init(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// Forwards retention events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: RetentionEvent) {
        match event {
            RetentionEvent::Demoted { id, period } => {
                info!(%id, %period, "Later backup in long-term period, treating as short-term");
            }
            RetentionEvent::Shadowed { id, path } => {
                warn!(%id, path = %path.display(), "Entry shares its id with another backup and is never rotated, remove it manually");
            }
            RetentionEvent::Considered { tier, id, decision } => match decision {
                Decision::Keep(reason) => debug!(%tier, %id, ?reason, "Keeping backup"),
                Decision::Delete(reason) => info!(%tier, %id, ?reason, "Backup marked for deletion"),
            },
            RetentionEvent::Deleted { tier, id, path } => {
                debug!(%tier, %id, path = %path.display(), "Backup removed");
            }
            RetentionEvent::WouldDelete { tier, id, path } => {
                info!(%tier, %id, path = %path.display(), "Dry run: would delete backup");
            }
            RetentionEvent::DeletionFailed { tier, id, path, error } => {
                error!(%tier, %id, path = %path.display(), %error, "Backup deletion failed");
            }
            RetentionEvent::PassFinished {
                tier,
                deleted,
                kept,
                success,
            } => {
                if success {
                    info!(%tier, deleted, kept, "Retention pass complete");
                } else {
                    warn!(%tier, deleted, kept, "Retention pass aborted");
                }
            }
        }
    }
}

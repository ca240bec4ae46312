//! Randomized start delay.
//!
//! Scheduled runs across a fleet tend to fire at the same minute. When the
//! runner is not attached to a terminal it sleeps a random amount first.

use rand::Rng;
use std::io::IsTerminal;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Delay to apply before a run, if any.
pub fn start_delay(max_delay_secs: u64, interactive: bool) -> Option<Duration> {
    if interactive || max_delay_secs == 0 {
        return None;
    }
    let millis = rand::rng().random_range(0..=max_delay_secs.saturating_mul(1000));
    Some(Duration::from_millis(millis))
}

/// Sleep the start delay unless stdin is a terminal.
///
/// Returns `false` when cancelled while waiting.
pub async fn wait_start_delay(max_delay_secs: u64, cancel: &CancellationToken) -> bool {
    let interactive = std::io::stdin().is_terminal();
    let Some(delay) = start_delay(max_delay_secs, interactive) else {
        return true;
    };

    info!(delay_ms = delay.as_millis() as u64, "Delaying start");
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = cancel.cancelled() => false,
    }
}

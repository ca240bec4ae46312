//! Run status notifications: JSON webhook and command hook.
//!
//! Notification failures never change the outcome of a run; they are logged
//! and dropped.

use crate::config::NotifyConfig;
use crate::utils::{Result, RunnerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Success,
    Failure,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Success => "success",
            RunState::Failure => "failure",
        }
    }
}

/// Status report sent after every run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_id: String,
    pub host: String,
    pub backup_id: Option<String>,
    pub status: RunState,
    pub message: String,
    pub backup_bytes: Option<u64>,
    pub deleted: Vec<String>,
    pub duration_secs: u64,
    pub finished_at: DateTime<Utc>,
}

pub struct Notifier {
    config: NotifyConfig,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(config: NotifyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    /// Deliver `status` to every configured target
    pub async fn notify(&self, status: &RunStatus) {
        if let Some(url) = &self.config.webhook_url {
            match self.post_webhook(url, status).await {
                Ok(()) => info!(url = %url, status = status.status.as_str(), "Webhook notified"),
                Err(e) => warn!(url = %url, error = %e, "Webhook notification failed"),
            }
        }

        if !self.config.command.is_empty() {
            if let Err(e) = self.run_command(status).await {
                warn!(error = %e, "Notify command failed");
            }
        }
    }

    async fn post_webhook(&self, url: &str, status: &RunStatus) -> Result<()> {
        let response = self.client.post(url).json(status).send().await?;

        if !response.status().is_success() {
            return Err(RunnerError::Notify(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        Ok(())
    }

    async fn run_command(&self, status: &RunStatus) -> Result<()> {
        let Some((program, args)) = self.config.command.split_first() else {
            return Ok(());
        };
        let args = substitute(args, status);
        debug!(program = %program, ?args, "Running notify command");

        let mut child = Command::new(program)
            .args(&args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunnerError::Notify(format!("failed to spawn {program}: {e}")))?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let exit = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(exit) => exit?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(RunnerError::Notify(format!(
                    "{program} timed out after {}s",
                    timeout.as_secs()
                )));
            }
        };

        if !exit.success() {
            return Err(RunnerError::Notify(format!("{program} exited with {exit}")));
        }
        Ok(())
    }
}

fn substitute(args: &[String], status: &RunStatus) -> Vec<String> {
    let id = status.backup_id.as_deref().unwrap_or("");
    args.iter()
        .map(|arg| {
            arg.replace("{status}", status.status.as_str())
                .replace("{host}", &status.host)
                .replace("{id}", id)
        })
        .collect()
}

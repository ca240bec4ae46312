//! db-backup - Main entry point
//!
//! Runs one backup followed by retention, then exits. Meant to be started
//! by cron or a systemd timer.

use anyhow::Result;
use clap::Parser;
use db_backup::{config::Config, daemon::shutdown::ShutdownCoordinator, notify::Notifier, utils};
use db_backup::{run, RunOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "/etc/db-backup/config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Start immediately, without the randomized delay
    #[arg(long)]
    no_delay: bool,

    /// Skip the backup and only apply retention
    #[arg(long)]
    prune_only: bool,

    /// Log what retention would delete without deleting anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::from_file(&args.config)?;
    config.apply_env_overrides();

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!(
        "Starting db-backup v{} (config: {})",
        env!("CARGO_PKG_VERSION"),
        args.config.display()
    );

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return Ok(ExitCode::FAILURE);
    }

    // Cancel the run on SIGINT/SIGTERM
    let shutdown_coordinator = ShutdownCoordinator::new(CancellationToken::new());
    let cancel = shutdown_coordinator.token();
    let signal_handle = tokio::spawn(async move {
        shutdown_coordinator.wait_for_signal().await;
    });

    let options = RunOptions {
        prune_only: args.prune_only,
        dry_run: args.dry_run,
        no_delay: args.no_delay,
    };
    let outcome = run(&config, options, cancel).await;
    signal_handle.abort();

    let notifier = Notifier::new(config.notify.clone())?;
    notifier.notify(&outcome.status()).await;

    if outcome.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

//! fota-tracker - Main entry point
//!
//! Checks every configured FOTA feed once, reports what changed since the
//! previous run and stores the new state. Meant to be driven by cron or a
//! systemd timer.

mod config;
mod feed_fetch;
mod monitor;

use anyhow::Result;
use clap::Parser;
use fota_tracker_core::FileSnapshotStore;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::feed_fetch::HttpFeedClient;
use crate::monitor::Monitor;

#[derive(Parser, Debug)]
#[command(name = "fota-tracker")]
#[command(about = "Report firmware version changes on FOTA servers since the last run")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "fota-tracker.toml")]
    config: PathBuf,

    /// Directory holding stored snapshots (overrides the config file)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs on stderr, report on stdout
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("fota-tracker v{}", env!("CARGO_PKG_VERSION"));

    let config = config::load_config(&args.config)?;
    let data_dir = args.data_dir.unwrap_or_else(|| config.data_dir());
    let registry = config.to_registry();

    info!(
        devices = registry.len(),
        data_dir = %data_dir.display(),
        timeout_secs = config.tracker.timeout_secs,
        "Configuration loaded"
    );

    let client = HttpFeedClient::new(config.timeout())?;
    let store = FileSnapshotStore::new(data_dir);
    let monitor = Monitor::new(registry, client, store);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = monitor.run(&mut out).await {
        error!(error = %format!("{:#}", e), "Firmware check aborted");
        return Err(e);
    }

    Ok(())
}

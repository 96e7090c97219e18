//! dirmirror daemon - one-way mirror of a local directory
//!
//! Runs the [`SyncEngine`] against the disk REST API and handles:
//! - Loading (or creating) the YAML configuration
//! - Logging to stderr and to the configured log file
//! - Printing status lines to stdout
//! - Raising Control Bus signals on config edits and on SIGTERM/SIGINT
//!
//! With `--once` a single reconciliation cycle runs and the process exits
//! with an error status if it did not complete.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{filter, fmt, prelude::*, EnvFilter};

use dirmirror_core::config::{expand_tilde, Config, FileConfigSource, LoggingConfig};
use dirmirror_core::ports::StatusLine;
use dirmirror_remote::client::DiskClient;
use dirmirror_remote::provider::DiskStorage;
use dirmirror_sync::config_watch::{ConfigWatcher, DEFAULT_DEBOUNCE};
use dirmirror_sync::control::{ControlBus, Signal};
use dirmirror_sync::engine::SyncEngine;
use dirmirror_sync::notifier::{ChannelNotifier, STATUS_TARGET};

#[derive(Debug, Parser)]
#[command(
    name = "dirmirrord",
    version,
    about = "Mirror a local directory to remote disk storage"
)]
struct Args {
    /// Use alternate config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run a single reconciliation cycle and exit
    #[arg(long)]
    once: bool,
}

// ============================================================================
// Configuration
// ============================================================================

/// Loads and validates the config file, writing defaults first if it does
/// not exist yet.
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        write_default_config(path)?;
    }

    let config = Config::load(path)?;
    let errors = config.validate();
    if !errors.is_empty() {
        let lines: Vec<String> = errors.iter().map(|e| format!("  {e}")).collect();
        bail!(
            "invalid configuration in {}:\n{}",
            path.display(),
            lines.join("\n")
        );
    }
    Ok(config)
}

fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }
    let yaml = serde_yaml::to_string(&Config::default()).context("serializing default config")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("writing default config {}", path.display()))?;
    Ok(())
}

// ============================================================================
// Logging
// ============================================================================

/// Level used when `RUST_LOG` is not set.
fn effective_level(config_level: &str, verbose: u8) -> &str {
    match verbose {
        0 => config_level,
        1 => "debug",
        _ => "trace",
    }
}

/// Installs the stderr and log-file layers.
///
/// Returns the reason the log file could not be opened, if any; logging
/// then continues on stderr only.
fn init_tracing(logging: &LoggingConfig, verbose: u8) -> Option<String> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(effective_level(&logging.level, verbose)));

    let log_path = expand_tilde(&logging.file);
    let (log_file, log_error) = match open_log_file(&log_path) {
        Ok(file) => (Some(file), None),
        Err(e) => (None, Some(format!("{e:#}"))),
    };
    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
    });

    // Status lines already reach the terminal through stdout.
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(filter::filter_fn(|meta| meta.target() != STATUS_TARGET));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    log_error
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

// ============================================================================
// Tasks
// ============================================================================

/// Prints status lines until every notifier is dropped.
async fn print_status(mut rx: mpsc::UnboundedReceiver<StatusLine>) {
    while let Some(line) = rx.recv().await {
        println!("{line}");
    }
}

/// Waits for SIGTERM or SIGINT and raises `ShutdownRequested`.
async fn shutdown_signal(control: Arc<ControlBus>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    control.raise(Signal::ShutdownRequested);
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = expand_tilde(&args.config.clone().unwrap_or_else(Config::default_path));
    let config = load_config(&config_path)?;

    if let Some(reason) = init_tracing(&config.logging, args.verbose) {
        warn!(%reason, "Logging to stderr only");
    }
    info!(config_path = %config_path.display(), "dirmirror daemon starting");

    let control = Arc::new(ControlBus::new());
    tokio::spawn(shutdown_signal(Arc::clone(&control)));

    let (notifier, status_rx) = ChannelNotifier::new();
    let printer = tokio::spawn(print_status(status_rx));

    let client = DiskClient::new(&config.remote).context("Failed to create HTTP client")?;
    let remote = Arc::new(DiskStorage::new(client));
    let source = Arc::new(FileConfigSource::new(&config_path));

    let mut engine = SyncEngine::new(
        source.clone(),
        remote,
        Arc::new(notifier),
        Arc::clone(&control),
    )?;

    let result = if args.once {
        engine
            .sync_once()
            .await
            .map(|report| {
                info!(
                    uploaded = report.uploaded,
                    deleted = report.deleted,
                    failed = report.failed,
                    "Single cycle finished"
                );
            })
            .context("Mirroring cycle did not complete")
    } else {
        let watcher =
            match ConfigWatcher::spawn(&config_path, source, Arc::clone(&control), DEFAULT_DEBOUNCE)
            {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    warn!(error = %e, "Config changes will not be picked up until restart");
                    None
                }
            };
        engine.run().await;
        if let Some(watcher) = watcher {
            watcher.stop().await;
        }
        Ok(())
    };

    // Closing the last notifier ends the printer once it has drained.
    drop(engine);
    let _ = printer.await;

    match &result {
        Ok(()) => info!("dirmirror daemon shut down gracefully"),
        Err(e) => error!(error = %e, "dirmirror daemon exiting with error"),
    }
    result
}

// ============================================================================
// Tests
// ============================================================================

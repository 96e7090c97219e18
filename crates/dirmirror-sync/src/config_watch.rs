//! Configuration file watcher
//!
//! Raises Control Bus signals when the YAML config file is edited, so a
//! running engine picks up a new token, poll interval or watched directory
//! without a restart.
//!
//! ```text
//! inotify ─→ ConfigWatcher ─→ reload + compare ─→ ControlBus::raise
//! ```
//!
//! The parent directory is watched rather than the file itself: editors
//! usually save by writing a new file and renaming it over the old one,
//! which would orphan a watch on the replaced inode.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use dirmirror_core::config::{ConfigSnapshot, ConfigSource, SnapshotChanges};

use crate::control::{ControlBus, Signal};

/// Quiet period after the last file event before the config is re-read.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Signals implied by a configuration change.
pub fn signals_for(changes: SnapshotChanges) -> Vec<Signal> {
    let mut signals = Vec::new();
    if changes.credential {
        signals.push(Signal::CredentialChanged);
    }
    if changes.poll_interval {
        signals.push(Signal::PollIntervalChanged);
    }
    if changes.local_dir {
        signals.push(Signal::WatchedFolderChanged);
    }
    signals
}

/// Watches the config file and raises Control Bus signals on edits
///
/// Dropping the watcher stops it.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl ConfigWatcher {
    /// Starts watching `path`, re-reading it through `source`.
    pub fn spawn(
        path: &Path,
        source: Arc<dyn ConfigSource>,
        control: Arc<ControlBus>,
        debounce: Duration,
    ) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .with_context(|| format!("config path has no file name: {}", path.display()))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::unbounded_channel::<()>();
        let watched_name = file_name.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if touches(&event, &watched_name) {
                        // Receiver gone means the watcher is shutting down.
                        let _ = tx.send(());
                    }
                }
                Err(err) => error!(error = %err, "Config watcher error"),
            },
            notify::Config::default(),
        )
        .context("Failed to create config watcher")?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        info!(path = %path.display(), "Watching configuration file");

        let initial = source.snapshot().ok();
        let task = tokio::spawn(reload_loop(rx, source, control, debounce, initial));

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }

    /// Stops watching and waits for the reload task to finish.
    pub async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

fn touches(event: &notify::Event, file_name: &OsString) -> bool {
    if event.kind.is_access() {
        return false;
    }
    event
        .paths
        .iter()
        .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

async fn reload_loop(
    mut rx: mpsc::UnboundedReceiver<()>,
    source: Arc<dyn ConfigSource>,
    control: Arc<ControlBus>,
    debounce: Duration,
    mut last: Option<ConfigSnapshot>,
) {
    let shutdown = control.shutdown_token();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = rx.recv() => {
                if event.is_none() {
                    break;
                }
            }
        }

        // Collapse a burst of events into one reload.
        loop {
            tokio::time::sleep(debounce).await;
            let mut more = false;
            while rx.try_recv().is_ok() {
                more = true;
            }
            if !more {
                break;
            }
        }

        match source.snapshot() {
            Ok(snapshot) => {
                let changes = match &last {
                    Some(previous) => snapshot.changes_from(previous),
                    None => SnapshotChanges {
                        credential: true,
                        poll_interval: true,
                        local_dir: true,
                    },
                };
                let signals = signals_for(changes);
                debug!(?signals, "Configuration reloaded");
                for signal in signals {
                    control.raise(signal);
                }
                last = Some(snapshot);
            }
            Err(err) => warn!(error = %err, "Ignoring invalid configuration edit"),
        }
    }
    debug!("Config watcher stopped");
}

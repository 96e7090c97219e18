//! Mirror engine: the polling control loop
//!
//! The [`SyncEngine`] owns the manifest and drives the
//! [`Reconciler`](crate::reconciler::Reconciler) once per cycle.
//!
//! ## States
//!
//! ```text
//!            ┌──────────────────────────────────────────┐
//!            ▼                                          │
//! start ─→ Idle ──(interval)──→ Authorizing ──→ Reconciling
//!            ▲    (probe until accepted)     │  (scan, diff, persist)
//!            │                               │
//!            └──────── Unauthorized ─────────┘ (back to Authorizing)
//! ```
//!
//! Every blocking point (interval wait, authorization backoff, missing
//! directory backoff, reconnect backoff) goes through the
//! [`ControlBus`] so shutdown and configuration changes cut it short.
//! Lost connectivity anywhere ends the session; the engine reports it once,
//! waits out the reconnect backoff and starts over.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use dirmirror_core::config::{ConfigSnapshot, ConfigSource};
use dirmirror_core::domain::{LocalSnapshot, Manifest, RemoteError, RemoteOutcome};
use dirmirror_core::ports::{INotifier, IRemoteStorage};

use crate::control::{ControlBus, Signal, Wake};
use crate::manifest::{ManifestError, ManifestStore};
use crate::reconciler::{CycleReport, CycleStatus, Reconciler};
use crate::scanner;
use crate::SyncError;

/// Backoff between authorization probes and directory checks.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// Backoff before restarting after lost connectivity.
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(10);

const CONNECTION_ERROR: &str = "Connection error. Check the internet connection.";
const AUTH_FAILED: &str = "Authorization failed. Please set a valid OAuth token.";
const AUTH_RESTORED: &str = "Token updated. Authorization restored.";

// ============================================================================
// EngineState
// ============================================================================

/// Observable state of the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Authorizing,
    Reconciling,
    Stopped,
}

/// Why a session ended early
#[derive(Debug, Clone, PartialEq, Eq)]
enum Halt {
    Shutdown,
    Disconnected(String),
}

type Step<T> = Result<T, Halt>;

// ============================================================================
// SyncEngine
// ============================================================================

pub struct SyncEngine {
    config: Arc<dyn ConfigSource>,
    remote: Arc<dyn IRemoteStorage>,
    notifier: Arc<dyn INotifier>,
    control: Arc<ControlBus>,
    snapshot: ConfigSnapshot,
    state: EngineState,
    retry_backoff: Duration,
    reconnect_backoff: Duration,
    /// Remote folder must be (re)created before the next reconciliation
    folder_check_pending: bool,
    /// A connection error was reported and not yet resolved
    connection_lost: bool,
    /// The credential was rejected and no cycle has completed since
    auth_rejected: bool,
}

impl SyncEngine {
    /// Creates an engine; fails if the initial configuration cannot be read.
    pub fn new(
        config: Arc<dyn ConfigSource>,
        remote: Arc<dyn IRemoteStorage>,
        notifier: Arc<dyn INotifier>,
        control: Arc<ControlBus>,
    ) -> anyhow::Result<Self> {
        let snapshot = config.snapshot()?;
        Ok(Self {
            config,
            remote,
            notifier,
            control,
            snapshot,
            state: EngineState::Idle,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
            folder_check_pending: false,
            connection_lost: false,
            auth_rejected: false,
        })
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    // ------------------------------------------------------------------------
    // Continuous mode
    // ------------------------------------------------------------------------

    /// Runs until shutdown is requested on the Control Bus.
    pub async fn run(&mut self) {
        self.notifier.info(&format!(
            "Mirroring started for directory {}",
            self.snapshot.local_dir.display()
        ));

        loop {
            match self.run_session().await {
                Ok(never) => match never {},
                Err(Halt::Shutdown) => break,
                Err(Halt::Disconnected(message)) => {
                    warn!(%message, "Connection lost, restarting");
                    if !self.connection_lost {
                        self.connection_lost = true;
                        self.notifier.error(CONNECTION_ERROR);
                    }
                    if self.control.wait(self.reconnect_backoff, &[]).await == Wake::Shutdown {
                        break;
                    }
                }
            }
        }

        self.set_state(EngineState::Stopped);
        info!("Mirror engine stopped");
    }

    async fn run_session(&mut self) -> Step<Infallible> {
        self.refresh();
        if !self.manifest_store().is_initialized().await {
            self.authorize_and_reconcile().await?;
        }
        loop {
            self.idle().await?;
            self.authorize_and_reconcile().await?;
        }
    }

    /// Authorizing then Reconciling, repeated while the cycle ends
    /// unauthorized.
    ///
    /// A 401 in the middle of a cycle is treated like a rejected probe: it
    /// is reported once and the next attempt waits out the retry backoff.
    async fn authorize_and_reconcile(&mut self) -> Step<()> {
        loop {
            self.authorize().await?;
            let local = self.scan_until_available().await?;
            let report = self.run_cycle(local).await?;
            match report.status {
                CycleStatus::Completed => {
                    if self.auth_rejected {
                        self.auth_rejected = false;
                        self.notifier.info(AUTH_RESTORED);
                    }
                    return Ok(());
                }
                CycleStatus::Unauthorized => {
                    warn!("Credential rejected mid-cycle");
                    self.reject_credential();
                    self.auth_backoff().await?;
                }
                CycleStatus::Cancelled => return Err(Halt::Shutdown),
                CycleStatus::Disconnected(message) => return Err(Halt::Disconnected(message)),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Idle
    // ------------------------------------------------------------------------

    /// Waits out the poll interval. An interval change ends the wait early
    /// so the next cycle runs at once; later waits use the new value.
    async fn idle(&mut self) -> Step<()> {
        self.set_state(EngineState::Idle);
        let interval = self.snapshot.poll_interval();
        debug!(interval_ms = interval.as_millis() as u64, "Waiting for next cycle");
        match self
            .control
            .wait(interval, &[Signal::PollIntervalChanged])
            .await
        {
            Wake::Elapsed => Ok(()),
            Wake::Shutdown => Err(Halt::Shutdown),
            Wake::Signal(_) => {
                self.control.take(Signal::PollIntervalChanged);
                self.refresh();
                info!(
                    interval_secs = self.snapshot.poll_interval,
                    "Poll interval changed"
                );
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Authorizing
    // ------------------------------------------------------------------------

    /// Probes until the credential is accepted.
    ///
    /// After a rejection (by a probe or mid-cycle) the first probe waits out
    /// the retry backoff unless the credential changed in the meantime.
    async fn authorize(&mut self) -> Step<()> {
        self.set_state(EngineState::Authorizing);
        loop {
            if self.control.shutdown_requested() {
                return Err(Halt::Shutdown);
            }
            self.refresh();

            let target = self.snapshot.remote_target();
            match self.remote.probe(&target).await {
                Ok(outcome) if outcome.is_unauthorized() => {
                    self.reject_credential();
                    self.connection_restored();
                    self.auth_backoff().await?;
                }
                Ok(outcome) => {
                    debug!(%outcome, "Credential accepted");
                    self.connection_restored();
                    return Ok(());
                }
                Err(err) if err.is_connectivity() => {
                    return Err(Halt::Disconnected(err.to_string()));
                }
                Err(other) => {
                    // Anything but an explicit 401 counts as accepted.
                    warn!(error = %other, "Probe failed without a status");
                    self.connection_restored();
                    return Ok(());
                }
            }
        }
    }

    /// Reports a rejected credential once per rejection episode.
    fn reject_credential(&mut self) {
        if !self.auth_rejected {
            self.auth_rejected = true;
            self.notifier.error(AUTH_FAILED);
        }
    }

    /// Waits the retry backoff, cut short by a credential change.
    async fn auth_backoff(&self) -> Step<()> {
        match self
            .control
            .wait(self.retry_backoff, &[Signal::CredentialChanged])
            .await
        {
            Wake::Shutdown => Err(Halt::Shutdown),
            _ => Ok(()),
        }
    }

    fn connection_restored(&mut self) {
        if self.connection_lost {
            self.connection_lost = false;
            self.notifier.info("Connection restored.");
        }
    }

    // ------------------------------------------------------------------------
    // Reconciling
    // ------------------------------------------------------------------------

    /// Scans the watched directory, waiting while it is unavailable.
    async fn scan_until_available(&mut self) -> Step<LocalSnapshot> {
        self.set_state(EngineState::Reconciling);
        let mut reported = false;
        loop {
            self.refresh();
            let exclude = self.snapshot.manifest_file_name().map(str::to_string);
            match scanner::scan(&self.snapshot.local_dir, exclude.as_deref()).await {
                Ok(local) => {
                    debug!(
                        files = local.len(),
                        bytes = local.total_bytes(),
                        "Local directory scanned"
                    );
                    if reported {
                        self.notifier.info(&format!(
                            "Local directory available: {}",
                            self.snapshot.local_dir.display()
                        ));
                    }
                    return Ok(local);
                }
                Err(err) => {
                    if !reported {
                        reported = true;
                        self.notifier.error(&format!(
                            "{err}. Set an existing directory to mirror."
                        ));
                    }
                    if self
                        .control
                        .wait(self.retry_backoff, &[Signal::WatchedFolderChanged])
                        .await
                        == Wake::Shutdown
                    {
                        return Err(Halt::Shutdown);
                    }
                }
            }
        }
    }

    /// One reconciliation cycle over an already scanned snapshot.
    ///
    /// Persists the working manifest whatever the cycle status, except when
    /// it never started.
    async fn run_cycle(&mut self, local: LocalSnapshot) -> Step<CycleReport> {
        self.set_state(EngineState::Reconciling);
        let store = self.manifest_store();
        let target = self.snapshot.remote_target();

        let previous = match store.load_existing().await {
            Ok(previous) => previous,
            Err(err @ ManifestError::Corrupt { .. }) => {
                error!(error = %err, "Manifest unreadable, rebuilding");
                self.notifier
                    .error("Manifest is corrupt; rebuilding it from the local directory.");
                None
            }
            Err(err) => {
                self.notifier.error(&format!("Cannot read manifest: {err}"));
                return Ok(CycleReport::new(Manifest::new()));
            }
        };

        let bootstrap = previous.is_none();
        if bootstrap {
            self.notifier.info("Initializing new manifest.");
            self.folder_check_pending = true;
        }
        if self.folder_check_pending {
            if let Some(status) = self.ensure_folder().await? {
                let mut report = CycleReport::new(previous.unwrap_or_default());
                report.status = status;
                return Ok(report);
            }
        }

        let reconciler = Reconciler::new(self.remote.clone(), self.notifier.clone())
            .with_shutdown(self.control.shutdown_token());
        let report = match &previous {
            Some(previous) => {
                reconciler
                    .reconcile(&target, &self.snapshot.local_dir, previous, &local)
                    .await
            }
            None => {
                reconciler
                    .bootstrap(&target, &self.snapshot.local_dir, &local)
                    .await
            }
        };

        if let Err(err) = store.save(&report.manifest).await {
            error!(path = %store.path().display(), error = %err, "Manifest not saved");
            self.notifier.error(&format!("Failed to save manifest: {err}"));
        } else if bootstrap && report.is_completed() {
            self.notifier.info("Manifest initialized.");
        }

        if report.is_completed() {
            self.connection_restored();
        }
        Ok(report)
    }

    /// Creates the remote folder. Returns a status only when the cycle
    /// cannot go on.
    async fn ensure_folder(&mut self) -> Step<Option<CycleStatus>> {
        let target = self.snapshot.remote_target();
        match self.remote.ensure_folder(&target).await {
            Ok(RemoteOutcome::Created) => {
                self.notifier
                    .info(&format!("Remote folder {} created.", target.folder_path()));
                self.folder_check_pending = false;
                Ok(None)
            }
            Ok(RemoteOutcome::AlreadyExists) => {
                debug!(folder = target.folder(), "Remote folder exists");
                self.folder_check_pending = false;
                Ok(None)
            }
            Ok(RemoteOutcome::Unauthorized) => Ok(Some(CycleStatus::Unauthorized)),
            Ok(other) => {
                self.notifier.error(&format!(
                    "Failed to create remote folder {}: {other}",
                    target.folder_path()
                ));
                Ok(None)
            }
            Err(RemoteError::Connectivity(message)) => Err(Halt::Disconnected(message)),
            Err(other) => {
                self.notifier.error(&format!(
                    "Failed to create remote folder {}: {other}",
                    target.folder_path()
                ));
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------------
    // One-shot mode
    // ------------------------------------------------------------------------

    /// Runs a single probe and reconciliation cycle.
    pub async fn sync_once(&mut self) -> Result<CycleReport, SyncError> {
        self.refresh();
        let target = self.snapshot.remote_target();

        match self.remote.probe(&target).await {
            Ok(RemoteOutcome::Unauthorized) => return Err(SyncError::Unauthorized),
            Ok(_) => {}
            Err(RemoteError::Connectivity(message)) => {
                return Err(SyncError::Disconnected(message))
            }
            Err(other) => return Err(other.into()),
        }

        self.set_state(EngineState::Reconciling);
        let exclude = self.snapshot.manifest_file_name().map(str::to_string);
        let local = scanner::scan(&self.snapshot.local_dir, exclude.as_deref()).await?;

        let result = match self.run_cycle(local).await {
            Ok(report) => match &report.status {
                CycleStatus::Completed => Ok(report),
                CycleStatus::Unauthorized => Err(SyncError::Unauthorized),
                CycleStatus::Disconnected(message) => {
                    Err(SyncError::Disconnected(message.clone()))
                }
                CycleStatus::Cancelled => Err(SyncError::Cancelled),
            },
            Err(Halt::Disconnected(message)) => Err(SyncError::Disconnected(message)),
            Err(Halt::Shutdown) => Err(SyncError::Cancelled),
        };
        self.set_state(EngineState::Stopped);
        result
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Re-reads the configuration and consumes the change signals it covers.
    fn refresh(&mut self) {
        self.control.take(Signal::CredentialChanged);
        let folder_signalled = self.control.take(Signal::WatchedFolderChanged);

        match self.config.snapshot() {
            Ok(snapshot) => {
                let changes = snapshot.changes_from(&self.snapshot);
                if changes.local_dir {
                    info!(dir = %snapshot.local_dir.display(), "Watched directory changed");
                    self.notifier.info(&format!(
                        "Local directory set to {}",
                        snapshot.local_dir.display()
                    ));
                }
                if changes.local_dir || folder_signalled {
                    self.folder_check_pending = true;
                }
                self.snapshot = snapshot;
            }
            Err(err) => {
                warn!(error = %err, "Configuration unreadable, keeping previous settings");
                if folder_signalled {
                    self.folder_check_pending = true;
                }
            }
        }
    }

    fn manifest_store(&self) -> ManifestStore {
        ManifestStore::new(&self.snapshot.manifest_path)
    }

    fn set_state(&mut self, state: EngineState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Engine state change");
            self.state = state;
        }
    }
}

//! Reconciler: replays a manifest/snapshot diff against remote storage
//!
//! ## Passes
//!
//! Work runs in a fixed order, one remote call at a time:
//!
//! 1. **Removed** - `delete`; `Deleted` and `NotFound` drop the entry
//! 2. **Modified** - `upload(overwrite = true)`; applied outcomes record the
//!    new size, failures keep the stale size so the file is retried
//! 3. **Added** - `upload(overwrite = false)`; applied outcomes add the
//!    entry, failures leave it out so the file is retried
//!
//! The working manifest only ever records confirmed remote state. A per-item
//! failure never stops a pass; `Unauthorized` and lost connectivity abort
//! the whole cycle and are returned in [`CycleReport::status`] for the
//! control loop to handle.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dirmirror_core::domain::{
    Diff, LocalSnapshot, Manifest, RemoteError, RemoteOutcome, RemoteTarget,
};
use dirmirror_core::ports::{INotifier, IRemoteStorage};

// ============================================================================
// CycleReport
// ============================================================================

/// How a reconciliation cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleStatus {
    /// Every pass ran to the end (individual items may still have failed)
    Completed,
    /// The credential was rejected mid-cycle
    Unauthorized,
    /// The service became unreachable mid-cycle
    Disconnected(String),
    /// Shutdown was requested mid-cycle
    Cancelled,
}

/// Result of one reconciliation cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Working manifest to persist, valid even when the cycle was aborted
    pub manifest: Manifest,
    pub status: CycleStatus,
    /// Files created or overwritten remotely (including `AlreadyExists`)
    pub uploaded: usize,
    /// Files removed remotely (including `NotFound`)
    pub deleted: usize,
    /// Items left for the next cycle
    pub failed: usize,
}

impl CycleReport {
    /// A completed report with no work done.
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            status: CycleStatus::Completed,
            uploaded: 0,
            deleted: 0,
            failed: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == CycleStatus::Completed
    }

    /// Number of remote mutations that took effect.
    pub fn changes(&self) -> usize {
        self.uploaded + self.deleted
    }
}

/// What happened to a single item
enum Step {
    Applied,
    Failed,
    Halt(CycleStatus),
}

// ============================================================================
// Reconciler
// ============================================================================

/// Executes diffs against an [`IRemoteStorage`]
pub struct Reconciler {
    remote: Arc<dyn IRemoteStorage>,
    notifier: Arc<dyn INotifier>,
    shutdown: Option<CancellationToken>,
}

impl Reconciler {
    pub fn new(remote: Arc<dyn IRemoteStorage>, notifier: Arc<dyn INotifier>) -> Self {
        Self {
            remote,
            notifier,
            shutdown: None,
        }
    }

    /// Stops between items once `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Runs the three passes for `previous` against `local`.
    ///
    /// `local_dir` is where the files named in `local` are read from.
    #[tracing::instrument(skip_all, fields(folder = target.folder()))]
    pub async fn reconcile(
        &self,
        target: &RemoteTarget,
        local_dir: &Path,
        previous: &Manifest,
        local: &LocalSnapshot,
    ) -> CycleReport {
        let diff = Diff::compute(previous, local);
        let mut report = CycleReport::new(previous.clone());
        if diff.is_empty() {
            debug!("No changes detected");
            return report;
        }
        info!(
            changes = diff.len(),
            removed = diff.removed.len(),
            modified = diff.modified.len(),
            added = diff.added.len(),
            "Reconciling changes"
        );

        let mut halt = self.removed_pass(target, &diff.removed, &mut report).await;
        if halt.is_none() {
            halt = self
                .upload_pass(target, local_dir, &diff.modified, local, true, &mut report)
                .await;
        }
        if halt.is_none() {
            halt = self
                .upload_pass(target, local_dir, &diff.added, local, false, &mut report)
                .await;
        }

        if let Some(status) = halt {
            warn!(?status, "Cycle aborted");
            report.status = status;
        }
        info!(
            uploaded = report.uploaded,
            deleted = report.deleted,
            failed = report.failed,
            "Reconciliation finished"
        );
        report
    }

    /// Reconciles against an empty manifest: every local file is uploaded.
    pub async fn bootstrap(
        &self,
        target: &RemoteTarget,
        local_dir: &Path,
        local: &LocalSnapshot,
    ) -> CycleReport {
        self.reconcile(target, local_dir, &Manifest::new(), local)
            .await
    }

    fn cancelled(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }

    async fn removed_pass(
        &self,
        target: &RemoteTarget,
        names: &[String],
        report: &mut CycleReport,
    ) -> Option<CycleStatus> {
        for name in names {
            if self.cancelled() {
                return Some(CycleStatus::Cancelled);
            }
            self.notifier.info(&format!("Detected removed file {name}"));
            let step = match self.remote.delete(target, name).await {
                Ok(RemoteOutcome::Deleted) => {
                    self.notifier.info(&format!("Deleted remote file {name}"));
                    Step::Applied
                }
                Ok(RemoteOutcome::NotFound) => {
                    self.notifier.info(&format!(
                        "File {name} not found on remote storage; dropping it from the manifest"
                    ));
                    Step::Applied
                }
                Ok(RemoteOutcome::Unauthorized) => Step::Halt(CycleStatus::Unauthorized),
                Ok(other) => {
                    self.notifier
                        .error(&format!("Failed to delete remote file {name}: {other}"));
                    Step::Failed
                }
                Err(err) => self.remote_error(name, err),
            };
            match step {
                Step::Applied => {
                    report.manifest.remove(name);
                    report.deleted += 1;
                }
                Step::Failed => report.failed += 1,
                Step::Halt(status) => return Some(status),
            }
        }
        None
    }

    async fn upload_pass(
        &self,
        target: &RemoteTarget,
        local_dir: &Path,
        names: &[String],
        local: &LocalSnapshot,
        overwrite: bool,
        report: &mut CycleReport,
    ) -> Option<CycleStatus> {
        for name in names {
            if self.cancelled() {
                return Some(CycleStatus::Cancelled);
            }
            let Some(size) = local.get(name) else {
                continue;
            };
            if overwrite {
                self.notifier.info(&format!("Detected change in file {name}"));
            } else {
                self.notifier.info(&format!("Detected new file {name}"));
            }

            let path = local_dir.join(name);
            let step = match self.remote.upload(target, &path, name, overwrite).await {
                Ok(RemoteOutcome::Created) | Ok(RemoteOutcome::Overwritten) => {
                    let verb = if overwrite { "Overwrote" } else { "Uploaded" };
                    self.notifier.info(&format!("{verb} file {name}"));
                    Step::Applied
                }
                Ok(RemoteOutcome::AlreadyExists) => {
                    self.notifier.info(&format!(
                        "File {name} is already on remote storage; updating the manifest"
                    ));
                    Step::Applied
                }
                Ok(RemoteOutcome::Unauthorized) => Step::Halt(CycleStatus::Unauthorized),
                Ok(RemoteOutcome::PayloadTooLarge) => {
                    self.notifier
                        .error(&format!("File {name} is too large for remote storage"));
                    Step::Failed
                }
                Ok(RemoteOutcome::StorageFull) => {
                    self.notifier
                        .error(&format!("Remote storage is full; {name} was not uploaded"));
                    Step::Failed
                }
                Ok(other) => {
                    self.notifier
                        .error(&format!("Failed to upload {name}: {other}"));
                    Step::Failed
                }
                Err(err) => self.remote_error(name, err),
            };
            match step {
                Step::Applied => {
                    report.manifest.insert(name.as_str(), size);
                    report.uploaded += 1;
                }
                Step::Failed => report.failed += 1,
                Step::Halt(status) => return Some(status),
            }
        }
        None
    }

    fn remote_error(&self, name: &str, err: RemoteError) -> Step {
        match err {
            RemoteError::Connectivity(message) => {
                warn!(file = name, %message, "Connectivity lost mid-cycle");
                Step::Halt(CycleStatus::Disconnected(message))
            }
            other => {
                self.notifier.error(&format!("Failed to sync {name}: {other}"));
                Step::Failed
            }
        }
    }
}

//! dirmirror Sync - One-way reconciliation engine
//!
//! Provides:
//! - Local directory scanning into a name/size snapshot
//! - A durable, atomically rewritten manifest of mirrored files
//! - The three-pass reconciler (removed, modified, added)
//! - The control loop reacting to credential, interval and folder changes
//!
//! ## Modules
//!
//! - [`scanner`] - Flat directory listing, manifest file excluded
//! - [`manifest`] - Manifest persistence (JSON, temp file + rename)
//! - [`reconciler`] - Diff execution against an `IRemoteStorage`
//! - [`control`] - Control Bus signals and interruptible waits
//! - [`notifier`] - Channel-backed `INotifier`
//! - [`config_watch`] - Raises Control Bus signals when the config file changes
//! - [`engine`] - The `Idle -> Authorizing -> Reconciling` control loop

pub mod config_watch;
pub mod control;
pub mod engine;
pub mod manifest;
pub mod notifier;
pub mod reconciler;
pub mod scanner;

use thiserror::Error;

use dirmirror_core::domain::errors::RemoteError;

pub use manifest::ManifestError;
pub use scanner::ScanError;

/// Errors surfaced by one-shot synchronization runs
#[derive(Debug, Error)]
pub enum SyncError {
    /// The watched directory is missing or unreadable
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The manifest could not be read or written
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The remote service rejected the credential
    #[error("Unauthorized: check the OAuth token")]
    Unauthorized,

    /// The remote service could not be reached
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// A remote call failed for another reason
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Shutdown was requested before the run finished
    #[error("Shutdown requested")]
    Cancelled,
}

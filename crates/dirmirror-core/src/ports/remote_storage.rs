//! Remote storage port (driven/secondary port)
//!
//! The interface the reconciler uses to mutate the remote folder. The
//! production implementation talks to a Yandex.Disk style REST API; tests
//! use scripted in-memory implementations.
//!
//! ## Design Notes
//!
//! - Every method takes the [`RemoteTarget`] of the current configuration
//!   snapshot, so a credential or folder change takes effect on the next call.
//! - HTTP statuses are classified into [`RemoteOutcome`]; only failures that
//!   produced no status (or an unreadable one) use [`RemoteError`].
//! - Uses `#[async_trait]` for async trait methods.

use std::path::Path;

use crate::domain::{RemoteError, RemoteOutcome, RemoteTarget};

// ============================================================================
// IRemoteStorage trait
// ============================================================================

#[async_trait::async_trait]
pub trait IRemoteStorage: Send + Sync {
    /// Creates the target folder if it does not exist yet.
    ///
    /// `Created` or `AlreadyExists` on success.
    async fn ensure_folder(&self, target: &RemoteTarget) -> Result<RemoteOutcome, RemoteError>;

    /// Uploads the local file at `local_path` as `file_name` in the folder.
    ///
    /// With `overwrite == false` an existing remote file yields
    /// `AlreadyExists`; with `overwrite == true` it is replaced and the
    /// result is `Overwritten`.
    async fn upload(
        &self,
        target: &RemoteTarget,
        local_path: &Path,
        file_name: &str,
        overwrite: bool,
    ) -> Result<RemoteOutcome, RemoteError>;

    /// Deletes `file_name` from the folder. A missing file is `NotFound`.
    async fn delete(
        &self,
        target: &RemoteTarget,
        file_name: &str,
    ) -> Result<RemoteOutcome, RemoteError>;

    /// Cheap authenticated request used to check the credential.
    ///
    /// Returns `Unauthorized` when the credential is rejected; any other
    /// outcome means the credential is accepted.
    async fn probe(&self, target: &RemoteTarget) -> Result<RemoteOutcome, RemoteError>;
}

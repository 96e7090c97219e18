//! Local scanner: flat listing of the watched directory
//!
//! Produces a [`LocalSnapshot`] of regular files directly inside the
//! directory (symlinks are followed, subdirectories ignored). The manifest's
//! own file name is always excluded so the mirror never uploads its state.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument, warn};

use dirmirror_core::domain::LocalSnapshot;

/// Errors raised while scanning the watched directory
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// The directory is missing, not a directory, or unreadable.
    /// Recoverable: the engine waits for it to come back.
    #[error("Directory unavailable: {path}: {reason}")]
    DirectoryUnavailable {
        /// The configured directory
        path: PathBuf,
        /// Why it could not be listed
        reason: String,
    },
}

fn unavailable(path: &Path, reason: impl Into<String>) -> ScanError {
    ScanError::DirectoryUnavailable {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Lists regular files directly inside `dir` with their sizes.
///
/// Entries that disappear during the scan or whose names are not valid
/// UTF-8 are skipped. `exclude` names a file that is never reported.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub async fn scan(dir: &Path, exclude: Option<&str>) -> Result<LocalSnapshot, ScanError> {
    if dir.as_os_str().is_empty() {
        return Err(unavailable(dir, "no directory configured"));
    }

    let metadata = tokio::fs::metadata(dir)
        .await
        .map_err(|e| unavailable(dir, e.to_string()))?;
    if !metadata.is_dir() {
        return Err(unavailable(dir, "not a directory"));
    }

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| unavailable(dir, e.to_string()))?;

    let mut snapshot = LocalSnapshot::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => return Err(unavailable(dir, e.to_string())),
        };

        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!(name = ?raw, "Skipping file with non UTF-8 name");
                continue;
            }
        };
        if exclude == Some(name.as_str()) {
            continue;
        }

        // Follows symlinks, like a plain stat of the path.
        match tokio::fs::metadata(entry.path()).await {
            Ok(meta) if meta.is_file() => {
                snapshot.insert(name, meta.len());
            }
            Ok(_) => {}
            Err(e) => debug!(file = %name, error = %e, "Entry vanished during scan"),
        }
    }

    debug!(files = snapshot.len(), "Scan complete");
    Ok(snapshot)
}

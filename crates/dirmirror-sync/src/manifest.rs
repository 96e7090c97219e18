//! Manifest store: durable record of mirrored files
//!
//! The manifest is a flat JSON object of file name to size, pretty-printed
//! with four-space indentation. It is rewritten in full on every save:
//! the new content goes to a sibling temporary file which is flushed,
//! fsynced and then renamed over the destination, so a crash leaves either
//! the old or the new manifest, never a torn one.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use dirmirror_core::domain::Manifest;

/// Errors raised by the manifest store
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Reading or writing the manifest file failed
    #[error("Manifest I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The manifest file exists but is not a valid name/size object
    #[error("Manifest at {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// Reads and atomically rewrites the manifest file.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the manifest if one has been written.
    ///
    /// Returns `None` when the file is missing or empty.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load_existing(&self) -> Result<Option<Manifest>, ManifestError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ManifestError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let manifest: Manifest =
            serde_json::from_slice(&content).map_err(|e| ManifestError::Corrupt {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        debug!(entries = manifest.len(), "Manifest loaded");
        Ok(Some(manifest))
    }

    /// Whether a non-empty manifest file exists.
    pub async fn is_initialized(&self) -> bool {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        }
    }

    /// Replaces the manifest with `manifest`.
    #[instrument(skip_all, fields(path = %self.path.display(), entries = manifest.len()))]
    pub async fn save(&self, manifest: &Manifest) -> Result<(), ManifestError> {
        let bytes = to_pretty_json(manifest).map_err(|e| ManifestError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(source))?;
        }

        let tmp_path = self.temp_path();
        if let Err(source) = write_synced(&tmp_path, &bytes).await {
            discard(&tmp_path).await;
            return Err(self.io_error(source));
        }
        if let Err(source) = tokio::fs::rename(&tmp_path, &self.path).await {
            discard(&tmp_path).await;
            return Err(self.io_error(source));
        }

        debug!("Manifest saved");
        Ok(())
    }

    /// Sibling `.<name>.tmp` in the same directory, so rename stays on one
    /// filesystem.
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "manifest".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    fn io_error(&self, source: io::Error) -> ManifestError {
        ManifestError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn to_pretty_json(manifest: &Manifest) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    manifest.serialize(&mut ser)?;
    Ok(out)
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove temporary manifest");
        }
    }
}

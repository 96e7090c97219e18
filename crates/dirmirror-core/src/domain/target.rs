//! Remote target: where and as whom a remote call is made

use std::path::Path;

use super::errors::DomainError;

/// Credential and remote folder for one remote call.
///
/// Built from the latest configuration snapshot, so every call sees the
/// current token and folder.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    credential: String,
    folder: String,
}

impl RemoteTarget {
    pub fn new(credential: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            folder: folder.into().trim_matches('/').to_string(),
        }
    }

    /// Derives the target for a watched directory: the remote folder is the
    /// directory's final path component (empty for `/`).
    pub fn for_local_dir(credential: impl Into<String>, local_dir: &Path) -> Self {
        let folder = local_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(credential, folder)
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// True when files go straight into the storage root.
    pub fn is_root(&self) -> bool {
        self.folder.is_empty()
    }

    /// Remote path of the folder, e.g. `/Photos`, or `/` for the root.
    pub fn folder_path(&self) -> String {
        format!("/{}", self.folder)
    }

    /// Remote path of a file inside the folder, e.g. `/Photos/a.jpg`.
    pub fn file_path(&self, file_name: &str) -> Result<String, DomainError> {
        if file_name.is_empty() || file_name.contains('/') || file_name == "." || file_name == ".."
        {
            return Err(DomainError::InvalidFileName(file_name.to_string()));
        }
        if self.is_root() {
            Ok(format!("/{file_name}"))
        } else {
            Ok(format!("/{}/{}", self.folder, file_name))
        }
    }
}

// Keep the token out of logs.
impl std::fmt::Debug for RemoteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTarget")
            .field("credential", &"<redacted>")
            .field("folder", &self.folder)
            .finish()
    }
}

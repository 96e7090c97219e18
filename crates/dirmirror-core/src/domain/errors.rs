//! Domain error types
//!
//! [`DomainError`] covers validation of names and paths handled by the core.
//! [`RemoteError`] is the error channel of the remote storage port: anything
//! that prevented a remote call from producing a classified
//! [`RemoteOutcome`](super::RemoteOutcome).

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A file name that cannot be mirrored into a flat remote folder
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),
}

/// Failures of a remote call that are not an HTTP status classification
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The service could not be reached (DNS, refused, reset, timeout)
    #[error("Connection error: {0}")]
    Connectivity(String),

    /// The service answered with a body the client could not interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The local file to upload could not be read
    #[error("Cannot read local file {path}: {message}")]
    LocalFile {
        /// Path of the file that failed
        path: PathBuf,
        /// Underlying I/O error text
        message: String,
    },

    /// The request could not be formed from the given names
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl RemoteError {
    /// Returns true for failures that should abort the cycle and restart
    /// the control loop.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, RemoteError::Connectivity(_))
    }
}

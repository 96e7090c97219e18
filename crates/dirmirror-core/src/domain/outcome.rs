//! Classified results of remote storage calls

use std::fmt;

/// Outcome of a remote call that reached the service.
///
/// Transport failures are not outcomes; they travel on the error channel as
/// [`RemoteError::Connectivity`](super::RemoteError::Connectivity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// A new file or folder was created
    Created,
    /// An existing file was replaced
    Overwritten,
    /// The file or folder was already present; treated as applied
    AlreadyExists,
    /// The file was deleted (or scheduled for deletion)
    Deleted,
    /// The file to delete did not exist; treated as applied
    NotFound,
    /// The credential was rejected
    Unauthorized,
    /// The file exceeds the service's size limit
    PayloadTooLarge,
    /// The account has no space left
    StorageFull,
    /// Any other status
    ServerError {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },
}

impl RemoteOutcome {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RemoteOutcome::Unauthorized)
    }
}

impl fmt::Display for RemoteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteOutcome::Created => write!(f, "created"),
            RemoteOutcome::Overwritten => write!(f, "overwritten"),
            RemoteOutcome::AlreadyExists => write!(f, "already exists"),
            RemoteOutcome::Deleted => write!(f, "deleted"),
            RemoteOutcome::NotFound => write!(f, "not found"),
            RemoteOutcome::Unauthorized => write!(f, "unauthorized"),
            RemoteOutcome::PayloadTooLarge => write!(f, "file too large"),
            RemoteOutcome::StorageFull => write!(f, "storage full"),
            RemoteOutcome::ServerError { status, body } if body.is_empty() => {
                write!(f, "server error {status}")
            }
            RemoteOutcome::ServerError { status, body } => {
                write!(f, "server error {status}: {body}")
            }
        }
    }
}

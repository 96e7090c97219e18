//! dirmirror Remote - Disk REST API client
//!
//! Provides the HTTPS adapter behind the `IRemoteStorage` port:
//! - Authenticated requests (`Authorization: OAuth <token>`)
//! - Folder creation, deletion and authorization probes on `/resources`
//! - Two-step uploads through `/resources/upload` and a streamed `PUT`
//!
//! ## Modules
//!
//! - [`client`] - HTTP client, base URL and request construction
//! - [`upload`] - Upload link negotiation and streamed file transfer
//! - [`provider`] - [`provider::DiskStorage`], the `IRemoteStorage` implementation

pub mod client;
pub mod provider;
pub mod upload;

use dirmirror_core::domain::{RemoteError, RemoteOutcome};
use reqwest::Response;
use thiserror::Error;

/// Longest response body kept in a [`RemoteOutcome::ServerError`].
const MAX_ERROR_BODY: usize = 512;

/// Errors raised while constructing the client
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP client could not be built (TLS backend, invalid settings)
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),

    /// The configured base URL is unusable
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Maps a transport-level reqwest error onto the port's error channel.
///
/// Undecodable bodies are `InvalidResponse`; everything else (connect,
/// timeout, reset, redirect loops) is treated as lost connectivity.
pub(crate) fn transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_decode() {
        RemoteError::InvalidResponse(err.to_string())
    } else {
        RemoteError::Connectivity(err.to_string())
    }
}

/// Builds a `ServerError` outcome from an unexpected response.
pub(crate) async fn unexpected_status(response: Response) -> RemoteOutcome {
    let status = response.status().as_u16();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    RemoteOutcome::ServerError { status, body }
}

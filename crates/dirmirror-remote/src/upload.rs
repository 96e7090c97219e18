//! Upload operations for the disk API
//!
//! An upload is two requests:
//! 1. [`request_upload_link`] - `GET /resources/upload?path=..&overwrite=..`
//!    returns a one-time `href` (or a status that already decides the outcome)
//! 2. [`put_file`] - streams the local file to `href` with `PUT`
//!
//! While the storage side is still processing the file it answers
//! `202 Accepted`; [`upload_file`] repeats the `PUT` after
//! [`DiskClient::processing_retry_delay`] until a final status arrives.

use std::path::Path;

use dirmirror_core::domain::{RemoteError, RemoteOutcome, RemoteTarget};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, Method, StatusCode};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::client::{DiskClient, UPLOAD_ENDPOINT};
use crate::{transport_error, unexpected_status};

// ============================================================================
// API response types
// ============================================================================

/// Response of `GET /resources/upload`
#[derive(Debug, Deserialize)]
struct UploadLinkResponse {
    /// One-time URL the file body is sent to
    href: String,
    /// HTTP method to use with `href` (always `PUT` in practice)
    #[serde(default)]
    method: Option<String>,
}

/// Result of asking for an upload link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadLink {
    /// Proceed by sending the file to this URL
    Href(String),
    /// The service already decided the outcome (exists, unauthorized, ...)
    Decided(RemoteOutcome),
}

/// Result of a single `PUT` of the file body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutStatus {
    /// `202 Accepted`: the file is still being processed
    Processing,
    /// `201 Created`
    Stored,
    /// Any other classified status
    Rejected(RemoteOutcome),
}

// ============================================================================
// request_upload_link
// ============================================================================

/// Asks the API where to send the file body.
///
/// | Status | Result |
/// |--------|--------|
/// | 200    | `Href` |
/// | 401    | `Unauthorized` |
/// | 409    | `AlreadyExists` |
/// | 413    | `PayloadTooLarge` |
/// | 507    | `StorageFull` |
/// | other  | `ServerError` |
pub async fn request_upload_link(
    client: &DiskClient,
    target: &RemoteTarget,
    file_name: &str,
    overwrite: bool,
) -> Result<UploadLink, RemoteError> {
    let remote_path = target.file_path(file_name)?;
    debug!(path = %remote_path, overwrite, "Requesting upload link");

    let response = client
        .request(Method::GET, UPLOAD_ENDPOINT, target.credential())
        .query(&[
            ("path", remote_path.as_str()),
            ("overwrite", if overwrite { "true" } else { "false" }),
        ])
        .send()
        .await
        .map_err(transport_error)?;

    let link = match response.status() {
        StatusCode::OK => {
            let body: UploadLinkResponse = response.json().await.map_err(|e| {
                RemoteError::InvalidResponse(format!("upload link response: {e}"))
            })?;
            if let Some(method) = body.method.as_deref() {
                if !method.eq_ignore_ascii_case("PUT") {
                    warn!(method, "Upload link expects a method other than PUT");
                }
            }
            UploadLink::Href(body.href)
        }
        StatusCode::UNAUTHORIZED => UploadLink::Decided(RemoteOutcome::Unauthorized),
        StatusCode::CONFLICT => UploadLink::Decided(RemoteOutcome::AlreadyExists),
        StatusCode::PAYLOAD_TOO_LARGE => UploadLink::Decided(RemoteOutcome::PayloadTooLarge),
        StatusCode::INSUFFICIENT_STORAGE => UploadLink::Decided(RemoteOutcome::StorageFull),
        _ => UploadLink::Decided(unexpected_status(response).await),
    };
    Ok(link)
}

// ============================================================================
// put_file
// ============================================================================

/// Streams the file at `local_path` to the upload link.
///
/// The file is opened fresh on every call so a retried `PUT` always sends
/// the complete body.
pub async fn put_file(
    client: &DiskClient,
    href: &str,
    local_path: &Path,
) -> Result<PutStatus, RemoteError> {
    let local_error = |e: std::io::Error| RemoteError::LocalFile {
        path: local_path.to_path_buf(),
        message: e.to_string(),
    };

    let file = tokio::fs::File::open(local_path).await.map_err(local_error)?;
    let size = file.metadata().await.map_err(local_error)?.len();
    let body = Body::wrap_stream(ReaderStream::new(file));

    debug!(bytes = size, path = %local_path.display(), "Sending file body");
    let response = client
        .http_client()
        .put(href)
        .header(CONTENT_LENGTH, size)
        .body(body)
        .send()
        .await
        .map_err(transport_error)?;

    let status = match response.status() {
        StatusCode::CREATED => PutStatus::Stored,
        StatusCode::ACCEPTED => PutStatus::Processing,
        StatusCode::PAYLOAD_TOO_LARGE => PutStatus::Rejected(RemoteOutcome::PayloadTooLarge),
        StatusCode::INSUFFICIENT_STORAGE => PutStatus::Rejected(RemoteOutcome::StorageFull),
        StatusCode::UNAUTHORIZED => PutStatus::Rejected(RemoteOutcome::Unauthorized),
        _ => PutStatus::Rejected(unexpected_status(response).await),
    };
    Ok(status)
}

// ============================================================================
// upload_file
// ============================================================================

/// Uploads one file: link negotiation, then the body until it is stored.
///
/// # Returns
/// `Created`, or `Overwritten` when `overwrite` was requested; otherwise
/// the outcome that stopped the upload.
pub async fn upload_file(
    client: &DiskClient,
    target: &RemoteTarget,
    local_path: &Path,
    file_name: &str,
    overwrite: bool,
) -> Result<RemoteOutcome, RemoteError> {
    let href = match request_upload_link(client, target, file_name, overwrite).await? {
        UploadLink::Href(href) => href,
        UploadLink::Decided(outcome) => {
            debug!(file = file_name, %outcome, "Upload decided before transfer");
            return Ok(outcome);
        }
    };

    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        match put_file(client, &href, local_path).await? {
            PutStatus::Stored => break,
            PutStatus::Processing => {
                debug!(file = file_name, attempts, "Upload still processing, retrying");
                tokio::time::sleep(client.processing_retry_delay()).await;
            }
            PutStatus::Rejected(outcome) => {
                warn!(file = file_name, %outcome, "Upload rejected");
                return Ok(outcome);
            }
        }
    }

    info!(file = file_name, overwrite, attempts, "Upload completed");
    if overwrite {
        Ok(RemoteOutcome::Overwritten)
    } else {
        Ok(RemoteOutcome::Created)
    }
}

//! Disk REST API client
//!
//! Provides a typed HTTP client for the disk API. Handles the authorization
//! header, timeouts, and endpoint construction. The credential is not stored
//! in the client: every request takes the token of the current
//! configuration snapshot.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dirmirror_core::config::RemoteConfig;
//! use dirmirror_remote::client::DiskClient;
//! use reqwest::Method;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DiskClient::new(&RemoteConfig::default())?;
//! let response = client
//!     .resource_request(Method::GET, "my-token", "/Photos")
//!     .send()
//!     .await?;
//! println!("status: {}", response.status());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use dirmirror_core::config::RemoteConfig;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder};
use tracing::debug;

use crate::ClientError;

/// Endpoint for folder and file resources.
pub const RESOURCES_ENDPOINT: &str = "/resources";

/// Endpoint that hands out upload links.
pub const UPLOAD_ENDPOINT: &str = "/resources/upload";

// ============================================================================
// DiskClient
// ============================================================================

/// HTTP client for disk API calls
///
/// Wraps `reqwest::Client` with base URL construction and the
/// `OAuth` authorization scheme the API expects.
#[derive(Debug, Clone)]
pub struct DiskClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests, without trailing slash
    base_url: String,
    /// Whether deletes bypass the remote trash
    permanent_delete: bool,
    /// Wait between commit retries while an upload is still processing
    processing_retry_delay: Duration,
}

impl DiskClient {
    /// Creates a client from the `remote` configuration section.
    pub fn new(config: &RemoteConfig) -> Result<Self, ClientError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
            return Err(ClientError::InvalidBaseUrl(config.base_url.clone()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        debug!(base_url = %base_url, "Disk client created");
        Ok(Self {
            client,
            base_url,
            permanent_delete: config.permanent_delete,
            processing_retry_delay: Duration::from_millis(config.processing_retry_delay_ms),
        })
    }

    /// Creates a client with default settings and a custom base URL
    /// (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            permanent_delete: false,
            processing_retry_delay: Duration::from_millis(
                RemoteConfig::default().processing_retry_delay_ms,
            ),
        }
    }

    pub fn with_permanent_delete(mut self, permanent: bool) -> Self {
        self.permanent_delete = permanent;
        self
    }

    pub fn with_processing_retry_delay(mut self, delay: Duration) -> Self {
        self.processing_retry_delay = delay;
        self
    }

    /// Creates an authenticated request builder for the given endpoint
    ///
    /// Prepends the base URL and adds `Authorization: OAuth <token>`.
    pub fn request(&self, method: Method, endpoint: &str, token: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        self.client
            .request(method, url)
            .header(AUTHORIZATION, format!("OAuth {token}"))
    }

    /// Request against `/resources` for the given remote path.
    pub fn resource_request(&self, method: Method, token: &str, remote_path: &str) -> RequestBuilder {
        self.request(method, RESOURCES_ENDPOINT, token)
            .query(&[("path", remote_path)])
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn permanent_delete(&self) -> bool {
        self.permanent_delete
    }

    pub fn processing_retry_delay(&self) -> Duration {
        self.processing_retry_delay
    }

    /// Returns a reference to the underlying reqwest Client
    ///
    /// Upload links are absolute URLs on a different host and carry their
    /// own authorization, so they are fetched with the bare client.
    pub fn http_client(&self) -> &Client {
        &self.client
    }
}

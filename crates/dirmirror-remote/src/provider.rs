//! DiskStorage - IRemoteStorage implementation for the disk REST API
//!
//! Wraps the [`DiskClient`] and delegates uploads to the [`upload`] module.
//! Folder creation, deletion and the authorization probe are single
//! requests against `/resources` and are classified here.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use tracing::{debug, info};

use dirmirror_core::domain::{RemoteError, RemoteOutcome, RemoteTarget};
use dirmirror_core::ports::IRemoteStorage;

use crate::client::DiskClient;
use crate::upload;
use crate::{transport_error, unexpected_status};

/// Remote storage adapter for the disk REST API
#[derive(Debug, Clone)]
pub struct DiskStorage {
    client: DiskClient,
}

impl DiskStorage {
    pub fn new(client: DiskClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &DiskClient {
        &self.client
    }
}

#[async_trait]
impl IRemoteStorage for DiskStorage {
    #[tracing::instrument(skip_all, fields(folder = target.folder()))]
    async fn ensure_folder(&self, target: &RemoteTarget) -> Result<RemoteOutcome, RemoteError> {
        if target.is_root() {
            return Ok(RemoteOutcome::AlreadyExists);
        }

        let response = self
            .client
            .resource_request(Method::PUT, target.credential(), &target.folder_path())
            .send()
            .await
            .map_err(transport_error)?;

        let outcome = match response.status() {
            StatusCode::CREATED => {
                info!("Remote folder created");
                RemoteOutcome::Created
            }
            StatusCode::CONFLICT => RemoteOutcome::AlreadyExists,
            StatusCode::UNAUTHORIZED => RemoteOutcome::Unauthorized,
            _ => unexpected_status(response).await,
        };
        Ok(outcome)
    }

    #[tracing::instrument(skip(self, target, local_path))]
    async fn upload(
        &self,
        target: &RemoteTarget,
        local_path: &Path,
        file_name: &str,
        overwrite: bool,
    ) -> Result<RemoteOutcome, RemoteError> {
        upload::upload_file(&self.client, target, local_path, file_name, overwrite).await
    }

    #[tracing::instrument(skip(self, target))]
    async fn delete(
        &self,
        target: &RemoteTarget,
        file_name: &str,
    ) -> Result<RemoteOutcome, RemoteError> {
        let remote_path = target.file_path(file_name)?;
        let permanently = if self.client.permanent_delete() {
            "true"
        } else {
            "false"
        };

        let response = self
            .client
            .resource_request(Method::DELETE, target.credential(), &remote_path)
            .query(&[("permanently", permanently)])
            .send()
            .await
            .map_err(transport_error)?;

        // 202 means the service deletes asynchronously; the name is gone
        // from the folder either way.
        let outcome = match response.status() {
            StatusCode::NO_CONTENT | StatusCode::ACCEPTED => RemoteOutcome::Deleted,
            StatusCode::NOT_FOUND => RemoteOutcome::NotFound,
            StatusCode::UNAUTHORIZED => RemoteOutcome::Unauthorized,
            _ => unexpected_status(response).await,
        };
        debug!(%outcome, "Delete finished");
        Ok(outcome)
    }

    #[tracing::instrument(skip_all, fields(folder = target.folder()))]
    async fn probe(&self, target: &RemoteTarget) -> Result<RemoteOutcome, RemoteError> {
        let response = self
            .client
            .resource_request(Method::GET, target.credential(), &target.folder_path())
            .query(&[("limit", "0")])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        debug!(status = status.as_u16(), "Probe answered");
        let outcome = match status {
            StatusCode::UNAUTHORIZED => RemoteOutcome::Unauthorized,
            StatusCode::NOT_FOUND => RemoteOutcome::NotFound,
            s if s.is_success() => RemoteOutcome::AlreadyExists,
            _ => unexpected_status(response).await,
        };
        Ok(outcome)
    }
}

//! Shared test helpers for disk API integration tests
//!
//! Each helper mounts the endpoints a scenario needs on a wiremock server.
//! The same server plays both the API and the upload host.

use std::path::PathBuf;
use std::time::Duration;

use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dirmirror_core::domain::RemoteTarget;
use dirmirror_remote::client::DiskClient;
use dirmirror_remote::provider::DiskStorage;

pub const TOKEN: &str = "test-oauth-token";

/// Starts a mock server and returns a storage adapter pointed at it.
pub async fn setup_disk_mock() -> (MockServer, DiskStorage) {
    let server = MockServer::start().await;
    let client = DiskClient::with_base_url(format!("{}/v1/disk", server.uri()))
        .with_processing_retry_delay(Duration::from_millis(10));
    (server, DiskStorage::new(client))
}

pub fn target() -> RemoteTarget {
    RemoteTarget::new(TOKEN, "Photos")
}

/// Writes a local file with the given content and returns its path.
pub fn local_file(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write local file");
    path
}

/// Mounts `GET /resources/upload` answering 200 with an href on this server.
pub async fn mount_upload_link(server: &MockServer, remote_path: &str, overwrite: &str) {
    Mock::given(method("GET"))
        .and(path("/v1/disk/resources/upload"))
        .and(query_param("path", remote_path))
        .and(query_param("overwrite", overwrite))
        .and(header("authorization", format!("OAuth {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "operation_id": "op-1",
            "href": format!("{}/upload-target/op-1", server.uri()),
            "method": "PUT",
            "templated": false
        })))
        .mount(server)
        .await;
}

/// Mounts `GET /resources/upload` answering a bare status.
pub async fn mount_upload_link_status(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/v1/disk/resources/upload"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Mounts the upload host `PUT` answering `status`.
pub async fn mount_put(server: &MockServer, status: u16) {
    Mock::given(method("PUT"))
        .and(path("/upload-target/op-1"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

//! Integration tests for folder creation, deletion and the authorization probe

use std::time::Duration;

use dirmirror_core::domain::{RemoteError, RemoteOutcome, RemoteTarget};
use dirmirror_core::ports::IRemoteStorage;
use dirmirror_remote::client::DiskClient;
use dirmirror_remote::provider::DiskStorage;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

// ============================================================================
// ensure_folder
// ============================================================================

#[tokio::test]
async fn test_ensure_folder_created() {
    let (server, storage) = common::setup_disk_mock().await;

    Mock::given(method("PUT"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "/Photos"))
        .and(header("authorization", "OAuth test-oauth-token"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = storage.ensure_folder(&common::target()).await.unwrap();
    assert_eq!(outcome, RemoteOutcome::Created);
}

#[tokio::test]
async fn test_ensure_folder_already_exists() {
    let (server, storage) = common::setup_disk_mock().await;

    Mock::given(method("PUT"))
        .and(path("/v1/disk/resources"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let outcome = storage.ensure_folder(&common::target()).await.unwrap();
    assert_eq!(outcome, RemoteOutcome::AlreadyExists);
}

#[tokio::test]
async fn test_ensure_folder_root_makes_no_request() {
    let (server, storage) = common::setup_disk_mock().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = storage
        .ensure_folder(&RemoteTarget::new(common::TOKEN, ""))
        .await
        .unwrap();
    assert_eq!(outcome, RemoteOutcome::AlreadyExists);
}

// ============================================================================
// delete
// ============================================================================

#[tokio::test]
async fn test_delete_moves_to_trash_by_default() {
    let (server, storage) = common::setup_disk_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "/Photos/a.txt"))
        .and(query_param("permanently", "false"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = storage.delete(&common::target(), "a.txt").await.unwrap();
    assert_eq!(outcome, RemoteOutcome::Deleted);
}

#[tokio::test]
async fn test_delete_permanently_when_configured() {
    let server = wiremock::MockServer::start().await;
    let storage = DiskStorage::new(
        DiskClient::with_base_url(format!("{}/v1/disk", server.uri())).with_permanent_delete(true),
    );

    Mock::given(method("DELETE"))
        .and(query_param("permanently", "true"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = storage.delete(&common::target(), "a.txt").await.unwrap();
    assert_eq!(outcome, RemoteOutcome::Deleted);
}

#[tokio::test]
async fn test_delete_missing_file_is_not_found() {
    let (server, storage) = common::setup_disk_mock().await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let outcome = storage.delete(&common::target(), "a.txt").await.unwrap();
    assert_eq!(outcome, RemoteOutcome::NotFound);
}

#[tokio::test]
async fn test_delete_unauthorized() {
    let (server, storage) = common::setup_disk_mock().await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let outcome = storage.delete(&common::target(), "a.txt").await.unwrap();
    assert_eq!(outcome, RemoteOutcome::Unauthorized);
}

#[tokio::test]
async fn test_delete_rejects_nested_name() {
    let (_server, storage) = common::setup_disk_mock().await;
    let err = storage
        .delete(&common::target(), "sub/a.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Domain(_)));
}

// ============================================================================
// probe
// ============================================================================

#[tokio::test]
async fn test_probe_unauthorized() {
    let (server, storage) = common::setup_disk_mock().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .and(query_param("path", "/Photos"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let outcome = storage.probe(&common::target()).await.unwrap();
    assert!(outcome.is_unauthorized());
}

#[tokio::test]
async fn test_probe_missing_folder_still_authorized() {
    let (server, storage) = common::setup_disk_mock().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let outcome = storage.probe(&common::target()).await.unwrap();
    assert_eq!(outcome, RemoteOutcome::NotFound);
    assert!(!outcome.is_unauthorized());
}

#[tokio::test]
async fn test_probe_ok() {
    let (server, storage) = common::setup_disk_mock().await;

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "Photos",
            "type": "dir",
            "path": "disk:/Photos"
        })))
        .mount(&server)
        .await;

    let outcome = storage.probe(&common::target()).await.unwrap();
    assert_eq!(outcome, RemoteOutcome::AlreadyExists);
}

// ============================================================================
// connectivity
// ============================================================================

#[tokio::test]
async fn test_unreachable_server_is_connectivity_failure() {
    // Bind then drop a listener to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let storage = DiskStorage::new(DiskClient::with_base_url(format!("http://{addr}/v1/disk")));
    let err = storage.probe(&common::target()).await.unwrap_err();
    assert!(err.is_connectivity(), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_slow_server_times_out_as_connectivity_failure() {
    let (server, _) = common::setup_disk_mock().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let config = dirmirror_core::config::RemoteConfig {
        base_url: format!("{}/v1/disk", server.uri()),
        timeout_secs: 1,
        ..Default::default()
    };
    let storage = DiskStorage::new(DiskClient::new(&config).unwrap());
    let err = storage.probe(&common::target()).await.unwrap_err();
    assert!(err.is_connectivity());
}

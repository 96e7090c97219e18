//! Integration tests for uploads (link negotiation and streamed PUT)

use dirmirror_core::domain::{RemoteError, RemoteOutcome};
use dirmirror_core::ports::IRemoteStorage;
use wiremock::matchers::{body_bytes, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_upload_new_file_created() {
    let (server, storage) = common::setup_disk_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let file = common::local_file(&dir, "a.txt", b"hello mirror");

    common::mount_upload_link(&server, "/Photos/a.txt", "false").await;
    Mock::given(method("PUT"))
        .and(path("/upload-target/op-1"))
        .and(body_bytes(b"hello mirror".to_vec()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = storage
        .upload(&common::target(), &file, "a.txt", false)
        .await
        .expect("upload");
    assert_eq!(outcome, RemoteOutcome::Created);
}

#[tokio::test]
async fn test_upload_overwrite_reports_overwritten() {
    let (server, storage) = common::setup_disk_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let file = common::local_file(&dir, "a.txt", b"v2");

    common::mount_upload_link(&server, "/Photos/a.txt", "true").await;
    common::mount_put(&server, 201).await;

    let outcome = storage
        .upload(&common::target(), &file, "a.txt", true)
        .await
        .expect("upload");
    assert_eq!(outcome, RemoteOutcome::Overwritten);
}

#[tokio::test]
async fn test_upload_retries_while_processing() {
    let (server, storage) = common::setup_disk_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let file = common::local_file(&dir, "slow.bin", &[7u8; 4096]);

    common::mount_upload_link(&server, "/Photos/slow.bin", "false").await;
    Mock::given(method("PUT"))
        .and(path("/upload-target/op-1"))
        .respond_with(ResponseTemplate::new(202))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload-target/op-1"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = storage
        .upload(&common::target(), &file, "slow.bin", false)
        .await
        .expect("upload");
    assert_eq!(outcome, RemoteOutcome::Created);
}

#[tokio::test]
async fn test_upload_existing_file_is_already_exists() {
    let (server, storage) = common::setup_disk_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let file = common::local_file(&dir, "a.txt", b"x");

    common::mount_upload_link_status(&server, 409).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = storage
        .upload(&common::target(), &file, "a.txt", false)
        .await
        .expect("upload");
    assert_eq!(outcome, RemoteOutcome::AlreadyExists);
}

#[tokio::test]
async fn test_upload_link_unauthorized() {
    let (server, storage) = common::setup_disk_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let file = common::local_file(&dir, "a.txt", b"x");

    common::mount_upload_link_status(&server, 401).await;

    let outcome = storage
        .upload(&common::target(), &file, "a.txt", false)
        .await
        .expect("upload");
    assert_eq!(outcome, RemoteOutcome::Unauthorized);
}

#[tokio::test]
async fn test_upload_too_large_and_storage_full() {
    let (server, storage) = common::setup_disk_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let file = common::local_file(&dir, "big.bin", &[0u8; 1024]);

    common::mount_upload_link(&server, "/Photos/big.bin", "false").await;
    Mock::given(method("PUT"))
        .and(path("/upload-target/op-1"))
        .respond_with(ResponseTemplate::new(413))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    common::mount_put(&server, 507).await;

    let first = storage
        .upload(&common::target(), &file, "big.bin", false)
        .await
        .expect("upload");
    assert_eq!(first, RemoteOutcome::PayloadTooLarge);

    let second = storage
        .upload(&common::target(), &file, "big.bin", false)
        .await
        .expect("upload");
    assert_eq!(second, RemoteOutcome::StorageFull);
}

#[tokio::test]
async fn test_upload_unexpected_status_keeps_body() {
    let (server, storage) = common::setup_disk_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let file = common::local_file(&dir, "a.txt", b"x");

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources/upload"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .mount(&server)
        .await;

    let outcome = storage
        .upload(&common::target(), &file, "a.txt", false)
        .await
        .expect("upload");
    assert_eq!(
        outcome,
        RemoteOutcome::ServerError {
            status: 503,
            body: "try later".to_string()
        }
    );
}

#[tokio::test]
async fn test_upload_malformed_link_response() {
    let (server, storage) = common::setup_disk_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let file = common::local_file(&dir, "a.txt", b"x");

    Mock::given(method("GET"))
        .and(path("/v1/disk/resources/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = storage
        .upload(&common::target(), &file, "a.txt", false)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_upload_missing_local_file() {
    let (server, storage) = common::setup_disk_mock().await;
    common::mount_upload_link(&server, "/Photos/gone.txt", "false").await;

    let err = storage
        .upload(
            &common::target(),
            std::path::Path::new("/nonexistent/gone.txt"),
            "gone.txt",
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::LocalFile { .. }));
    assert!(!err.is_connectivity());
}

//! Integration tests for the HTTP downloader against a mock server

use super::*;
use crate::error::ErrorKind;
use crate::models::Mod;
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio_util::sync::CancellationToken;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Helper struct to capture progress events during testing
#[derive(Default)]
struct ProgressCapture {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl ProgressCapture {
    fn get_callback(&self) -> ProgressCallback {
        let events = self.events.clone();
        Arc::new(move |event| {
            events.lock().unwrap().push(event);
        })
    }

    fn get_events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

fn archive_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn downloader_in(dir: &TempDir) -> HttpDownloader {
    let config = DownloadConfigBuilder::new()
        .cache_dir(dir.path().join("cache"))
        .temp_dir(dir.path().join("temp"))
        .timeout(Duration::from_secs(10))
        .build();
    HttpDownloader::new(config).unwrap()
}

fn temp_dir_is_empty(dir: &TempDir) -> bool {
    match std::fs::read_dir(dir.path().join("temp")) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

#[tokio::test]
async fn downloads_once_then_serves_from_cache() {
    let server = MockServer::start().await;
    let body = archive_body(4096);
    Mock::given(method("GET"))
        .and(path("/mods/a.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/zip")
                .set_body_bytes(body.clone()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let downloader = downloader_in(&dir);
    let m = Mod::new("m1", "1.0", format!("{}/mods/a.zip", server.uri())).with_checksum(sha256_hex(&body));
    let cancel = CancellationToken::new();

    let progress = ProgressCapture::default();
    let first = downloader.download(&m, &cancel, Some(progress.get_callback())).await.unwrap();
    assert_eq!(std::fs::read(&first).unwrap(), body);
    assert_eq!(first, downloader.cache().entry_path(&m));
    assert!(progress
        .get_events()
        .iter()
        .any(|e| matches!(e, ProgressEvent::DownloadProgress { downloaded, .. } if *downloaded == 4096)));

    let progress = ProgressCapture::default();
    let second = downloader.download(&m, &cancel, Some(progress.get_callback())).await.unwrap();
    assert_eq!(first, second);

    let events = progress.get_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].byte_counters(), Some((4096, 4096)));

    let snapshot = downloader.metrics().snapshot();
    assert_eq!(snapshot.total_downloads, 1);
    assert_eq!(snapshot.successful_downloads, 1);
    assert_eq!(snapshot.cache_hits, 1);
    assert!(temp_dir_is_empty(&dir));
}

#[tokio::test]
async fn undersized_payload_is_an_integrity_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 10]))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let downloader = downloader_in(&dir);
    let m = Mod::new("m1", "1.0", format!("{}/a.zip", server.uri()));

    let err = downloader.download(&m, &CancellationToken::new(), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(!downloader.cache().entry_path(&m).exists());
    assert!(temp_dir_is_empty(&dir));
    assert_eq!(downloader.metrics().snapshot().integrity_failures, 1);
}

#[tokio::test]
async fn checksum_mismatch_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive_body(2048)))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let downloader = downloader_in(&dir);
    let m = Mod::new("m1", "1.0", format!("{}/a.zip", server.uri())).with_checksum("00".repeat(32));

    let err = downloader.download(&m, &CancellationToken::new(), None).await.unwrap_err();
    assert!(matches!(err, DownloadError::ChecksumMismatch { .. }));
    assert!(!downloader.cache().entry_path(&m).exists());
}

#[tokio::test]
async fn html_pages_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>".repeat(500), "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let downloader = downloader_in(&dir);
    let m = Mod::new("m1", "1.0", format!("{}/a.zip", server.uri()));

    let err = downloader.download(&m, &CancellationToken::new(), None).await.unwrap_err();
    assert!(matches!(err, DownloadError::HtmlResponse { .. }));
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(!downloader.cache().entry_path(&m).exists());
}

#[tokio::test]
async fn http_errors_carry_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let downloader = downloader_in(&dir);
    let m = Mod::new("m1", "1.0", format!("{}/missing.zip", server.uri()));

    let err = downloader.download(&m, &CancellationToken::new(), None).await.unwrap_err();
    assert!(matches!(err, DownloadError::HttpStatus { status: 404, .. }));
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn folder_links_never_touch_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let downloader = downloader_in(&dir);
    let m = Mod::new("m1", "1.0", format!("{}/drive/folders/XYZ", server.uri()));

    let err = downloader.download(&m, &CancellationToken::new(), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ManualActionRequired);
    assert_eq!(downloader.metrics().snapshot().total_downloads, 0);
}

#[tokio::test]
async fn cancelled_token_stops_before_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive_body(2048)))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let downloader = downloader_in(&dir);
    let m = Mod::new("m1", "1.0", format!("{}/a.zip", server.uri()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = downloader.download(&m, &cancel, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn cancellation_mid_request_leaves_cache_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(archive_body(2048))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let downloader = downloader_in(&dir);
    let m = Mod::new("m1", "1.0", format!("{}/a.zip", server.uri()));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = downloader.download(&m, &cancel, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!downloader.cache().entry_path(&m).exists());
    assert!(temp_dir_is_empty(&dir));
}

#[tokio::test]
async fn progress_reaches_body_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive_body(3000)))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let downloader = downloader_in(&dir);
    let m = Mod::new("m1", "1.0", format!("{}/a.zip", server.uri()));

    let progress = ProgressCapture::default();
    downloader
        .download(&m, &CancellationToken::new(), Some(progress.get_callback()))
        .await
        .unwrap();

    let last = progress
        .get_events()
        .into_iter()
        .filter_map(|e| match e {
            ProgressEvent::DownloadProgress { .. } => e.byte_counters(),
            _ => None,
        })
        .last()
        .unwrap();
    assert_eq!(last, (3000, 3000));
}

#[tokio::test]
async fn timeouts_report_the_configured_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(archive_body(4096))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = DownloadConfigBuilder::new()
        .cache_dir(dir.path().join("cache"))
        .temp_dir(dir.path().join("temp"))
        .timeout(Duration::from_secs(1))
        .build();
    let downloader = HttpDownloader::new(config).unwrap();
    let m = Mod::new("m1", "1.0", format!("{}/a.zip", server.uri()));

    let err = downloader.download(&m, &CancellationToken::new(), None).await.unwrap_err();
    assert!(matches!(err, DownloadError::NetworkTimeout { duration_secs: 1, .. }));
    assert!(err.to_string().contains("after 1s"));
    assert!(err.is_recoverable());
    assert!(!downloader.cache().entry_path(&m).exists());
}

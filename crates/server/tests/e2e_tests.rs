//! End-to-end tests with a mocked downloader.
//!
//! These tests run the full router in-process: HTTP handlers, the operation
//! controller and the real archive extractor.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use cellar_core::{Command, Outcome, Phase};
use cellar_server::api::WsMessage;
use common::{fixtures, TestFixture};

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/config").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(
        response.body["storage"]["install_root"],
        json!(fixture.install_root)
    );
    assert_eq!(response.body["extract"]["strip_single_root"], true);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    let (status, body) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("cellar_artifacts_known"));
}

// =============================================================================
// Artifact Listing
// =============================================================================

#[tokio::test]
async fn test_list_artifacts() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/artifacts").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total"], 2);
    let first = &response.body["artifacts"][0];
    assert!(first["id"].is_string());
    assert_eq!(first["installed"], false);
    assert_eq!(first["update_available"], false);
    assert_eq!(first["phase"], "idle");
    assert_eq!(first["kind"], "wine-ge");
}

#[tokio::test]
async fn test_get_unknown_artifact_is_404() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/artifacts/does-not-exist").await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert!(response.body["error"].as_str().unwrap().contains("does-not-exist"));
}

#[tokio::test]
async fn test_commands_on_unknown_artifact_are_404() {
    let fixture = TestFixture::new().await;
    for command in ["install", "update", "remove", "abort"] {
        let response = fixture
            .post_empty(&format!("/api/v1/artifacts/nope/{}", command))
            .await;
        assert_status!(response, StatusCode::NOT_FOUND);
    }
    assert_eq!(fixture.downloader.download_count().await, 0);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_install_and_remove_via_api() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_empty("/api/v1/artifacts/GE-Proton8-1/install")
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["outcome"], "success");

    let dir = fixture.install_root.join("GE-Proton8-1");
    assert!(dir.join("bin/wine").is_file());

    let response = fixture.get("/api/v1/artifacts/GE-Proton8-1").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["installed"], true);
    assert_eq!(response.body["phase"], "idle");

    let response = fixture
        .post_empty("/api/v1/artifacts/GE-Proton8-1/remove")
        .await;
    assert_eq!(response.body["outcome"], "success");
    assert!(!dir.exists());

    let response = fixture
        .post_empty("/api/v1/artifacts/GE-Proton8-1/remove")
        .await;
    assert_eq!(response.body["outcome"], "no_op");

    let response = fixture.get("/api/v1/artifacts/GE-Proton8-1").await;
    assert_eq!(response.body["installed"], false);
}

#[tokio::test]
async fn test_abort_idle_is_noop() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post_empty("/api/v1/artifacts/GE-Proton8-1/abort")
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["outcome"], "no_op");
}

#[tokio::test]
async fn test_second_install_conflicts_and_abort_stops_first() {
    let fixture = TestFixture::new().await;
    fixture
        .downloader
        .set_chunking(200, Duration::from_millis(20))
        .await;

    let controller = fixture.controller.clone();
    let first = tokio::spawn(async move { controller.install("GE-Proton8-1").await });
    tokio::time::timeout(Duration::from_secs(5), async {
        while fixture.controller.phase("GE-Proton8-1") != Phase::Downloading {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("install never started");

    let response = fixture.get("/api/v1/artifacts/GE-Proton8-1").await;
    assert_eq!(response.body["phase"], "downloading");

    let response = fixture
        .post_empty("/api/v1/artifacts/GE-Proton8-1/install")
        .await;
    assert_status!(response, StatusCode::CONFLICT);
    assert_eq!(response.body["outcome"], "already_in_progress");

    let response = fixture
        .post_empty("/api/v1/artifacts/GE-Proton8-1/abort")
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["outcome"], "aborted");

    assert_eq!(first.await.unwrap(), Outcome::Aborted);
    let response = fixture.get("/api/v1/artifacts/GE-Proton8-1").await;
    assert_eq!(response.body["phase"], "idle");
    assert_eq!(response.body["installed"], false);
}

#[tokio::test]
async fn test_checksum_failure_reports_error() {
    let fixture = TestFixture::new().await;
    fixture
        .downloader
        .set_archive("GE-Proton8-2", fixtures::runtime_archive("other"))
        .await;

    let response = fixture
        .post_empty("/api/v1/artifacts/GE-Proton8-2/install")
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["outcome"], "error");
    assert!(!fixture.install_root.join("GE-Proton8-2").exists());
}

#[tokio::test]
async fn test_outcomes_are_broadcast() {
    let fixture = TestFixture::new().await;
    let mut rx = fixture.ws_broadcaster.subscribe();

    fixture
        .post_empty("/api/v1/artifacts/GE-Proton8-1/install")
        .await;

    let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("no outcome broadcast")
        .unwrap();
    match msg {
        WsMessage::Outcome {
            artifact_id,
            command,
            outcome,
            ..
        } => {
            assert_eq!(artifact_id, "GE-Proton8-1");
            assert_eq!(command, Command::Install);
            assert_eq!(outcome, Outcome::Success);
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

// =============================================================================
// Catalog Refresh
// =============================================================================

#[tokio::test]
async fn test_catalog_refresh_flags_update() {
    let fixture = TestFixture::new().await;
    fixture
        .post_empty("/api/v1/artifacts/GE-Proton8-1/install")
        .await;

    let files: &[(&str, &[u8])] = &[("GE-Proton8-1/version", b"rebuilt".as_slice())];
    let rebuilt = fixtures::tar_gz_archive(files);
    fixture
        .downloader
        .set_archive("GE-Proton8-1", rebuilt.clone())
        .await;
    fixture.catalog.replace(vec![
        fixtures::descriptor_for("GE-Proton8-1", &rebuilt),
        fixtures::descriptor("GE-Proton9-1"),
    ]);

    let response = fixture.post_empty("/api/v1/catalog/refresh").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["added"], 1);
    assert_eq!(response.body["removed"], 1);
    assert_eq!(response.body["updates_available"], 1);

    // GE-Proton8-2 was delisted and never installed.
    let response = fixture.get("/api/v1/artifacts").await;
    assert_eq!(response.body["total"], 2);
    let response = fixture.get("/api/v1/artifacts/GE-Proton8-2").await;
    assert_status!(response, StatusCode::NOT_FOUND);

    let response = fixture.get("/api/v1/artifacts/GE-Proton8-1").await;
    assert_eq!(response.body["update_available"], true);

    let response = fixture
        .post_empty("/api/v1/artifacts/GE-Proton8-1/update")
        .await;
    assert_eq!(response.body["outcome"], "success");
    let version =
        std::fs::read_to_string(fixture.install_root.join("GE-Proton8-1/version")).unwrap();
    assert_eq!(version, "rebuilt");

    let response = fixture.get("/api/v1/artifacts/GE-Proton8-1").await;
    assert_eq!(response.body["update_available"], false);
}

// =============================================================================
// Progress Stream
// =============================================================================

#[tokio::test]
async fn test_progress_socket_streams_samples() {
    let fixture = TestFixture::new().await;
    fixture
        .downloader
        .set_chunking(20, Duration::from_millis(10))
        .await;
    let addr = fixture.serve().await;

    let (mut socket, _) = connect_async(format!(
        "ws://{}/api/v1/artifacts/GE-Proton8-1/progress",
        addr
    ))
    .await
    .expect("progress socket should upgrade");

    let install = {
        let controller = fixture.controller.clone();
        tokio::spawn(async move { controller.install("GE-Proton8-1").await })
    };

    let mut frames: Vec<Value> = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(message) = socket.next().await {
            let message = message.expect("socket error");
            let Message::Text(text) = message else {
                continue;
            };
            let frame: Value = serde_json::from_str(&text).unwrap();
            let done = frame["phase"] == "unzipping" && frame["sample"]["percentage"] == 100.0;
            frames.push(frame);
            if done {
                break;
            }
        }
    })
    .await
    .expect("never saw unzipping complete");

    assert_eq!(install.await.unwrap(), Outcome::Success);
    assert!(frames.iter().all(|f| f["type"] == "progress"));
    assert!(frames.iter().all(|f| f["artifact_id"] == "GE-Proton8-1"));
    assert!(frames.iter().any(|f| f["phase"] == "downloading"));
    assert!(frames.iter().all(|f| f["sample"]["percentage"].is_number()));
    assert!(frames.iter().all(|f| f["eta"].is_string()));
}

#[tokio::test]
async fn test_progress_socket_unknown_artifact_is_rejected() {
    let fixture = TestFixture::new().await;
    let addr = fixture.serve().await;

    let result = connect_async(format!("ws://{}/api/v1/artifacts/nope/progress", addr)).await;
    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 404);
        }
        other => panic!("expected a 404 handshake failure, got {:?}", other.map(|_| ())),
    }
}

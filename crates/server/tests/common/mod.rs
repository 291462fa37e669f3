//! Common test utilities for E2E testing with mocks.
//!
//! The fixture builds the full router in-process with a mock downloader, so
//! installs run against the real archive extractor without any network.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use cellar_core::{
    create_outcome_system, testing::MockDownloader, ArchiveExtractor, ArtifactDescriptor,
    ArtifactRegistry, Config, ControllerConfig, Downloader, Extractor, OperationController,
    ProgressChannel, StaticCatalog, StorageConfig,
};
use cellar_server::api::{WsBroadcaster, WsOutcomeSink};
use cellar_server::state::{AppState, Controller};

/// Re-export fixtures for test convenience
pub use cellar_core::testing::fixtures;

/// Ids listed by the default fixture catalog.
pub const DEFAULT_IDS: [&str; 2] = ["GE-Proton8-1", "GE-Proton8-2"];

/// Test fixture for E2E testing with mock dependencies.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock downloader - serves fixture archives
    pub downloader: Arc<MockDownloader>,
    /// Catalog source behind `/catalog/refresh`
    pub catalog: Arc<StaticCatalog>,
    /// Controller shared with the router
    pub controller: Controller,
    /// Broadcaster behind `/ws`
    pub ws_broadcaster: WsBroadcaster,
    /// Where artifacts get installed
    pub install_root: PathBuf,
    /// Temporary directory holding installs and downloads
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture listing [`DEFAULT_IDS`].
    pub async fn new() -> Self {
        Self::with_catalog(DEFAULT_IDS.iter().map(|id| fixtures::descriptor(id)).collect()).await
    }

    /// Create a test fixture with the given catalog.
    pub async fn with_catalog(descriptors: Vec<ArtifactDescriptor>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let install_root = temp_dir.path().join("runtimes");
        let download_dir = temp_dir.path().join("downloads");

        let config = Config {
            storage: StorageConfig {
                install_root: install_root.clone(),
                temp_dir: download_dir.clone(),
            },
            ..Default::default()
        };

        let catalog = Arc::new(StaticCatalog::new(descriptors.clone()));
        let registry = Arc::new(ArtifactRegistry::with_catalog(descriptors));
        let downloader = Arc::new(MockDownloader::new(&download_dir));
        let extractor: Arc<dyn Extractor> =
            Arc::new(ArchiveExtractor::new(config.extract.clone()));

        let ws_broadcaster = WsBroadcaster::default();
        let (outcome_handle, dispatcher) =
            create_outcome_system(Arc::new(WsOutcomeSink::new(ws_broadcaster.clone())), 64);
        tokio::spawn(dispatcher.run());

        let controller: Controller = OperationController::new(
            ControllerConfig::new(&install_root),
            registry,
            Arc::clone(&downloader) as Arc<dyn Downloader>,
            extractor,
            ProgressChannel::new(),
            Some(outcome_handle),
        );

        let state = Arc::new(AppState::new(
            config,
            controller.clone(),
            Arc::clone(&catalog) as Arc<dyn cellar_core::CatalogSource>,
            ws_broadcaster.clone(),
        ));
        let router = cellar_server::api::create_router(state);

        Self {
            router,
            downloader,
            catalog,
            controller,
            ws_broadcaster,
            install_root,
            temp_dir,
        }
    }

    /// Serves the router on an ephemeral local port and returns its address.
    ///
    /// WebSocket upgrades need a real connection, `oneshot` cannot do them.
    pub async fn serve(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        addr
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Fetch the raw text body of a GET request.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&body_bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

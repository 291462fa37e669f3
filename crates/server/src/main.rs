use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cellar_core::{
    create_outcome_system, extract::sweep_leftovers, load_config, load_config_from_env,
    validate_config, ArchiveExtractor, ArtifactRegistry, CatalogSource, Config, ControllerConfig,
    Downloader, Extractor, HttpDownloader, JsonFileCatalog, OperationController, ProgressChannel,
    StaticCatalog,
};

use cellar_server::api::{create_router, WsBroadcaster, WsOutcomeSink};
use cellar_server::state::AppState;

/// Buffer size for the outcome notification channel
const OUTCOME_BUFFER_SIZE: usize = 256;

/// How long shutdown waits for queued notifications to drain
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

/// Loads the config file named by `CELLAR_CONFIG`, or `config.toml`.
///
/// An explicitly named file must exist; the default one may be absent, in
/// which case defaults and environment variables apply.
fn load_configuration() -> Result<Config> {
    match std::env::var("CELLAR_CONFIG") {
        Ok(path) => {
            let path = PathBuf::from(path);
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        Err(_) => {
            let path = PathBuf::from("config.toml");
            if path.exists() {
                info!("Loading configuration from {:?}", path);
                load_config(&path)
                    .with_context(|| format!("Failed to load config from {:?}", path))
            } else {
                info!("No config.toml found, using defaults and environment");
                load_config_from_env().context("Failed to load config from environment")
            }
        }
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_configuration()?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Install root: {:?}", config.storage.install_root);
    info!("Download directory: {:?}", config.storage.temp_dir);

    let install_root = config.storage.install_root.clone();
    tokio::fs::create_dir_all(&install_root)
        .await
        .with_context(|| format!("Failed to create install root {:?}", install_root))?;
    tokio::fs::create_dir_all(&config.storage.temp_dir)
        .await
        .with_context(|| format!("Failed to create temp dir {:?}", config.storage.temp_dir))?;

    // Leftovers of an update interrupted by a crash
    match sweep_leftovers(&install_root).await {
        Ok(0) => {}
        Ok(n) => info!("Removed {} leftover staging directories", n),
        Err(e) => warn!("Failed to sweep {:?}: {}", install_root, e),
    }

    // Load the catalog
    let catalog: Arc<dyn CatalogSource> = match &config.catalog.path {
        Some(path) => Arc::new(JsonFileCatalog::new(path.clone())),
        None => {
            info!("No catalog configured, starting with an empty catalog");
            Arc::new(StaticCatalog::new(Vec::new()))
        }
    };
    let descriptors = catalog
        .fetch()
        .await
        .with_context(|| format!("Failed to load catalog from {}", catalog.name()))?;
    info!("Catalog {} lists {} artifacts", catalog.name(), descriptors.len());

    let registry = Arc::new(ArtifactRegistry::with_catalog(descriptors));
    let recovered = registry.recover_installed(&install_root);
    info!("Found {} installed artifacts", recovered);

    // Engines
    let downloader: Arc<dyn Downloader> = Arc::new(
        HttpDownloader::new(config.download.clone(), &config.storage.temp_dir)
            .context("Failed to create downloader")?,
    );
    let extractor: Arc<dyn Extractor> = Arc::new(ArchiveExtractor::new(config.extract.clone()));
    info!(
        "Using downloader: {}, extractor: {}",
        downloader.name(),
        extractor.name()
    );

    // Outcome notifications go to the log and to WebSocket clients
    let ws_broadcaster = WsBroadcaster::default();
    let (outcome_handle, dispatcher) = create_outcome_system(
        Arc::new(WsOutcomeSink::new(ws_broadcaster.clone())),
        OUTCOME_BUFFER_SIZE,
    );
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    let controller = OperationController::new(
        ControllerConfig::new(&install_root),
        registry,
        downloader,
        extractor,
        ProgressChannel::new(),
        Some(outcome_handle),
    );

    let state = Arc::new(AppState::new(
        config.clone(),
        controller.clone(),
        catalog,
        ws_broadcaster,
    ));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Running operations hold their requests open, so abort them as soon as
    // shutdown starts or the server would wait for them to finish.
    let shutdown_controller = controller.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Server shutting down...");
            let aborted = shutdown_controller.abort_all().await;
            if aborted > 0 {
                info!("Aborted {} running operations", aborted);
            }
        })
        .await
        .context("Server error")?;

    // The controller owns the last outcome handle; dropping it closes the
    // dispatcher's channel.
    drop(controller);
    if tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_handle)
        .await
        .is_err()
    {
        warn!("Outcome dispatcher did not stop in time");
    }
    info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

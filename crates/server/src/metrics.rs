//! Prometheus metrics for observability.
//!
//! The server registry carries:
//! - HTTP request metrics (latency, counts, in flight)
//! - WebSocket connection metrics
//! - Artifact counts, collected on every scrape
//! - The core operation metrics from `cellar_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use tracing::error;

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "cellar_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cellar_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "cellar_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "cellar_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative), by stream.
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cellar_ws_connections_total",
            "Total WebSocket connections since startup",
        ),
        &["stream"],
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cellar_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "cellar_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Artifact Metrics (collected dynamically)
// =============================================================================

/// Artifacts listed in the catalog.
pub static ARTIFACTS_KNOWN: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("cellar_artifacts_known", "Number of artifacts in the catalog").unwrap()
});

/// Artifacts currently installed.
pub static ARTIFACTS_INSTALLED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "cellar_artifacts_installed",
        "Number of artifacts installed on disk",
    )
    .unwrap()
});

/// Installed artifacts with a newer catalog build.
pub static ARTIFACTS_UPDATABLE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "cellar_artifacts_update_available",
        "Number of installed artifacts with an update available",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Artifacts
    registry
        .register(Box::new(ARTIFACTS_KNOWN.clone()))
        .unwrap();
    registry
        .register(Box::new(ARTIFACTS_INSTALLED.clone()))
        .unwrap();
    registry
        .register(Box::new(ARTIFACTS_UPDATABLE.clone()))
        .unwrap();

    // Core operation metrics
    for metric in cellar_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh the gauges derived from the registry.
pub fn collect_dynamic_metrics(state: &AppState) {
    let views = state.registry().list();
    ARTIFACTS_KNOWN.set(views.len() as i64);
    ARTIFACTS_INSTALLED.set(views.iter().filter(|v| v.status.installed).count() as i64);
    ARTIFACTS_UPDATABLE.set(
        views
            .iter()
            .filter(|v| v.status.update_available)
            .count() as i64,
    );
}

/// Normalize a path for metric labels (artifact ids become `{id}`).
pub fn normalize_path(path: &str) -> String {
    let mut previous = "";
    path.split('/')
        .map(|segment| {
            let normalized = if previous == "artifacts" && !segment.is_empty() {
                "{id}"
            } else {
                segment
            };
            previous = segment;
            normalized
        })
        .collect::<Vec<_>>()
        .join("/")
}

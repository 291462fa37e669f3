//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Operation controller (commands, outcomes, durations, active phases)
//! - Download engine (bytes transferred, checksum failures)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts};

// =============================================================================
// Operation Controller
// =============================================================================

/// Completed operations by command and outcome.
pub static OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cellar_operations_total", "Total operations by outcome"),
        &["command", "outcome"], // "install"/"update"/"remove", outcome tag
    )
    .unwrap()
});

/// Operation duration in seconds.
pub static OPERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "cellar_operation_duration_seconds",
            "Duration of install, update and remove operations",
        )
        .buckets(vec![0.1, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 900.0, 1800.0]),
        &["command"],
    )
    .unwrap()
});

/// Operations currently in flight by phase.
pub static ACTIVE_OPERATIONS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("cellar_active_operations", "Operations currently in flight"),
        &["phase"], // "downloading", "unzipping", "removing"
    )
    .unwrap()
});

// =============================================================================
// Download Engine
// =============================================================================

/// Archive bytes received.
pub static BYTES_DOWNLOADED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("cellar_bytes_downloaded_total", "Total archive bytes downloaded").unwrap()
});

/// Downloads rejected by checksum verification.
pub static CHECKSUM_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "cellar_checksum_failures_total",
        "Total downloads that failed checksum verification",
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(OPERATIONS_TOTAL.clone()),
        Box::new(OPERATION_DURATION.clone()),
        Box::new(ACTIVE_OPERATIONS.clone()),
        Box::new(BYTES_DOWNLOADED.clone()),
        Box::new(CHECKSUM_FAILURES.clone()),
    ]
}

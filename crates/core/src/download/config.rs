//! Configuration for the download engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::progress::TrackerSettings;

/// Configuration for the HTTP downloader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// TCP connect timeout in seconds. There is no overall timeout; long
    /// downloads are only bounded by an explicit abort.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Minimum time between two progress samples (milliseconds).
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,

    /// Minimum percentage movement between two progress samples.
    #[serde(default = "default_min_delta")]
    pub progress_min_delta_pct: f64,

    /// Weight of the newest reading in the throughput average, `(0, 1]`.
    #[serde(default = "default_smoothing")]
    pub speed_smoothing: f64,
}

fn default_user_agent() -> String {
    format!("cellar/{}", env!("CARGO_PKG_VERSION"))
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_progress_interval() -> u64 {
    100
}

fn default_min_delta() -> f64 {
    1.0
}

fn default_smoothing() -> f64 {
    0.3
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout(),
            progress_interval_ms: default_progress_interval(),
            progress_min_delta_pct: default_min_delta(),
            speed_smoothing: default_smoothing(),
        }
    }
}

impl DownloaderConfig {
    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            min_interval: Duration::from_millis(self.progress_interval_ms),
            min_delta_pct: self.progress_min_delta_pct,
            smoothing: self.speed_smoothing,
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

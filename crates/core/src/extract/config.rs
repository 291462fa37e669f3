//! Configuration for the extraction engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::progress::TrackerSettings;

/// Configuration for the archive extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Hoist the contents of a lone top-level directory into the target.
    #[serde(default = "default_true")]
    pub strip_single_root: bool,

    /// Minimum time between two progress samples (milliseconds).
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_progress_interval() -> u64 {
    100
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            strip_single_root: true,
            progress_interval_ms: default_progress_interval(),
        }
    }
}

impl ExtractorConfig {
    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            min_interval: Duration::from_millis(self.progress_interval_ms),
            ..TrackerSettings::default()
        }
    }

    pub fn with_strip_single_root(mut self, enabled: bool) -> Self {
        self.strip_single_root = enabled;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval_ms = interval.as_millis() as u64;
        self
    }
}

//! Types for progress reporting.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Phase an in-flight operation reports progress for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Downloading,
    Unzipping,
}

impl ProgressPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressPhase::Downloading => "downloading",
            ProgressPhase::Unzipping => "unzipping",
        }
    }
}

/// A point-in-time progress reading produced by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    /// Completion in percent, `0.0..=100.0`.
    pub percentage: f64,
    /// Smoothed throughput in bytes per second.
    pub average_speed_bytes_per_sec: f64,
    /// Best-effort time until completion.
    #[serde(with = "duration_secs")]
    pub estimated_time_remaining: Duration,
}

impl ProgressSample {
    pub fn new(percentage: f64, average_speed_bytes_per_sec: f64, eta: Duration) -> Self {
        Self {
            percentage: percentage.clamp(0.0, 100.0),
            average_speed_bytes_per_sec: average_speed_bytes_per_sec.max(0.0),
            estimated_time_remaining: eta,
        }
    }

    /// A sample reporting completion.
    pub fn complete(average_speed_bytes_per_sec: f64) -> Self {
        Self::new(100.0, average_speed_bytes_per_sec, Duration::ZERO)
    }

    /// Remaining time as `HH:MM:SS`.
    pub fn eta_display(&self) -> String {
        let total = self.estimated_time_remaining.as_secs();
        format!(
            "{:02}:{:02}:{:02}",
            total / 3600,
            (total % 3600) / 60,
            total % 60
        )
    }
}

/// A progress sample tagged with the phase that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    #[serde(flatten)]
    pub sample: ProgressSample,
}

impl ProgressEvent {
    pub fn new(phase: ProgressPhase, sample: ProgressSample) -> Self {
        Self { phase, sample }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

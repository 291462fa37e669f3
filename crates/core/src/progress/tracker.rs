//! Throughput tracking and sample throttling.

use std::time::{Duration, Instant};

use super::types::ProgressSample;

/// Without percentage movement a sample is still emitted this often, so the
/// ETA keeps updating on slow transfers.
const HEARTBEAT: Duration = Duration::from_secs(1);

/// Throttling and smoothing parameters for a [`ProgressTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerSettings {
    /// Minimum time between two samples.
    pub min_interval: Duration,
    /// Minimum percentage movement between two samples.
    pub min_delta_pct: f64,
    /// Weight of the newest throughput reading in the moving average, `(0, 1]`.
    pub smoothing: f64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(100),
            min_delta_pct: 1.0,
            smoothing: 0.3,
        }
    }
}

struct Mark {
    at: Instant,
    done: u64,
    percentage: f64,
}

/// Turns a running byte count into throttled [`ProgressSample`]s.
///
/// Throughput is an exponential moving average over the intervals between
/// emitted samples, which keeps the ETA steady on bursty transfers. A sample
/// is emitted for the first reading, then only once `min_interval` has
/// passed and the percentage moved by `min_delta_pct` (or a second went by).
pub struct ProgressTracker {
    total: u64,
    settings: TrackerSettings,
    started: Instant,
    last: Option<Mark>,
    smoothed_speed: Option<f64>,
    done: u64,
}

impl ProgressTracker {
    pub fn new(total: u64, settings: TrackerSettings) -> Self {
        Self::starting_at(total, settings, Instant::now())
    }

    pub fn starting_at(total: u64, settings: TrackerSettings, started: Instant) -> Self {
        Self {
            total,
            settings,
            started,
            last: None,
            smoothed_speed: None,
            done: 0,
        }
    }

    /// Updates the expected total, e.g. once a Content-Length is known.
    pub fn set_total(&mut self, total: u64) {
        self.total = total;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    fn percentage(&self, done: u64) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (done as f64 / self.total as f64 * 100.0).min(100.0)
    }

    /// Records `done` units and returns a sample if one is due.
    pub fn record(&mut self, done: u64) -> Option<ProgressSample> {
        self.record_at(done, Instant::now())
    }

    pub fn record_at(&mut self, done: u64, now: Instant) -> Option<ProgressSample> {
        self.done = done;
        let percentage = self.percentage(done);

        if let Some(last) = &self.last {
            let elapsed = now.saturating_duration_since(last.at);
            if elapsed < self.settings.min_interval {
                return None;
            }
            let moved = percentage - last.percentage >= self.settings.min_delta_pct;
            if !moved && elapsed < HEARTBEAT {
                return None;
            }
        }

        Some(self.emit(done, percentage, now))
    }

    /// Final sample at 100%, emitted unconditionally.
    pub fn finish(&mut self) -> ProgressSample {
        self.finish_at(Instant::now())
    }

    pub fn finish_at(&mut self, now: Instant) -> ProgressSample {
        let done = self.done.max(self.total);
        self.emit(done, 100.0, now);
        ProgressSample::complete(self.smoothed_speed.unwrap_or(0.0))
    }

    fn emit(&mut self, done: u64, percentage: f64, now: Instant) -> ProgressSample {
        let (since, base) = match &self.last {
            Some(last) => (last.at, last.done),
            None => (self.started, 0),
        };
        let secs = now.saturating_duration_since(since).as_secs_f64();
        if secs > 0.0 {
            let instant_speed = done.saturating_sub(base) as f64 / secs;
            let alpha = self.settings.smoothing;
            self.smoothed_speed = Some(match self.smoothed_speed {
                Some(prev) => alpha * instant_speed + (1.0 - alpha) * prev,
                None => instant_speed,
            });
        }
        self.last = Some(Mark {
            at: now,
            done,
            percentage,
        });

        let speed = self.smoothed_speed.unwrap_or(0.0);
        let remaining = self.total.saturating_sub(done) as f64;
        let eta = if speed > 0.0 {
            Duration::try_from_secs_f64(remaining / speed).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        ProgressSample::new(percentage, speed, eta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_first_reading_is_emitted() {
        let t0 = Instant::now();
        let mut tracker = ProgressTracker::starting_at(1000, TrackerSettings::default(), t0);
        let sample = tracker.record_at(0, t0).unwrap();
        assert_eq!(sample.percentage, 0.0);
    }

    #[test]
    fn test_throttles_on_interval() {
        let t0 = Instant::now();
        let mut tracker = ProgressTracker::starting_at(1000, TrackerSettings::default(), t0);
        tracker.record_at(0, t0).unwrap();

        // 50% moved but only 10ms passed.
        assert!(tracker.record_at(500, t0 + ms(10)).is_none());
        let sample = tracker.record_at(500, t0 + ms(100)).unwrap();
        assert_eq!(sample.percentage, 50.0);
    }

    #[test]
    fn test_throttles_on_delta_until_heartbeat() {
        let t0 = Instant::now();
        let mut tracker = ProgressTracker::starting_at(100_000, TrackerSettings::default(), t0);
        tracker.record_at(0, t0).unwrap();

        // 0.5% after 200ms: not enough movement.
        assert!(tracker.record_at(500, t0 + ms(200)).is_none());
        // Still 0.5% but a full second has gone by.
        assert!(tracker.record_at(500, t0 + ms(1000)).is_some());
    }

    #[test]
    fn test_speed_and_eta() {
        let t0 = Instant::now();
        let mut tracker = ProgressTracker::starting_at(10_000, TrackerSettings::default(), t0);
        tracker.record_at(0, t0);

        let sample = tracker.record_at(1000, t0 + ms(1000)).unwrap();
        assert!((sample.average_speed_bytes_per_sec - 1000.0).abs() < 1e-6);
        assert_eq!(sample.estimated_time_remaining.as_secs(), 9);
    }

    #[test]
    fn test_smoothing_damps_bursts() {
        let t0 = Instant::now();
        let mut tracker = ProgressTracker::starting_at(1_000_000, TrackerSettings::default(), t0);
        tracker.record_at(0, t0);
        tracker.record_at(10_000, t0 + ms(1000)).unwrap();

        // A 10x burst over the next second only moves the average by alpha.
        let sample = tracker.record_at(110_000, t0 + ms(2000)).unwrap();
        let expected = 0.3 * 100_000.0 + 0.7 * 10_000.0;
        assert!((sample.average_speed_bytes_per_sec - expected).abs() < 1e-6);
    }

    #[test]
    fn test_percentages_are_non_decreasing_and_finish_at_100() {
        let t0 = Instant::now();
        let mut tracker = ProgressTracker::starting_at(1_000_000, TrackerSettings::default(), t0);
        let mut samples = Vec::new();
        for step in 0..=100u64 {
            if let Some(s) = tracker.record_at(step * 10_000, t0 + ms(step * 37)) {
                samples.push(s);
            }
        }
        samples.push(tracker.finish_at(t0 + ms(4000)));

        assert!(samples
            .windows(2)
            .all(|w| w[0].percentage <= w[1].percentage));
        assert_eq!(samples.last().unwrap().percentage, 100.0);
        assert_eq!(samples.last().unwrap().estimated_time_remaining, Duration::ZERO);
    }

    #[test]
    fn test_unknown_total_reports_zero_percent() {
        let t0 = Instant::now();
        let mut tracker = ProgressTracker::starting_at(0, TrackerSettings::default(), t0);
        let sample = tracker.record_at(5000, t0 + ms(500)).unwrap();
        assert_eq!(sample.percentage, 0.0);
        assert_eq!(sample.estimated_time_remaining, Duration::ZERO);
    }
}

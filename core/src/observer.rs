//! MetaObserver — metrics for the inference adapter.
//!
//! Collects structured metrics on:
//! - request counts (submitted / completed / failed),
//! - completed-request latency (EMA, min, max),
//! - tensor traffic (elements in / out).
//!
//! The observer sits on the hot path of every request, so it never locks,
//! never logs and never panics; the engine owns one and updates it inline.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Latency statistics for completed requests.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyStats {
    /// Latency of the most recently completed request, in milliseconds.
    pub last_ms: f64,
    /// Exponential moving average of latency, in milliseconds.
    pub avg_ms_ema: f64,
    /// Largest latency observed, in milliseconds.
    pub max_ms: f64,
    /// Smallest latency observed, in milliseconds.
    pub min_ms: f64,
}

/// Snapshot of every metric the observer tracks.
///
/// This is the DTO handed out by [`crate::engine::NeuralEngine::metrics`];
/// it is detached from the live counters.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    /// Timestamp (milliseconds since 1970-01-01 UTC) of the last update.
    pub last_update_ms: u128,
    /// Requests accepted by `submit`.
    pub submitted: u64,
    /// Requests that resolved with outputs.
    pub completed: u64,
    /// Requests that resolved with an error.
    pub failed: u64,
    /// Latency statistics over completed requests.
    pub latency: LatencyStats,
    /// Total input elements fed to the backend.
    pub input_elements: u64,
    /// Total output elements produced by the backend.
    pub output_elements: u64,
}

/// Per-engine inference metrics.
#[derive(Debug, Default)]
pub struct MetaObserver {
    submitted: u64,
    completed: u64,
    failed: u64,

    latency_last_ms: f64,
    latency_avg_ema_ms: f64,
    latency_max_ms: f64,
    latency_min_ms: f64,

    input_elements: u64,
    output_elements: u64,

    last_update_ms: u128,
}

impl MetaObserver {
    /// A fresh observer with every metric at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an accepted submission and the elements it carried.
    pub fn record_submitted(&mut self, input_elements: u64) {
        self.submitted = self.submitted.saturating_add(1);
        self.input_elements = self.input_elements.saturating_add(input_elements);
        self.touch();
    }

    /// Records a successfully resolved request.
    pub fn record_completed(&mut self, latency: Duration, output_elements: u64) {
        self.completed = self.completed.saturating_add(1);
        self.output_elements = self.output_elements.saturating_add(output_elements);

        let latency_ms = duration_to_ms(latency);
        self.latency_last_ms = latency_ms;
        if self.completed == 1 {
            self.latency_avg_ema_ms = latency_ms;
            self.latency_min_ms = latency_ms;
            self.latency_max_ms = latency_ms;
        } else {
            // Fixed alpha: reactive without being noisy.
            const ALPHA: f64 = 0.1;
            self.latency_avg_ema_ms = (1.0 - ALPHA) * self.latency_avg_ema_ms + ALPHA * latency_ms;
            if latency_ms > self.latency_max_ms {
                self.latency_max_ms = latency_ms;
            }
            if latency_ms < self.latency_min_ms {
                self.latency_min_ms = latency_ms;
            }
        }
        self.touch();
    }

    /// Records a request that resolved with an error.
    pub fn record_failed(&mut self) {
        self.failed = self.failed.saturating_add(1);
        self.touch();
    }

    /// An immutable snapshot of the current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            last_update_ms: self.last_update_ms,
            submitted: self.submitted,
            completed: self.completed,
            failed: self.failed,
            latency: LatencyStats {
                last_ms: self.latency_last_ms,
                avg_ms_ema: self.latency_avg_ema_ms,
                max_ms: self.latency_max_ms,
                min_ms: self.latency_min_ms,
            },
            input_elements: self.input_elements,
            output_elements: self.output_elements,
        }
    }

    /// Resets every metric to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn touch(&mut self) {
        self.last_update_ms = current_unix_time_ms();
    }
}

/// Converts a [`Duration`] to milliseconds (f64).
fn duration_to_ms(d: Duration) -> f64 {
    let secs = d.as_secs() as f64;
    let nanos = f64::from(d.subsec_nanos());
    secs * 1_000.0 + nanos / 1_000_000.0
}

/// Current time in milliseconds since 1970-01-01 UTC; 0 on clock errors
/// rather than panicking on the hot path.
fn current_unix_time_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_observer_has_zero_metrics() {
        let obs = MetaObserver::new();
        let snap = obs.snapshot();

        assert_eq!(snap.submitted, 0);
        assert_eq!(snap.completed, 0);
        assert_eq!(snap.failed, 0);
        assert_eq!(snap.input_elements, 0);
        assert_eq!(snap.output_elements, 0);
    }

    #[test]
    fn record_updates_counters_and_traffic() {
        let mut obs = MetaObserver::new();

        obs.record_submitted(48);
        obs.record_completed(Duration::from_millis(42), 5);

        let snap = obs.snapshot();
        assert_eq!(snap.submitted, 1);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.input_elements, 48);
        assert_eq!(snap.output_elements, 5);
        assert!(snap.latency.last_ms > 0.0);
        assert!(snap.latency.avg_ms_ema > 0.0);
    }

    #[test]
    fn latency_min_max_track_extremes() {
        let mut obs = MetaObserver::new();

        obs.record_completed(Duration::from_millis(10), 1);
        obs.record_completed(Duration::from_millis(90), 1);
        obs.record_completed(Duration::from_millis(30), 1);

        let snap = obs.snapshot();
        assert_eq!(snap.latency.min_ms, 10.0);
        assert_eq!(snap.latency.max_ms, 90.0);
        assert_eq!(snap.latency.last_ms, 30.0);
        assert!(snap.latency.avg_ms_ema > 10.0);
        assert!(snap.latency.avg_ms_ema < 90.0);
    }

    #[test]
    fn failures_do_not_touch_latency() {
        let mut obs = MetaObserver::new();

        obs.record_submitted(1);
        obs.record_failed();

        let snap = obs.snapshot();
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.completed, 0);
        assert_eq!(snap.latency.last_ms, 0.0);
    }

    #[test]
    fn reset_clears_metrics() {
        let mut obs = MetaObserver::new();

        obs.record_submitted(10);
        obs.record_completed(Duration::from_millis(5), 2);
        assert_eq!(obs.snapshot().submitted, 1);

        obs.reset();
        let snap = obs.snapshot();
        assert_eq!(snap.submitted, 0);
        assert_eq!(snap.completed, 0);
        assert_eq!(snap.output_elements, 0);
    }
}

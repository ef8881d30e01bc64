//! Progress and failure reporting
//!
//! The sweep runner observes every completed unit; [`ProgressReporter`]
//! turns that stream into snapshots throttled by wall-clock time (default
//! one report per 10 seconds -- the time-based policy, not unit-count).
//! Interval durations feed a rolling window of the last 20 intervals and
//! the mean of the filled window smooths out bursty units.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Wall-clock throttle between progress reports.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// How many interval durations the smoothing window holds.
const SMOOTHING_WINDOW: usize = 20;

/// One throttled progress observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Units completed so far
    pub index: usize,
    /// Total units in the sweep
    pub total: usize,
    /// Smoothed seconds per reporting interval
    pub time_per_interval: f64,
    /// Units completed since the previous report
    pub interval: usize,
}

/// Emits at most one [`ProgressSnapshot`] per configured wall-clock
/// threshold, smoothing interval durations over a fixed-size window.
#[derive(Debug)]
pub struct ProgressReporter {
    total: usize,
    threshold: Duration,
    window: VecDeque<f64>,
    interval_start: Instant,
    last_index: usize,
}

impl ProgressReporter {
    /// Create a reporter for a sweep of `total` units with the default
    /// threshold.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self::with_threshold(total, DEFAULT_REPORT_INTERVAL)
    }

    /// Create a reporter with a custom wall-clock threshold.
    #[must_use]
    pub fn with_threshold(total: usize, threshold: Duration) -> Self {
        Self {
            total,
            threshold,
            window: VecDeque::with_capacity(SMOOTHING_WINDOW),
            interval_start: Instant::now(),
            last_index: 0,
        }
    }

    /// Observe that `index` units have completed.
    ///
    /// Returns a snapshot when at least the threshold has elapsed since
    /// the last report, `None` otherwise.
    pub fn observe(&mut self, index: usize) -> Option<ProgressSnapshot> {
        let elapsed = self.interval_start.elapsed();
        if elapsed < self.threshold {
            return None;
        }

        if self.window.len() == SMOOTHING_WINDOW {
            self.window.pop_back();
        }
        self.window.push_front(elapsed.as_secs_f64());
        let mean = self.window.iter().sum::<f64>() / self.window.len() as f64;

        let snapshot = ProgressSnapshot {
            index,
            total: self.total,
            time_per_interval: mean,
            interval: index - self.last_index,
        };
        self.interval_start = Instant::now();
        self.last_index = index;
        Some(snapshot)
    }
}

/// Terminal failure report for a sweep that aborted.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    /// Formatted error chain or panic trace
    pub error: String,
    /// Tracking-service experiment id, when the sweep was remote
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,
}

impl FailureReport {
    /// Build a failure report from a formatted trace.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), experiment_id: None }
    }

    /// Attach the experiment id the failure belongs to.
    #[must_use]
    pub fn for_experiment(mut self, id: impl Into<String>) -> Self {
        self.experiment_id = Some(id.into());
        self
    }
}

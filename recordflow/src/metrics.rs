//! Run and stage metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Metrics for one stage, accumulated per stage invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    /// Times the stage was invoked.
    pub executions: u64,
    /// Invocations that ended in a terminal failure.
    pub failures: u64,
    /// Wall time across invocations, retries and backoff included.
    pub total_time_ms: f64,
    /// When the stage last finished an invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution: Option<DateTime<Utc>>,
}

impl StageMetrics {
    /// Average wall time per invocation.
    #[must_use]
    pub fn average_time_ms(&self) -> f64 {
        if self.executions == 0 {
            return 0.0;
        }
        self.total_time_ms / self.executions as f64
    }
}

/// Aggregate metrics for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Records in the output of successful runs.
    pub processed_records: u64,
    /// Input records of runs that aborted.
    pub failed_records: u64,
    /// Wall time of the run (or batched operation).
    pub total_processing_time_ms: f64,
    /// Per-stage metrics keyed by stage name.
    #[serde(default)]
    pub per_stage: HashMap<String, StageMetrics>,
}

impl RunMetrics {
    /// Creates empty metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Records one stage invocation.
    pub fn record_stage(&mut self, stage: &str, elapsed: Duration, success: bool) {
        let entry = self.per_stage.entry(stage.to_string()).or_default();
        entry.executions += 1;
        if !success {
            entry.failures += 1;
        }
        entry.total_time_ms += elapsed.as_secs_f64() * 1000.0;
        entry.last_execution = Some(Utc::now());
    }

    /// Returns metrics for one stage.
    #[must_use]
    pub fn stage(&self, stage: &str) -> Option<&StageMetrics> {
        self.per_stage.get(stage)
    }

    /// Builds the error report for the given threshold.
    #[must_use]
    pub fn error_report(&self, error_threshold: f64) -> ErrorReport {
        let is_above_threshold = if self.processed_records == 0 {
            self.failed_records > 0
        } else {
            self.failed_records as f64 / self.processed_records as f64 > error_threshold
        };

        ErrorReport {
            total_errors: self.failed_records,
            error_threshold,
            is_above_threshold,
        }
    }
}

/// Error summary for caller-side alerting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Failed records so far.
    pub total_errors: u64,
    /// The configured threshold.
    pub error_threshold: f64,
    /// Whether failed/processed exceeds the threshold.
    pub is_above_threshold: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_stage() {
        let mut metrics = RunMetrics::new();
        metrics.record_stage("load", Duration::from_millis(20), true);
        metrics.record_stage("load", Duration::from_millis(40), false);

        let load = metrics.stage("load").unwrap();
        assert_eq!(load.executions, 2);
        assert_eq!(load.failures, 1);
        assert!((load.total_time_ms - 60.0).abs() < 1e-6);
        assert!((load.average_time_ms() - 30.0).abs() < 1e-6);
        assert!(load.last_execution.is_some());
    }

    #[test]
    fn test_reset() {
        let mut metrics = RunMetrics::new();
        metrics.processed_records = 10;
        metrics.record_stage("load", Duration::from_millis(1), true);
        metrics.reset();

        assert_eq!(metrics, RunMetrics::default());
    }

    #[test]
    fn test_error_report_threshold() {
        let mut metrics = RunMetrics::new();
        metrics.processed_records = 100;
        metrics.failed_records = 5;
        assert!(!metrics.error_report(0.1).is_above_threshold);

        metrics.failed_records = 11;
        let report = metrics.error_report(0.1);
        assert!(report.is_above_threshold);
        assert_eq!(report.total_errors, 11);
        assert!((report.error_threshold - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_error_report_without_processed_records() {
        let mut metrics = RunMetrics::new();
        assert!(!metrics.error_report(0.1).is_above_threshold);

        metrics.failed_records = 1;
        assert!(metrics.error_report(0.1).is_above_threshold);
    }
}

//! Construction-time configuration for the orchestrator.

use crate::checkpoint::{DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_MAX_CHECKPOINTS};
use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Reserved for a future parallel executor. Stages always run sequentially.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Default chunk size for batched runs.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Default attempt budget for stages registered without one.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Default per-attempt timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Failed/processed record ratio above which error reports flag an alert.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: f64,
    /// Records processed between automatic checkpoints.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,
    /// Checkpoints retained before eviction.
    #[serde(default = "default_max_checkpoints")]
    pub max_checkpoints: usize,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_batch_size() -> usize {
    100
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_error_threshold() -> f64 {
    0.1
}

fn default_checkpoint_interval() -> u64 {
    DEFAULT_CHECKPOINT_INTERVAL
}

fn default_max_checkpoints() -> usize {
    DEFAULT_MAX_CHECKPOINTS
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            batch_size: default_batch_size(),
            retry_attempts: default_retry_attempts(),
            timeout_ms: default_timeout_ms(),
            error_threshold: default_error_threshold(),
            checkpoint_interval: default_checkpoint_interval(),
            max_checkpoints: default_max_checkpoints(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the reserved concurrency limit.
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Sets the default batch size.
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the default attempt budget.
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Sets the default timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets the error threshold.
    #[must_use]
    pub fn with_error_threshold(mut self, threshold: f64) -> Self {
        self.error_threshold = threshold;
        self
    }

    /// Sets the checkpoint interval.
    #[must_use]
    pub fn with_checkpoint_interval(mut self, interval: u64) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Sets the checkpoint buffer capacity.
    #[must_use]
    pub fn with_max_checkpoints(mut self, max: usize) -> Self {
        self.max_checkpoints = max;
        self
    }

    /// Returns the default timeout as a duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.batch_size == 0 {
            return Err(PipelineError::Config("batch_size must be positive".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(PipelineError::Config("timeout_ms must be positive".to_string()));
        }
        if self.checkpoint_interval == 0 {
            return Err(PipelineError::Config(
                "checkpoint_interval must be positive".to_string(),
            ));
        }
        if self.max_checkpoints == 0 {
            return Err(PipelineError::Config("max_checkpoints must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.error_threshold) {
            return Err(PipelineError::Config(format!(
                "error_threshold must be within [0, 1], got {}",
                self.error_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.checkpoint_interval, 1000);
        assert_eq!(config.max_checkpoints, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::new()
            .with_batch_size(10)
            .with_retry_attempts(5)
            .with_timeout_ms(250)
            .with_error_threshold(0.5)
            .with_checkpoint_interval(20)
            .with_max_checkpoints(2)
            .with_max_concurrency(1);

        assert_eq!(config.batch_size, 10);
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.checkpoint_interval, 20);
        assert_eq!(config.max_checkpoints, 2);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = PipelineConfig::from_json(r#"{"batch_size": 5, "timeout_ms": 100}"#).unwrap();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.timeout_ms, 100);
        assert_eq!(config.retry_attempts, 3);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(matches!(
            PipelineConfig::from_json(r#"{"batch_size": 0}"#),
            Err(PipelineError::Config(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json("not json"),
            Err(PipelineError::Serialization(_))
        ));
    }

    #[test]
    fn test_validate_threshold_range() {
        assert!(PipelineConfig::new().with_error_threshold(1.5).validate().is_err());
        assert!(PipelineConfig::new().with_error_threshold(-0.1).validate().is_err());
        assert!(PipelineConfig::new().with_error_threshold(0.0).validate().is_ok());
    }
}

//! The mutable context for a pipeline run.

use crate::checkpoint::Checkpoint;
use crate::core::{Record, StageAttempt};
use crate::errors::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// An error recorded by a stage that was allowed to fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// The stage that failed.
    pub stage: String,
    /// The error message.
    pub message: String,
    /// The error kind (e.g. "StageTimeoutError").
    pub kind: String,
    /// When the error was recorded.
    pub timestamp: DateTime<Utc>,
}

/// A non-fatal observation recorded during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningEntry {
    /// The stage that raised the warning, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// The warning message.
    pub message: String,
    /// When the warning was recorded.
    pub timestamp: DateTime<Utc>,
}

/// The context of a single run.
///
/// Owned by exactly one run. Stages receive it by exclusive reference and
/// may read prior results, rewrite the record set and add results,
/// metadata, errors and warnings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Run id, shared with lifecycle events.
    pub run_id: Uuid,
    /// The working record set.
    pub records: Vec<Record>,
    /// Free-form run metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Errors from stages that continue on error.
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
    /// Warnings raised during the run.
    #[serde(default)]
    pub warnings: Vec<WarningEntry>,
    /// Results of completed stages keyed by stage name.
    #[serde(default)]
    pub stage_results: HashMap<String, serde_json::Value>,
    /// Every stage attempt made in this run, in order.
    #[serde(default)]
    pub attempts: Vec<StageAttempt>,
}

impl ExecutionContext {
    /// Creates a fresh context seeded with the run's input records.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            records,
            ..Self::default()
        }
    }

    /// Creates a context that resumes from a checkpoint.
    ///
    /// Stage results are copied from the checkpoint so stages that already
    /// completed can be skipped and their dependents gated correctly.
    #[must_use]
    pub fn resume_from(records: Vec<Record>, checkpoint: &Checkpoint) -> Self {
        let mut ctx = Self::new(records);
        ctx.stage_results = checkpoint.stage_results.clone();
        ctx.metadata.insert(
            "resumed_from".to_string(),
            serde_json::json!(checkpoint.id),
        );
        ctx
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns the result of a completed stage.
    #[must_use]
    pub fn stage_result(&self, stage: &str) -> Option<&serde_json::Value> {
        self.stage_results.get(stage)
    }

    /// Returns true if the stage has completed in this context.
    #[must_use]
    pub fn has_result(&self, stage: &str) -> bool {
        self.stage_results.contains_key(stage)
    }

    /// Returns the number of records in the working set.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Records a stage error.
    pub fn record_error(&mut self, stage: impl Into<String>, error: &PipelineError) {
        self.errors.push(ErrorEntry {
            stage: stage.into(),
            message: error.to_string(),
            kind: error.kind().to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Records a warning.
    pub fn record_warning(&mut self, stage: Option<&str>, message: impl Into<String>) {
        self.warnings.push(WarningEntry {
            stage: stage.map(str::to_string),
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    /// Returns the attempts made for one stage.
    #[must_use]
    pub fn attempts_for(&self, stage: &str) -> Vec<&StageAttempt> {
        self.attempts.iter().filter(|a| a.stage_name == stage).collect()
    }
}

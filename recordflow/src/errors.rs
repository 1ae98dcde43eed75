//! Error types for the recordflow engine.
//!
//! Errors fall into two classes. Configuration errors (unknown stages,
//! cycles, unsatisfied dependencies) are surfaced immediately and never
//! retried. Transient errors (timeouts, stage failures) are retried up to the
//! stage's retry budget.

use crate::context::ExecutionContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for recordflow operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage name is not present in the registry.
    #[error(
        "Unknown stage '{name}'{}",
        referenced_by
            .as_ref()
            .map(|s| format!(" (referenced by '{s}')"))
            .unwrap_or_default()
    )]
    UnknownStage {
        /// The missing stage name.
        name: String,
        /// The stage whose dependency list named it, if any.
        referenced_by: Option<String>,
    },

    /// The registered dependency graph contains a cycle.
    #[error("Cyclic dependency detected at stage '{stage}': {}", cycle.join(" -> "))]
    CyclicDependency {
        /// The stage revisited while still on the traversal stack.
        stage: String,
        /// The path forming the cycle, first and last entries equal.
        cycle: Vec<String>,
    },

    /// A dependency has no result in the execution context.
    #[error("Stage '{stage}' depends on '{missing}', which has not completed in this run")]
    UnsatisfiedDependency {
        /// The stage being executed.
        stage: String,
        /// The dependency without a result.
        missing: String,
    },

    /// A stage attempt exceeded its timeout.
    #[error("Stage '{stage}' timed out after {timeout_ms}ms on attempt {attempt}")]
    StageTimeout {
        /// The stage name.
        stage: String,
        /// The configured timeout.
        timeout_ms: u64,
        /// The 1-indexed attempt that timed out.
        attempt: u32,
    },

    /// A stage executable returned an error.
    #[error("Stage '{stage}' failed on attempt {attempt}: {message}")]
    StageExecution {
        /// The stage name.
        stage: String,
        /// The 1-indexed attempt that failed.
        attempt: u32,
        /// The underlying error, including its cause chain.
        message: String,
    },

    /// A run is already in progress on this orchestrator.
    #[error("Pipeline is already running")]
    PipelineAlreadyRunning,

    /// No checkpoint exists with the given id.
    #[error("Checkpoint not found: {id}")]
    CheckpointNotFound {
        /// The requested checkpoint id.
        id: String,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Creates an unknown stage error.
    #[must_use]
    pub fn unknown_stage(name: impl Into<String>) -> Self {
        Self::UnknownStage {
            name: name.into(),
            referenced_by: None,
        }
    }

    /// Creates an unknown stage error for a dangling dependency.
    #[must_use]
    pub fn unknown_dependency(name: impl Into<String>, referenced_by: impl Into<String>) -> Self {
        Self::UnknownStage {
            name: name.into(),
            referenced_by: Some(referenced_by.into()),
        }
    }

    /// Creates an unsatisfied dependency error.
    #[must_use]
    pub fn unsatisfied(stage: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::UnsatisfiedDependency {
            stage: stage.into(),
            missing: missing.into(),
        }
    }

    /// Creates a stage execution error from an executable failure.
    #[must_use]
    pub fn execution(stage: impl Into<String>, attempt: u32, source: &anyhow::Error) -> Self {
        Self::StageExecution {
            stage: stage.into(),
            attempt,
            message: format!("{source:#}"),
        }
    }

    /// Returns true for transient errors that the executor may retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StageTimeout { .. } | Self::StageExecution { .. })
    }

    /// Returns the stage this error concerns, if any.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::UnknownStage { name, .. } => Some(name.as_str()),
            Self::CyclicDependency { stage, .. }
            | Self::UnsatisfiedDependency { stage, .. }
            | Self::StageTimeout { stage, .. }
            | Self::StageExecution { stage, .. } => Some(stage.as_str()),
            _ => None,
        }
    }

    /// Returns the stable error kind name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownStage { .. } => "UnknownStageError",
            Self::CyclicDependency { .. } => "CyclicDependencyError",
            Self::UnsatisfiedDependency { .. } => "UnsatisfiedDependencyError",
            Self::StageTimeout { .. } => "StageTimeoutError",
            Self::StageExecution { .. } => "StageExecutionError",
            Self::PipelineAlreadyRunning => "PipelineAlreadyRunningError",
            Self::CheckpointNotFound { .. } => "CheckpointNotFoundError",
            Self::Config(_) => "ConfigError",
            Self::Serialization(_) => "SerializationError",
            Self::Io(_) => "IoError",
        }
    }

    /// Builds diagnostic info with a code and a fix hint.
    #[must_use]
    pub fn error_info(&self) -> ContractErrorInfo {
        let info = match self {
            Self::UnknownStage { name, referenced_by } => {
                let info = ContractErrorInfo::new("PIPELINE-UNKNOWN-STAGE", self.to_string())
                    .with_fix_hint("Register the stage before adding it to the pipeline or naming it as a dependency.")
                    .with_context_entry("stage", name);
                match referenced_by {
                    Some(parent) => info.with_context_entry("referenced_by", parent),
                    None => info,
                }
            }
            Self::CyclicDependency { stage, .. } => {
                ContractErrorInfo::new("PIPELINE-CYCLE", self.to_string())
                    .with_fix_hint("Remove one of the dependencies in the cycle to break it.")
                    .with_context_entry("stage", stage)
            }
            Self::UnsatisfiedDependency { stage, missing } => {
                ContractErrorInfo::new("PIPELINE-UNSATISFIED-DEP", self.to_string())
                    .with_fix_hint("Schedule the dependency earlier in the pipeline order.")
                    .with_context_entry("stage", stage)
                    .with_context_entry("missing", missing)
            }
            Self::StageTimeout { stage, timeout_ms, .. } => {
                ContractErrorInfo::new("STAGE-TIMEOUT", self.to_string())
                    .with_fix_hint("Raise the stage timeout or make the stage faster.")
                    .with_context_entry("stage", stage)
                    .with_context_entry("timeout_ms", timeout_ms.to_string())
            }
            Self::StageExecution { stage, attempt, .. } => {
                ContractErrorInfo::new("STAGE-EXECUTION", self.to_string())
                    .with_context_entry("stage", stage)
                    .with_context_entry("attempt", attempt.to_string())
            }
            Self::PipelineAlreadyRunning => {
                ContractErrorInfo::new("PIPELINE-ALREADY-RUNNING", self.to_string())
                    .with_fix_hint("Wait for the active run to finish or use a separate orchestrator.")
            }
            Self::CheckpointNotFound { id } => {
                ContractErrorInfo::new("CHECKPOINT-NOT-FOUND", self.to_string())
                    .with_fix_hint("Older checkpoints are evicted once the buffer is full.")
                    .with_context_entry("checkpoint_id", id)
            }
            Self::Config(_) => ContractErrorInfo::new("CONFIG-INVALID", self.to_string()),
            Self::Serialization(_) => ContractErrorInfo::new("SERIALIZATION", self.to_string()),
            Self::Io(_) => ContractErrorInfo::new("IO", self.to_string()),
        };
        info.with_context_entry("kind", self.kind())
    }
}

/// Error returned by a failed run.
///
/// Carries the failing stage, the number of attempts made and the partially
/// populated context so the failure can be diagnosed without re-running.
#[derive(Debug, Error)]
#[error(
    "Pipeline run failed{}: {error}",
    stage
        .as_ref()
        .map(|s| format!(" at stage '{s}' after {attempts} attempt(s)"))
        .unwrap_or_default()
)]
pub struct RunError {
    /// The underlying error.
    #[source]
    pub error: PipelineError,
    /// The stage that aborted the run.
    pub stage: Option<String>,
    /// Attempts made by that stage.
    pub attempts: u32,
    /// Context as it stood when the run aborted.
    pub context: Option<Box<ExecutionContext>>,
}

impl RunError {
    /// Wraps an error that occurred before any context existed.
    #[must_use]
    pub fn without_context(error: PipelineError) -> Self {
        Self {
            error,
            stage: None,
            attempts: 0,
            context: None,
        }
    }

    /// Wraps a stage failure together with the partial context.
    #[must_use]
    pub fn at_stage(
        error: PipelineError,
        stage: impl Into<String>,
        attempts: u32,
        context: ExecutionContext,
    ) -> Self {
        Self {
            error,
            stage: Some(stage.into()),
            attempts,
            context: Some(Box::new(context)),
        }
    }

    /// Returns true if the run was rejected because another run was active.
    #[must_use]
    pub fn is_already_running(&self) -> bool {
        matches!(self.error, PipelineError::PipelineAlreadyRunning)
    }
}

impl From<PipelineError> for RunError {
    fn from(error: PipelineError) -> Self {
        Self::without_context(error)
    }
}

/// Metadata about an error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "PIPELINE-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

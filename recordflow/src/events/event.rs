//! Lifecycle event types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The kind of a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A run started.
    #[serde(rename = "pipeline:start")]
    PipelineStart,
    /// A run finished successfully.
    #[serde(rename = "pipeline:complete")]
    PipelineComplete,
    /// A run aborted.
    #[serde(rename = "pipeline:error")]
    PipelineError,
    /// A stage invocation started.
    #[serde(rename = "stage:start")]
    StageStart,
    /// A stage invocation succeeded.
    #[serde(rename = "stage:complete")]
    StageComplete,
    /// A stage invocation failed terminally.
    #[serde(rename = "stage:error")]
    StageError,
    /// A stage attempt failed and will be retried.
    #[serde(rename = "stage:retry")]
    StageRetry,
    /// A checkpoint was taken.
    #[serde(rename = "checkpoint:created")]
    CheckpointCreated,
}

impl EventKind {
    /// Every event kind.
    pub const ALL: [Self; 8] = [
        Self::PipelineStart,
        Self::PipelineComplete,
        Self::PipelineError,
        Self::StageStart,
        Self::StageComplete,
        Self::StageError,
        Self::StageRetry,
        Self::CheckpointCreated,
    ];

    /// Returns the wire name, e.g. `stage:retry`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PipelineStart => "pipeline:start",
            Self::PipelineComplete => "pipeline:complete",
            Self::PipelineError => "pipeline:error",
            Self::StageStart => "stage:start",
            Self::StageComplete => "stage:complete",
            Self::StageError => "stage:error",
            Self::StageRetry => "stage:retry",
            Self::CheckpointCreated => "checkpoint:created",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// A run started.
    #[serde(rename = "pipeline:start")]
    PipelineStart {
        /// Run id.
        run_id: Uuid,
        /// Input record count.
        record_count: usize,
        /// Stages scheduled for the run.
        stages: Vec<String>,
    },
    /// A run finished successfully.
    #[serde(rename = "pipeline:complete")]
    PipelineComplete {
        /// Run id.
        run_id: Uuid,
        /// Output record count.
        record_count: usize,
        /// Run wall time.
        duration_ms: f64,
    },
    /// A run aborted.
    #[serde(rename = "pipeline:error")]
    PipelineError {
        /// Run id.
        run_id: Uuid,
        /// The stage that aborted the run.
        stage: Option<String>,
        /// The error message.
        error: String,
    },
    /// A stage invocation started.
    #[serde(rename = "stage:start")]
    StageStart {
        /// Run id.
        run_id: Uuid,
        /// Stage name.
        stage: String,
    },
    /// A stage invocation succeeded.
    #[serde(rename = "stage:complete")]
    StageComplete {
        /// Run id.
        run_id: Uuid,
        /// Stage name.
        stage: String,
        /// Attempts used.
        attempts: u32,
        /// Invocation wall time, backoff included.
        duration_ms: f64,
    },
    /// A stage invocation failed terminally.
    #[serde(rename = "stage:error")]
    StageError {
        /// Run id.
        run_id: Uuid,
        /// Stage name.
        stage: String,
        /// The error message.
        error: String,
        /// Attempts used.
        attempts: u32,
        /// Whether the run continues past this failure.
        continued: bool,
    },
    /// A stage attempt failed and will be retried.
    #[serde(rename = "stage:retry")]
    StageRetry {
        /// Run id.
        run_id: Uuid,
        /// Stage name.
        stage: String,
        /// The attempt that failed.
        attempt: u32,
        /// Backoff before the next attempt.
        delay_ms: u64,
        /// The error message.
        error: String,
    },
    /// A checkpoint was taken.
    #[serde(rename = "checkpoint:created")]
    CheckpointCreated {
        /// Checkpoint id.
        checkpoint_id: String,
        /// Cumulative records processed.
        records_processed: u64,
    },
}

impl PipelineEvent {
    /// Returns the event kind.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PipelineStart { .. } => EventKind::PipelineStart,
            Self::PipelineComplete { .. } => EventKind::PipelineComplete,
            Self::PipelineError { .. } => EventKind::PipelineError,
            Self::StageStart { .. } => EventKind::StageStart,
            Self::StageComplete { .. } => EventKind::StageComplete,
            Self::StageError { .. } => EventKind::StageError,
            Self::StageRetry { .. } => EventKind::StageRetry,
            Self::CheckpointCreated { .. } => EventKind::CheckpointCreated,
        }
    }

    /// Returns the stage the event concerns, if any.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::StageStart { stage, .. }
            | Self::StageComplete { stage, .. }
            | Self::StageError { stage, .. }
            | Self::StageRetry { stage, .. } => Some(stage.as_str()),
            Self::PipelineError { stage, .. } => stage.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        let names: Vec<&str> = EventKind::ALL.iter().map(EventKind::as_str).collect();
        assert_eq!(
            names,
            vec![
                "pipeline:start",
                "pipeline:complete",
                "pipeline:error",
                "stage:start",
                "stage:complete",
                "stage:error",
                "stage:retry",
                "checkpoint:created",
            ]
        );
    }

    #[test]
    fn test_event_kind_and_stage() {
        let event = PipelineEvent::StageRetry {
            run_id: Uuid::nil(),
            stage: "load".to_string(),
            attempt: 1,
            delay_ms: 2000,
            error: "boom".to_string(),
        };
        assert_eq!(event.kind(), EventKind::StageRetry);
        assert_eq!(event.stage(), Some("load"));

        let event = PipelineEvent::CheckpointCreated {
            checkpoint_id: "checkpoint_1".to_string(),
            records_processed: 1000,
        };
        assert_eq!(event.stage(), None);
    }

    #[test]
    fn test_event_serialization_uses_wire_names() {
        let event = PipelineEvent::StageStart {
            run_id: Uuid::nil(),
            stage: "load".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stage:start");
        assert_eq!(json["stage"], "load");

        let restored: PipelineEvent = serde_json::from_value(json).unwrap();
        assert_eq!(restored, event);
    }
}

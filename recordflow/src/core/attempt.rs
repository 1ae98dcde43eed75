//! Per-run log entries for stage attempts.

use super::AttemptStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One attempt at running a stage.
///
/// Entries are appended to the run's attempt log when the attempt starts and
/// are frozen once `completed_at` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageAttempt {
    /// Unique attempt id.
    pub id: Uuid,
    /// The stage being attempted.
    pub stage_name: String,
    /// 1-indexed attempt number within the stage invocation.
    pub attempt: u32,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// When the attempt finished, if it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Current status.
    pub status: AttemptStatus,
    /// Failure message for failed attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageAttempt {
    /// Starts a new attempt.
    #[must_use]
    pub fn start(stage_name: impl Into<String>, attempt: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            stage_name: stage_name.into(),
            attempt,
            started_at: Utc::now(),
            completed_at: None,
            status: AttemptStatus::InProgress,
            error: None,
        }
    }

    /// Marks the attempt as succeeded. No-op once completed.
    pub fn succeed(&mut self) {
        if self.completed_at.is_none() {
            self.status = AttemptStatus::Success;
            self.completed_at = Some(Utc::now());
        }
    }

    /// Marks the attempt as failed. No-op once completed.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.completed_at.is_none() {
            self.status = AttemptStatus::Failed;
            self.error = Some(error.into());
            self.completed_at = Some(Utc::now());
        }
    }

    /// Returns true once the attempt has a terminal status.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

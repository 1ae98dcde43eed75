//! Stage attempt status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The status of a single stage attempt.
///
/// An attempt starts `InProgress` and moves to exactly one terminal state.
/// A failed attempt may be followed by a fresh attempt while retries remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// The attempt is running.
    #[default]
    InProgress,
    /// The attempt produced a result.
    Success,
    /// The attempt raised an error or timed out.
    Failed,
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl AttemptStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

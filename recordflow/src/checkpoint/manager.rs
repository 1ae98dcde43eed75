//! Bounded checkpoint buffer.

use crate::context::ExecutionContext;
use crate::errors::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Records processed between automatic checkpoints.
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 1000;

/// Checkpoints retained before the oldest is evicted.
pub const DEFAULT_MAX_CHECKPOINTS: usize = 10;

/// A snapshot of completed stage results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint id, `checkpoint_<millis>`, strictly increasing per manager.
    pub id: String,
    /// When the checkpoint was taken.
    pub timestamp: DateTime<Utc>,
    /// Deep copy of the stage results at checkpoint time.
    pub stage_results: HashMap<String, serde_json::Value>,
    /// Cumulative records processed when the checkpoint was taken.
    pub records_processed: u64,
}

/// Creates, stores and recovers checkpoints.
#[derive(Debug)]
pub struct CheckpointManager {
    interval: u64,
    max_checkpoints: usize,
    checkpoints: VecDeque<Checkpoint>,
    last_id_millis: i64,
    last_checkpointed_count: Option<u64>,
}

impl Default for CheckpointManager {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_MAX_CHECKPOINTS)
    }
}

impl CheckpointManager {
    /// Creates a manager. An interval of zero disables automatic checkpoints.
    #[must_use]
    pub fn new(interval: u64, max_checkpoints: usize) -> Self {
        Self {
            interval,
            max_checkpoints: max_checkpoints.max(1),
            checkpoints: VecDeque::new(),
            last_id_millis: 0,
            last_checkpointed_count: None,
        }
    }

    /// Returns the checkpoint interval.
    #[must_use]
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Returns the buffer capacity.
    #[must_use]
    pub fn max_checkpoints(&self) -> usize {
        self.max_checkpoints
    }

    /// Checkpoints if `processed_count` is a non-zero multiple of the interval.
    ///
    /// A count that was already checkpointed is not checkpointed again.
    pub fn maybe_checkpoint(
        &mut self,
        ctx: &ExecutionContext,
        processed_count: u64,
    ) -> Option<Checkpoint> {
        if self.interval == 0 || processed_count == 0 || processed_count % self.interval != 0 {
            return None;
        }
        if self.last_checkpointed_count == Some(processed_count) {
            return None;
        }
        Some(self.create_checkpoint(ctx, processed_count))
    }

    /// Starts a new run: processed counts restart from zero, so boundaries
    /// checkpointed by an earlier run are eligible again.
    pub fn begin_run(&mut self) {
        self.last_checkpointed_count = None;
    }

    /// Checkpoints every interval boundary in `(previous, current]` that the
    /// current run has not checkpointed yet.
    ///
    /// Equivalent to calling [`Self::maybe_checkpoint`] once per record
    /// processed between the two counts.
    pub fn record_progress(
        &mut self,
        ctx: &ExecutionContext,
        previous: u64,
        current: u64,
    ) -> Vec<Checkpoint> {
        let floor = self
            .last_checkpointed_count
            .map_or(previous, |last| last.max(previous));
        if self.interval == 0 || current <= floor {
            return Vec::new();
        }

        let mut created = Vec::new();
        let mut boundary = (floor / self.interval + 1) * self.interval;
        while boundary <= current {
            if let Some(checkpoint) = self.maybe_checkpoint(ctx, boundary) {
                created.push(checkpoint);
            }
            boundary += self.interval;
        }
        created
    }

    /// Takes a checkpoint unconditionally.
    pub fn create_checkpoint(&mut self, ctx: &ExecutionContext, processed_count: u64) -> Checkpoint {
        let timestamp = Utc::now();
        let millis = timestamp.timestamp_millis().max(self.last_id_millis + 1);
        self.last_id_millis = millis;

        let checkpoint = Checkpoint {
            id: format!("checkpoint_{millis}"),
            timestamp,
            stage_results: ctx.stage_results.clone(),
            records_processed: processed_count,
        };

        self.checkpoints.push_back(checkpoint.clone());
        while self.checkpoints.len() > self.max_checkpoints {
            if let Some(evicted) = self.checkpoints.pop_front() {
                debug!(checkpoint_id = %evicted.id, "Evicted checkpoint");
            }
        }
        self.last_checkpointed_count = Some(processed_count);

        debug!(
            checkpoint_id = %checkpoint.id,
            records_processed = processed_count,
            stages = checkpoint.stage_results.len(),
            "Created checkpoint"
        );
        checkpoint
    }

    /// Returns the checkpoint with the given id.
    pub fn recover(&self, checkpoint_id: &str) -> Result<Checkpoint, PipelineError> {
        self.checkpoints
            .iter()
            .find(|c| c.id == checkpoint_id)
            .cloned()
            .ok_or_else(|| PipelineError::CheckpointNotFound {
                id: checkpoint_id.to_string(),
            })
    }

    /// Returns the retained checkpoints, oldest first.
    #[must_use]
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.checkpoints.iter().cloned().collect()
    }

    /// Returns the most recent checkpoint.
    #[must_use]
    pub fn latest(&self) -> Option<&Checkpoint> {
        self.checkpoints.back()
    }

    /// Returns the number of retained checkpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    /// Returns true if no checkpoints are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Drops every checkpoint and resets the progress marker.
    pub fn clear(&mut self) {
        self.checkpoints.clear();
        self.last_checkpointed_count = None;
    }
}

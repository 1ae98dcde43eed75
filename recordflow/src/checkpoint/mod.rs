//! Checkpointing of run progress.
//!
//! Checkpoints are point-in-time copies of completed stage results, taken at
//! record-count intervals and kept in a bounded FIFO buffer. They are used
//! for diagnostics and caller-initiated resumption; the engine never resumes
//! on its own.

mod manager;

pub use manager::{Checkpoint, CheckpointManager, DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_MAX_CHECKPOINTS};

//! Testing utilities for recordflow pipelines.
//!
//! Stages with scripted behavior (failures, delays, hangs) for exercising the
//! executor's retry and timeout paths.

mod mocks;

pub use mocks::{FailingStage, FlakyStage, HangingStage, RecordedExecution, RecordingStage, SlowStage};

//! Core domain model types for recordflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - The record type stages operate on
//! - Attempt status enum
//! - Stage attempt log entries

mod attempt;
mod status;

pub use attempt::StageAttempt;
pub use status::AttemptStatus;

/// A single record flowing through a pipeline.
///
/// Records are opaque JSON documents; stages decide their shape.
pub type Record = serde_json::Value;

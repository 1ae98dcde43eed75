//! Pipeline registration, validation and execution.
//!
//! This module provides:
//! - The stage registry and per-stage options
//! - Static validation of the order and dependency graph
//! - The single-stage executor (dependency gating, timeout, retry)
//! - The orchestrator that drives whole runs

mod backoff;
mod executor;
mod export;
mod orchestrator;
mod registry;
mod validator;

pub use backoff::{RetryDecision, RetryPolicy, DEFAULT_BASE_DELAY};
pub use executor::{StageExecutor, StageOutcome};
pub use export::PipelineExport;
pub use orchestrator::{BatchOutcome, PipelineOrchestrator, RunOptions};
pub use registry::{StageDefinition, StageOptions, StageRegistry, StageSettings};
pub use validator::{ordering_violations, validate_acyclic, validate_pipeline};

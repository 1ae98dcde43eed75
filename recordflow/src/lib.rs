//! # Recordflow
//!
//! A sequential pipeline engine for batches of JSON records.
//!
//! Recordflow runs named stages in a fixed order over a shared execution
//! context, with support for:
//!
//! - **Dependency gating**: a stage runs only once the stages it depends on
//!   have produced a result in the current run
//! - **Timeouts and retries**: per-attempt timeouts and exponential backoff
//! - **Checkpoints**: snapshots of stage results at record-count intervals
//! - **Lifecycle events**: typed subscriptions and pluggable event sinks
//! - **Batched runs**: chunked input with per-chunk failure isolation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use recordflow::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = PipelineOrchestrator::new(PipelineConfig::default())?;
//!
//! orchestrator.register(
//!     "validate",
//!     Arc::new(FnStage::new(|ctx: &mut ExecutionContext, _attempt: u32| {
//!         ctx.records.retain(|r| r.get("v").is_some());
//!         Ok(json!({ "valid": ctx.records.len() }))
//!     })),
//!     StageOptions::new(),
//! )?;
//! orchestrator.register(
//!     "transform",
//!     Arc::new(FnStage::new(|ctx: &mut ExecutionContext, _attempt: u32| {
//!         for record in &mut ctx.records {
//!             record["v"] = json!(record["v"].as_i64().unwrap_or_default() * 2);
//!         }
//!         Ok(json!(null))
//!     })),
//!     StageOptions::new().depends_on("validate"),
//! )?;
//! orchestrator.set_pipeline(["validate", "transform"])?;
//!
//! let ctx = orchestrator.run(vec![json!({ "v": 1 })]).await?;
//! assert_eq!(ctx.records, vec![json!({ "v": 2 })]);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

pub mod checkpoint;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::checkpoint::{Checkpoint, CheckpointManager};
    pub use crate::config::PipelineConfig;
    pub use crate::context::ExecutionContext;
    pub use crate::core::{AttemptStatus, Record, StageAttempt};
    pub use crate::errors::{ContractErrorInfo, PipelineError, RunError};
    pub use crate::events::{
        CollectingEventSink, EventKind, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent,
        Subscription,
    };
    pub use crate::metrics::{ErrorReport, RunMetrics, StageMetrics};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        BatchOutcome, PipelineExport, PipelineOrchestrator, RunOptions, StageOptions,
        StageSettings,
    };
    pub use crate::stages::{AsyncFnStage, FnStage, NoOpStage, Stage};
}

//! Run-scoped execution context.
//!
//! This module provides:
//! - The mutable context threaded through every stage of a run
//! - Error and warning entries accumulated during a run

#[cfg(test)]
mod context_tests;
mod execution;

pub use execution::{ErrorEntry, ExecutionContext, WarningEntry};

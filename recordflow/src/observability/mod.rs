//! Observability utilities.
//!
//! The engine logs through `tracing` macros and emits lifecycle events on the
//! orchestrator's event bus. Hosts that want the logs printed install a
//! subscriber with [`init_tracing`].

mod logging;

pub use logging::{init_tracing, LogFormat};

//! Lifecycle events for observability.
//!
//! The orchestrator emits a closed set of [`PipelineEvent`]s. Callers observe
//! them either by subscribing a handler for one [`EventKind`] on the
//! [`EventBus`], or by installing an [`EventSink`] that receives every event.

mod bus;
mod event;
mod sink;

pub use bus::{EventBus, EventHandler, Subscription};
pub use event::{EventKind, PipelineEvent};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

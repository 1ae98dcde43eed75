//! Typed subscribe/unsubscribe dispatch.

use super::{EventKind, EventSink, LoggingEventSink, PipelineEvent};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::warn;

/// A handler for one event kind.
pub type EventHandler = Arc<dyn Fn(&PipelineEvent) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<(u64, EventHandler)>>,
}

/// Dispatches events to subscribed handlers and to a sink.
pub struct EventBus {
    handlers: Arc<RwLock<Handlers>>,
    sink: Arc<dyn EventSink>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(Arc::new(LoggingEventSink::default()))
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    /// Creates a bus that forwards every event to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Handlers::default())),
            sink,
        }
    }

    /// Replaces the sink.
    pub fn set_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sink = sink;
    }

    /// Subscribes a handler to one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write();
        handlers.next_id += 1;
        let id = handlers.next_id;
        handlers
            .by_kind
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            id,
            kind,
            handlers: Arc::downgrade(&self.handlers),
        }
    }

    /// Returns the number of subscribed handlers across all kinds.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().by_kind.values().map(Vec::len).sum()
    }

    /// Delivers an event to the sink and to the kind's handlers.
    ///
    /// A panicking handler is logged and does not affect other handlers or
    /// the run.
    pub fn emit(&self, event: &PipelineEvent) {
        self.sink.try_emit(event);

        // Cloned so handlers may subscribe or unsubscribe while dispatching.
        let handlers: Vec<EventHandler> = self
            .handlers
            .read()
            .by_kind
            .get(&event.kind())
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        for handler in handlers {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler(event);
            })) {
                warn!(event_type = %event.kind(), "Event handler panicked: {:?}", e);
            }
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping the handle keeps the handler subscribed; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    kind: EventKind,
    handlers: Weak<RwLock<Handlers>>,
}

impl Subscription {
    /// Returns the subscribed kind.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Removes the handler. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(handlers) = self.handlers.upgrade() else {
            return false;
        };
        let mut handlers = handlers.write();
        let Some(list) = handlers.by_kind.get_mut(&self.kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != self.id);
        before != list.len()
    }
}

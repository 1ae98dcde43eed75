//! Event sink trait and implementations.

use super::PipelineEvent;
use parking_lot::RwLock;
use tracing::{debug, info, Level};

/// Trait for sinks that receive every lifecycle event.
///
/// Implementations must not panic or block; errors are logged and
/// suppressed.
pub trait EventSink: Send + Sync {
    /// Delivers an event.
    fn try_emit(&self, event: &PipelineEvent);
}

/// A no-op event sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event: &PipelineEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::DEBUG }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event: &PipelineEvent) {
        let event_type = event.kind();
        let stage = event.stage().unwrap_or("-");
        if self.level == Level::DEBUG {
            debug!(event_type = %event_type, stage = %stage, event = ?event, "Event: {}", event_type);
        } else {
            info!(event_type = %event_type, stage = %stage, event = ?event, "Event: {}", event_type);
        }
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the wire names of collected events, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.read().iter().map(|e| e.kind().as_str()).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event: &PipelineEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn start_event(stage: &str) -> PipelineEvent {
        PipelineEvent::StageStart {
            run_id: Uuid::nil(),
            stage: stage.to_string(),
        }
    }

    #[test]
    fn test_noop_sink() {
        NoOpEventSink.try_emit(&start_event("a"));
    }

    #[test]
    fn test_logging_sink() {
        LoggingEventSink::info().try_emit(&start_event("a"));
        LoggingEventSink::debug().try_emit(&start_event("b"));
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.try_emit(&start_event("a"));
        sink.try_emit(&PipelineEvent::CheckpointCreated {
            checkpoint_id: "checkpoint_1".to_string(),
            records_processed: 10,
        });

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.kinds(), vec!["stage:start", "checkpoint:created"]);

        sink.clear();
        assert!(sink.is_empty());
    }
}

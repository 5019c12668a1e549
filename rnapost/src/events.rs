//! Injected event-sink capability.
//!
//! The controller never installs process-wide logging state; it emits
//! stage-transition events through a sink handed to it at construction.
//! The default sink forwards to the `tracing` framework; tests use the
//! collecting sink to assert on transitions.

use std::fmt::Debug;
use tracing::{info, warn};

/// Receives pipeline lifecycle events.
///
/// Implementations must never fail; sinks exist for observability only and
/// must not influence control flow.
pub trait EventSink: Send + Sync + Debug {
    /// Emits an event. `data` carries event-specific context.
    fn emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// A no-op sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {
        // Intentionally empty - discards all events
    }
}

/// A sink that forwards events to the `tracing` framework.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

impl EventSink for LoggingEventSink {
    fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        if event_type.ends_with(".failed") {
            warn!(
                event_type = %event_type,
                event_data = ?data,
                "Event: {}", event_type
            );
        } else {
            info!(
                event_type = %event_type,
                event_data = ?data,
                "Event: {}", event_type
            );
        }
    }
}

/// A collecting sink for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<(String, Option<serde_json::Value>)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.events.read().clone()
    }

    /// Returns events whose type starts with `prefix`.
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<(String, Option<serde_json::Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// True when nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collecting_sink_records_in_order() {
        let sink = CollectingEventSink::new();
        sink.emit("pipeline.started", None);
        sink.emit(
            "stage.completed",
            Some(serde_json::json!({"stage": "quality"})),
        );
        sink.emit("stage.failed", Some(serde_json::json!({"stage": "enrichment"})));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events()[0].0, "pipeline.started");
        assert_eq!(sink.events_of_type("stage.").len(), 2);
    }

    #[test]
    fn test_noop_sink_discards() {
        // Nothing observable; just exercise the path.
        NoOpEventSink.emit("pipeline.started", None);
    }
}

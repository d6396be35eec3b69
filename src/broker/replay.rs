//! History replay for late-joining peers
//!
//! A [`ReplaySource`] hands out controllers holding a snapshot of history. The
//! broker attaches an encoder aimed at the new peer and asks the controller to
//! push the whole snapshot through it before live traffic resumes.

use std::sync::{Mutex, PoisonError};

use crate::protocol::{GraphEvent, Sink};

/// Something that can replay its history
pub trait ReplaySource: Send + Sync {
    /// Snapshot the current history
    fn replay_controller(&self) -> Box<dyn ReplayController>;
}

/// One replay of a snapshot
pub trait ReplayController: Send {
    fn add_sink(&mut self, sink: Box<dyn Sink + Send>);

    /// Push every snapshotted event to every attached sink, returning once done
    fn replay(&mut self);
}

/// In-memory history of published events
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<GraphEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    ///
    /// A cleared graph carries no earlier state, so clearing discards
    /// everything recorded before it.
    pub fn record(&self, event: GraphEvent) {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(event, GraphEvent::GraphCleared { .. }) {
            events.clear();
        }
        events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<GraphEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ReplaySource for EventLog {
    fn replay_controller(&self) -> Box<dyn ReplayController> {
        Box::new(LogReplay {
            events: self.snapshot(),
            sinks: Vec::new(),
        })
    }
}

struct LogReplay {
    events: Vec<GraphEvent>,
    sinks: Vec<Box<dyn Sink + Send>>,
}

impl ReplayController for LogReplay {
    fn add_sink(&mut self, sink: Box<dyn Sink + Send>) {
        self.sinks.push(sink);
    }

    fn replay(&mut self) {
        tracing::debug!(
            "Replaying {} events to {} sinks",
            self.events.len(),
            self.sinks.len()
        );
        for event in &self.events {
            for sink in self.sinks.iter_mut() {
                event.dispatch(sink.as_mut());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn node(id: &str, time_id: u64) -> GraphEvent {
        GraphEvent::NodeAdded {
            source_id: "g".into(),
            time_id,
            node_id: id.into(),
        }
    }

    #[test]
    fn test_replay_is_a_snapshot() {
        let log = EventLog::new();
        log.record(node("a", 0));
        log.record(node("b", 1));

        let mut controller = log.replay_controller();
        log.record(node("c", 2));

        let seen: Arc<Mutex<Vec<GraphEvent>>> = Arc::new(Mutex::new(Vec::new()));
        controller.add_sink(Box::new(seen.clone()));
        controller.replay();

        assert_eq!(*seen.lock().unwrap(), vec![node("a", 0), node("b", 1)]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_clear_truncates_history() {
        let log = EventLog::new();
        log.record(node("a", 0));
        log.record(GraphEvent::GraphCleared {
            source_id: "g".into(),
            time_id: 1,
        });
        log.record(node("b", 2));

        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(matches!(snapshot[0], GraphEvent::GraphCleared { .. }));
        assert_eq!(snapshot[1], node("b", 2));
    }
}

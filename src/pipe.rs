//! Pipe - A sink that publishes to every peer of a broker
//!
//! Events fed into the pipe are encoded once and broadcast. When the pipe
//! keeps history, each event is recorded in the same critical section as its
//! broadcast, so a peer joining at any moment gets it exactly once.

use bytes::Bytes;
use std::sync::Arc;

use crate::broker::{Broker, EventLog};
use crate::protocol::{encode_event, Command, GraphEvent, Sink, Value};

#[derive(Clone, Debug)]
pub struct NetStreamPipe {
    broker: Arc<Broker>,
    history: Option<Arc<EventLog>>,
}

impl NetStreamPipe {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self {
            broker,
            history: None,
        }
    }

    /// Record every published event into `history`.
    ///
    /// The broker should replay the same log, see [`Broker::with_replay`].
    pub fn with_history(broker: Arc<Broker>, history: Arc<EventLog>) -> Self {
        Self {
            broker,
            history: Some(history),
        }
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    pub fn history(&self) -> Option<&Arc<EventLog>> {
        self.history.as_ref()
    }

    pub fn publish(&self, event: GraphEvent) {
        let message = encode_event(&event);
        tracing::debug!("Publishing {} ({} bytes)", event, message.len());

        match &self.history {
            Some(log) => self.broker.broadcast_with(message, || log.record(event)),
            None => self.broker.broadcast(message),
        }
    }

    /// Tell every peer the stream is over
    pub fn end(&self) {
        self.broker.broadcast(Bytes::from_static(&[Command::End as u8]));
    }

    fn capture(&self, f: impl FnOnce(&mut Vec<GraphEvent>)) {
        let mut events = Vec::with_capacity(1);
        f(&mut events);
        for event in events {
            self.publish(event);
        }
    }
}

impl Sink for NetStreamPipe {
    fn node_added(&mut self, source_id: &str, time_id: u64, node_id: &str) {
        self.capture(|e| e.node_added(source_id, time_id, node_id));
    }

    fn node_removed(&mut self, source_id: &str, time_id: u64, node_id: &str) {
        self.capture(|e| e.node_removed(source_id, time_id, node_id));
    }

    fn edge_added(
        &mut self,
        source_id: &str,
        time_id: u64,
        edge_id: &str,
        from_id: &str,
        to_id: &str,
        directed: bool,
    ) {
        self.capture(|e| e.edge_added(source_id, time_id, edge_id, from_id, to_id, directed));
    }

    fn edge_removed(&mut self, source_id: &str, time_id: u64, edge_id: &str) {
        self.capture(|e| e.edge_removed(source_id, time_id, edge_id));
    }

    fn step_begins(&mut self, source_id: &str, time_id: u64, step: f64) {
        self.capture(|e| e.step_begins(source_id, time_id, step));
    }

    fn graph_cleared(&mut self, source_id: &str, time_id: u64) {
        self.capture(|e| e.graph_cleared(source_id, time_id));
    }

    fn graph_attribute_added(&mut self, source_id: &str, time_id: u64, attribute: &str, value: &Value) {
        self.capture(|e| e.graph_attribute_added(source_id, time_id, attribute, value));
    }

    fn graph_attribute_changed(
        &mut self,
        source_id: &str,
        time_id: u64,
        attribute: &str,
        old_value: &Value,
        new_value: &Value,
    ) {
        self.capture(|e| {
            e.graph_attribute_changed(source_id, time_id, attribute, old_value, new_value)
        });
    }

    fn graph_attribute_removed(&mut self, source_id: &str, time_id: u64, attribute: &str) {
        self.capture(|e| e.graph_attribute_removed(source_id, time_id, attribute));
    }

    fn node_attribute_added(
        &mut self,
        source_id: &str,
        time_id: u64,
        node_id: &str,
        attribute: &str,
        value: &Value,
    ) {
        self.capture(|e| e.node_attribute_added(source_id, time_id, node_id, attribute, value));
    }

    fn node_attribute_changed(
        &mut self,
        source_id: &str,
        time_id: u64,
        node_id: &str,
        attribute: &str,
        old_value: &Value,
        new_value: &Value,
    ) {
        self.capture(|e| {
            e.node_attribute_changed(source_id, time_id, node_id, attribute, old_value, new_value)
        });
    }

    fn node_attribute_removed(&mut self, source_id: &str, time_id: u64, node_id: &str, attribute: &str) {
        self.capture(|e| e.node_attribute_removed(source_id, time_id, node_id, attribute));
    }

    fn edge_attribute_added(
        &mut self,
        source_id: &str,
        time_id: u64,
        edge_id: &str,
        attribute: &str,
        value: &Value,
    ) {
        self.capture(|e| e.edge_attribute_added(source_id, time_id, edge_id, attribute, value));
    }

    fn edge_attribute_changed(
        &mut self,
        source_id: &str,
        time_id: u64,
        edge_id: &str,
        attribute: &str,
        old_value: &Value,
        new_value: &Value,
    ) {
        self.capture(|e| {
            e.edge_attribute_changed(source_id, time_id, edge_id, attribute, old_value, new_value)
        });
    }

    fn edge_attribute_removed(&mut self, source_id: &str, time_id: u64, edge_id: &str, attribute: &str) {
        self.capture(|e| e.edge_attribute_removed(source_id, time_id, edge_id, attribute));
    }

    fn stream_ended(&mut self) {
        self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::testing::RecordingPeer;
    use crate::broker::PeerState;
    use crate::protocol::EventDecoder;

    fn running(history: Option<Arc<EventLog>>) -> NetStreamPipe {
        let broker = match &history {
            Some(log) => Broker::new("pipe").with_replay(log.clone()),
            None => Broker::new("pipe"),
        };
        broker.start().unwrap();
        let broker = Arc::new(broker);

        match history {
            Some(log) => NetStreamPipe::with_history(broker, log),
            None => NetStreamPipe::new(broker),
        }
    }

    #[test]
    fn test_callbacks_reach_peers() {
        let mut pipe = running(None);
        let peer = Arc::new(RecordingPeer::new());
        pipe.broker().admit(peer.clone());

        pipe.node_added("g", 0, "a");
        pipe.node_attribute_added("g", 1, "a", "weight", &Value::Double(1.5));
        pipe.step_begins("g", 2, 3.0);

        let events = peer.events();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1],
            GraphEvent::NodeAttributeAdded {
                source_id: "g".into(),
                time_id: 1,
                node_id: "a".into(),
                attribute: "weight".into(),
                value: Value::Double(1.5),
            }
        );
    }

    #[test]
    fn test_late_joiner_gets_history() {
        let log = Arc::new(EventLog::new());
        let mut pipe = running(Some(log.clone()));

        pipe.node_added("g", 0, "a");
        pipe.node_added("g", 1, "b");
        pipe.edge_added("g", 2, "ab", "a", "b", false);
        assert_eq!(log.len(), 3);

        let peer = Arc::new(RecordingPeer::new());
        assert_eq!(pipe.broker().admit(peer.clone()), PeerState::Open);
        pipe.edge_removed("g", 3, "ab");

        assert_eq!(peer.events().len(), 4);
        assert_eq!(peer.events(), log.snapshot());
    }

    #[test]
    fn test_relay_from_decoder() {
        let pipe = running(None);
        let peer = Arc::new(RecordingPeer::new());
        pipe.broker().admit(peer.clone());

        let event = GraphEvent::GraphAttributeChanged {
            source_id: "src".into(),
            time_id: 9,
            attribute: "title".into(),
            old_value: Value::from("old"),
            new_value: Value::from("new"),
        };
        let message = encode_event(&event);

        let mut decoder = EventDecoder::new(pipe.clone());
        decoder.decode(&message);
        decoder.decode(&[Command::End as u8]);

        let received = peer.received();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], message);
        assert_eq!(&received[1][..], &[Command::End as u8]);
    }
}

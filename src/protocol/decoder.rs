//! Event decoder
//!
//! Reads one framed message, dispatches on its command byte and replays the
//! event into a [`Sink`]. A malformed message is logged and dropped; the sink
//! only ever sees fully decoded events, so nothing leaks into the next call.

use bytes::Buf;

use super::codec::{ensure_remaining, CodecResult};
use super::command::Command;
use super::event::{GraphEvent, Sink};
use super::string::get_string;
use super::value::{get_tagged_value, get_type, get_value, Value};
use super::varint::get_varint;

/// Result of reading one message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Event(GraphEvent),
    End,
}

/// What `EventDecoder::decode` did with a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// An event was delivered to the sink
    Dispatched(Command),
    /// The producer ended the stream
    Ended,
    /// The message was malformed or unknown and was dropped
    Dropped,
}

/// Decodes messages into a sink
pub struct EventDecoder<S: Sink> {
    sink: S,
    forward_end: bool,
}

impl<S: Sink> EventDecoder<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            forward_end: true,
        }
    }

    /// Whether END reaches `Sink::stream_ended`. Relays that outlive a
    /// single producer turn this off and only watch for `DecodeOutcome::Ended`.
    pub fn forward_end(mut self, forward: bool) -> Self {
        self.forward_end = forward;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Decode exactly one message from `buf`.
    ///
    /// Never fails: unknown commands and truncated or corrupt payloads are
    /// logged and reported as `Dropped`.
    pub fn decode(&mut self, mut buf: &[u8]) -> DecodeOutcome {
        match read_message(&mut buf) {
            Ok(Message::Event(event)) => {
                if buf.has_remaining() {
                    tracing::debug!(
                        "Ignoring {} trailing bytes after {}",
                        buf.remaining(),
                        event.command()
                    );
                }
                tracing::debug!("Received {}", event.command());

                event.dispatch(&mut self.sink);
                DecodeOutcome::Dispatched(event.command())
            }
            Ok(Message::End) => {
                tracing::info!("Producer properly ended the stream");
                if self.forward_end {
                    self.sink.stream_ended();
                }
                DecodeOutcome::Ended
            }
            Err(e) => {
                tracing::warn!("Dropping bad message: {}", e);
                DecodeOutcome::Dropped
            }
        }
    }
}

/// Read one message from the front of `buf`
pub fn read_message<B: Buf>(buf: &mut B) -> CodecResult<Message> {
    ensure_remaining(buf, 1)?;
    let command = Command::try_from(buf.get_u8())?;
    if command == Command::End {
        return Ok(Message::End);
    }

    let source_id = get_string(buf)?;
    let time_id = get_varint(buf)?;

    let event = match command {
        Command::AddNode => GraphEvent::NodeAdded {
            source_id,
            time_id,
            node_id: get_string(buf)?,
        },
        Command::DelNode => GraphEvent::NodeRemoved {
            source_id,
            time_id,
            node_id: get_string(buf)?,
        },
        Command::AddEdge => {
            let edge_id = get_string(buf)?;
            let from_id = get_string(buf)?;
            let to_id = get_string(buf)?;
            ensure_remaining(buf, 1)?;
            let directed = buf.get_u8() != 0;

            GraphEvent::EdgeAdded {
                source_id,
                time_id,
                edge_id,
                from_id,
                to_id,
                directed,
            }
        }
        Command::DelEdge => GraphEvent::EdgeRemoved {
            source_id,
            time_id,
            edge_id: get_string(buf)?,
        },
        Command::Step => {
            ensure_remaining(buf, 8)?;
            GraphEvent::StepBegins {
                source_id,
                time_id,
                step: buf.get_f64(),
            }
        }
        Command::Cleared => GraphEvent::GraphCleared { source_id, time_id },
        Command::AddGraphAttr => {
            let attribute = get_string(buf)?;
            GraphEvent::GraphAttributeAdded {
                source_id,
                time_id,
                attribute,
                value: get_tagged_value(buf)?,
            }
        }
        Command::ChgGraphAttr => {
            let attribute = get_string(buf)?;
            let (old_value, new_value) = get_value_pair(buf)?;
            GraphEvent::GraphAttributeChanged {
                source_id,
                time_id,
                attribute,
                old_value,
                new_value,
            }
        }
        Command::DelGraphAttr => GraphEvent::GraphAttributeRemoved {
            source_id,
            time_id,
            attribute: get_string(buf)?,
        },
        Command::AddNodeAttr => {
            let node_id = get_string(buf)?;
            let attribute = get_string(buf)?;
            GraphEvent::NodeAttributeAdded {
                source_id,
                time_id,
                node_id,
                attribute,
                value: get_tagged_value(buf)?,
            }
        }
        Command::ChgNodeAttr => {
            let node_id = get_string(buf)?;
            let attribute = get_string(buf)?;
            let (old_value, new_value) = get_value_pair(buf)?;
            GraphEvent::NodeAttributeChanged {
                source_id,
                time_id,
                node_id,
                attribute,
                old_value,
                new_value,
            }
        }
        Command::DelNodeAttr => {
            let node_id = get_string(buf)?;
            GraphEvent::NodeAttributeRemoved {
                source_id,
                time_id,
                node_id,
                attribute: get_string(buf)?,
            }
        }
        Command::AddEdgeAttr => {
            let edge_id = get_string(buf)?;
            let attribute = get_string(buf)?;
            GraphEvent::EdgeAttributeAdded {
                source_id,
                time_id,
                edge_id,
                attribute,
                value: get_tagged_value(buf)?,
            }
        }
        Command::ChgEdgeAttr => {
            let edge_id = get_string(buf)?;
            let attribute = get_string(buf)?;
            let (old_value, new_value) = get_value_pair(buf)?;
            GraphEvent::EdgeAttributeChanged {
                source_id,
                time_id,
                edge_id,
                attribute,
                old_value,
                new_value,
            }
        }
        Command::DelEdgeAttr => {
            let edge_id = get_string(buf)?;
            GraphEvent::EdgeAttributeRemoved {
                source_id,
                time_id,
                edge_id,
                attribute: get_string(buf)?,
            }
        }
        Command::End => return Ok(Message::End),
    };

    Ok(Message::Event(event))
}

/// Old and new values of a "changed" command, each with its own tag
fn get_value_pair<B: Buf>(buf: &mut B) -> CodecResult<(Value, Value)> {
    let old_type = get_type(buf)?;
    let old_value = get_value(buf, old_type)?;
    let new_type = get_type(buf)?;
    let new_value = get_value(buf, new_type)?;
    Ok((old_value, new_value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encoder::{encode_event, EventEncoder};
    use crate::protocol::value::Value;
    use crate::transport::BufferTransport;

    fn event_of_every_kind() -> Vec<GraphEvent> {
        let s = || "g1".to_string();
        vec![
            GraphEvent::NodeAdded { source_id: s(), time_id: 0, node_id: "n1".into() },
            GraphEvent::NodeRemoved { source_id: s(), time_id: 1, node_id: "n1".into() },
            GraphEvent::EdgeAdded {
                source_id: s(),
                time_id: 2,
                edge_id: "e1".into(),
                from_id: "n1".into(),
                to_id: "n2".into(),
                directed: true,
            },
            GraphEvent::EdgeRemoved { source_id: s(), time_id: 3, edge_id: "e1".into() },
            GraphEvent::StepBegins { source_id: s(), time_id: 4, step: 1.5 },
            GraphEvent::GraphCleared { source_id: s(), time_id: 5 },
            GraphEvent::GraphAttributeAdded {
                source_id: s(),
                time_id: 6,
                attribute: "title".into(),
                value: Value::String("roads".into()),
            },
            GraphEvent::GraphAttributeChanged {
                source_id: s(),
                time_id: 7,
                attribute: "scale".into(),
                old_value: Value::Int(1),
                new_value: Value::LongArray(vec![2, 3]),
            },
            GraphEvent::GraphAttributeRemoved { source_id: s(), time_id: 8, attribute: "scale".into() },
            GraphEvent::NodeAttributeAdded {
                source_id: s(),
                time_id: 9,
                node_id: "n1".into(),
                attribute: "xy".into(),
                value: Value::DoubleArray(vec![0.5, -1.0]),
            },
            GraphEvent::NodeAttributeChanged {
                source_id: s(),
                time_id: 10,
                node_id: "n1".into(),
                attribute: "visible".into(),
                old_value: Value::Boolean(false),
                new_value: Value::Boolean(true),
            },
            GraphEvent::NodeAttributeRemoved {
                source_id: s(),
                time_id: 11,
                node_id: "n1".into(),
                attribute: "xy".into(),
            },
            GraphEvent::EdgeAttributeAdded {
                source_id: s(),
                time_id: 12,
                edge_id: "e1".into(),
                attribute: "tags".into(),
                value: Value::Array(vec![Value::String("a".into()), Value::Short(7)]),
            },
            GraphEvent::EdgeAttributeChanged {
                source_id: s(),
                time_id: 1 << 40,
                edge_id: "e1".into(),
                attribute: "w".into(),
                old_value: Value::Float(0.25),
                new_value: Value::Byte(-3),
            },
            GraphEvent::EdgeAttributeRemoved {
                source_id: s(),
                time_id: 14,
                edge_id: "e1".into(),
                attribute: "w".into(),
            },
        ]
    }

    #[test]
    fn test_every_event_kind_roundtrips() {
        let events = event_of_every_kind();
        let mut decoder = EventDecoder::new(Vec::<GraphEvent>::new());

        for event in &events {
            let outcome = decoder.decode(&encode_event(event));
            assert_eq!(outcome, DecodeOutcome::Dispatched(event.command()));
        }

        assert_eq!(decoder.into_sink(), events);
    }

    #[test]
    fn test_node_added_scenario() {
        let transport = BufferTransport::new();
        EventEncoder::new(&transport).node_added("g1", 0, "n1");

        let mut decoder = EventDecoder::new(Vec::<GraphEvent>::new());
        for message in transport.take() {
            decoder.decode(&message);
        }

        assert_eq!(
            decoder.into_sink(),
            vec![GraphEvent::NodeAdded {
                source_id: "g1".into(),
                time_id: 0,
                node_id: "n1".into(),
            }]
        );
    }

    #[test]
    fn test_edge_attribute_changed_doubles() {
        let transport = BufferTransport::new();
        EventEncoder::new(&transport).edge_attribute_changed(
            "g1",
            3,
            "e1",
            "weight",
            &Value::Double(1.0),
            &Value::Double(2.5),
        );

        let mut decoder = EventDecoder::new(Vec::<GraphEvent>::new());
        decoder.decode(&transport.take()[0]);

        match decoder.into_sink().as_slice() {
            [GraphEvent::EdgeAttributeChanged {
                source_id,
                time_id,
                edge_id,
                attribute,
                old_value,
                new_value,
            }] => {
                assert_eq!(source_id, "g1");
                assert_eq!(*time_id, 3);
                assert_eq!(edge_id, "e1");
                assert_eq!(attribute, "weight");
                assert_eq!(old_value, &Value::Double(1.0));
                assert_eq!(new_value, &Value::Double(2.5));
            }
            other => panic!("Unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_truncation_at_every_boundary() {
        let good = GraphEvent::NodeAdded {
            source_id: "g1".into(),
            time_id: 99,
            node_id: "ok".into(),
        };

        for event in event_of_every_kind() {
            let bytes = encode_event(&event);

            for cut in 0..bytes.len() {
                let mut decoder = EventDecoder::new(Vec::<GraphEvent>::new());
                assert_eq!(
                    decoder.decode(&bytes[..cut]),
                    DecodeOutcome::Dropped,
                    "{} cut at {}",
                    event.command(),
                    cut
                );
                assert!(decoder.sink().is_empty());

                // The same decoder still handles a well-formed buffer
                decoder.decode(&encode_event(&good));
                assert_eq!(decoder.sink(), &vec![good.clone()]);
            }
        }
    }

    #[test]
    fn test_unknown_command_dropped() {
        let mut decoder = EventDecoder::new(Vec::<GraphEvent>::new());
        assert_eq!(decoder.decode(&[0x7F, 0x01, b'g', 0x00]), DecodeOutcome::Dropped);
        assert!(decoder.sink().is_empty());
    }

    #[test]
    fn test_unknown_value_type_dropped() {
        // ADD_GRAPH_ATTR "g" 0 "a" <tag 0x01>
        let mut decoder = EventDecoder::new(Vec::<GraphEvent>::new());
        let bytes = [0x16, 0x01, b'g', 0x00, 0x01, b'a', 0x01];
        assert_eq!(decoder.decode(&bytes), DecodeOutcome::Dropped);
        assert!(decoder.sink().is_empty());
    }

    #[test]
    fn test_end() {
        struct EndCounter(usize, Vec<GraphEvent>);

        impl Sink for EndCounter {
            fn node_added(&mut self, s: &str, t: u64, n: &str) {
                self.1.node_added(s, t, n)
            }
            fn node_removed(&mut self, s: &str, t: u64, n: &str) {
                self.1.node_removed(s, t, n)
            }
            fn edge_added(&mut self, s: &str, t: u64, e: &str, f: &str, to: &str, d: bool) {
                self.1.edge_added(s, t, e, f, to, d)
            }
            fn edge_removed(&mut self, s: &str, t: u64, e: &str) {
                self.1.edge_removed(s, t, e)
            }
            fn step_begins(&mut self, s: &str, t: u64, step: f64) {
                self.1.step_begins(s, t, step)
            }
            fn graph_cleared(&mut self, s: &str, t: u64) {
                self.1.graph_cleared(s, t)
            }
            fn graph_attribute_added(&mut self, s: &str, t: u64, a: &str, v: &Value) {
                self.1.graph_attribute_added(s, t, a, v)
            }
            fn graph_attribute_changed(&mut self, s: &str, t: u64, a: &str, o: &Value, n: &Value) {
                self.1.graph_attribute_changed(s, t, a, o, n)
            }
            fn graph_attribute_removed(&mut self, s: &str, t: u64, a: &str) {
                self.1.graph_attribute_removed(s, t, a)
            }
            fn node_attribute_added(&mut self, s: &str, t: u64, n: &str, a: &str, v: &Value) {
                self.1.node_attribute_added(s, t, n, a, v)
            }
            fn node_attribute_changed(&mut self, s: &str, t: u64, n: &str, a: &str, o: &Value, v: &Value) {
                self.1.node_attribute_changed(s, t, n, a, o, v)
            }
            fn node_attribute_removed(&mut self, s: &str, t: u64, n: &str, a: &str) {
                self.1.node_attribute_removed(s, t, n, a)
            }
            fn edge_attribute_added(&mut self, s: &str, t: u64, e: &str, a: &str, v: &Value) {
                self.1.edge_attribute_added(s, t, e, a, v)
            }
            fn edge_attribute_changed(&mut self, s: &str, t: u64, e: &str, a: &str, o: &Value, v: &Value) {
                self.1.edge_attribute_changed(s, t, e, a, o, v)
            }
            fn edge_attribute_removed(&mut self, s: &str, t: u64, e: &str, a: &str) {
                self.1.edge_attribute_removed(s, t, e, a)
            }
            fn stream_ended(&mut self) {
                self.0 += 1;
            }
        }

        let mut decoder = EventDecoder::new(EndCounter(0, Vec::new()));
        assert_eq!(decoder.decode(&[0x02]), DecodeOutcome::Ended);
        assert_eq!(decoder.sink().0, 1);
        assert!(decoder.sink().1.is_empty());

        let mut decoder = EventDecoder::new(EndCounter(0, Vec::new())).forward_end(false);
        assert_eq!(decoder.decode(&[0x02]), DecodeOutcome::Ended);
        assert_eq!(decoder.sink().0, 0);
    }

    #[test]
    fn test_deeply_nested_value_dropped() {
        // ADD_GRAPH_ATTR "g" 0 "a", then a million one-element arrays around a boolean
        let mut bytes = vec![0x16, 0x01, b'g', 0x00, 0x01, b'a'];
        for _ in 0..1_000_000 {
            bytes.extend_from_slice(&[0x60, 0x01]);
        }
        bytes.extend_from_slice(&[0x50, 0x00]);
        assert!(bytes.len() < crate::protocol::DEFAULT_MAX_MESSAGE_SIZE);

        let mut decoder = EventDecoder::new(Vec::<GraphEvent>::new());
        assert_eq!(decoder.decode(&bytes), DecodeOutcome::Dropped);
        assert!(decoder.sink().is_empty());

        // The decoder keeps working afterwards
        let next = encode_event(&GraphEvent::NodeAdded {
            source_id: "g".into(),
            time_id: 1,
            node_id: "n".into(),
        });
        assert_eq!(decoder.decode(&next), DecodeOutcome::Dispatched(Command::AddNode));
    }
}

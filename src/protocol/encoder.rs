//! Event encoder
//!
//! Turns sink callbacks into NetStream messages. Every callback builds one
//! message and hands it to the transport immediately; nothing is batched.

use bytes::{BufMut, Bytes, BytesMut};

use super::command::Command;
use super::event::{GraphEvent, Sink};
use super::string::{put_string, string_size};
use super::value::{put_value, Value};
use super::varint::{put_varint, varint_size};
use crate::transport::{BufferTransport, Transport, TransportError, TransportResult};

/// Encodes events onto a transport
pub struct EventEncoder<T: Transport> {
    transport: T,
}

impl<T: Transport> EventEncoder<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Encode and send one owned event
    pub fn send_event(&mut self, event: &GraphEvent) {
        event.dispatch(self);
    }

    /// Tell the receiver the stream is over
    pub fn end(&self) -> TransportResult<()> {
        self.transport.send(Bytes::from_static(&[Command::End as u8]))
    }

    fn flush(&self, command: Command, message: BytesMut) {
        let len = message.len();
        match self.transport.send(message.freeze()) {
            Ok(()) => tracing::trace!("Sent {} ({} bytes)", command, len),
            Err(TransportError::Closed) => tracing::debug!("Dropped {}: transport closed", command),
            Err(e) => tracing::warn!("Failed to send {}: {}", command, e),
        }
    }
}

/// Encode a single event into a standalone message
pub fn encode_event(event: &GraphEvent) -> Bytes {
    let mut encoder = EventEncoder::new(BufferTransport::new());
    encoder.send_event(event);

    // The buffer transport never fails, so exactly one message is present
    encoder.into_transport().take().pop().unwrap_or_default()
}

/// Start a message with its command, source id and time id
fn header(command: Command, source_id: &str, time_id: u64, payload_hint: usize) -> BytesMut {
    let mut buf = BytesMut::with_capacity(
        1 + string_size(source_id) + varint_size(time_id) + payload_hint,
    );
    buf.put_u8(command as u8);
    put_string(&mut buf, source_id);
    put_varint(&mut buf, time_id);
    buf
}

impl<T: Transport> Sink for EventEncoder<T> {
    fn node_added(&mut self, source_id: &str, time_id: u64, node_id: &str) {
        let mut buf = header(Command::AddNode, source_id, time_id, string_size(node_id));
        put_string(&mut buf, node_id);
        self.flush(Command::AddNode, buf);
    }

    fn node_removed(&mut self, source_id: &str, time_id: u64, node_id: &str) {
        let mut buf = header(Command::DelNode, source_id, time_id, string_size(node_id));
        put_string(&mut buf, node_id);
        self.flush(Command::DelNode, buf);
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
        let hint = string_size(edge_id) + string_size(from_id) + string_size(to_id) + 1;
        let mut buf = header(Command::AddEdge, source_id, time_id, hint);
        put_string(&mut buf, edge_id);
        put_string(&mut buf, from_id);
        put_string(&mut buf, to_id);
        buf.put_u8(directed as u8);
        self.flush(Command::AddEdge, buf);
    }

    fn edge_removed(&mut self, source_id: &str, time_id: u64, edge_id: &str) {
        let mut buf = header(Command::DelEdge, source_id, time_id, string_size(edge_id));
        put_string(&mut buf, edge_id);
        self.flush(Command::DelEdge, buf);
    }

    fn step_begins(&mut self, source_id: &str, time_id: u64, step: f64) {
        let mut buf = header(Command::Step, source_id, time_id, 8);
        buf.put_f64(step);
        self.flush(Command::Step, buf);
    }

    fn graph_cleared(&mut self, source_id: &str, time_id: u64) {
        let buf = header(Command::Cleared, source_id, time_id, 0);
        self.flush(Command::Cleared, buf);
    }

    fn graph_attribute_added(&mut self, source_id: &str, time_id: u64, attribute: &str, value: &Value) {
        let mut buf = header(Command::AddGraphAttr, source_id, time_id, string_size(attribute));
        put_string(&mut buf, attribute);
        put_value(&mut buf, value);
        self.flush(Command::AddGraphAttr, buf);
    }

    fn graph_attribute_changed(
        &mut self,
        source_id: &str,
        time_id: u64,
        attribute: &str,
        old_value: &Value,
        new_value: &Value,
    ) {
        let mut buf = header(Command::ChgGraphAttr, source_id, time_id, string_size(attribute));
        put_string(&mut buf, attribute);
        put_value(&mut buf, old_value);
        put_value(&mut buf, new_value);
        self.flush(Command::ChgGraphAttr, buf);
    }

    fn graph_attribute_removed(&mut self, source_id: &str, time_id: u64, attribute: &str) {
        let mut buf = header(Command::DelGraphAttr, source_id, time_id, string_size(attribute));
        put_string(&mut buf, attribute);
        self.flush(Command::DelGraphAttr, buf);
    }

    fn node_attribute_added(
        &mut self,
        source_id: &str,
        time_id: u64,
        node_id: &str,
        attribute: &str,
        value: &Value,
    ) {
        let hint = string_size(node_id) + string_size(attribute);
        let mut buf = header(Command::AddNodeAttr, source_id, time_id, hint);
        put_string(&mut buf, node_id);
        put_string(&mut buf, attribute);
        put_value(&mut buf, value);
        self.flush(Command::AddNodeAttr, buf);
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
        let hint = string_size(node_id) + string_size(attribute);
        let mut buf = header(Command::ChgNodeAttr, source_id, time_id, hint);
        put_string(&mut buf, node_id);
        put_string(&mut buf, attribute);
        put_value(&mut buf, old_value);
        put_value(&mut buf, new_value);
        self.flush(Command::ChgNodeAttr, buf);
    }

    fn node_attribute_removed(&mut self, source_id: &str, time_id: u64, node_id: &str, attribute: &str) {
        let hint = string_size(node_id) + string_size(attribute);
        let mut buf = header(Command::DelNodeAttr, source_id, time_id, hint);
        put_string(&mut buf, node_id);
        put_string(&mut buf, attribute);
        self.flush(Command::DelNodeAttr, buf);
    }

    fn edge_attribute_added(
        &mut self,
        source_id: &str,
        time_id: u64,
        edge_id: &str,
        attribute: &str,
        value: &Value,
    ) {
        let hint = string_size(edge_id) + string_size(attribute);
        let mut buf = header(Command::AddEdgeAttr, source_id, time_id, hint);
        put_string(&mut buf, edge_id);
        put_string(&mut buf, attribute);
        put_value(&mut buf, value);
        self.flush(Command::AddEdgeAttr, buf);
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
        let hint = string_size(edge_id) + string_size(attribute);
        let mut buf = header(Command::ChgEdgeAttr, source_id, time_id, hint);
        put_string(&mut buf, edge_id);
        put_string(&mut buf, attribute);
        put_value(&mut buf, old_value);
        put_value(&mut buf, new_value);
        self.flush(Command::ChgEdgeAttr, buf);
    }

    fn edge_attribute_removed(&mut self, source_id: &str, time_id: u64, edge_id: &str, attribute: &str) {
        let hint = string_size(edge_id) + string_size(attribute);
        let mut buf = header(Command::DelEdgeAttr, source_id, time_id, hint);
        put_string(&mut buf, edge_id);
        put_string(&mut buf, attribute);
        self.flush(Command::DelEdgeAttr, buf);
    }

    fn stream_ended(&mut self) {
        if let Err(e) = self.end() {
            tracing::warn!("Failed to send END: {}", e);
        }
    }
}

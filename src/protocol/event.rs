//! Graph events and the sink interface
//!
//! A [`Sink`] is anything that receives graph events: the encoder turns them
//! into messages, the decoder produces them from messages, and the graph
//! mutator that lives outside this crate applies them.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use super::command::Command;
use super::value::Value;

/// Receiver of graph events.
///
/// Every callback carries the id of the source that produced the event and a
/// per-source time id.
pub trait Sink {
    fn node_added(&mut self, source_id: &str, time_id: u64, node_id: &str);

    fn node_removed(&mut self, source_id: &str, time_id: u64, node_id: &str);

    fn edge_added(
        &mut self,
        source_id: &str,
        time_id: u64,
        edge_id: &str,
        from_id: &str,
        to_id: &str,
        directed: bool,
    );

    fn edge_removed(&mut self, source_id: &str, time_id: u64, edge_id: &str);

    fn step_begins(&mut self, source_id: &str, time_id: u64, step: f64);

    fn graph_cleared(&mut self, source_id: &str, time_id: u64);

    fn graph_attribute_added(&mut self, source_id: &str, time_id: u64, attribute: &str, value: &Value);

    fn graph_attribute_changed(
        &mut self,
        source_id: &str,
        time_id: u64,
        attribute: &str,
        old_value: &Value,
        new_value: &Value,
    );

    fn graph_attribute_removed(&mut self, source_id: &str, time_id: u64, attribute: &str);

    fn node_attribute_added(
        &mut self,
        source_id: &str,
        time_id: u64,
        node_id: &str,
        attribute: &str,
        value: &Value,
    );

    fn node_attribute_changed(
        &mut self,
        source_id: &str,
        time_id: u64,
        node_id: &str,
        attribute: &str,
        old_value: &Value,
        new_value: &Value,
    );

    fn node_attribute_removed(&mut self, source_id: &str, time_id: u64, node_id: &str, attribute: &str);

    fn edge_attribute_added(
        &mut self,
        source_id: &str,
        time_id: u64,
        edge_id: &str,
        attribute: &str,
        value: &Value,
    );

    fn edge_attribute_changed(
        &mut self,
        source_id: &str,
        time_id: u64,
        edge_id: &str,
        attribute: &str,
        old_value: &Value,
        new_value: &Value,
    );

    fn edge_attribute_removed(&mut self, source_id: &str, time_id: u64, edge_id: &str, attribute: &str);

    /// The producer will send nothing more
    fn stream_ended(&mut self) {}
}

/// One graph event, owned
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GraphEvent {
    NodeAdded {
        source_id: String,
        time_id: u64,
        node_id: String,
    },
    NodeRemoved {
        source_id: String,
        time_id: u64,
        node_id: String,
    },
    EdgeAdded {
        source_id: String,
        time_id: u64,
        edge_id: String,
        from_id: String,
        to_id: String,
        directed: bool,
    },
    EdgeRemoved {
        source_id: String,
        time_id: u64,
        edge_id: String,
    },
    StepBegins {
        source_id: String,
        time_id: u64,
        step: f64,
    },
    GraphCleared {
        source_id: String,
        time_id: u64,
    },
    GraphAttributeAdded {
        source_id: String,
        time_id: u64,
        attribute: String,
        value: Value,
    },
    GraphAttributeChanged {
        source_id: String,
        time_id: u64,
        attribute: String,
        old_value: Value,
        new_value: Value,
    },
    GraphAttributeRemoved {
        source_id: String,
        time_id: u64,
        attribute: String,
    },
    NodeAttributeAdded {
        source_id: String,
        time_id: u64,
        node_id: String,
        attribute: String,
        value: Value,
    },
    NodeAttributeChanged {
        source_id: String,
        time_id: u64,
        node_id: String,
        attribute: String,
        old_value: Value,
        new_value: Value,
    },
    NodeAttributeRemoved {
        source_id: String,
        time_id: u64,
        node_id: String,
        attribute: String,
    },
    EdgeAttributeAdded {
        source_id: String,
        time_id: u64,
        edge_id: String,
        attribute: String,
        value: Value,
    },
    EdgeAttributeChanged {
        source_id: String,
        time_id: u64,
        edge_id: String,
        attribute: String,
        old_value: Value,
        new_value: Value,
    },
    EdgeAttributeRemoved {
        source_id: String,
        time_id: u64,
        edge_id: String,
        attribute: String,
    },
}

impl GraphEvent {
    /// The command this event travels as
    pub fn command(&self) -> Command {
        match self {
            GraphEvent::NodeAdded { .. } => Command::AddNode,
            GraphEvent::NodeRemoved { .. } => Command::DelNode,
            GraphEvent::EdgeAdded { .. } => Command::AddEdge,
            GraphEvent::EdgeRemoved { .. } => Command::DelEdge,
            GraphEvent::StepBegins { .. } => Command::Step,
            GraphEvent::GraphCleared { .. } => Command::Cleared,
            GraphEvent::GraphAttributeAdded { .. } => Command::AddGraphAttr,
            GraphEvent::GraphAttributeChanged { .. } => Command::ChgGraphAttr,
            GraphEvent::GraphAttributeRemoved { .. } => Command::DelGraphAttr,
            GraphEvent::NodeAttributeAdded { .. } => Command::AddNodeAttr,
            GraphEvent::NodeAttributeChanged { .. } => Command::ChgNodeAttr,
            GraphEvent::NodeAttributeRemoved { .. } => Command::DelNodeAttr,
            GraphEvent::EdgeAttributeAdded { .. } => Command::AddEdgeAttr,
            GraphEvent::EdgeAttributeChanged { .. } => Command::ChgEdgeAttr,
            GraphEvent::EdgeAttributeRemoved { .. } => Command::DelEdgeAttr,
        }
    }

    pub fn source_id(&self) -> &str {
        match self {
            GraphEvent::NodeAdded { source_id, .. }
            | GraphEvent::NodeRemoved { source_id, .. }
            | GraphEvent::EdgeAdded { source_id, .. }
            | GraphEvent::EdgeRemoved { source_id, .. }
            | GraphEvent::StepBegins { source_id, .. }
            | GraphEvent::GraphCleared { source_id, .. }
            | GraphEvent::GraphAttributeAdded { source_id, .. }
            | GraphEvent::GraphAttributeChanged { source_id, .. }
            | GraphEvent::GraphAttributeRemoved { source_id, .. }
            | GraphEvent::NodeAttributeAdded { source_id, .. }
            | GraphEvent::NodeAttributeChanged { source_id, .. }
            | GraphEvent::NodeAttributeRemoved { source_id, .. }
            | GraphEvent::EdgeAttributeAdded { source_id, .. }
            | GraphEvent::EdgeAttributeChanged { source_id, .. }
            | GraphEvent::EdgeAttributeRemoved { source_id, .. } => source_id,
        }
    }

    pub fn time_id(&self) -> u64 {
        match self {
            GraphEvent::NodeAdded { time_id, .. }
            | GraphEvent::NodeRemoved { time_id, .. }
            | GraphEvent::EdgeAdded { time_id, .. }
            | GraphEvent::EdgeRemoved { time_id, .. }
            | GraphEvent::StepBegins { time_id, .. }
            | GraphEvent::GraphCleared { time_id, .. }
            | GraphEvent::GraphAttributeAdded { time_id, .. }
            | GraphEvent::GraphAttributeChanged { time_id, .. }
            | GraphEvent::GraphAttributeRemoved { time_id, .. }
            | GraphEvent::NodeAttributeAdded { time_id, .. }
            | GraphEvent::NodeAttributeChanged { time_id, .. }
            | GraphEvent::NodeAttributeRemoved { time_id, .. }
            | GraphEvent::EdgeAttributeAdded { time_id, .. }
            | GraphEvent::EdgeAttributeChanged { time_id, .. }
            | GraphEvent::EdgeAttributeRemoved { time_id, .. } => *time_id,
        }
    }

    /// Deliver this event to `sink` through the matching callback
    pub fn dispatch<S: Sink + ?Sized>(&self, sink: &mut S) {
        match self {
            GraphEvent::NodeAdded { source_id, time_id, node_id } => {
                sink.node_added(source_id, *time_id, node_id)
            }
            GraphEvent::NodeRemoved { source_id, time_id, node_id } => {
                sink.node_removed(source_id, *time_id, node_id)
            }
            GraphEvent::EdgeAdded {
                source_id,
                time_id,
                edge_id,
                from_id,
                to_id,
                directed,
            } => sink.edge_added(source_id, *time_id, edge_id, from_id, to_id, *directed),
            GraphEvent::EdgeRemoved { source_id, time_id, edge_id } => {
                sink.edge_removed(source_id, *time_id, edge_id)
            }
            GraphEvent::StepBegins { source_id, time_id, step } => {
                sink.step_begins(source_id, *time_id, *step)
            }
            GraphEvent::GraphCleared { source_id, time_id } => sink.graph_cleared(source_id, *time_id),
            GraphEvent::GraphAttributeAdded {
                source_id,
                time_id,
                attribute,
                value,
            } => sink.graph_attribute_added(source_id, *time_id, attribute, value),
            GraphEvent::GraphAttributeChanged {
                source_id,
                time_id,
                attribute,
                old_value,
                new_value,
            } => sink.graph_attribute_changed(source_id, *time_id, attribute, old_value, new_value),
            GraphEvent::GraphAttributeRemoved {
                source_id,
                time_id,
                attribute,
            } => sink.graph_attribute_removed(source_id, *time_id, attribute),
            GraphEvent::NodeAttributeAdded {
                source_id,
                time_id,
                node_id,
                attribute,
                value,
            } => sink.node_attribute_added(source_id, *time_id, node_id, attribute, value),
            GraphEvent::NodeAttributeChanged {
                source_id,
                time_id,
                node_id,
                attribute,
                old_value,
                new_value,
            } => sink.node_attribute_changed(source_id, *time_id, node_id, attribute, old_value, new_value),
            GraphEvent::NodeAttributeRemoved {
                source_id,
                time_id,
                node_id,
                attribute,
            } => sink.node_attribute_removed(source_id, *time_id, node_id, attribute),
            GraphEvent::EdgeAttributeAdded {
                source_id,
                time_id,
                edge_id,
                attribute,
                value,
            } => sink.edge_attribute_added(source_id, *time_id, edge_id, attribute, value),
            GraphEvent::EdgeAttributeChanged {
                source_id,
                time_id,
                edge_id,
                attribute,
                old_value,
                new_value,
            } => sink.edge_attribute_changed(source_id, *time_id, edge_id, attribute, old_value, new_value),
            GraphEvent::EdgeAttributeRemoved {
                source_id,
                time_id,
                edge_id,
                attribute,
            } => sink.edge_attribute_removed(source_id, *time_id, edge_id, attribute),
        }
    }
}

impl fmt::Display for GraphEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}@{}] ", self.source_id(), self.time_id())?;
        match self {
            GraphEvent::NodeAdded { node_id, .. } => write!(f, "+node {node_id}"),
            GraphEvent::NodeRemoved { node_id, .. } => write!(f, "-node {node_id}"),
            GraphEvent::EdgeAdded {
                edge_id,
                from_id,
                to_id,
                directed,
                ..
            } => {
                let arrow = if *directed { "->" } else { "--" };
                write!(f, "+edge {edge_id} ({from_id} {arrow} {to_id})")
            }
            GraphEvent::EdgeRemoved { edge_id, .. } => write!(f, "-edge {edge_id}"),
            GraphEvent::StepBegins { step, .. } => write!(f, "step {step}"),
            GraphEvent::GraphCleared { .. } => write!(f, "cleared"),
            GraphEvent::GraphAttributeAdded { attribute, value, .. } => {
                write!(f, "graph.{attribute} = {value}")
            }
            GraphEvent::GraphAttributeChanged {
                attribute,
                old_value,
                new_value,
                ..
            } => write!(f, "graph.{attribute}: {old_value} => {new_value}"),
            GraphEvent::GraphAttributeRemoved { attribute, .. } => write!(f, "graph.{attribute} removed"),
            GraphEvent::NodeAttributeAdded {
                node_id,
                attribute,
                value,
                ..
            } => write!(f, "node {node_id}.{attribute} = {value}"),
            GraphEvent::NodeAttributeChanged {
                node_id,
                attribute,
                old_value,
                new_value,
                ..
            } => write!(f, "node {node_id}.{attribute}: {old_value} => {new_value}"),
            GraphEvent::NodeAttributeRemoved { node_id, attribute, .. } => {
                write!(f, "node {node_id}.{attribute} removed")
            }
            GraphEvent::EdgeAttributeAdded {
                edge_id,
                attribute,
                value,
                ..
            } => write!(f, "edge {edge_id}.{attribute} = {value}"),
            GraphEvent::EdgeAttributeChanged {
                edge_id,
                attribute,
                old_value,
                new_value,
                ..
            } => write!(f, "edge {edge_id}.{attribute}: {old_value} => {new_value}"),
            GraphEvent::EdgeAttributeRemoved { edge_id, attribute, .. } => {
                write!(f, "edge {edge_id}.{attribute} removed")
            }
        }
    }
}

/// Forward every callback to the sink `$target` resolves to
macro_rules! delegate_sink {
    ($(impl [$($gen:tt)*] for $ty:ty => |$this:ident| $target:expr;)*) => {$(
        impl<$($gen)*> Sink for $ty {
            fn node_added(&mut self, source_id: &str, time_id: u64, node_id: &str) {
                let $this = self;
                $target.node_added(source_id, time_id, node_id)
            }

            fn node_removed(&mut self, source_id: &str, time_id: u64, node_id: &str) {
                let $this = self;
                $target.node_removed(source_id, time_id, node_id)
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
                let $this = self;
                $target.edge_added(source_id, time_id, edge_id, from_id, to_id, directed)
            }

            fn edge_removed(&mut self, source_id: &str, time_id: u64, edge_id: &str) {
                let $this = self;
                $target.edge_removed(source_id, time_id, edge_id)
            }

            fn step_begins(&mut self, source_id: &str, time_id: u64, step: f64) {
                let $this = self;
                $target.step_begins(source_id, time_id, step)
            }

            fn graph_cleared(&mut self, source_id: &str, time_id: u64) {
                let $this = self;
                $target.graph_cleared(source_id, time_id)
            }

            fn graph_attribute_added(&mut self, source_id: &str, time_id: u64, attribute: &str, value: &Value) {
                let $this = self;
                $target.graph_attribute_added(source_id, time_id, attribute, value)
            }

            fn graph_attribute_changed(
                &mut self,
                source_id: &str,
                time_id: u64,
                attribute: &str,
                old_value: &Value,
                new_value: &Value,
            ) {
                let $this = self;
                $target.graph_attribute_changed(source_id, time_id, attribute, old_value, new_value)
            }

            fn graph_attribute_removed(&mut self, source_id: &str, time_id: u64, attribute: &str) {
                let $this = self;
                $target.graph_attribute_removed(source_id, time_id, attribute)
            }

            fn node_attribute_added(
                &mut self,
                source_id: &str,
                time_id: u64,
                node_id: &str,
                attribute: &str,
                value: &Value,
            ) {
                let $this = self;
                $target.node_attribute_added(source_id, time_id, node_id, attribute, value)
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
                let $this = self;
                $target.node_attribute_changed(source_id, time_id, node_id, attribute, old_value, new_value)
            }

            fn node_attribute_removed(&mut self, source_id: &str, time_id: u64, node_id: &str, attribute: &str) {
                let $this = self;
                $target.node_attribute_removed(source_id, time_id, node_id, attribute)
            }

            fn edge_attribute_added(
                &mut self,
                source_id: &str,
                time_id: u64,
                edge_id: &str,
                attribute: &str,
                value: &Value,
            ) {
                let $this = self;
                $target.edge_attribute_added(source_id, time_id, edge_id, attribute, value)
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
                let $this = self;
                $target.edge_attribute_changed(source_id, time_id, edge_id, attribute, old_value, new_value)
            }

            fn edge_attribute_removed(&mut self, source_id: &str, time_id: u64, edge_id: &str, attribute: &str) {
                let $this = self;
                $target.edge_attribute_removed(source_id, time_id, edge_id, attribute)
            }

            fn stream_ended(&mut self) {
                let $this = self;
                $target.stream_ended()
            }
        }
    )*};
}

delegate_sink! {
    impl [S: Sink + ?Sized] for Box<S> => |this| (**this);
    impl [S: Sink + ?Sized] for &mut S => |this| (**this);
    impl [S: Sink + ?Sized] for Arc<Mutex<S>> => |this| this.lock().unwrap_or_else(PoisonError::into_inner);
}

/// Collects every received event, in order
impl Sink for Vec<GraphEvent> {
    fn node_added(&mut self, source_id: &str, time_id: u64, node_id: &str) {
        self.push(GraphEvent::NodeAdded {
            source_id: source_id.into(),
            time_id,
            node_id: node_id.into(),
        });
    }

    fn node_removed(&mut self, source_id: &str, time_id: u64, node_id: &str) {
        self.push(GraphEvent::NodeRemoved {
            source_id: source_id.into(),
            time_id,
            node_id: node_id.into(),
        });
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
        self.push(GraphEvent::EdgeAdded {
            source_id: source_id.into(),
            time_id,
            edge_id: edge_id.into(),
            from_id: from_id.into(),
            to_id: to_id.into(),
            directed,
        });
    }

    fn edge_removed(&mut self, source_id: &str, time_id: u64, edge_id: &str) {
        self.push(GraphEvent::EdgeRemoved {
            source_id: source_id.into(),
            time_id,
            edge_id: edge_id.into(),
        });
    }

    fn step_begins(&mut self, source_id: &str, time_id: u64, step: f64) {
        self.push(GraphEvent::StepBegins {
            source_id: source_id.into(),
            time_id,
            step,
        });
    }

    fn graph_cleared(&mut self, source_id: &str, time_id: u64) {
        self.push(GraphEvent::GraphCleared {
            source_id: source_id.into(),
            time_id,
        });
    }

    fn graph_attribute_added(&mut self, source_id: &str, time_id: u64, attribute: &str, value: &Value) {
        self.push(GraphEvent::GraphAttributeAdded {
            source_id: source_id.into(),
            time_id,
            attribute: attribute.into(),
            value: value.clone(),
        });
    }

    fn graph_attribute_changed(
        &mut self,
        source_id: &str,
        time_id: u64,
        attribute: &str,
        old_value: &Value,
        new_value: &Value,
    ) {
        self.push(GraphEvent::GraphAttributeChanged {
            source_id: source_id.into(),
            time_id,
            attribute: attribute.into(),
            old_value: old_value.clone(),
            new_value: new_value.clone(),
        });
    }

    fn graph_attribute_removed(&mut self, source_id: &str, time_id: u64, attribute: &str) {
        self.push(GraphEvent::GraphAttributeRemoved {
            source_id: source_id.into(),
            time_id,
            attribute: attribute.into(),
        });
    }

    fn node_attribute_added(
        &mut self,
        source_id: &str,
        time_id: u64,
        node_id: &str,
        attribute: &str,
        value: &Value,
    ) {
        self.push(GraphEvent::NodeAttributeAdded {
            source_id: source_id.into(),
            time_id,
            node_id: node_id.into(),
            attribute: attribute.into(),
            value: value.clone(),
        });
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
        self.push(GraphEvent::NodeAttributeChanged {
            source_id: source_id.into(),
            time_id,
            node_id: node_id.into(),
            attribute: attribute.into(),
            old_value: old_value.clone(),
            new_value: new_value.clone(),
        });
    }

    fn node_attribute_removed(&mut self, source_id: &str, time_id: u64, node_id: &str, attribute: &str) {
        self.push(GraphEvent::NodeAttributeRemoved {
            source_id: source_id.into(),
            time_id,
            node_id: node_id.into(),
            attribute: attribute.into(),
        });
    }

    fn edge_attribute_added(
        &mut self,
        source_id: &str,
        time_id: u64,
        edge_id: &str,
        attribute: &str,
        value: &Value,
    ) {
        self.push(GraphEvent::EdgeAttributeAdded {
            source_id: source_id.into(),
            time_id,
            edge_id: edge_id.into(),
            attribute: attribute.into(),
            value: value.clone(),
        });
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
        self.push(GraphEvent::EdgeAttributeChanged {
            source_id: source_id.into(),
            time_id,
            edge_id: edge_id.into(),
            attribute: attribute.into(),
            old_value: old_value.clone(),
            new_value: new_value.clone(),
        });
    }

    fn edge_attribute_removed(&mut self, source_id: &str, time_id: u64, edge_id: &str, attribute: &str) {
        self.push(GraphEvent::EdgeAttributeRemoved {
            source_id: source_id.into(),
            time_id,
            edge_id: edge_id.into(),
            attribute: attribute.into(),
        });
    }
}

/// Turns a closure over owned events into a [`Sink`]
pub struct SinkFn<F>(pub F);

impl<F: FnMut(GraphEvent)> SinkFn<F> {
    fn emit(&mut self, record: impl FnOnce(&mut Vec<GraphEvent>)) {
        let mut events = Vec::with_capacity(1);
        record(&mut events);
        events.into_iter().for_each(&mut self.0);
    }
}

impl<F: FnMut(GraphEvent)> Sink for SinkFn<F> {
    fn node_added(&mut self, source_id: &str, time_id: u64, node_id: &str) {
        self.emit(|e| e.node_added(source_id, time_id, node_id));
    }

    fn node_removed(&mut self, source_id: &str, time_id: u64, node_id: &str) {
        self.emit(|e| e.node_removed(source_id, time_id, node_id));
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
        self.emit(|e| e.edge_added(source_id, time_id, edge_id, from_id, to_id, directed));
    }

    fn edge_removed(&mut self, source_id: &str, time_id: u64, edge_id: &str) {
        self.emit(|e| e.edge_removed(source_id, time_id, edge_id));
    }

    fn step_begins(&mut self, source_id: &str, time_id: u64, step: f64) {
        self.emit(|e| e.step_begins(source_id, time_id, step));
    }

    fn graph_cleared(&mut self, source_id: &str, time_id: u64) {
        self.emit(|e| e.graph_cleared(source_id, time_id));
    }

    fn graph_attribute_added(&mut self, source_id: &str, time_id: u64, attribute: &str, value: &Value) {
        self.emit(|e| e.graph_attribute_added(source_id, time_id, attribute, value));
    }

    fn graph_attribute_changed(
        &mut self,
        source_id: &str,
        time_id: u64,
        attribute: &str,
        old_value: &Value,
        new_value: &Value,
    ) {
        self.emit(|e| e.graph_attribute_changed(source_id, time_id, attribute, old_value, new_value));
    }

    fn graph_attribute_removed(&mut self, source_id: &str, time_id: u64, attribute: &str) {
        self.emit(|e| e.graph_attribute_removed(source_id, time_id, attribute));
    }

    fn node_attribute_added(
        &mut self,
        source_id: &str,
        time_id: u64,
        node_id: &str,
        attribute: &str,
        value: &Value,
    ) {
        self.emit(|e| e.node_attribute_added(source_id, time_id, node_id, attribute, value));
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
        self.emit(|e| {
            e.node_attribute_changed(source_id, time_id, node_id, attribute, old_value, new_value)
        });
    }

    fn node_attribute_removed(&mut self, source_id: &str, time_id: u64, node_id: &str, attribute: &str) {
        self.emit(|e| e.node_attribute_removed(source_id, time_id, node_id, attribute));
    }

    fn edge_attribute_added(
        &mut self,
        source_id: &str,
        time_id: u64,
        edge_id: &str,
        attribute: &str,
        value: &Value,
    ) {
        self.emit(|e| e.edge_attribute_added(source_id, time_id, edge_id, attribute, value));
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
        self.emit(|e| {
            e.edge_attribute_changed(source_id, time_id, edge_id, attribute, old_value, new_value)
        });
    }

    fn edge_attribute_removed(&mut self, source_id: &str, time_id: u64, edge_id: &str, attribute: &str) {
        self.emit(|e| e.edge_attribute_removed(source_id, time_id, edge_id, attribute));
    }
}

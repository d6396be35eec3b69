//! NetStream - Graph events over the network
//!
//! A compact binary protocol for streaming graph mutations (nodes, edges,
//! attributes, steps) from a producer to any number of live subscribers.

pub mod broker;
pub mod config;
pub mod network;
pub mod pipe;
pub mod protocol;
pub mod transport;

pub use broker::{Broker, EventLog, PeerState, ProcessRegistry};
pub use pipe::NetStreamPipe;
pub use protocol::{EventDecoder, EventEncoder, GraphEvent, Sink, Value};
pub use transport::{Peer, Transport};

//! Protocol module - The NetStream wire format
//!
//! Every message is one command:
//! - 1 byte command code
//! - source id (varint length + UTF-8)
//! - time id (varint)
//! - command-specific payload (ids, attribute names, tagged values)
//!
//! END is the exception: a single command byte with nothing after it.

mod codec;
mod command;
mod decoder;
mod encoder;
mod event;
mod string;
mod value;
mod varint;

pub use codec::*;
pub use command::*;
pub use decoder::*;
pub use encoder::*;
pub use event::*;
pub use string::*;
pub use value::*;
pub use varint::*;

/// Default port for raw socket subscribers
pub const DEFAULT_PORT: u16 = 2001;

/// Default port for producers pushing events into a relay
pub const DEFAULT_INGEST_PORT: u16 = 2002;

/// Default port for WebSocket subscribers
pub const DEFAULT_WEBSOCKET_PORT: u16 = 10042;

//! Delivery of finished messages
//!
//! A [`Transport`] takes one complete message and hands it to a destination.
//! A [`Peer`] is a transport that is also one live connection the broker can
//! identify and close.

use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of a peer connection
pub type PeerId = Uuid;

/// Transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection closed")]
    Closed,

    #[error("Send failed: {0}")]
    SendFailed(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Sends whole messages.
///
/// Implementations must deliver each message entirely or report an error,
/// and must not reorder messages from consecutive calls.
pub trait Transport: Send + Sync {
    fn send(&self, message: Bytes) -> TransportResult<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, message: Bytes) -> TransportResult<()> {
        (**self).send(message)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, message: Bytes) -> TransportResult<()> {
        (**self).send(message)
    }
}

/// One live connection owned by a broker.
///
/// `send` must not block on the network: brokers call it while holding their
/// state lock.
pub trait Peer: Transport {
    fn id(&self) -> PeerId;

    fn remote_addr(&self) -> Option<SocketAddr>;

    /// Close the connection. Closing twice is not an error.
    fn close(&self) -> TransportResult<()>;
}

/// Keeps every message in memory
#[derive(Debug, Default)]
pub struct BufferTransport {
    messages: Mutex<Vec<Bytes>>,
}

impl BufferTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything sent so far
    pub fn take(&self) -> Vec<Bytes> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Transport for BufferTransport {
    fn send(&self, message: Bytes) -> TransportResult<()> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }
}

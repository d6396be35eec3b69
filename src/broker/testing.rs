//! In-memory peers for broker tests

use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::protocol::{EventDecoder, GraphEvent};
use crate::transport::{Peer, PeerId, Transport, TransportError, TransportResult};

/// Records every message it is sent
#[derive(Debug)]
pub(crate) struct RecordingPeer {
    id: PeerId,
    addr: Option<SocketAddr>,
    received: Mutex<Vec<Bytes>>,
    closed: AtomicBool,
    fail_sends: AtomicBool,
    fail_close: AtomicBool,
}

impl RecordingPeer {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            addr: None,
            received: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
        }
    }

    pub(crate) fn with_addr(addr: SocketAddr) -> Self {
        Self {
            addr: Some(addr),
            ..Self::new()
        }
    }

    pub(crate) fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn received(&self) -> Vec<Bytes> {
        self.received.lock().unwrap().clone()
    }

    /// Decode everything received so far
    pub(crate) fn events(&self) -> Vec<GraphEvent> {
        let mut decoder = EventDecoder::new(Vec::<GraphEvent>::new());
        for message in self.received() {
            decoder.decode(&message);
        }
        decoder.into_sink()
    }
}

impl Transport for RecordingPeer {
    fn send(&self, message: Bytes) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("injected failure".into()));
        }
        self.received.lock().unwrap().push(message);
        Ok(())
    }
}

impl Peer for RecordingPeer {
    fn id(&self) -> PeerId {
        self.id
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    fn close(&self) -> TransportResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("injected close failure".into()));
        }
        Ok(())
    }
}

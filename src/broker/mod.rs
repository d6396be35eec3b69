//! Broker module - Fans encoded messages out to live peers
//!
//! Provides:
//! - An ordered chain of authorization filters run on every new peer
//! - Broadcast of each message to every open peer
//! - History replay for late joiners, with live traffic held back until the
//!   replay is done
//! - A process-wide registry so every broker can be stopped at exit
//!
//! All broker state (filters and peers) sits behind one mutex. Peers must
//! accept `send` without blocking, so holding the lock while sending is cheap
//! and gives every peer the same message order.

mod filter;
mod registry;
mod replay;

#[cfg(test)]
pub(crate) mod testing;

pub use filter::*;
pub use registry::*;
pub use replay::*;

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::watch;

use crate::protocol::EventEncoder;
use crate::transport::{Peer, PeerId, Transport, TransportError, TransportResult};

/// Broker errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Broker already running")]
    AlreadyRunning,

    #[error("Broker not running")]
    NotRunning,

    #[error("{failed} peers failed to close")]
    CloseFailed { failed: usize },
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// Lifecycle of a peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Transport accepted, handshake or admission still to come
    Connecting,
    /// Running the filter chain
    Authorizing,
    /// Receiving messages (replay first, when configured)
    Open,
    /// Gone: rejected, failed, or closed by either side
    Closed,
}

struct PeerEntry {
    peer: Arc<dyn Peer>,
    /// Live messages held back while the peer is replaying history
    backlog: Option<Vec<Bytes>>,
}

#[derive(Default)]
struct BrokerState {
    running: bool,
    filters: Vec<(FilterId, Arc<dyn PeerFilter>)>,
    next_filter_id: u64,
    peers: HashMap<PeerId, PeerEntry>,
    /// Peers not yet open: accepted, or running the filter chain
    pending: HashMap<PeerId, PeerState>,
}

/// Owns the live peers of one endpoint
pub struct Broker {
    name: String,
    state: Mutex<BrokerState>,
    replay: Option<Arc<dyn ReplaySource>>,
    stopped_tx: watch::Sender<bool>,
}

impl Broker {
    pub fn new(name: impl Into<String>) -> Self {
        let (stopped_tx, _) = watch::channel(true);

        Self {
            name: name.into(),
            state: Mutex::new(BrokerState::default()),
            replay: None,
            stopped_tx,
        }
    }

    /// Replay `source` to every peer before it sees live traffic
    pub fn with_replay(mut self, source: Arc<dyn ReplaySource>) -> Self {
        self.replay = Some(source);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock_state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start accepting peers
    pub fn start(&self) -> BrokerResult<()> {
        let mut state = self.lock_state();
        if state.running {
            return Err(BrokerError::AlreadyRunning);
        }
        state.running = true;
        self.stopped_tx.send_replace(false);

        tracing::info!("Broker '{}' started", self.name);
        Ok(())
    }

    /// Stop the broker and close every peer.
    ///
    /// All peers are closed even if some fail to; the failures are counted in
    /// the returned error.
    pub fn stop(&self) -> BrokerResult<()> {
        let peers: Vec<PeerEntry> = {
            let mut state = self.lock_state();
            if !state.running {
                return Err(BrokerError::NotRunning);
            }
            state.running = false;
            // Peers still authorizing notice this and close themselves
            state.pending.clear();
            state.peers.drain().map(|(_, entry)| entry).collect()
        };
        self.stopped_tx.send_replace(true);

        let total = peers.len();
        let mut failed = 0;
        for entry in peers {
            if let Err(e) = entry.peer.close() {
                tracing::warn!("Failed to close peer {}: {}", entry.peer.id(), e);
                failed += 1;
            }
        }

        tracing::info!("Broker '{}' stopped, {} peers closed", self.name, total);

        if failed > 0 {
            return Err(BrokerError::CloseFailed { failed });
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.lock_state().running
    }

    /// Watch for the broker stopping; the value is `true` once stopped
    pub fn subscribe_stopped(&self) -> watch::Receiver<bool> {
        self.stopped_tx.subscribe()
    }

    /// Append a filter to the end of the chain
    pub fn add_filter(&self, filter: impl PeerFilter + 'static) -> FilterId {
        let mut state = self.lock_state();
        let id = FilterId(state.next_filter_id);
        state.next_filter_id += 1;
        state.filters.push((id, Arc::new(filter)));
        id
    }

    pub fn remove_filter(&self, id: FilterId) -> bool {
        let mut state = self.lock_state();
        let before = state.filters.len();
        state.filters.retain(|(filter_id, _)| *filter_id != id);
        state.filters.len() != before
    }

    /// Record a transport-level accept; the peer is `Connecting` until it is
    /// handed to [`Broker::admit`] or removed.
    pub fn connecting(&self, id: PeerId) {
        let mut state = self.lock_state();
        if state.running {
            state.pending.insert(id, PeerState::Connecting);
        }
    }

    /// Authorize a newly accepted peer and, if it passes, replay history to it.
    ///
    /// Returns `Open` once the peer is caught up and receiving live traffic,
    /// `Closed` if it was rejected or failed along the way. Filters and
    /// replay run on the calling thread.
    pub fn admit(&self, peer: Arc<dyn Peer>) -> PeerState {
        let id = peer.id();
        tracing::debug!("Peer {} ({:?}) authorizing", id, peer.remote_addr());

        let filters: Vec<(FilterId, Arc<dyn PeerFilter>)> = {
            let mut state = self.lock_state();
            if !state.running {
                state.pending.remove(&id);
                drop(state);
                tracing::warn!("Broker '{}' not running, refusing peer {}", self.name, id);
                close_quietly(peer.as_ref());
                return PeerState::Closed;
            }
            state.pending.insert(id, PeerState::Authorizing);
            state.filters.clone()
        };

        let rejected_by = filters
            .iter()
            .find(|(_, filter)| !filter.authorize(peer.as_ref()))
            .map(|(filter_id, _)| *filter_id);

        let controller = {
            let mut state = self.lock_state();
            let still_pending = state.pending.remove(&id).is_some();

            if let Some(filter_id) = rejected_by {
                drop(state);
                tracing::info!("Peer {} rejected by filter {:?}", id, filter_id);
                close_quietly(peer.as_ref());
                return PeerState::Closed;
            }

            if !still_pending || !state.running {
                drop(state);
                tracing::debug!("Peer {} dropped while authorizing", id);
                close_quietly(peer.as_ref());
                return PeerState::Closed;
            }

            // Snapshot history and join the live set atomically, so every
            // event lands either in the snapshot or in the backlog
            let controller = self.replay.as_ref().map(|source| source.replay_controller());
            state.peers.insert(
                id,
                PeerEntry {
                    peer: peer.clone(),
                    backlog: controller.as_ref().map(|_| Vec::new()),
                },
            );
            controller
        };

        if let Some(mut controller) = controller {
            let target = Arc::new(ReplayTarget {
                peer: peer.clone(),
                failed: AtomicBool::new(false),
            });
            controller.add_sink(Box::new(EventEncoder::new(target.clone())));
            controller.replay();
            drop(controller);

            if target.failed.load(Ordering::SeqCst) {
                tracing::warn!("Replay to peer {} failed", id);
                self.disconnect(id);
                return PeerState::Closed;
            }

            let mut state = self.lock_state();
            let Some(entry) = state.peers.get_mut(&id) else {
                tracing::debug!("Peer {} closed during replay", id);
                return PeerState::Closed;
            };

            let backlog = entry.backlog.take().unwrap_or_default();
            let queued = backlog.len();
            for message in backlog {
                if let Err(e) = peer.send(message) {
                    tracing::warn!("Failed to flush backlog to peer {}: {}", id, e);
                    state.peers.remove(&id);
                    drop(state);
                    close_quietly(peer.as_ref());
                    return PeerState::Closed;
                }
            }
            tracing::debug!("Peer {} caught up, {} queued messages flushed", id, queued);
        }

        tracing::info!("Peer {} open on broker '{}'", id, self.name);
        PeerState::Open
    }

    /// Send `message` to every open peer
    pub fn broadcast(&self, message: Bytes) {
        self.broadcast_with(message, || ());
    }

    /// Run `before`, then broadcast, without letting peers join in between.
    ///
    /// Publishers that record history use this so a joining peer sees each
    /// event exactly once: in its replay snapshot or live, never both.
    pub fn broadcast_with<R>(&self, message: Bytes, before: impl FnOnce() -> R) -> R {
        let mut state = self.lock_state();
        let result = before();

        let mut failed = Vec::new();
        for (id, entry) in state.peers.iter_mut() {
            match entry.backlog.as_mut() {
                Some(backlog) => backlog.push(message.clone()),
                None => {
                    if let Err(e) = entry.peer.send(message.clone()) {
                        tracing::warn!("Broadcast to peer {} failed: {}", id, e);
                        failed.push(*id);
                    }
                }
            }
        }

        let dropped: Vec<PeerEntry> = failed
            .iter()
            .filter_map(|id| state.peers.remove(id))
            .collect();
        drop(state);

        for entry in dropped {
            close_quietly(entry.peer.as_ref());
        }
        result
    }

    /// Forget a peer whose connection already closed
    pub fn remove_peer(&self, id: PeerId) -> bool {
        let removed = {
            let mut state = self.lock_state();
            let pending = state.pending.remove(&id).is_some();
            state.peers.remove(&id).is_some() || pending
        };
        if removed {
            tracing::info!("Peer {} left broker '{}'", id, self.name);
        }
        removed
    }

    /// Remove a peer and close its connection
    pub fn disconnect(&self, id: PeerId) -> bool {
        let entry = self.lock_state().peers.remove(&id);
        match entry {
            Some(entry) => {
                close_quietly(entry.peer.as_ref());
                true
            }
            None => false,
        }
    }

    pub fn peer_state(&self, id: PeerId) -> PeerState {
        let state = self.lock_state();
        if state.peers.contains_key(&id) {
            return PeerState::Open;
        }
        state.pending.get(&id).copied().unwrap_or(PeerState::Closed)
    }

    pub fn peer_count(&self) -> usize {
        self.lock_state().peers.len()
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.lock_state().peers.keys().copied().collect()
    }
}

impl Transport for Broker {
    fn send(&self, message: Bytes) -> TransportResult<()> {
        self.broadcast(message);
        Ok(())
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("name", &self.name)
            .field("replay", &self.replay.is_some())
            .finish_non_exhaustive()
    }
}

/// Sends replayed history straight to one peer
struct ReplayTarget {
    peer: Arc<dyn Peer>,
    failed: AtomicBool,
}

impl Transport for ReplayTarget {
    fn send(&self, message: Bytes) -> TransportResult<()> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        self.peer.send(message).inspect_err(|_| {
            self.failed.store(true, Ordering::SeqCst);
        })
    }
}

fn close_quietly(peer: &dyn Peer) {
    if let Err(e) = peer.close() {
        tracing::debug!("Closing peer {}: {}", peer.id(), e);
    }
}

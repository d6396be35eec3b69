//! NetStream Server
//!
//! Accepts subscriber connections and attaches each one to a broker as a
//! peer. Everything the broker broadcasts is written to every subscriber.

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::connection::{Connection, ConnectionError, Outbound, PeerHandle};
use super::{wait_until_set, websocket, NetworkConfig, TransportKind};
use crate::broker::{Broker, BrokerError, PeerState, ProcessRegistry};
use crate::transport::Peer;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Server already running")]
    AlreadyRunning,

    #[error("Server not running")]
    NotRunning,

    #[error("Bind failed: {0}")]
    BindFailed(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Publishes a broker to network subscribers
pub struct Server {
    config: NetworkConfig,
    kind: TransportKind,
    broker: Arc<Broker>,
    local_addr: Option<SocketAddr>,
    /// Set when this server started the broker and so is the one to stop it
    owns_broker: bool,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
}

impl Server {
    pub fn new(config: NetworkConfig, kind: TransportKind, broker: Arc<Broker>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            kind,
            broker,
            local_addr: None,
            owns_broker: false,
            shutdown_tx,
            accept_task: None,
        }
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Address actually bound, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind, start the broker and begin accepting subscribers.
    ///
    /// The broker may be shared between servers; starting one that already
    /// runs is fine, and the server that started it owns it. The accept loop
    /// ends when this server or the broker stops.
    pub async fn start(&mut self) -> ServerResult<SocketAddr> {
        if self.accept_task.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let bind_addr = self.config.bind_string();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            ServerError::BindFailed(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;
        let local_addr = listener.local_addr()?;

        self.owns_broker = match self.broker.start() {
            Ok(()) => true,
            Err(BrokerError::AlreadyRunning) => false,
            Err(e) => return Err(e.into()),
        };
        if self.owns_broker {
            ProcessRegistry::global().register(self.broker.clone());
        }

        tracing::info!(
            "Server '{}' listening on {} ({})",
            self.broker.name(),
            local_addr,
            self.kind
        );

        let broker = self.broker.clone();
        let kind = self.kind;
        let max_message_size = self.config.max_message_size;
        let mut stopped = broker.subscribe_stopped();
        self.shutdown_tx.send_replace(false);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        self.accept_task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                tracing::info!("New connection from {}", addr);
                                let broker = broker.clone();

                                tokio::spawn(async move {
                                    let result = match kind {
                                        TransportKind::Tcp => {
                                            handle_subscriber(stream, addr, broker, max_message_size).await
                                        }
                                        TransportKind::WebSocket => {
                                            websocket::handle_subscriber(stream, addr, broker).await
                                        }
                                    };
                                    if let Err(e) = result {
                                        tracing::error!("Subscriber handler error ({}): {}", addr, e);
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = wait_until_set(&mut stopped) => {
                        tracing::info!("Broker stopped, closing listener");
                        break;
                    }
                    _ = wait_until_set(&mut shutdown_rx) => {
                        tracing::info!("Server shutdown requested");
                        break;
                    }
                }
            }
        }));

        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// Close the listener and wait for the accept loop.
    ///
    /// A server that started its broker also stops it, closing every
    /// subscriber on every server sharing it. Otherwise the broker and its
    /// subscribers are left to their owner.
    pub async fn stop(&mut self) -> ServerResult<()> {
        let task = self.accept_task.take().ok_or(ServerError::NotRunning)?;
        self.shutdown_tx.send_replace(true);

        let mut result = Ok(());
        if std::mem::take(&mut self.owns_broker) {
            ProcessRegistry::global().unregister(&self.broker);
            result = match self.broker.stop() {
                Ok(()) | Err(BrokerError::NotRunning) => Ok(()),
                Err(e) => Err(ServerError::Broker(e)),
            };
        }

        if let Err(e) = task.await {
            tracing::error!("Accept loop failed: {}", e);
        }
        result
    }

    pub fn is_running(&self) -> bool {
        self.accept_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

/// Run the broker's admission for a new peer on the blocking pool.
///
/// Admission may replay a long history, so it stays off the async workers.
pub(super) async fn admit(broker: &Arc<Broker>, handle: &Arc<PeerHandle>) -> PeerState {
    let broker = broker.clone();
    let peer: Arc<dyn Peer> = handle.clone();

    match tokio::task::spawn_blocking(move || broker.admit(peer)).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Admission of peer {} failed: {}", handle.id(), e);
            PeerState::Closed
        }
    }
}

/// Handle a raw TCP subscriber
async fn handle_subscriber(
    stream: TcpStream,
    addr: SocketAddr,
    broker: Arc<Broker>,
    max_message_size: usize,
) -> Result<(), ConnectionError> {
    stream.set_nodelay(true)?;
    let mut conn = Connection::new(stream, addr, max_message_size);

    let (handle, mut outbound) = PeerHandle::new(addr);
    let handle = Arc::new(handle);
    let id = handle.id();
    broker.connecting(id);

    if admit(&broker, &handle).await == PeerState::Closed {
        tracing::info!("Subscriber {} ({}) not admitted", id, addr);
        let _ = conn.shutdown().await;
        return Ok(());
    }

    let reason = loop {
        tokio::select! {
            message = outbound.recv() => {
                match message {
                    Some(Outbound::Message(message)) => {
                        if let Err(e) = conn.send_frame(&message).await {
                            break format!("Send error: {}", e);
                        }
                    }
                    Some(Outbound::Close) | None => break "Closed by broker".to_string(),
                }
            }

            result = conn.recv_frame() => {
                match result {
                    Ok(Some(frame)) => {
                        tracing::debug!("Ignoring {} bytes from subscriber {}", frame.len(), addr);
                    }
                    Ok(None) => break "Connection closed".to_string(),
                    Err(e) => break format!("Error: {}", e),
                }
            }
        }
    };

    handle.mark_disconnected();
    broker.remove_peer(id);
    tracing::info!("Subscriber {} ({}) disconnected: {}", id, addr, reason);

    let _ = conn.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::AllowList;
    use crate::protocol::{encode_event, GraphEvent};
    use std::time::Duration;

    fn local_config() -> NetworkConfig {
        NetworkConfig::new(0).with_bind_address("127.0.0.1")
    }

    async fn wait_for_peers(broker: &Broker, count: usize) {
        for _ in 0..200 {
            if broker.peer_count() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} peers, have {}", count, broker.peer_count());
    }

    #[tokio::test]
    async fn test_server_lifecycle() {
        let broker = Arc::new(Broker::new("lifecycle"));
        let mut server = Server::new(local_config(), TransportKind::Tcp, broker.clone());
        assert!(!server.is_running());

        let addr = server.start().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert!(server.is_running());
        assert!(broker.is_running());
        assert!(ProcessRegistry::global().contains(&broker));
        assert!(matches!(server.start().await, Err(ServerError::AlreadyRunning)));

        server.stop().await.unwrap();
        assert!(!broker.is_running());
        assert!(!ProcessRegistry::global().contains(&broker));
        assert!(matches!(server.stop().await, Err(ServerError::NotRunning)));
    }

    #[tokio::test]
    async fn test_subscriber_receives_broadcast() {
        let broker = Arc::new(Broker::new("broadcast"));
        let mut server = Server::new(local_config(), TransportKind::Tcp, broker.clone());
        let addr = server.start().await.unwrap();

        let mut client = Connection::connect(addr, Duration::from_secs(1), 1024)
            .await
            .unwrap();
        wait_for_peers(&broker, 1).await;

        let message = encode_event(&GraphEvent::NodeAdded {
            source_id: "g".into(),
            time_id: 0,
            node_id: "a".into(),
        });
        broker.broadcast(message.clone());

        let frame = client
            .recv_timeout(Duration::from_secs(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame, message);

        drop(client);
        wait_for_peers(&broker, 0).await;
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_filtered_subscriber_is_dropped() {
        let broker = Arc::new(Broker::new("filtered"));
        broker.add_filter(AllowList::from_config(&["10.9.9.9".into()]));
        let mut server = Server::new(local_config(), TransportKind::Tcp, broker.clone());
        let addr = server.start().await.unwrap();

        let mut client = Connection::connect(addr, Duration::from_secs(1), 1024)
            .await
            .unwrap();
        let result = client.recv_timeout(Duration::from_secs(2)).await;
        assert!(matches!(result, Ok(None)));
        assert_eq!(broker.peer_count(), 0);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_disconnects_subscribers() {
        let broker = Arc::new(Broker::new("stopping"));
        let mut server = Server::new(local_config(), TransportKind::Tcp, broker.clone());
        let addr = server.start().await.unwrap();

        let mut client = Connection::connect(addr, Duration::from_secs(1), 1024)
            .await
            .unwrap();
        wait_for_peers(&broker, 1).await;

        server.stop().await.unwrap();

        let result = client.recv_timeout(Duration::from_secs(2)).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_shared_broker_outlives_second_server() {
        let broker = Arc::new(Broker::new("shared"));
        let mut tcp = Server::new(local_config(), TransportKind::Tcp, broker.clone());
        let mut ws = Server::new(local_config(), TransportKind::WebSocket, broker.clone());
        let tcp_addr = tcp.start().await.unwrap();
        ws.start().await.unwrap();

        ws.stop().await.unwrap();
        assert!(!ws.is_running());
        assert!(broker.is_running());
        assert!(tcp.is_running());
        assert!(ProcessRegistry::global().contains(&broker));

        let _client = Connection::connect(tcp_addr, Duration::from_secs(1), 1024)
            .await
            .unwrap();
        wait_for_peers(&broker, 1).await;

        tcp.stop().await.unwrap();
        assert!(!broker.is_running());
        assert!(!ProcessRegistry::global().contains(&broker));
    }
}

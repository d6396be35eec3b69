//! Ingest server
//!
//! Accepts producer connections over framed TCP and replays every decoded
//! event into a sink, normally a pipe publishing to subscribers. A producer
//! sending END only ends its own connection; the sink keeps running for the
//! other producers.

use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::connection::{Connection, ConnectionError};
use super::server::{ServerError, ServerResult};
use super::{wait_until_set, NetworkConfig};
use crate::protocol::{DecodeOutcome, EventDecoder, Sink};

pub struct IngestServer<S> {
    config: NetworkConfig,
    sink: S,
    local_addr: Option<SocketAddr>,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
}

impl<S> IngestServer<S>
where
    S: Sink + Clone + Send + 'static,
{
    /// Each producer connection feeds its own clone of `sink`
    pub fn new(config: NetworkConfig, sink: S) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            sink,
            local_addr: None,
            shutdown_tx,
            accept_task: None,
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub async fn start(&mut self) -> ServerResult<SocketAddr> {
        if self.accept_task.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let bind_addr = self.config.bind_string();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            ServerError::BindFailed(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Ingest listening on {}", local_addr);

        self.shutdown_tx.send_replace(false);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let sink = self.sink.clone();
        let max_message_size = self.config.max_message_size;

        self.accept_task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                tracing::info!("Producer connected from {}", addr);
                                let sink = sink.clone();
                                let shutdown_rx = shutdown_rx.clone();

                                tokio::spawn(async move {
                                    if let Err(e) =
                                        handle_producer(stream, addr, sink, max_message_size, shutdown_rx).await
                                    {
                                        tracing::error!("Producer handler error ({}): {}", addr, e);
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = wait_until_set(&mut shutdown_rx) => {
                        tracing::info!("Ingest shutdown requested");
                        break;
                    }
                }
            }
        }));

        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// Stop accepting and disconnect every producer
    pub async fn stop(&mut self) -> ServerResult<()> {
        let task = self.accept_task.take().ok_or(ServerError::NotRunning)?;
        self.shutdown_tx.send_replace(true);

        if let Err(e) = task.await {
            tracing::error!("Accept loop failed: {}", e);
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.accept_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

async fn handle_producer<S: Sink>(
    stream: TcpStream,
    addr: SocketAddr,
    sink: S,
    max_message_size: usize,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), ConnectionError> {
    let mut conn = Connection::new(stream, addr, max_message_size);
    let mut decoder = EventDecoder::new(sink).forward_end(false);
    let mut events = 0u64;

    let reason = loop {
        tokio::select! {
            result = conn.recv_frame() => {
                let Some(frame) = result? else {
                    break "connection closed";
                };

                match decoder.decode(&frame) {
                    DecodeOutcome::Dispatched(_) => events += 1,
                    DecodeOutcome::Ended => break "stream ended",
                    DecodeOutcome::Dropped => tracing::debug!("Dropped a message from {}", addr),
                }
            }
            _ = wait_until_set(&mut shutdown_rx) => break "shutting down",
        }
    };

    tracing::info!("Producer {} done after {} events: {}", addr, events, reason);
    let _ = conn.shutdown().await;
    Ok(())
}

//! NetStream Client
//!
//! Subscribes to a server's event stream, or publishes events to an ingest
//! endpoint.

use bytes::Bytes;
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::connection::{Connection, ConnectionError};
use super::NetworkConfig;
use crate::protocol::{Command, DecodeOutcome, EventDecoder, Sink};
use crate::transport::{Transport, TransportError, TransportResult};

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Publisher writer failed: {0}")]
    WriterFailed(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Receive a server's stream into `sink` until the server ends it or hangs up
pub async fn subscribe<S: Sink>(
    addr: SocketAddr,
    sink: S,
    config: &NetworkConfig,
) -> ClientResult<S> {
    tracing::info!("Subscribing to {}", addr);
    let mut conn = Connection::connect(
        addr,
        Duration::from_millis(config.connect_timeout_ms),
        config.max_message_size,
    )
    .await?;

    let mut decoder = EventDecoder::new(sink);
    while let Some(frame) = conn.recv_frame().await? {
        if decoder.decode(&frame) == DecodeOutcome::Ended {
            break;
        }
    }

    tracing::info!(
        "Subscription to {} finished after {} messages",
        addr,
        conn.stats().messages_received
    );
    Ok(decoder.into_sink())
}

/// Like [`subscribe`], over a WebSocket url such as `ws://host:10042`
pub async fn subscribe_websocket<S: Sink>(url: &str, sink: S) -> ClientResult<S> {
    tracing::info!("Subscribing to {}", url);
    let (mut ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(ConnectionError::from)?;

    let mut decoder = EventDecoder::new(sink);
    while let Some(msg) = ws.next().await {
        match msg.map_err(ConnectionError::from)? {
            WsMessage::Binary(data) => {
                if decoder.decode(&data) == DecodeOutcome::Ended {
                    break;
                }
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    let _ = ws.close(None).await;
    Ok(decoder.into_sink())
}

/// Writes framed messages to a remote endpoint.
///
/// `send` only queues; a background task does the writing. Wrap it in an
/// `EventEncoder` to publish events, then call [`Publisher::finish`].
#[derive(Debug)]
pub struct Publisher {
    remote_addr: SocketAddr,
    sender: mpsc::UnboundedSender<Bytes>,
    writer: JoinHandle<Result<(), ConnectionError>>,
}

impl Publisher {
    pub async fn connect(addr: SocketAddr, config: &NetworkConfig) -> ClientResult<Self> {
        let mut conn = Connection::connect(
            addr,
            Duration::from_millis(config.connect_timeout_ms),
            config.max_message_size,
        )
        .await?;
        tracing::info!("Publishing to {}", addr);

        let (sender, mut receiver) = mpsc::unbounded_channel::<Bytes>();
        let writer = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                conn.send_frame(&message).await?;
            }
            conn.shutdown().await
        });

        Ok(Self {
            remote_addr: addr,
            sender,
            writer,
        })
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Send END, then wait until everything queued is written
    pub async fn finish(self) -> ClientResult<()> {
        if self.send(Bytes::from_static(&[Command::End as u8])).is_err() {
            tracing::warn!("Publisher to {} closed before END", self.remote_addr);
        }
        drop(self.sender);

        match self.writer.await {
            Ok(result) => Ok(result?),
            Err(e) => Err(ClientError::WriterFailed(e.to_string())),
        }
    }
}

impl Transport for Publisher {
    fn send(&self, message: Bytes) -> TransportResult<()> {
        self.sender.send(message).map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_event, EventEncoder, GraphEvent, Value};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_subscribe_stops_at_end() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let event = GraphEvent::GraphAttributeAdded {
            source_id: "g".into(),
            time_id: 3,
            attribute: "ui.title".into(),
            value: Value::from("demo"),
        };
        let message = encode_event(&event);

        tokio::spawn(async move {
            let (stream, remote) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream, remote, 1024);
            conn.send_frame(&message).await.unwrap();
            conn.send_frame(&[Command::End as u8]).await.unwrap();
            // Never reached by a well-behaved subscriber
            conn.send_frame(&message).await.ok();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let events = subscribe(addr, Vec::<GraphEvent>::new(), &NetworkConfig::default())
            .await
            .unwrap();
        assert_eq!(events, vec![event]);
    }

    #[tokio::test]
    async fn test_publisher_frames_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, remote) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream, remote, 1024);
            let mut frames = Vec::new();
            while let Some(frame) = conn.recv_frame().await.unwrap() {
                frames.push(frame);
            }
            frames
        });

        let publisher = Publisher::connect(addr, &NetworkConfig::default())
            .await
            .unwrap();
        let mut encoder = EventEncoder::new(publisher);
        encoder.node_added("g", 0, "a");
        encoder.step_begins("g", 1, 1.0);
        encoder.into_transport().finish().await.unwrap();

        let frames = server.await.unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0][0], Command::AddNode as u8);
        assert_eq!(&frames[2][..], &[Command::End as u8]);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = Publisher::connect(addr, &NetworkConfig::default()).await;
        assert!(matches!(result, Err(ClientError::Connection(_))));
    }
}

//! Connection handling for NetStream
//!
//! Manages individual peer connections, including:
//! - Length-prefixed framing over TCP
//! - The non-blocking peer handle brokers send through

use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::{CodecError, FrameDecoder, FrameEncoder};
use crate::transport::{Peer, PeerId, Transport, TransportError, TransportResult};

/// Connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Connection closed")]
    Closed,

    #[error("Connection timeout")]
    Timeout,
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Connection statistics
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// A framed TCP connection
pub struct Connection {
    remote_addr: SocketAddr,
    stream: TcpStream,
    encoder: FrameEncoder,
    decoder: FrameDecoder,
    read_buf: BytesMut,
    write_buf: BytesMut,
    last_activity: Instant,
    stats: ConnectionStats,
}

impl Connection {
    pub fn new(stream: TcpStream, remote_addr: SocketAddr, max_message_size: usize) -> Self {
        Self {
            remote_addr,
            stream,
            encoder: FrameEncoder::new(max_message_size),
            decoder: FrameDecoder::new(max_message_size),
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::with_capacity(4096),
            last_activity: Instant::now(),
            stats: ConnectionStats::default(),
        }
    }

    /// Connect to `addr`, giving up after `timeout`
    pub async fn connect(
        addr: SocketAddr,
        timeout: Duration,
        max_message_size: usize,
    ) -> ConnectionResult<Self> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ConnectionError::Io(e)),
            Err(_) => return Err(ConnectionError::Timeout),
        };
        stream.set_nodelay(true)?;

        Ok(Self::new(stream, addr, max_message_size))
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Write one message as a frame
    pub async fn send_frame(&mut self, message: &[u8]) -> ConnectionResult<()> {
        self.write_buf.clear();
        self.encoder.encode(message, &mut self.write_buf)?;

        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;

        self.stats.messages_sent += 1;
        self.stats.bytes_sent += self.write_buf.len() as u64;
        self.last_activity = Instant::now();

        Ok(())
    }

    /// Read the next frame; `None` on a clean close.
    ///
    /// Cancel safe: partial input stays buffered for the next call.
    pub async fn recv_frame(&mut self) -> ConnectionResult<Option<Bytes>> {
        loop {
            if let Some(frame) = self.decoder.decode(&mut self.read_buf)? {
                self.stats.messages_received += 1;
                self.last_activity = Instant::now();
                return Ok(Some(frame));
            }

            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                if self.read_buf.is_empty() {
                    return Ok(None);
                }
                return Err(ConnectionError::Closed);
            }
            self.stats.bytes_received += n as u64;
        }
    }

    pub async fn recv_timeout(&mut self, timeout: Duration) -> ConnectionResult<Option<Bytes>> {
        match tokio::time::timeout(timeout, self.recv_frame()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    pub async fn shutdown(&mut self) -> ConnectionResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    pub fn idle_time(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

/// Work queued for a connection task
#[derive(Debug)]
pub enum Outbound {
    Message(Bytes),
    Close,
}

/// Broker-side handle to a live connection.
///
/// Sending only enqueues, so brokers can call it under their lock; the
/// connection task drains the queue in order.
#[derive(Debug)]
pub struct PeerHandle {
    id: PeerId,
    remote_addr: SocketAddr,
    sender: mpsc::UnboundedSender<Outbound>,
    connected: AtomicBool,
}

impl PeerHandle {
    pub fn new(remote_addr: SocketAddr) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = Self {
            id: Uuid::new_v4(),
            remote_addr,
            sender,
            connected: AtomicBool::new(true),
        };
        (handle, receiver)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Transport for PeerHandle {
    fn send(&self, message: Bytes) -> TransportResult<()> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }

        self.sender
            .send(Outbound::Message(message))
            .map_err(|_| TransportError::Closed)
    }
}

impl Peer for PeerHandle {
    fn id(&self) -> PeerId {
        self.id
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        Some(self.remote_addr)
    }

    fn close(&self) -> TransportResult<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            // The task may already be gone; nothing left to close then
            let _ = self.sender.send(Outbound::Close);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn local() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[test]
    fn test_peer_handle_queues_in_order() {
        let (handle, mut rx) = PeerHandle::new(local());

        handle.send(Bytes::from_static(b"one")).unwrap();
        handle.send(Bytes::from_static(b"two")).unwrap();
        handle.close().unwrap();
        handle.close().unwrap();

        assert!(matches!(rx.try_recv(), Ok(Outbound::Message(m)) if m == "one"));
        assert!(matches!(rx.try_recv(), Ok(Outbound::Message(m)) if m == "two"));
        assert!(matches!(rx.try_recv(), Ok(Outbound::Close)));
        assert!(rx.try_recv().is_err());
        assert_eq!(handle.send(Bytes::from_static(b"late")), Err(TransportError::Closed));
    }

    #[test]
    fn test_peer_handle_after_task_exit() {
        let (handle, rx) = PeerHandle::new(local());
        drop(rx);

        assert_eq!(handle.send(Bytes::from_static(b"x")), Err(TransportError::Closed));
        assert!(handle.close().is_ok());
    }

    #[tokio::test]
    async fn test_frames_over_tcp() {
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

        let mut client = Connection::connect(addr, Duration::from_secs(1), 1024)
            .await
            .unwrap();
        client.send_frame(b"hello").await.unwrap();
        client.send_frame(&[]).await.unwrap();
        client.send_frame(&[0x02]).await.unwrap();
        client.shutdown().await.unwrap();

        let frames = server.await.unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(&frames[0][..], b"hello");
        assert!(frames[1].is_empty());
        assert_eq!(client.stats().messages_sent, 3);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, remote) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream, remote, 4);
            conn.recv_frame().await
        });

        let mut client = Connection::connect(addr, Duration::from_secs(1), 1024)
            .await
            .unwrap();
        client.send_frame(b"too long").await.unwrap();

        let result = server.await.unwrap();
        assert!(matches!(
            result,
            Err(ConnectionError::Protocol(CodecError::MessageTooLarge(..)))
        ));
    }
}

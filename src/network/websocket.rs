//! WebSocket subscribers
//!
//! Each NetStream message travels as one binary WebSocket message, so no
//! extra framing is needed.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;

use super::connection::{ConnectionError, Outbound, PeerHandle};
use super::server::admit;
use crate::broker::{Broker, PeerState};
use crate::transport::Peer;

pub(super) async fn handle_subscriber(
    stream: TcpStream,
    addr: SocketAddr,
    broker: Arc<Broker>,
) -> Result<(), ConnectionError> {
    let (handle, mut outbound) = PeerHandle::new(addr);
    let handle = Arc::new(handle);
    let id = handle.id();

    broker.connecting(id);
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            broker.remove_peer(id);
            return Err(e.into());
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    tracing::info!("WebSocket connection established from {}", addr);

    if admit(&broker, &handle).await == PeerState::Closed {
        tracing::info!("Subscriber {} ({}) not admitted", id, addr);
        let _ = ws_sender.send(Message::Close(None)).await;
        return Ok(());
    }

    let reason = loop {
        tokio::select! {
            message = outbound.recv() => {
                match message {
                    Some(Outbound::Message(message)) => {
                        if let Err(e) = ws_sender.send(Message::Binary(message)).await {
                            break format!("Send error: {}", e);
                        }
                    }
                    Some(Outbound::Close) | None => break "Closed by broker".to_string(),
                }
            }

            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break "Connection closed".to_string(),
                    Some(Ok(Message::Binary(data))) => {
                        tracing::debug!("Ignoring {} bytes from subscriber {}", data.len(), addr);
                    }
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Ignoring text from subscriber {}: {}", addr, text.as_str());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break format!("Error: {}", e),
                }
            }
        }
    };

    handle.mark_disconnected();
    broker.remove_peer(id);
    tracing::info!("Subscriber {} ({}) disconnected: {}", id, addr, reason);

    let _ = ws_sender.send(Message::Close(None)).await;
    Ok(())
}

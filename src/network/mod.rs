//! Network module - Carries NetStream messages over sockets
//!
//! Provides:
//! - Server publishing a broker's messages to TCP or WebSocket subscribers
//! - Ingest server accepting events pushed by remote producers
//! - Client helpers for subscribing and publishing

mod client;
mod connection;
mod ingest;
mod server;
mod websocket;

pub use client::*;
pub use connection::*;
pub use ingest::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::sync::watch;

use crate::protocol::DEFAULT_MAX_MESSAGE_SIZE;

/// How subscribers talk to a server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Length-prefixed frames over raw TCP
    #[default]
    Tcp,
    /// One binary WebSocket message per NetStream message
    #[value(name = "websocket")]
    #[serde(rename = "websocket")]
    WebSocket,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Tcp => write!(f, "tcp"),
            TransportKind::WebSocket => write!(f, "websocket"),
        }
    }
}

/// Configuration for network operations
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Address to bind listeners to
    pub bind_address: String,
    /// Port to listen on or connect to (0 picks a free port)
    pub port: u16,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Maximum message size
    pub max_message_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: crate::protocol::DEFAULT_PORT,
            connect_timeout_ms: 5000,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl NetworkConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn with_bind_address(mut self, bind_address: impl Into<String>) -> Self {
        self.bind_address = bind_address.into();
        self
    }

    pub fn bind_string(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Resolve a hostname to a socket address
pub async fn resolve_host(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    use tokio::net::lookup_host;

    let addr_string = format!("{}:{}", host, port);
    let mut addrs = lookup_host(&addr_string).await?;

    addrs.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Could not resolve host: {}", host),
        )
    })
}

/// Resolves once `flag` is set, or once its sender is gone
pub(crate) async fn wait_until_set(flag: &mut watch::Receiver<bool>) {
    let _ = flag.wait_for(|set| *set).await;
}

//! Skylink coordinator server.
//!
//! Production runtime around [`Coordinator`]: a TCP listener, the WebSocket
//! upgrade per connection, and one Tokio task per peer.
//!
//! # Architecture
//!
//! Protocol decisions live in [`skylink_core`] (handshake, secure channel)
//! and in [`Coordinator`] (who is the producer, who receives records). This
//! crate only adds I/O: [`Server`] accepts sockets, bridges each into a
//! [`skylink_core::transport::Connection`] and hands it to the coordinator.
//!
//! # Components
//!
//! - [`Server`]: listener and accept loop
//! - [`Coordinator`]: producer slot, subscriber registry, fan-out
//! - [`SubscriberRegistry`]: id-keyed subscriber handles
//! - [`ProducerSlot`]: singleton producer session with RAII release
//!
//! # Health
//!
//! A plain `GET /health` on the listen port is answered with the
//! [`CoordinatorStatus`] as JSON and the socket is closed. Every other
//! request goes through the WebSocket upgrade.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod coordinator;
mod error;
mod registry;
mod session;

use std::{net::SocketAddr, sync::Arc, time::Duration};

pub use coordinator::{
    BroadcastReport, Coordinator, CoordinatorConfig, CoordinatorStatus, DEFAULT_CLASSIFY_TIMEOUT,
    DEFAULT_FANOUT_TIMEOUT, DEFAULT_PRODUCER_IDLE_TIMEOUT,
};
pub use error::{CoordinatorError, ServerError};
pub use registry::{SubscriberHandle, SubscriberId, SubscriberRegistry};
pub use session::{ProducerLease, ProducerSession, ProducerSlot};
use skylink_core::{
    SystemEnv,
    keys::KeyProvider,
    transport::{self, DEFAULT_CHANNEL_CAPACITY},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

/// Default listen address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Request line prefix that selects the health endpoint.
const HEALTH_REQUEST_LINE: &[u8] = b"GET /health ";

/// Upper bound on the health request we bother reading.
const MAX_HEALTH_REQUEST: usize = 4096;

/// Time allowed to sniff or read a request before giving up.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:8000")
    pub bind_address: String,
    /// Buffered messages per connection direction
    pub channel_capacity: usize,
    /// Coordinator configuration (timeouts, policies)
    pub coordinator: CoordinatorConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

/// Production Skylink server.
///
/// Wraps a [`Coordinator`] with a WebSocket listener and system environment.
pub struct Server {
    listener: TcpListener,
    coordinator: Arc<Coordinator<SystemEnv>>,
    channel_capacity: usize,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(
        config: ServerRuntimeConfig,
        keys: Arc<dyn KeyProvider>,
    ) -> Result<Self, ServerError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ServerError::Config(format!("invalid bind address {}: {e}", config.bind_address))
        })?;
        let listener = TcpListener::bind(addr).await?;
        let coordinator = Arc::new(Coordinator::new(SystemEnv::new(), keys, config.coordinator));

        Ok(Self { listener, coordinator, channel_capacity: config.channel_capacity })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared handle to the coordinator (status, shutdown).
    pub fn coordinator(&self) -> Arc<Coordinator<SystemEnv>> {
        Arc::clone(&self.coordinator)
    }

    /// Run the server, accepting connections until the task is dropped.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let coordinator = Arc::clone(&self.coordinator);
                    let capacity = self.channel_capacity;

                    tokio::spawn(async move {
                        handle_connection(stream, peer, coordinator, capacity).await;
                    });
                },
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                },
            }
        }
    }
}

/// Upgrade one TCP connection and serve it.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    coordinator: Arc<Coordinator<SystemEnv>>,
    capacity: usize,
) {
    if is_health_request(&stream).await {
        if let Err(e) = respond_health(stream, &coordinator).await {
            tracing::debug!(%peer, error = %e, "health response failed");
        }
        return;
    }

    let websocket = match tokio_tungstenite::accept_async(stream).await {
        Ok(websocket) => websocket,
        Err(e) => {
            tracing::debug!(%peer, error = %e, "websocket upgrade failed");
            return;
        },
    };

    tracing::debug!(%peer, "new connection");

    let connection = transport::websocket(websocket, capacity);
    if let Err(e) = coordinator.serve(connection).await {
        tracing::warn!(%peer, error = %e, "connection closed");
    }
}

/// Peek at the request line without consuming it.
///
/// A request line may arrive split across segments, so a prefix match keeps
/// peeking until enough bytes are buffered.
async fn is_health_request(stream: &TcpStream) -> bool {
    let sniff = async {
        let mut buf = [0u8; HEALTH_REQUEST_LINE.len()];
        loop {
            match stream.peek(&mut buf).await {
                Ok(n) if n >= buf.len() => return buf == HEALTH_REQUEST_LINE,
                Ok(n) if n > 0 && HEALTH_REQUEST_LINE.starts_with(&buf[..n]) => {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                },
                _ => return false,
            }
        }
    };

    tokio::time::timeout(REQUEST_READ_TIMEOUT, sniff).await.unwrap_or(false)
}

/// Answer `GET /health` with the coordinator status and close.
async fn respond_health(
    mut stream: TcpStream,
    coordinator: &Coordinator<SystemEnv>,
) -> std::io::Result<()> {
    // Drain the headers so closing does not reset the connection under the reply.
    let mut request = Vec::with_capacity(512);
    let mut chunk = [0u8; 512];
    let drain = async {
        let complete = |r: &[u8]| r.windows(4).any(|w| w == b"\r\n\r\n");
        while !complete(&request) && request.len() < MAX_HEALTH_REQUEST {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
        }
        Ok::<_, std::io::Error>(())
    };
    let Ok(drained) = tokio::time::timeout(REQUEST_READ_TIMEOUT, drain).await else {
        return Ok(());
    };
    drained?;

    let body = serde_json::to_string(&coordinator.status()).map_err(std::io::Error::other)?;
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\
         Connection: close\r\n\r\n{body}",
        body.len()
    );

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

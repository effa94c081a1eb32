//! Connection establishment.

use std::future::Future;

use skylink_core::{
    TransportError,
    transport::{self, Connection, DEFAULT_CHANNEL_CAPACITY},
};

/// Opens a fresh connection to the coordinator.
///
/// Called once per cycle. Every reconnect goes through it again, so no state
/// leaks from a failed connection into the next.
pub trait Connector: Send + Sync {
    /// Connect.
    fn connect(&self) -> impl Future<Output = Result<Connection, TransportError>> + Send;
}

/// Connects over WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    capacity: usize,
}

impl WebSocketConnector {
    /// Connect to `url` (e.g. `ws://127.0.0.1:8000`).
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), capacity: DEFAULT_CHANNEL_CAPACITY }
    }

    /// Buffered messages per direction.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Connection, TransportError> {
        let (stream, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(transport::websocket(stream, self.capacity))
    }
}

//! Client error types.

use skylink_core::{ChannelError, HandshakeError, TransportError};
use thiserror::Error;

/// Errors from the producer client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Could not reach the coordinator, or the connection broke
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Handshake did not complete
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    /// Coordinator sent the rejection marker after the handshake
    #[error("rejected by coordinator")]
    PeerRejected,

    /// Record could not be sealed
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Telemetry source failed
    #[error("telemetry source error: {0}")]
    Source(String),

    /// Gave up after the configured number of consecutive failures
    #[error("gave up after {attempts} consecutive failed attempts")]
    RetriesExhausted {
        /// Failed cycles in a row
        attempts: u32,
    },
}

impl ClientError {
    /// Whether a fresh connection and handshake may succeed.
    ///
    /// Source failures are local and retrying would only repeat them.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Source(_) | Self::RetriesExhausted { .. })
    }
}

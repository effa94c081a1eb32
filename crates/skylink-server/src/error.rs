//! Server error types.

use std::{fmt, time::Duration};

use skylink_core::HandshakeError;
use thiserror::Error;

/// Why the coordinator ended a connection.
///
/// Only ever logged. The peer sees at most the opaque rejection marker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// A producer tried to authenticate while another session is active
    #[error("a producer session is already active")]
    DuplicateProducer,

    /// Producer handshake failed
    #[error("producer handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    /// Producer sent nothing, not even a heartbeat, for too long
    #[error("producer silent for {idle:?}")]
    ProducerIdle {
        /// Configured idle limit that was exceeded
        idle: Duration,
    },

    /// Producer session torn down by the decryption-failure policy
    #[error("{count} consecutive envelopes failed to decrypt")]
    TooManyDecryptFailures {
        /// Failures in a row when the session was closed
        count: u32,
    },
}

/// Errors that can occur in the server runtime.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, bad keys, etc.).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    Config(String),

    /// Transport/network error (bind failure, accept failure, I/O error).
    ///
    /// May be transient (network issues) or fatal (bind address in use).
    Transport(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<skylink_core::KeyError> for ServerError {
    fn from(err: skylink_core::KeyError) -> Self {
        Self::Config(err.to_string())
    }
}

//! Error types for the Skylink protocol core.
//!
//! Strongly-typed errors per layer: authentication (token and challenge
//! checks), handshake (state machine and deadline), secure channel, key
//! loading, and transport.
//!
//! None of these are ever sent to a peer. A failed handshake is reported to
//! the other side only as the opaque rejection marker.

use std::time::Duration;

use skylink_crypto::CryptoError;
use thiserror::Error;

use crate::handshake::HandshakeState;

/// Why a token or challenge response was not accepted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Token is not `hex(message)|hex(signature)` or the message does not
    /// parse as `identity:timestamp`
    #[error("malformed token")]
    MalformedToken,

    /// Recomputed MAC differs from the token signature
    #[error("token signature mismatch")]
    SignatureMismatch,

    /// Token is genuine but asserts a different identity
    #[error("token identity does not match the expected peer")]
    IdentityMismatch,

    /// Token timestamp lies outside the accepted window
    #[error("token outside the freshness window")]
    TokenExpired,

    /// Challenge response is malformed or does not match
    #[error("challenge response mismatch")]
    ChallengeMismatch,
}

/// Errors produced while establishing a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// A token or challenge response failed verification
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Peer sent the rejection marker
    #[error("handshake rejected by peer")]
    Rejected,

    /// Peer authenticated but the caller refused to admit it
    #[error("authenticated peer not admitted")]
    NotAdmitted,

    /// Connection closed before the handshake completed
    #[error("transport closed during handshake")]
    TransportClosed,

    /// Handshake did not complete within its deadline
    #[error("handshake timeout after {elapsed:?}")]
    Timeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// Received a message that is not valid for the current state
    #[error("unexpected {kind} message in state {state:?}")]
    UnexpectedMessage {
        /// State when the message arrived
        state: HandshakeState,
        /// Short description of the message
        kind: &'static str,
    },

    /// Operation attempted in a state that does not allow it
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: HandshakeState,
        /// Operation that was attempted
        operation: &'static str,
    },
}

/// Errors from the secure channel codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Envelope failed authentication, was truncated, had an unknown version,
    /// or its plaintext did not decode as a record
    #[error("decryption failure")]
    DecryptionFailure,

    /// Record could not be CBOR-encoded before sealing
    #[error("record encoding failed: {0}")]
    Encoding(String),
}

/// Errors from loading key material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Key bytes or hex were rejected
    #[error("invalid key: {0}")]
    Crypto(#[from] CryptoError),

    /// Authentication and channel keys are the same bytes
    #[error("authentication key and channel key must be independent")]
    SharedMaterial,
}

/// Transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Peer or bridge task closed the connection
    #[error("connection closed")]
    Closed,

    /// Could not establish the connection
    #[error("connect failed: {0}")]
    Connect(String),

    /// WebSocket protocol error
    #[error("websocket error: {0}")]
    WebSocket(String),
}

impl From<TransportError> for HandshakeError {
    fn from(_: TransportError) -> Self {
        Self::TransportClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_convert_into_handshake_errors() {
        let err: HandshakeError = AuthError::TokenExpired.into();
        assert_eq!(err, HandshakeError::Auth(AuthError::TokenExpired));
    }

    #[test]
    fn display_never_includes_secret_material() {
        let rendered = HandshakeError::Auth(AuthError::ChallengeMismatch).to_string();
        assert_eq!(rendered, "authentication failed: challenge response mismatch");
    }
}

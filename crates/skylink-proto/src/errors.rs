//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while parsing or validating wire values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Identity string is not one of the known roles
    #[error("unknown identity: {0:?}")]
    UnknownIdentity(String),

    /// Control message could not be parsed
    #[error("malformed control message: {0}")]
    MalformedControl(&'static str),

    /// Telemetry field is outside its valid range
    #[error("invalid telemetry field {field}: {reason}")]
    InvalidRecord {
        /// Name of the offending field
        field: &'static str,
        /// Why the value was rejected
        reason: &'static str,
    },

    /// JSON encoding or decoding failed
    #[error("record encoding failed: {0}")]
    Encoding(String),
}

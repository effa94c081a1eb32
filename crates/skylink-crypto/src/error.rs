//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors from key handling, MAC verification and envelope opening.
///
/// Verification failures carry no detail on purpose: callers must not be
/// able to tell a bad tag from a truncated or corrupted input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Envelope failed authentication, was truncated, or was malformed
    #[error("decryption failed")]
    DecryptionFailure,

    /// MAC tag did not match
    #[error("mac verification failed")]
    MacMismatch,

    /// Channel key has the wrong length
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Authentication key is too short to be a meaningful secret
    #[error("key too short: need at least {min} bytes, got {actual}")]
    KeyTooShort {
        /// Minimum length
        min: usize,
        /// Supplied length
        actual: usize,
    },

    /// Key material was not valid hex
    #[error("key is not valid hex")]
    InvalidKeyEncoding,
}

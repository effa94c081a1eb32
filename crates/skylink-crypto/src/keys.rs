//! Shared secret newtypes.

use std::fmt;

use zeroize::Zeroize;

use crate::{CryptoError, mac::constant_time_eq};

/// Channel keys are XChaCha20 keys.
pub const CHANNEL_KEY_SIZE: usize = 32;

/// Shortest accepted authentication key.
pub const MIN_AUTH_KEY_SIZE: usize = 16;

/// Secret used to sign identity tokens and challenge responses.
///
/// HMAC accepts keys of any length; anything shorter than
/// [`MIN_AUTH_KEY_SIZE`] is refused as too weak.
#[derive(Clone)]
pub struct AuthKey {
    bytes: Vec<u8>,
}

impl AuthKey {
    /// Wrap raw key bytes.
    ///
    /// # Errors
    ///
    /// - `CryptoError::KeyTooShort` if fewer than [`MIN_AUTH_KEY_SIZE`] bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_AUTH_KEY_SIZE {
            return Err(CryptoError::KeyTooShort { min: MIN_AUTH_KEY_SIZE, actual: bytes.len() });
        }
        Ok(Self { bytes: bytes.to_vec() })
    }

    /// Decode a hex-encoded key.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidKeyEncoding` if the text is not hex
    /// - `CryptoError::KeyTooShort` if the decoded key is too short
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let mut bytes = hex::decode(text.trim()).map_err(|_| CryptoError::InvalidKeyEncoding)?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether this key has the same bytes as a channel key.
    ///
    /// Identical secrets would void the key separation guarantee.
    pub fn shares_material_with(&self, channel: &ChannelKey) -> bool {
        constant_time_eq(&self.bytes, channel.as_bytes())
    }
}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthKey(<redacted>)")
    }
}

impl Drop for AuthKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Secret used to seal and open telemetry envelopes.
#[derive(Clone)]
pub struct ChannelKey {
    bytes: [u8; CHANNEL_KEY_SIZE],
}

impl ChannelKey {
    /// Wrap a 32-byte key.
    pub const fn new(bytes: [u8; CHANNEL_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Wrap a key of unchecked length.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidKeyLength` unless exactly 32 bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; CHANNEL_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyLength { expected: CHANNEL_KEY_SIZE, actual: bytes.len() }
        })?;
        Ok(Self::new(bytes))
    }

    /// Decode a hex-encoded key.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidKeyEncoding` if the text is not hex
    /// - `CryptoError::InvalidKeyLength` unless the decoded key is 32 bytes
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let mut bytes = hex::decode(text.trim()).map_err(|_| CryptoError::InvalidKeyEncoding)?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    pub(crate) fn as_bytes(&self) -> &[u8; CHANNEL_KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChannelKey(<redacted>)")
    }
}

impl Drop for ChannelKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

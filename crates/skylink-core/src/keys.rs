//! Key provider.
//!
//! The core consumes two independent secrets and never manages their
//! lifecycle. Where they come from (CLI, environment, a secrets store) is the
//! binary's concern.

use skylink_crypto::{AuthKey, ChannelKey};

use crate::error::KeyError;

/// Source of the authentication and channel keys.
pub trait KeyProvider: Send + Sync {
    /// Key for tokens and challenge responses.
    fn auth_key(&self) -> &AuthKey;

    /// Key for sealing telemetry envelopes.
    fn channel_key(&self) -> &ChannelKey;
}

/// Keys fixed at startup.
#[derive(Debug)]
pub struct StaticKeys {
    auth: AuthKey,
    channel: ChannelKey,
}

impl StaticKeys {
    /// Pair an authentication key with a channel key.
    ///
    /// # Errors
    ///
    /// - `KeyError::SharedMaterial` if both keys are the same bytes
    pub fn new(auth: AuthKey, channel: ChannelKey) -> Result<Self, KeyError> {
        if auth.shares_material_with(&channel) {
            return Err(KeyError::SharedMaterial);
        }
        Ok(Self { auth, channel })
    }

    /// Parse both keys from hex.
    ///
    /// # Errors
    ///
    /// - `KeyError::Crypto` if either key is not valid hex of an acceptable
    ///   length
    /// - `KeyError::SharedMaterial` if both keys are the same bytes
    pub fn from_hex(auth_hex: &str, channel_hex: &str) -> Result<Self, KeyError> {
        Self::new(AuthKey::from_hex(auth_hex)?, ChannelKey::from_hex(channel_hex)?)
    }
}

impl KeyProvider for StaticKeys {
    fn auth_key(&self) -> &AuthKey {
        &self.auth
    }

    fn channel_key(&self) -> &ChannelKey {
        &self.channel
    }
}

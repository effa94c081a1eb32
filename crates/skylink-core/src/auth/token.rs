//! Identity tokens.
//!
//! ```text
//! message = identity ":" issued_at          (ASCII, seconds since epoch)
//! token   = hex(message) "|" hex(HMAC-SHA256(auth_key, message))
//! ```
//!
//! Verification is fail-closed. The MAC is checked before the message is
//! interpreted, so a forged identity or timestamp never reaches the parser.

use std::fmt;

use skylink_crypto::{AuthKey, mac};
use skylink_proto::Identity;

use crate::error::AuthError;

/// Accepted clock difference between token issue and verification.
pub const DEFAULT_TOKEN_WINDOW_SECS: u64 = 30;

const FIELD_SEPARATOR: char = ':';
const TOKEN_DELIMITER: char = '|';

/// A signed identity assertion.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    identity: Identity,
    issued_at: u64,
    signature: [u8; mac::MAC_SIZE],
}

impl AuthToken {
    /// Identity the token asserts.
    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Seconds since the Unix epoch at issue time.
    pub fn issued_at(&self) -> u64 {
        self.issued_at
    }

    /// Wire form: `hex(identity:issued_at)|hex(signature)`.
    pub fn encode(&self) -> String {
        let message = signed_message(self.identity, self.issued_at);
        format!("{}{TOKEN_DELIMITER}{}", hex::encode(message), hex::encode(self.signature))
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("identity", &self.identity)
            .field("issued_at", &self.issued_at)
            .finish_non_exhaustive()
    }
}

fn signed_message(identity: Identity, issued_at: u64) -> String {
    format!("{identity}{FIELD_SEPARATOR}{issued_at}")
}

/// Issue a token for `identity` at wall-clock time `now`.
///
/// Deterministic in `(key, identity, now)`: two tokens issued in the same
/// second are identical.
pub fn issue(identity: Identity, key: &AuthKey, now: u64) -> AuthToken {
    let message = signed_message(identity, now);
    let signature = mac::sign(key, &[message.as_bytes()]);
    AuthToken { identity, issued_at: now, signature }
}

/// Verify a wire token against the expected identity.
///
/// Checks run in a fixed order and the first failure wins:
///
/// 1. exactly two `|`-separated parts, both valid hex
/// 2. constant-time MAC comparison over the decoded message
/// 3. message parses as `identity:timestamp`, identity matches `expected`
/// 4. `|now - timestamp| <= window_secs`
///
/// # Errors
///
/// - `AuthError::MalformedToken` on any structural problem
/// - `AuthError::SignatureMismatch` if the MAC does not match
/// - `AuthError::IdentityMismatch` if the token names another identity
/// - `AuthError::TokenExpired` if the timestamp is outside the window
pub fn verify(
    token: &str,
    expected: Identity,
    key: &AuthKey,
    window_secs: u64,
    now: u64,
) -> Result<AuthToken, AuthError> {
    let mut parts = token.split(TOKEN_DELIMITER);
    let (Some(message_hex), Some(signature_hex), None) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::MalformedToken);
    };

    let message = hex::decode(message_hex).map_err(|_| AuthError::MalformedToken)?;
    let signature = hex::decode(signature_hex).map_err(|_| AuthError::MalformedToken)?;

    mac::verify(key, &[&message], &signature).map_err(|_| AuthError::SignatureMismatch)?;

    let message = std::str::from_utf8(&message).map_err(|_| AuthError::MalformedToken)?;
    let (identity, issued_at) =
        message.split_once(FIELD_SEPARATOR).ok_or(AuthError::MalformedToken)?;
    let issued_at: u64 = issued_at.parse().map_err(|_| AuthError::MalformedToken)?;

    // A validly signed token can only carry a name we issued, so an unknown
    // name here is still a token for someone else.
    let identity: Identity = identity.parse().map_err(|_| AuthError::IdentityMismatch)?;
    if identity != expected {
        return Err(AuthError::IdentityMismatch);
    }

    if now.abs_diff(issued_at) > window_secs {
        return Err(AuthError::TokenExpired);
    }

    let mut fixed = [0u8; mac::MAC_SIZE];
    fixed.copy_from_slice(&signature);
    Ok(AuthToken { identity, issued_at, signature: fixed })
}

/// Boolean convenience over [`verify`].
pub fn is_valid(
    token: &str,
    expected: Identity,
    key: &AuthKey,
    window_secs: u64,
    now: u64,
) -> bool {
    verify(token, expected, key, window_secs, now).is_ok()
}

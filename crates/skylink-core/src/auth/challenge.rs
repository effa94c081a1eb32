//! Challenge-response proof of key possession.
//!
//! The responder draws [`CHALLENGE_SIZE`] random bytes per handshake attempt.
//! The initiator answers with `HMAC-SHA256(auth_key, challenge || identity)`,
//! which binds the answer to both this challenge and the claimed identity. A
//! response captured from one handshake is useless in the next.

use std::fmt;

use skylink_crypto::{AuthKey, mac};
use skylink_proto::Identity;

use crate::{env::Environment, error::AuthError};

/// Challenge length in bytes.
pub const CHALLENGE_SIZE: usize = 32;

/// A single-use random challenge.
#[derive(Clone, PartialEq, Eq)]
pub struct Challenge([u8; CHALLENGE_SIZE]);

impl Challenge {
    /// Wrap existing bytes.
    pub const fn from_bytes(bytes: [u8; CHALLENGE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Draw a fresh challenge from the environment's CSPRNG.
    pub fn generate<E: Environment>(env: &E) -> Self {
        let mut bytes = [0u8; CHALLENGE_SIZE];
        env.random_bytes(&mut bytes);
        Self(bytes)
    }

    /// Decode the hex payload of a `CHALLENGE:` message.
    ///
    /// Returns `None` unless the input is exactly [`CHALLENGE_SIZE`] bytes of
    /// hex.
    pub fn from_hex(text: &str) -> Option<Self> {
        let mut bytes = [0u8; CHALLENGE_SIZE];
        hex::decode_to_slice(text, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    /// Hex encoding, as carried after the `CHALLENGE:` prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw challenge bytes.
    pub fn as_bytes(&self) -> &[u8; CHALLENGE_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Challenge({})", self.to_hex())
    }
}

/// MAC proving possession of the authentication key for one challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResponse([u8; mac::MAC_SIZE]);

impl ChallengeResponse {
    /// Hex wire form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Answer `challenge` as `identity`.
pub fn respond(challenge: &Challenge, identity: Identity, key: &AuthKey) -> ChallengeResponse {
    let parts: [&[u8]; 2] = [challenge.as_bytes(), identity.as_str().as_bytes()];
    ChallengeResponse(mac::sign(key, &parts))
}

/// Check a hex response against the challenge we issued.
///
/// # Errors
///
/// - `AuthError::ChallengeMismatch` if the response is not hex or does not
///   match (compared in constant time)
pub fn verify_response(
    challenge: &Challenge,
    response_hex: &str,
    expected: Identity,
    key: &AuthKey,
) -> Result<(), AuthError> {
    let response = hex::decode(response_hex).map_err(|_| AuthError::ChallengeMismatch)?;
    let parts: [&[u8]; 2] = [challenge.as_bytes(), expected.as_str().as_bytes()];
    mac::verify(key, &parts, &response).map_err(|_| AuthError::ChallengeMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> AuthKey {
        AuthKey::from_bytes(b"skylink test authentication key").unwrap()
    }

    fn challenge() -> Challenge {
        Challenge::from_bytes([7u8; CHALLENGE_SIZE])
    }

    #[test]
    fn response_verifies() {
        let response = respond(&challenge(), Identity::Producer, &key());
        assert_eq!(
            verify_response(&challenge(), &response.to_hex(), Identity::Producer, &key()),
            Ok(())
        );
    }

    #[test]
    fn response_is_bound_to_challenge() {
        let response = respond(&challenge(), Identity::Producer, &key());
        let other = Challenge::from_bytes([8u8; CHALLENGE_SIZE]);

        assert_eq!(
            verify_response(&other, &response.to_hex(), Identity::Producer, &key()),
            Err(AuthError::ChallengeMismatch)
        );
    }

    #[test]
    fn response_is_bound_to_identity() {
        let response = respond(&challenge(), Identity::Coordinator, &key());

        assert_eq!(
            verify_response(&challenge(), &response.to_hex(), Identity::Producer, &key()),
            Err(AuthError::ChallengeMismatch)
        );
    }

    #[test]
    fn malformed_response_is_mismatch() {
        for response in ["", "not hex", "abc", "00"] {
            assert_eq!(
                verify_response(&challenge(), response, Identity::Producer, &key()),
                Err(AuthError::ChallengeMismatch),
                "response {response:?}"
            );
        }
    }

    #[test]
    fn hex_round_trip_requires_exact_length() {
        let hex = challenge().to_hex();
        assert_eq!(hex.len(), CHALLENGE_SIZE * 2);
        assert_eq!(Challenge::from_hex(&hex), Some(challenge()));

        assert_eq!(Challenge::from_hex(&hex[2..]), None);
        assert_eq!(Challenge::from_hex(&format!("{hex}00")), None);
        assert_eq!(Challenge::from_hex("zz"), None);
    }
}

//! Telemetry envelopes using `XChaCha20-Poly1305`
//!
//! All functions are pure - the nonce and timestamp are provided by the
//! caller. Production callers draw the nonce from the OS RNG.
//!
//! # Layout
//!
//! ```text
//! [version: 1][issued_at: 8, big-endian][nonce: 24][ciphertext][tag: 16]
//!  └──────── associated data ────────┘
//! ```
//!
//! The version byte and timestamp are authenticated but not encrypted, so a
//! receiver can reason about staleness only after the tag has verified.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};

use crate::{ChannelKey, CryptoError};

/// Current envelope format.
pub const ENVELOPE_VERSION: u8 = 1;

/// `XChaCha20` nonce size (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
const TAG_SIZE: usize = 16;

/// Version byte plus big-endian timestamp.
const HEADER_SIZE: usize = 1 + 8;

/// Smallest envelope that can possibly open (empty plaintext).
pub const MIN_ENVELOPE_SIZE: usize = HEADER_SIZE + NONCE_SIZE + TAG_SIZE;

/// Plaintext recovered from an authenticated envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedEnvelope {
    /// Seconds since the Unix epoch at sealing time
    pub issued_at: u64,
    /// Decrypted payload
    pub plaintext: Vec<u8>,
}

/// Seal `plaintext` under `key`.
///
/// # Security
///
/// - The caller MUST NOT reuse a nonce under the same key. A uniformly random
///   192-bit nonce per call satisfies this for the lifetime of any key.
/// - `issued_at` is bound as associated data and cannot be altered without
///   failing authentication
pub fn seal(
    plaintext: &[u8],
    key: &ChannelKey,
    issued_at: u64,
    nonce: [u8; NONCE_SIZE],
) -> Vec<u8> {
    let header = build_header(issued_at);
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let Ok(ciphertext) =
        cipher.encrypt(XNonce::from_slice(&nonce), Payload { msg: plaintext, aad: &header })
    else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    let mut envelope = Vec::with_capacity(HEADER_SIZE + NONCE_SIZE + ciphertext.len());
    envelope.extend_from_slice(&header);
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    envelope
}

/// Authenticate and decrypt an envelope.
///
/// # Errors
///
/// - `DecryptionFailure`: truncated input, unknown version, wrong key, or any
///   tampering. No plaintext is released unless the tag verifies.
pub fn open(envelope: &[u8], key: &ChannelKey) -> Result<OpenedEnvelope, CryptoError> {
    if envelope.len() < MIN_ENVELOPE_SIZE {
        return Err(CryptoError::DecryptionFailure);
    }

    let (header, rest) = envelope.split_at(HEADER_SIZE);
    let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

    if header[0] != ENVELOPE_VERSION {
        return Err(CryptoError::DecryptionFailure);
    }

    let mut timestamp = [0u8; 8];
    timestamp.copy_from_slice(&header[1..HEADER_SIZE]);

    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad: header })
        .map_err(|_| CryptoError::DecryptionFailure)?;

    Ok(OpenedEnvelope { issued_at: u64::from_be_bytes(timestamp), plaintext })
}

fn build_header(issued_at: u64) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[0] = ENVELOPE_VERSION;
    header[1..].copy_from_slice(&issued_at.to_be_bytes());
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> ChannelKey {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        ChannelKey::new(key)
    }

    #[test]
    fn seal_open_roundtrip() {
        let envelope = seal(b"hello drone", &test_key(), 1000, [0xAB; NONCE_SIZE]);
        let opened = open(&envelope, &test_key()).unwrap();

        assert_eq!(opened.plaintext, b"hello drone");
        assert_eq!(opened.issued_at, 1000);
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let envelope = seal(b"", &test_key(), 0, [0x00; NONCE_SIZE]);
        assert_eq!(envelope.len(), MIN_ENVELOPE_SIZE);
        assert_eq!(open(&envelope, &test_key()).unwrap().plaintext, b"");
    }

    #[test]
    fn layout_matches_documentation() {
        let nonce = [0x5A; NONCE_SIZE];
        let envelope = seal(b"abc", &test_key(), 0x0102_0304_0506_0708, nonce);

        assert_eq!(envelope[0], ENVELOPE_VERSION);
        assert_eq!(&envelope[1..9], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&envelope[9..33], &nonce);
        assert_eq!(envelope.len(), MIN_ENVELOPE_SIZE + 3);
    }

    #[test]
    fn different_nonces_produce_different_ciphertexts() {
        let a = seal(b"same", &test_key(), 5, [0x00; NONCE_SIZE]);
        let b = seal(b"same", &test_key(), 5, [0xFF; NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let envelope = seal(b"secret", &test_key(), 1, [0x11; NONCE_SIZE]);
        let wrong = ChannelKey::new([0xFF; 32]);
        assert_eq!(open(&envelope, &wrong), Err(CryptoError::DecryptionFailure));
    }

    #[test]
    fn every_single_byte_flip_fails() {
        let envelope = seal(b"telemetry payload", &test_key(), 42, [0x22; NONCE_SIZE]);
        for i in 0..envelope.len() {
            let mut tampered = envelope.clone();
            tampered[i] ^= 0x01;
            assert_eq!(
                open(&tampered, &test_key()),
                Err(CryptoError::DecryptionFailure),
                "flip at byte {i} was accepted"
            );
        }
    }

    #[test]
    fn truncated_input_fails() {
        let envelope = seal(b"payload", &test_key(), 42, [0x22; NONCE_SIZE]);
        for len in 0..envelope.len() {
            assert!(open(&envelope[..len], &test_key()).is_err(), "length {len} was accepted");
        }
    }

    #[test]
    fn timestamp_is_authenticated() {
        let mut envelope = seal(b"payload", &test_key(), 1000, [0x33; NONCE_SIZE]);
        // Rewrite issued_at to 2000 without touching the ciphertext.
        envelope[1..9].copy_from_slice(&2000u64.to_be_bytes());
        assert!(open(&envelope, &test_key()).is_err());
    }
}

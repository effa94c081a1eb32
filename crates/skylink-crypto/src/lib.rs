//! Skylink Cryptographic Primitives
//!
//! Cryptographic building blocks for Skylink. Pure functions with
//! deterministic outputs. Callers provide random bytes (nonces) and
//! timestamps so that every operation can be reproduced in tests.
//!
//! # Key Separation
//!
//! Two secrets are provisioned independently and never derived from one
//! another:
//!
//! ```text
//! AuthKey ──── HMAC-SHA256 ──── identity tokens, challenge responses
//!
//! ChannelKey ─ XChaCha20-Poly1305 ─ telemetry envelopes
//! ```
//!
//! Leaking the channel key exposes telemetry contents but does not let an
//! attacker authenticate as a producer. Leaking the auth key lets an attacker
//! authenticate but not read or forge sealed records.
//!
//! # Security
//!
//! Comparison:
//! - Every MAC check goes through [`mac::constant_time_eq`]; running time does
//!   not depend on the position of the first differing byte
//!
//! Authenticity:
//! - Envelopes are opened only after the Poly1305 tag verifies
//! - Envelope version and timestamp are bound as associated data
//! - Any failure collapses into a single opaque error
//!
//! Hygiene:
//! - Key newtypes zeroize their bytes on drop and redact `Debug`

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
mod error;
mod keys;
pub mod mac;

pub use envelope::{MIN_ENVELOPE_SIZE, NONCE_SIZE, OpenedEnvelope, open, seal};
pub use error::CryptoError;
pub use keys::{AuthKey, CHANNEL_KEY_SIZE, ChannelKey, MIN_AUTH_KEY_SIZE};
pub use mac::{MAC_SIZE, constant_time_eq};

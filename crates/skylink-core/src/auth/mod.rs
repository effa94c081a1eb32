//! Authentication codecs.
//!
//! Two proofs of key possession, both HMAC-SHA256 under the shared
//! authentication key:
//!
//! - [`token`]: a signed, timestamped identity assertion. Bounds replay to the
//!   freshness window.
//! - [`challenge`]: a MAC over a fresh random challenge and the claimed
//!   identity. Proves the peer holds the key *now*, not just a captured token.
//!
//! Every comparison of MAC output goes through
//! [`skylink_crypto::constant_time_eq`].

pub mod challenge;
pub mod token;

pub use challenge::{CHALLENGE_SIZE, Challenge, ChallengeResponse, respond, verify_response};
pub use token::{AuthToken, DEFAULT_TOKEN_WINDOW_SECS, issue, is_valid, verify};

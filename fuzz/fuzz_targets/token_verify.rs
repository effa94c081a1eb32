//! Fuzz target for token and control message parsing
//!
//! # Invariants
//!
//! - Arbitrary text never verifies as a token under a key it never saw
//! - A genuine token verifies exactly when it is inside the window
//! - Changing one character of a genuine token breaks it
//! - NEVER panic on malformed input

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use skylink_core::auth;
use skylink_crypto::AuthKey;
use skylink_proto::{ControlMessage, Identity};

const KEY: &[u8] = b"fuzz-target-authentication-key";

#[derive(Debug, Arbitrary)]
enum TokenInput {
    Raw(String),
    Mangled { issued_at: u64, now: u64, position: usize, window: u8 },
}

fuzz_target!(|input: TokenInput| {
    let Ok(key) = AuthKey::from_bytes(KEY) else { return };

    match input {
        TokenInput::Raw(text) => {
            let _ = ControlMessage::parse(&text);
            for identity in [Identity::Producer, Identity::Coordinator] {
                assert!(auth::verify(&text, identity, &key, u64::MAX, 0).is_err());
            }
        },

        TokenInput::Mangled { issued_at, now, position, window } => {
            let token = auth::issue(Identity::Producer, &key, issued_at).encode();
            assert!(ControlMessage::is_token(&token));

            let window = u64::from(window);
            let fresh = now.abs_diff(issued_at) <= window;
            assert_eq!(auth::is_valid(&token, Identity::Producer, &key, window, now), fresh);

            // Tokens are ASCII, so any byte swap keeps them valid UTF-8.
            let mut bytes = token.into_bytes();
            let index = position % bytes.len();
            bytes[index] = if bytes[index] == b'0' { b'1' } else { b'0' };
            if let Ok(mangled) = String::from_utf8(bytes) {
                assert!(auth::verify(&mangled, Identity::Producer, &key, u64::MAX, now).is_err());
            }
        },
    }
});

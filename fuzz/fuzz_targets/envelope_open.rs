//! Fuzz target for sealed telemetry envelopes
//!
//! # Strategy
//!
//! - Random bytes: arbitrary input handed straight to `open_record`
//! - Bit flips: a genuine envelope with one bit flipped
//! - Truncation: a genuine envelope cut at an arbitrary length
//!
//! # Invariants
//!
//! - Untouched envelopes open to their plaintext and timestamp
//! - Every other input fails with `DecryptionFailure`
//! - NEVER panic on malformed envelopes

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use skylink_core::{ChannelError, channel};
use skylink_crypto::{ChannelKey, envelope};

#[derive(Debug, Arbitrary)]
struct Genuine {
    plaintext: Vec<u8>,
    issued_at: u64,
    nonce: [u8; envelope::NONCE_SIZE],
}

#[derive(Debug, Arbitrary)]
enum EnvelopeAttack {
    RandomBytes(Vec<u8>),
    BitFlip { genuine: Genuine, position: usize, bit: u8 },
    Truncate { genuine: Genuine, len: usize },
}

fn seal(genuine: &Genuine, key: &ChannelKey) -> Vec<u8> {
    envelope::seal(&genuine.plaintext, key, genuine.issued_at, genuine.nonce)
}

fuzz_target!(|attack: EnvelopeAttack| {
    let key = ChannelKey::new([7; 32]);

    match attack {
        EnvelopeAttack::RandomBytes(bytes) => {
            let _ = channel::open_record(&bytes, &key);
        },

        EnvelopeAttack::BitFlip { genuine, position, bit } => {
            let mut sealed = seal(&genuine, &key);
            let Ok(opened) = envelope::open(&sealed, &key) else {
                panic!("genuine envelope failed to open");
            };
            assert_eq!(opened.plaintext, genuine.plaintext);
            assert_eq!(opened.issued_at, genuine.issued_at);

            let index = position % sealed.len();
            sealed[index] ^= 1 << (bit % 8);
            assert!(envelope::open(&sealed, &key).is_err());
            assert_eq!(
                channel::open_record(&sealed, &key).err(),
                Some(ChannelError::DecryptionFailure)
            );
        },

        EnvelopeAttack::Truncate { genuine, len } => {
            let sealed = seal(&genuine, &key);
            let cut = len % sealed.len();
            assert!(envelope::open(&sealed[..cut], &key).is_err());
        },
    }
});

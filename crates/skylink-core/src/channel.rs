//! Secure channel for telemetry records.
//!
//! A record is CBOR-encoded and sealed into an XChaCha20-Poly1305 envelope
//! (see [`skylink_crypto::envelope`]) under the channel key. The sealing time
//! travels in the authenticated header so the receiver can apply its own
//! staleness policy.
//!
//! Opening never releases partial results: a bad tag, truncated input,
//! unknown version and undecodable plaintext are all the same
//! [`ChannelError::DecryptionFailure`].

use std::time::Duration;

use skylink_crypto::{ChannelKey, NONCE_SIZE, envelope};
use skylink_proto::TelemetryRecord;

use crate::{env::Environment, error::ChannelError};

/// A record recovered from an authenticated envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedRecord {
    /// Decrypted record
    pub record: TelemetryRecord,
    /// Seconds since the Unix epoch at sealing time
    pub issued_at: u64,
}

impl OpenedRecord {
    /// Time between sealing and `now_secs`.
    ///
    /// Zero for envelopes stamped in the future (clock skew).
    pub fn age(&self, now_secs: u64) -> Duration {
        Duration::from_secs(now_secs.saturating_sub(self.issued_at))
    }
}

/// Encode and seal a record with a fresh random nonce.
///
/// # Errors
///
/// - `ChannelError::Encoding` if the record cannot be CBOR-encoded
pub fn seal_record<E: Environment>(
    record: &TelemetryRecord,
    key: &ChannelKey,
    env: &E,
) -> Result<Vec<u8>, ChannelError> {
    let mut plaintext = Vec::new();
    ciborium::ser::into_writer(record, &mut plaintext)
        .map_err(|e| ChannelError::Encoding(e.to_string()))?;

    let mut nonce = [0u8; NONCE_SIZE];
    env.random_bytes(&mut nonce);

    Ok(envelope::seal(&plaintext, key, env.wall_clock_secs(), nonce))
}

/// Authenticate, decrypt and decode an envelope.
///
/// # Errors
///
/// - `ChannelError::DecryptionFailure` for every failure
pub fn open_record(sealed: &[u8], key: &ChannelKey) -> Result<OpenedRecord, ChannelError> {
    let opened = envelope::open(sealed, key).map_err(|_| ChannelError::DecryptionFailure)?;
    let record: TelemetryRecord = ciborium::de::from_reader(opened.plaintext.as_slice())
        .map_err(|_| ChannelError::DecryptionFailure)?;

    Ok(OpenedRecord { record, issued_at: opened.issued_at })
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use skylink_proto::FlightStatus;

    use super::*;

    #[derive(Clone)]
    struct TestEnv {
        wall: u64,
    }

    impl Environment for TestEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            Instant::now()
        }

        fn wall_clock_secs(&self) -> u64 {
            self.wall
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            async {}
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            // Deterministic for tests
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = i as u8;
            }
        }
    }

    fn record() -> TelemetryRecord {
        TelemetryRecord {
            timestamp: 1_700_000_000.25,
            latitude: 37.774_929,
            longitude: -122.419_416,
            altitude: 120.5,
            speed: 12.25,
            heading: 270.0,
            battery_level: 88.5,
            status: FlightStatus::Active,
        }
    }

    fn key() -> ChannelKey {
        ChannelKey::new([0x42; 32])
    }

    #[test]
    fn seal_then_open_recovers_record_and_time() {
        let env = TestEnv { wall: 1000 };
        let sealed = seal_record(&record(), &key(), &env).unwrap();
        let opened = open_record(&sealed, &key()).unwrap();

        assert_eq!(opened.record, record());
        assert_eq!(opened.issued_at, 1000);
    }

    #[test]
    fn wrong_key_is_decryption_failure() {
        let env = TestEnv { wall: 1000 };
        let sealed = seal_record(&record(), &key(), &env).unwrap();

        assert_eq!(
            open_record(&sealed, &ChannelKey::new([0x43; 32])),
            Err(ChannelError::DecryptionFailure)
        );
    }

    #[test]
    fn authenticated_non_record_is_decryption_failure() {
        let sealed = envelope::seal(b"not cbor for a record", &key(), 1000, [0u8; NONCE_SIZE]);

        assert_eq!(open_record(&sealed, &key()), Err(ChannelError::DecryptionFailure));
    }

    #[test]
    fn single_byte_flips_never_open() {
        let env = TestEnv { wall: 1000 };
        let sealed = seal_record(&record(), &key(), &env).unwrap();

        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] ^= 0x01;
            assert_eq!(
                open_record(&tampered, &key()),
                Err(ChannelError::DecryptionFailure),
                "flip at byte {i}"
            );
        }
    }

    #[test]
    fn age_saturates_for_future_envelopes() {
        let opened = OpenedRecord { record: record(), issued_at: 1000 };

        assert_eq!(opened.age(1005), Duration::from_secs(5));
        assert_eq!(opened.age(995), Duration::ZERO);
    }
}

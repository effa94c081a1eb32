//! HMAC-SHA256 signing and constant-time comparison.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{AuthKey, CryptoError};

/// HMAC-SHA256 output length.
pub const MAC_SIZE: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 over the concatenation of `parts`.
///
/// Taking the message in parts lets callers bind several fields (challenge
/// and identity, for example) without building an intermediate buffer.
pub fn sign(key: &AuthKey, parts: &[&[u8]]) -> [u8; MAC_SIZE] {
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(key.as_bytes()) else {
        unreachable!("HMAC accepts keys of any length");
    };
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

/// Recompute the MAC over `parts` and compare it with `tag`.
///
/// # Errors
///
/// - `CryptoError::MacMismatch` if the tag is wrong or has the wrong length
pub fn verify(key: &AuthKey, parts: &[&[u8]], tag: &[u8]) -> Result<(), CryptoError> {
    let expected = sign(key, parts);
    if constant_time_eq(&expected, tag) { Ok(()) } else { Err(CryptoError::MacMismatch) }
}

/// Compare two byte strings in constant time.
///
/// Running time depends only on the lengths, never on where the inputs first
/// differ. Lengths are not secret here (MACs have a fixed size).
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

//! Envelope signing.
//!
//! HMAC-SHA256 over the exact byte sequence of the serialized envelope,
//! keyed by the subscription's secret, rendered as lowercase hex. Receivers
//! recompute the signature over the raw request body and compare it against
//! the signature header.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute the signature for a payload. Deterministic: same secret and
/// payload always yield the same 64-char hex string.
pub fn sign(secret: &str, payload: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a signature in constant time.
///
/// Returns false on any mismatch, including malformed or wrong-length
/// signatures; never panics.
pub fn verify(secret: &str, payload: &[u8], signature: &str) -> bool {
    let computed = sign(secret, payload);
    computed.as_bytes().ct_eq(signature.as_bytes()).into()
}

//! Comparison helpers for key and fingerprint material.

use constant_time_eq::constant_time_eq;

/// Compare two byte slices without an early exit on the first differing byte.
///
/// Used wherever a recipient fingerprint or derived public key is checked
/// against the value observed from the key service.
///
/// ```rust
/// use vkd_crypto::utils::constant_time_compare;
///
/// assert!(constant_time_compare(b"fingerprint", b"fingerprint"));
/// assert!(!constant_time_compare(b"fingerprint", b"fingerprinT"));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    constant_time_eq(a, b)
}

/// XOR two equal-length arrays.
pub fn xor_into<const N: usize>(a: &[u8; N], b: &[u8; N]) -> [u8; N] {
    let mut out = [0u8; N];
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
        *o = x ^ y;
    }
    out
}

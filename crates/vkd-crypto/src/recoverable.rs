//! Recoverable secp256k1 signatures.
//!
//! A recoverable signature is the 64-byte compact form (r | s) followed by a
//! recovery byte `27 + id`. Signing never trusts an externally supplied id:
//! the id is found by recovering each candidate key and matching it against
//! the signer's known public key.
//!
//! High-S signatures are accepted as input and normalized to low-S before
//! any recovery; emitted signatures are always low-S.
//!
//! Verification only has an address. Each candidate id is recovered, hashed
//! to an address and compared, then the signature is checked directly
//! against the recovered key. Both must pass for [`VerificationOutcome::Valid`].

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use crate::address::{Address, AddressError};

pub const COMPACT_SIGNATURE_LEN: usize = 64;
pub const RECOVERABLE_SIGNATURE_LEN: usize = 65;
/// Conventional offset added to the recovery id in the last byte.
pub const RECOVERY_BYTE_OFFSET: u8 = 27;
const EIP155_OFFSET: u8 = 35;
const MAX_RECOVERY_ID: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("no recovery id reproduces the signer's public key")]
    RecoveryIdNotFound,
    #[error("invalid signature format: {0}")]
    InvalidFormat(String),
    #[error(transparent)]
    Address(#[from] AddressError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Address matched and the direct check passed.
    Valid { recovery_id: u8, address: Address },
    /// A key was recovered but never matched the address and direct check.
    Invalid,
    /// No candidate id produced a public key.
    Unrecoverable,
}

impl VerificationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationOutcome::Valid { .. })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    compact: [u8; COMPACT_SIGNATURE_LEN],
    recovery_id: u8,
}

impl std::fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecoverableSignature({})", self.to_hex())
    }
}

impl RecoverableSignature {
    pub fn compact(&self) -> &[u8; COMPACT_SIGNATURE_LEN] {
        &self.compact
    }

    pub fn recovery_id(&self) -> u8 {
        self.recovery_id
    }

    /// Recovery byte as written on the wire.
    pub fn v(&self) -> u8 {
        RECOVERY_BYTE_OFFSET + self.recovery_id
    }

    pub fn to_bytes(&self) -> [u8; RECOVERABLE_SIGNATURE_LEN] {
        let mut out = [0u8; RECOVERABLE_SIGNATURE_LEN];
        out[..COMPACT_SIGNATURE_LEN].copy_from_slice(&self.compact);
        out[COMPACT_SIGNATURE_LEN] = self.v();
        out
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

/// Find the recovery id that reproduces `public_key` from `compact`.
///
/// `public_key` is compared byte-for-byte in its own SEC1 encoding, so a
/// compressed key is matched against compressed recoveries.
pub fn find_recovery_id(
    hash: &[u8; 32],
    compact: &[u8],
    public_key: &[u8],
) -> Result<u8, SignatureError> {
    let compress = match (public_key.len(), public_key.first()) {
        (33, Some(0x02 | 0x03)) => true,
        (65, Some(0x04)) => false,
        _ => {
            return Err(AddressError::InvalidPublicKeyEncoding("expected 33 or 65 byte SEC1 key").into())
        }
    };
    let (signature, _) = low_s(parse_compact(compact)?);

    for id in 0..=MAX_RECOVERY_ID {
        let Some(recovery_id) = RecoveryId::from_byte(id) else {
            continue;
        };
        if let Ok(key) = VerifyingKey::recover_from_prehash(hash, &signature, recovery_id) {
            if key.to_encoded_point(compress).as_bytes() == public_key {
                return Ok(id);
            }
        }
    }
    Err(SignatureError::RecoveryIdNotFound)
}

/// Attach the recovery byte to a compact signature from an external signer.
///
/// The returned compact form is the low-S normalization of `compact`.
pub fn sign_with_recovery(
    hash: &[u8; 32],
    compact: &[u8],
    public_key: &[u8],
) -> Result<RecoverableSignature, SignatureError> {
    let recovery_id = find_recovery_id(hash, compact, public_key)?;
    let (signature, _) = low_s(parse_compact(compact)?);
    let mut out = [0u8; COMPACT_SIGNATURE_LEN];
    out.copy_from_slice(&signature.to_bytes());
    Ok(RecoverableSignature {
        compact: out,
        recovery_id,
    })
}

/// A signature as supplied for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSignature {
    pub compact: [u8; COMPACT_SIGNATURE_LEN],
    /// Declared id of a 65-byte input; `None` for 64-byte input.
    pub recovery_id: Option<u8>,
}

impl ParsedSignature {
    /// Ids to attempt during verification.
    pub fn candidates(&self) -> Vec<u8> {
        match self.recovery_id {
            Some(id) => vec![id],
            None => (0..=MAX_RECOVERY_ID).collect(),
        }
    }
}

/// Parse 64- or 65-byte signature input.
///
/// The recovery byte may be `27`/`28`, `0`/`1`, or an EIP-155 value
/// (`35 + 2*chain_id + id`).
pub fn parse_signature(bytes: &[u8]) -> Result<ParsedSignature, SignatureError> {
    let recovery_id = match bytes.len() {
        COMPACT_SIGNATURE_LEN => None,
        RECOVERABLE_SIGNATURE_LEN => Some(decode_recovery_byte(bytes[COMPACT_SIGNATURE_LEN])?),
        n => {
            return Err(SignatureError::InvalidFormat(format!(
                "expected 64 or 65 bytes, got {n}"
            )))
        }
    };
    let mut compact = [0u8; COMPACT_SIGNATURE_LEN];
    compact.copy_from_slice(&bytes[..COMPACT_SIGNATURE_LEN]);
    Ok(ParsedSignature {
        compact,
        recovery_id,
    })
}

fn decode_recovery_byte(v: u8) -> Result<u8, SignatureError> {
    match v {
        0 | 1 => Ok(v),
        27 | 28 => Ok(v - RECOVERY_BYTE_OFFSET),
        v if v >= EIP155_OFFSET => Ok((v - EIP155_OFFSET) % 2),
        v => Err(SignatureError::InvalidFormat(format!(
            "unsupported recovery byte {v}"
        ))),
    }
}

fn parse_compact(compact: &[u8]) -> Result<Signature, SignatureError> {
    if compact.len() != COMPACT_SIGNATURE_LEN {
        return Err(SignatureError::InvalidFormat(format!(
            "expected 64-byte compact signature, got {}",
            compact.len()
        )));
    }
    Signature::from_slice(compact)
        .map_err(|_| SignatureError::InvalidFormat("r or s out of range".to_string()))
}

/// Low-S form of `signature`, and whether s had to be negated.
///
/// Negating s flips the parity bit of the recovery id.
fn low_s(signature: Signature) -> (Signature, bool) {
    match signature.normalize_s() {
        Some(normalized) => (normalized, true),
        None => (signature, false),
    }
}

/// Verify `signature` over `hash` against `address`.
///
/// Errors only for malformed input shape; cryptographic failure is reported
/// through [`VerificationOutcome`]. A high-S input is normalized first, and a
/// declared id is adjusted to match, so the reported id refers to the low-S
/// form.
pub fn verify_with_address(
    hash: &[u8; 32],
    signature: &[u8],
    address: &Address,
) -> Result<VerificationOutcome, SignatureError> {
    let parsed = parse_signature(signature)?;
    // Scalars out of range cannot yield any public key.
    let Ok(sig) = Signature::from_slice(&parsed.compact) else {
        return Ok(VerificationOutcome::Unrecoverable);
    };
    let (sig, negated) = low_s(sig);

    let mut recovered_any = false;
    for declared in parsed.candidates() {
        let id = if negated && parsed.recovery_id.is_some() {
            declared ^ 1
        } else {
            declared
        };
        let Some(recovery_id) = RecoveryId::from_byte(id) else {
            continue;
        };
        let Ok(key) = VerifyingKey::recover_from_prehash(hash, &sig, recovery_id) else {
            continue;
        };
        recovered_any = true;

        if Address::from_verifying_key(&key) != *address {
            continue;
        }
        if key.verify_prehash(hash, &sig).is_ok() {
            return Ok(VerificationOutcome::Valid {
                recovery_id: id,
                address: *address,
            });
        }
    }

    Ok(if recovered_any {
        VerificationOutcome::Invalid
    } else {
        VerificationOutcome::Unrecoverable
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::personal_message_hash;
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use k256::ecdsa::SigningKey;

    fn signer() -> SigningKey {
        SigningKey::from_slice(&[0x11u8; 32]).unwrap()
    }

    fn sign(key: &SigningKey, text: &str) -> ([u8; 32], RecoverableSignature) {
        let hash = personal_message_hash(text);
        let compact: Signature = key.sign_prehash(&hash).unwrap();
        let public = key.verifying_key().to_encoded_point(true);
        let sig = sign_with_recovery(&hash, &compact.to_bytes(), public.as_bytes()).unwrap();
        (hash, sig)
    }

    fn address_of(key: &SigningKey) -> Address {
        Address::from_verifying_key(key.verifying_key())
    }

    #[test]
    fn test_sign_then_verify() {
        let key = signer();
        let (hash, sig) = sign(&key, "release 1.2.6 is frozen");
        assert!(sig.v() == 27 || sig.v() == 28);

        let outcome = verify_with_address(&hash, &sig.to_bytes(), &address_of(&key)).unwrap();
        assert_eq!(
            outcome,
            VerificationOutcome::Valid {
                recovery_id: sig.recovery_id(),
                address: address_of(&key),
            }
        );
    }

    #[test]
    fn test_recovery_id_matches_uncompressed_key_too() {
        let key = signer();
        let hash = personal_message_hash("hello");
        let compact: Signature = key.sign_prehash(&hash).unwrap();
        let compressed = key.verifying_key().to_encoded_point(true);
        let uncompressed = key.verifying_key().to_encoded_point(false);
        assert_eq!(
            find_recovery_id(&hash, &compact.to_bytes(), compressed.as_bytes()).unwrap(),
            find_recovery_id(&hash, &compact.to_bytes(), uncompressed.as_bytes()).unwrap()
        );
    }

    #[test]
    fn test_recovery_id_not_found_for_other_key() {
        let key = signer();
        let other = SigningKey::from_slice(&[0x22u8; 32]).unwrap();
        let hash = personal_message_hash("hello");
        let compact: Signature = key.sign_prehash(&hash).unwrap();
        let other_pub = other.verifying_key().to_encoded_point(true);
        assert_eq!(
            find_recovery_id(&hash, &compact.to_bytes(), other_pub.as_bytes()),
            Err(SignatureError::RecoveryIdNotFound)
        );
    }

    #[test]
    fn test_unrelated_address_is_invalid() {
        let key = signer();
        let other = SigningKey::from_slice(&[0x22u8; 32]).unwrap();
        let (hash, sig) = sign(&key, "hello");
        assert_eq!(
            verify_with_address(&hash, &sig.to_bytes(), &address_of(&other)).unwrap(),
            VerificationOutcome::Invalid
        );
    }

    #[test]
    fn test_changed_message_is_invalid() {
        let key = signer();
        let (_, sig) = sign(&key, "release 1.2.6 is frozen");
        let hash = personal_message_hash("release 1.2.7 is frozen");
        assert_eq!(
            verify_with_address(&hash, &sig.to_bytes(), &address_of(&key)).unwrap(),
            VerificationOutcome::Invalid
        );
    }

    #[test]
    fn test_bit_flips_never_valid() {
        let key = signer();
        let (hash, sig) = sign(&key, "hello");
        let addr = address_of(&key);
        for byte in [0usize, 13, 31, 32, 50, 63] {
            let mut bytes = sig.to_bytes();
            bytes[byte] ^= 0x01;
            let outcome = verify_with_address(&hash, &bytes, &addr).unwrap();
            assert!(!outcome.is_valid(), "flip at {byte} verified");
        }
    }

    #[test]
    fn test_compact_input_tries_all_ids() {
        let key = signer();
        let (hash, sig) = sign(&key, "hello");
        let outcome = verify_with_address(&hash, sig.compact(), &address_of(&key)).unwrap();
        assert!(outcome.is_valid());
    }

    #[test]
    fn test_recovery_byte_encodings() {
        let key = signer();
        let (hash, sig) = sign(&key, "hello");
        let addr = address_of(&key);
        let id = sig.recovery_id();

        for v in [id, 27 + id, 37 + id] {
            let mut bytes = sig.to_bytes();
            bytes[64] = v;
            assert!(verify_with_address(&hash, &bytes, &addr).unwrap().is_valid(), "v = {v}");
        }
    }

    #[test]
    fn test_wrong_declared_id_is_not_valid() {
        let key = signer();
        let (hash, sig) = sign(&key, "hello");
        let mut bytes = sig.to_bytes();
        bytes[64] = 27 + (1 - sig.recovery_id());
        let outcome = verify_with_address(&hash, &bytes, &address_of(&key)).unwrap();
        assert!(!outcome.is_valid());
    }

    /// Same signature with s replaced by n - s.
    fn high_s(signature: &Signature) -> [u8; COMPACT_SIGNATURE_LEN] {
        let negated = -*signature.s().as_ref();
        let mut out = [0u8; COMPACT_SIGNATURE_LEN];
        out[..32].copy_from_slice(&signature.r().to_bytes());
        out[32..].copy_from_slice(&negated.to_bytes());
        assert!(Signature::from_slice(&out).unwrap().normalize_s().is_some());
        out
    }

    #[test]
    fn test_high_s_input_is_normalized_on_sign() {
        let key = signer();
        let hash = personal_message_hash("release 1.2.6 is frozen");
        let low: Signature = key.sign_prehash(&hash).unwrap();
        let high = high_s(&low);
        let public = key.verifying_key().to_encoded_point(true);

        let sig = sign_with_recovery(&hash, &high, public.as_bytes()).unwrap();
        assert_eq!(sig.compact().as_slice(), low.to_bytes().as_slice());
        assert_eq!(
            sig.recovery_id(),
            find_recovery_id(&hash, &low.to_bytes(), public.as_bytes()).unwrap()
        );
        assert!(verify_with_address(&hash, &sig.to_bytes(), &address_of(&key))
            .unwrap()
            .is_valid());
    }

    #[test]
    fn test_high_s_input_verifies() {
        let key = signer();
        let (hash, sig) = sign(&key, "hello");
        let addr = address_of(&key);
        let low = Signature::from_slice(sig.compact()).unwrap();
        let high = high_s(&low);

        // Declared id belongs to the high-S form, whose parity is flipped.
        let mut bytes = [0u8; RECOVERABLE_SIGNATURE_LEN];
        bytes[..COMPACT_SIGNATURE_LEN].copy_from_slice(&high);
        bytes[COMPACT_SIGNATURE_LEN] = RECOVERY_BYTE_OFFSET + (sig.recovery_id() ^ 1);
        assert_eq!(
            verify_with_address(&hash, &bytes, &addr).unwrap(),
            VerificationOutcome::Valid {
                recovery_id: sig.recovery_id(),
                address: addr,
            }
        );

        assert!(verify_with_address(&hash, &high, &addr).unwrap().is_valid());
    }

    #[test]
    fn test_bad_format_rejected() {
        let addr = address_of(&signer());
        let hash = [0u8; 32];
        assert!(matches!(
            verify_with_address(&hash, &[0u8; 63], &addr),
            Err(SignatureError::InvalidFormat(_))
        ));
        let mut bytes = [1u8; 65];
        bytes[64] = 5;
        assert!(matches!(
            verify_with_address(&hash, &bytes, &addr),
            Err(SignatureError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_zero_signature_is_unrecoverable() {
        let addr = address_of(&signer());
        assert_eq!(
            verify_with_address(&[7u8; 32], &[0u8; 64], &addr).unwrap(),
            VerificationOutcome::Unrecoverable
        );
    }
}

use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

/// SHA-256 over the concatenation of `parts`.
///
/// Used for identity fingerprints and for seeding development signers.
pub fn sha256_parts(parts: &[&[u8]]) -> [u8; 32] {
    parts
        .iter()
        .fold(Sha256::new(), |hasher, part| hasher.chain_update(part))
        .finalize()
        .into()
}

/// Keccak-256 (the pre-standard SHA-3 padding used by chain tooling).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    keccak256_parts(&[data])
}

/// Keccak-256 over the concatenation of `parts` without allocating.
pub fn keccak256_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Identity fingerprint for development identities: fp = sha256(identity text).
pub fn derive_fingerprint(identity: &str) -> [u8; 32] {
    sha256_parts(&[identity.as_bytes()])
}

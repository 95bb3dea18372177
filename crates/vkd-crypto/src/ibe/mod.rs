//! Identity-based encryption over BLS12-381.
//!
//! A sender needs only the service's [`DerivedPublicKey`] and the recipient's
//! identity bytes. The recipient obtains a [`VetKey`] for its own identity
//! from the key service, wrapped under a one-time [`TransportSecretKey`].
//!
//! Ciphertext layout:
//!
//! ```text
//! "IBE\x01" | C1 = t*G2 (96) | C2 = seed ^ H(e(Q_id, dpk)^t) (32) | C3 = AEAD(seed, msg)
//! ```
//!
//! `t` is derived from the seed and the message, so decryption re-derives it
//! and rejects any ciphertext whose C1 does not match.

mod curve;
mod master;
mod transport;

pub use curve::{G1_LEN, G2_LEN};
pub use master::{DerivedSecret, MasterKey};
pub use transport::{EncryptedKeyMaterial, TransportSecretKey, VetKey};

use ark_bls12_381::{Bls12_381, G1Affine, G2Affine, G2Projective};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup, Group};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::utils::xor_into;

/// Ciphertext header: "IBE" followed by scheme version 1.
pub const IBE_CIPHERTEXT_HEADER: [u8; 4] = *b"IBE\x01";
pub const SEED_LEN: usize = 32;
const AEAD_TAG_LEN: usize = 16;
const MIN_CIPHERTEXT_LEN: usize = IBE_CIPHERTEXT_HEADER.len() + G2_LEN + SEED_LEN + AEAD_TAG_LEN;

const IDENTITY_DST: &[u8] = b"VKD-IBE-V01-CS01-with-BLS12381G1_XMD:SHA-256_SSWU_RO_ID_";
const MESSAGE_DST: &[u8] = b"VKD-IBE-V01-with-BLS12381_XMD:SHA-256_MSG_SCALAR_";
const MASK_INFO: &[u8] = b"vkd_ibe_v1_mask";
const PAYLOAD_SALT: &[u8] = b"vkd_ibe_v1_payload";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IbeError {
    #[error("invalid derived public key")]
    InvalidDerivedPublicKey,
    #[error("invalid transport public key")]
    InvalidTransportKey,
    #[error("invalid encrypted key material")]
    InvalidKeyMaterial,
    #[error("key material failed verification")]
    KeyMaterialVerification,
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(&'static str),
    #[error("ciphertext integrity check failed")]
    IntegrityCheck,
    #[error("hash to curve failed")]
    HashToCurve,
    #[error("random number generation failed")]
    Rng,
    #[error("key derivation failed")]
    Kdf,
    #[error("point serialization failed")]
    Serialization,
    #[error("payload encryption failed")]
    Aead,
}

/// Public key derived by the key service for one (key name, context) pair.
#[derive(Clone, Debug)]
pub struct DerivedPublicKey {
    point: G2Affine,
    bytes: Vec<u8>,
}

impl PartialEq for DerivedPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for DerivedPublicKey {}

impl DerivedPublicKey {
    /// Parse a compressed G2 point. The identity element is rejected.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, IbeError> {
        let point = curve::g2_from_bytes(bytes).ok_or(IbeError::InvalidDerivedPublicKey)?;
        Self::from_point(point)
    }

    pub(crate) fn from_point(point: G2Affine) -> Result<Self, IbeError> {
        if point.is_zero() {
            return Err(IbeError::InvalidDerivedPublicKey);
        }
        let bytes = curve::g2_to_bytes(&point)?;
        Ok(Self { point, bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn point(&self) -> &G2Affine {
        &self.point
    }
}

/// Identity bytes a ciphertext is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IbeIdentity(Vec<u8>);

impl IbeIdentity {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Fresh randomness for one encryption.
pub struct IbeSeed(Zeroizing<[u8; SEED_LEN]>);

impl IbeSeed {
    pub fn random() -> Result<Self, IbeError> {
        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        getrandom::getrandom(&mut seed[..]).map_err(|_| IbeError::Rng)?;
        Ok(Self(seed))
    }

    /// Fixed seed; encryption under it is deterministic.
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    fn as_array(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

/// Hash the key and identity to the G1 point the key service signs.
pub(crate) fn identity_point(dpk: &DerivedPublicKey, identity: &[u8]) -> Result<G1Affine, IbeError> {
    let mut input = Vec::with_capacity(dpk.as_bytes().len() + identity.len());
    input.extend_from_slice(dpk.as_bytes());
    input.extend_from_slice(identity);
    curve::hash_to_g1(IDENTITY_DST, &input)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IbeCiphertext {
    c1: G2Affine,
    c2: [u8; SEED_LEN],
    c3: Vec<u8>,
}

impl IbeCiphertext {
    /// Encrypt `plaintext` so that only the holder of the vetKey for
    /// `identity` under `dpk` can decrypt it.
    pub fn encrypt(
        dpk: &DerivedPublicKey,
        identity: &IbeIdentity,
        plaintext: &[u8],
        seed: &IbeSeed,
    ) -> Result<Self, IbeError> {
        let q = identity_point(dpk, identity.as_bytes())?;
        let t = message_scalar(seed.as_array(), plaintext);

        let c1 = (G2Projective::generator() * t).into_affine();
        let shared = Bls12_381::pairing(q * t, *dpk.point());
        let mask = Zeroizing::new(seed_mask(&curve::gt_to_bytes(&shared)?)?);
        let c2 = xor_into(seed.as_array(), &mask);

        let c1_bytes = curve::g2_to_bytes(&c1)?;
        let c3 = seal_payload(seed.as_array(), &c1_bytes, &c2, plaintext)?;

        Ok(Self { c1, c2, c3 })
    }

    pub fn serialize(&self) -> Result<Vec<u8>, IbeError> {
        let c1 = curve::g2_to_bytes(&self.c1)?;
        let mut out =
            Vec::with_capacity(IBE_CIPHERTEXT_HEADER.len() + c1.len() + self.c2.len() + self.c3.len());
        out.extend_from_slice(&IBE_CIPHERTEXT_HEADER);
        out.extend_from_slice(&c1);
        out.extend_from_slice(&self.c2);
        out.extend_from_slice(&self.c3);
        Ok(out)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, IbeError> {
        if bytes.len() < MIN_CIPHERTEXT_LEN {
            return Err(IbeError::MalformedCiphertext("too short"));
        }
        let (header, rest) = bytes.split_at(IBE_CIPHERTEXT_HEADER.len());
        if header != IBE_CIPHERTEXT_HEADER {
            return Err(IbeError::MalformedCiphertext("unknown header"));
        }
        let (c1_bytes, rest) = rest.split_at(G2_LEN);
        let c1 = curve::g2_nonzero_from_bytes(c1_bytes)
            .ok_or(IbeError::MalformedCiphertext("invalid C1 point"))?;
        let (c2_bytes, c3) = rest.split_at(SEED_LEN);
        let mut c2 = [0u8; SEED_LEN];
        c2.copy_from_slice(c2_bytes);

        Ok(Self {
            c1,
            c2,
            c3: c3.to_vec(),
        })
    }

    /// Decrypt with the recipient's vetKey.
    pub fn decrypt(&self, vetkey: &VetKey) -> Result<Vec<u8>, IbeError> {
        let shared = Bls12_381::pairing(*vetkey.point(), self.c1);
        let mask = Zeroizing::new(seed_mask(&curve::gt_to_bytes(&shared)?)?);
        let seed = Zeroizing::new(xor_into(&self.c2, &mask));

        let c1_bytes = curve::g2_to_bytes(&self.c1)?;
        let plaintext = open_payload(&seed, &c1_bytes, &self.c2, &self.c3)?;

        let t = message_scalar(&seed, &plaintext);
        if (G2Projective::generator() * t).into_affine() != self.c1 {
            return Err(IbeError::IntegrityCheck);
        }
        Ok(plaintext)
    }
}

fn message_scalar(seed: &[u8; SEED_LEN], msg: &[u8]) -> ark_bls12_381::Fr {
    let mut input = Vec::with_capacity(SEED_LEN + msg.len());
    input.extend_from_slice(seed);
    input.extend_from_slice(msg);
    curve::hash_to_scalar(MESSAGE_DST, &input)
}

fn seed_mask(shared: &[u8]) -> Result<[u8; SEED_LEN], IbeError> {
    let hk = Hkdf::<Sha256>::new(None, shared);
    let mut mask = [0u8; SEED_LEN];
    hk.expand(MASK_INFO, &mut mask).map_err(|_| IbeError::Kdf)?;
    Ok(mask)
}

fn payload_key_nonce(seed: &[u8; SEED_LEN]) -> Result<(Zeroizing<[u8; 32]>, [u8; 12]), IbeError> {
    let hk = Hkdf::<Sha256>::new(Some(PAYLOAD_SALT), seed);
    let mut key = Zeroizing::new([0u8; 32]);
    hk.expand(b"vkd_ibe_v1_key", &mut key[..])
        .map_err(|_| IbeError::Kdf)?;
    let mut nonce = [0u8; 12];
    hk.expand(b"vkd_ibe_v1_nonce", &mut nonce)
        .map_err(|_| IbeError::Kdf)?;
    Ok((key, nonce))
}

fn payload_aad(c1: &[u8], c2: &[u8; SEED_LEN]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(c1.len() + c2.len());
    aad.extend_from_slice(c1);
    aad.extend_from_slice(c2);
    aad
}

fn seal_payload(
    seed: &[u8; SEED_LEN],
    c1: &[u8],
    c2: &[u8; SEED_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, IbeError> {
    let (key, nonce) = payload_key_nonce(seed)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
    let aad = payload_aad(c1, c2);
    cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad: &aad })
        .map_err(|_| IbeError::Aead)
}

fn open_payload(
    seed: &[u8; SEED_LEN],
    c1: &[u8],
    c2: &[u8; SEED_LEN],
    c3: &[u8],
) -> Result<Vec<u8>, IbeError> {
    let (key, nonce) = payload_key_nonce(seed)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
    let aad = payload_aad(c1, c2);
    cipher
        .decrypt(Nonce::from_slice(&nonce), Payload { msg: c3, aad: &aad })
        .map_err(|_| IbeError::IntegrityCheck)
}

//! BLS12-381 plumbing shared by the IBE types: hashing, scalars, encodings.

use ark_bls12_381::{g1, Bls12_381, Fr, G1Affine, G1Projective, G2Affine};
use ark_ec::hashing::{
    curve_maps::wb::WBMap, map_to_curve_hasher::MapToCurveBasedHasher, HashToCurve,
};
use ark_ec::pairing::PairingOutput;
use ark_ec::AffineRepr;
use ark_ff::field_hashers::{DefaultFieldHasher, HashToField};
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use sha2::Sha256;

use super::IbeError;

/// Compressed G1 encoding length.
pub const G1_LEN: usize = 48;
/// Compressed G2 encoding length.
pub const G2_LEN: usize = 96;

type G1Hasher = MapToCurveBasedHasher<G1Projective, DefaultFieldHasher<Sha256, 128>, WBMap<g1::Config>>;

pub(crate) fn hash_to_g1(dst: &[u8], msg: &[u8]) -> Result<G1Affine, IbeError> {
    let hasher = G1Hasher::new(dst).map_err(|_| IbeError::HashToCurve)?;
    hasher.hash(msg).map_err(|_| IbeError::HashToCurve)
}

pub(crate) fn hash_to_scalar(dst: &[u8], msg: &[u8]) -> Fr {
    let hasher = <DefaultFieldHasher<Sha256, 128> as HashToField<Fr>>::new(dst);
    let mut out: Vec<Fr> = hasher.hash_to_field(msg, 1);
    out.pop().unwrap_or_default()
}

/// Uniform scalar from 64 bytes of OS entropy.
pub(crate) fn random_scalar() -> Result<Fr, IbeError> {
    let mut wide = [0u8; 64];
    getrandom::getrandom(&mut wide).map_err(|_| IbeError::Rng)?;
    Ok(Fr::from_le_bytes_mod_order(&wide))
}

pub(crate) fn g1_to_bytes(p: &G1Affine) -> Result<Vec<u8>, IbeError> {
    let mut out = Vec::with_capacity(G1_LEN);
    p.serialize_compressed(&mut out)
        .map_err(|_| IbeError::Serialization)?;
    Ok(out)
}

pub(crate) fn g2_to_bytes(p: &G2Affine) -> Result<Vec<u8>, IbeError> {
    let mut out = Vec::with_capacity(G2_LEN);
    p.serialize_compressed(&mut out)
        .map_err(|_| IbeError::Serialization)?;
    Ok(out)
}

/// Parse a compressed G1 point; on-curve and subgroup checks included.
/// Only the canonical encoding is accepted, so stray flag or payload bits
/// next to the infinity flag are rejected.
pub(crate) fn g1_from_bytes(bytes: &[u8]) -> Option<G1Affine> {
    if bytes.len() != G1_LEN {
        return None;
    }
    let point = G1Affine::deserialize_compressed(bytes).ok()?;
    (g1_to_bytes(&point).ok()?.as_slice() == bytes).then_some(point)
}

/// Parse a compressed G2 point; canonical encodings only.
pub(crate) fn g2_from_bytes(bytes: &[u8]) -> Option<G2Affine> {
    if bytes.len() != G2_LEN {
        return None;
    }
    let point = G2Affine::deserialize_compressed(bytes).ok()?;
    (g2_to_bytes(&point).ok()?.as_slice() == bytes).then_some(point)
}

/// [`g1_from_bytes`] that also rejects the identity point.
pub(crate) fn g1_nonzero_from_bytes(bytes: &[u8]) -> Option<G1Affine> {
    g1_from_bytes(bytes).filter(|p| !p.is_zero())
}

/// [`g2_from_bytes`] that also rejects the identity point.
pub(crate) fn g2_nonzero_from_bytes(bytes: &[u8]) -> Option<G2Affine> {
    g2_from_bytes(bytes).filter(|p| !p.is_zero())
}

pub(crate) fn gt_to_bytes(gt: &PairingOutput<Bls12_381>) -> Result<Vec<u8>, IbeError> {
    let mut out = Vec::new();
    gt.serialize_compressed(&mut out)
        .map_err(|_| IbeError::Serialization)?;
    Ok(out)
}

//! One-time transport keys and the key material the service wraps under them.
//!
//! Key material is an ElGamal-style encryption of the identity key `k` to the
//! transport public key `tpk = tsk*G1`:
//!
//! ```text
//! C1 = r*G1 (48) | C2 = r*G2 (96) | C3 = k + r*tpk (48)
//! ```

use std::fmt;

use ark_bls12_381::{Bls12_381, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup, Group};

use super::curve::{self, G1_LEN, G2_LEN};
use super::{identity_point, DerivedPublicKey, IbeError};

const TRANSPORT_DST: &[u8] = b"VKD-TRANSPORT-V01-with-BLS12381_XMD:SHA-256_SCALAR_";

/// Ephemeral key a caller generates per key-material request.
pub struct TransportSecretKey {
    scalar: Fr,
    public: Vec<u8>,
}

impl fmt::Debug for TransportSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSecretKey")
            .field("public", &hex::encode(&self.public))
            .finish_non_exhaustive()
    }
}

impl TransportSecretKey {
    pub fn random() -> Result<Self, IbeError> {
        Self::from_scalar(curve::random_scalar()?)
    }

    /// Deterministic key from seed bytes.
    pub fn from_seed(seed: &[u8]) -> Result<Self, IbeError> {
        Self::from_scalar(curve::hash_to_scalar(TRANSPORT_DST, seed))
    }

    fn from_scalar(scalar: Fr) -> Result<Self, IbeError> {
        let public = curve::g1_to_bytes(&(G1Projective::generator() * scalar).into_affine())?;
        Ok(Self { scalar, public })
    }

    /// Compressed G1 public key handed to the key service.
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public
    }
}

/// Decrypted and verified identity key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VetKey {
    point: G1Affine,
}

impl VetKey {
    pub(crate) fn from_point(point: G1Affine) -> Self {
        Self { point }
    }

    pub(crate) fn point(&self) -> &G1Affine {
        &self.point
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedKeyMaterial {
    c1: G1Affine,
    c2: G2Affine,
    c3: G1Affine,
}

impl EncryptedKeyMaterial {
    pub const LEN: usize = G1_LEN + G2_LEN + G1_LEN;

    /// Wrap `key` (the identity key) under a caller's transport public key.
    pub(crate) fn seal(key: &G1Affine, transport_public_key: &[u8]) -> Result<Self, IbeError> {
        let tpk = curve::g1_nonzero_from_bytes(transport_public_key)
            .ok_or(IbeError::InvalidTransportKey)?;
        let r = curve::random_scalar()?;
        Ok(Self {
            c1: (G1Projective::generator() * r).into_affine(),
            c2: (G2Projective::generator() * r).into_affine(),
            c3: (key.into_group() + tpk * r).into_affine(),
        })
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, IbeError> {
        if bytes.len() != Self::LEN {
            return Err(IbeError::InvalidKeyMaterial);
        }
        let (c1, rest) = bytes.split_at(G1_LEN);
        let (c2, c3) = rest.split_at(G2_LEN);
        Ok(Self {
            c1: curve::g1_nonzero_from_bytes(c1).ok_or(IbeError::InvalidKeyMaterial)?,
            c2: curve::g2_nonzero_from_bytes(c2).ok_or(IbeError::InvalidKeyMaterial)?,
            c3: curve::g1_from_bytes(c3).ok_or(IbeError::InvalidKeyMaterial)?,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>, IbeError> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.extend_from_slice(&curve::g1_to_bytes(&self.c1)?);
        out.extend_from_slice(&curve::g2_to_bytes(&self.c2)?);
        out.extend_from_slice(&curve::g1_to_bytes(&self.c3)?);
        Ok(out)
    }

    /// Unwrap with `tsk` and check the result is the identity key for
    /// `identity` under `dpk`. Nothing is returned unless both checks pass.
    pub fn decrypt_and_verify(
        &self,
        tsk: &TransportSecretKey,
        dpk: &DerivedPublicKey,
        identity: &[u8],
    ) -> Result<VetKey, IbeError> {
        let g1 = G1Affine::generator();
        let g2 = G2Affine::generator();

        // C1 and C2 must share the same ephemeral exponent.
        if Bls12_381::pairing(self.c1, g2) != Bls12_381::pairing(g1, self.c2) {
            return Err(IbeError::KeyMaterialVerification);
        }

        let key = (self.c3.into_group() - self.c1 * tsk.scalar).into_affine();
        let q = identity_point(dpk, identity)?;
        if Bls12_381::pairing(key, g2) != Bls12_381::pairing(q, *dpk.point()) {
            return Err(IbeError::KeyMaterialVerification);
        }
        Ok(VetKey::from_point(key))
    }
}

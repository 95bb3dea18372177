//! Single-party key deriver.
//!
//! Stands in for a threshold key service in development and tests: it holds
//! one master scalar and derives a per-(key name, context) secret from it.

use std::fmt;

use ark_bls12_381::{Fr, G2Projective};
use ark_ec::{CurveGroup, Group};
use bytes::BufMut;

use super::curve;
use super::transport::{EncryptedKeyMaterial, VetKey};
use super::{identity_point, DerivedPublicKey, IbeError};

const MASTER_DST: &[u8] = b"VKD-MASTER-V01-with-BLS12381_XMD:SHA-256_SCALAR_";
const DERIVE_DST: &[u8] = b"VKD-DERIVE-V01-with-BLS12381_XMD:SHA-256_SCALAR_";

pub struct MasterKey {
    secret: Fr,
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

impl MasterKey {
    pub fn from_seed(seed: &[u8]) -> Self {
        Self {
            secret: curve::hash_to_scalar(MASTER_DST, seed),
        }
    }

    /// Derive the secret for `key_name` within `context`.
    ///
    /// derived = master + H(len(key_name) | key_name | len(context) | context)
    pub fn derive(&self, key_name: &str, context: &[u8]) -> Result<DerivedSecret, IbeError> {
        let mut transcript = Vec::with_capacity(8 + key_name.len() + context.len());
        transcript.put_u32(key_name.len() as u32);
        transcript.put_slice(key_name.as_bytes());
        transcript.put_u32(context.len() as u32);
        transcript.put_slice(context);

        let scalar = self.secret + curve::hash_to_scalar(DERIVE_DST, &transcript);
        let public = DerivedPublicKey::from_point((G2Projective::generator() * scalar).into_affine())?;
        Ok(DerivedSecret { scalar, public })
    }
}

/// Secret scalar for one (key name, context) pair.
pub struct DerivedSecret {
    scalar: Fr,
    public: DerivedPublicKey,
}

impl fmt::Debug for DerivedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedSecret(..)")
    }
}

impl DerivedSecret {
    pub fn public_key(&self) -> &DerivedPublicKey {
        &self.public
    }

    /// Identity key for `identity` under this derived secret.
    pub fn vet_key(&self, identity: &[u8]) -> Result<VetKey, IbeError> {
        let q = identity_point(&self.public, identity)?;
        Ok(VetKey::from_point((q * self.scalar).into_affine()))
    }

    /// Issue the identity key for `identity`, wrapped under a caller's
    /// transport public key.
    pub fn encrypted_key_material(
        &self,
        identity: &[u8],
        transport_public_key: &[u8],
    ) -> Result<EncryptedKeyMaterial, IbeError> {
        let key = self.vet_key(identity)?;
        EncryptedKeyMaterial::seal(key.point(), transport_public_key)
    }
}

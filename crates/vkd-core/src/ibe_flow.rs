//! Sender and recipient workflows for identity-bound encryption.
//!
//! Sender: fetch the derived public key, encrypt under the recipient's
//! fingerprint with a fresh seed, package as an [`Envelope`].
//!
//! Recipient: unpack, fetch key material under a one-time transport key,
//! and check the binding before touching any cryptography:
//! 1. the envelope's derived key must equal the one the service serves now
//! 2. the envelope's fingerprint must equal the caller the service observes
//!
//! Every failure after those checks is reported as
//! [`VkdError::DecryptionDenied`].

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use vkd_crypto::envelope::{self, DecodedEnvelope, Envelope};
use vkd_crypto::ibe::{
    DerivedPublicKey, EncryptedKeyMaterial, IbeCiphertext, IbeError, IbeIdentity, IbeSeed,
    TransportSecretKey,
};
use vkd_crypto::utils::constant_time_compare;

use crate::collaborators::{CallerObserver, IdentityProvider, KeyDerivationService, KeyScope};
use crate::errors::VkdError;

/// Transport key and the key material the service issued under it.
#[derive(Debug)]
pub struct KeyMaterialReport {
    pub transport_public_key: Vec<u8>,
    pub encrypted_key_material: Vec<u8>,
    pub caller_fingerprint: Vec<u8>,
    /// Whether the material unwrapped to a valid key for the caller.
    pub verified: bool,
}

pub struct IbeWorkflow {
    keys: Arc<dyn KeyDerivationService>,
    observer: Arc<dyn CallerObserver>,
    identity: Arc<dyn IdentityProvider>,
    scope: KeyScope,
}

impl IbeWorkflow {
    pub fn new(
        keys: Arc<dyn KeyDerivationService>,
        observer: Arc<dyn CallerObserver>,
        identity: Arc<dyn IdentityProvider>,
        scope: KeyScope,
    ) -> Self {
        Self {
            keys,
            observer,
            identity,
            scope,
        }
    }

    async fn require_login(&self) -> Result<Vec<u8>, VkdError> {
        self.identity
            .current_identity_fingerprint()
            .await?
            .ok_or(VkdError::NotAuthenticated)
    }

    /// Fetch and parse the derived public key for this workflow's scope.
    pub async fn derived_public_key(&self) -> Result<DerivedPublicKey, VkdError> {
        let bytes = self.keys.derived_public_key(&self.scope).await?;
        DerivedPublicKey::deserialize(&bytes).map_err(|e| VkdError::KeyFormat(e.to_string()))
    }

    /// The caller identity the key service observes.
    pub async fn observed_caller(&self) -> Result<Vec<u8>, VkdError> {
        Ok(self.observer.observed_caller_fingerprint().await?)
    }

    /// Encrypt `plaintext` for `recipient` and package it.
    pub async fn encrypt_for(&self, recipient: &str, plaintext: &[u8]) -> Result<Envelope, VkdError> {
        self.require_login().await?;
        if plaintext.is_empty() {
            return Err(VkdError::EmptyPlaintext);
        }

        let (dpk_bytes, recipient_fp) = tokio::try_join!(
            async { self.keys.derived_public_key(&self.scope).await.map_err(VkdError::from) },
            async { self.identity.fingerprint_for(recipient).await.map_err(VkdError::from) },
        )?;

        let dpk = DerivedPublicKey::deserialize(&dpk_bytes)
            .map_err(|e| VkdError::KeyFormat(e.to_string()))?;
        let seed = IbeSeed::random().map_err(crypto_error)?;
        let ciphertext = IbeCiphertext::encrypt(&dpk, &IbeIdentity::from_bytes(&recipient_fp), plaintext, &seed)
            .and_then(|ct| ct.serialize())
            .map_err(crypto_error)?;

        let env = Envelope::new(recipient_fp, dpk_bytes, ciphertext);
        // Validates field sizes before the envelope leaves this function.
        env.to_bytes()?;

        info!(
            recipient = hex::encode(&env.recipient_fingerprint),
            key_name = %self.scope.key_name,
            ciphertext_len = env.ciphertext.len(),
            "Encrypted message for recipient"
        );
        Ok(env)
    }

    /// Encrypt and return the envelope's wire bytes.
    pub async fn encrypt_to_bytes(&self, recipient: &str, plaintext: &[u8]) -> Result<Bytes, VkdError> {
        Ok(self.encrypt_for(recipient, plaintext).await?.to_bytes()?)
    }

    /// Decrypt an envelope addressed to the current caller.
    pub async fn decrypt(&self, envelope_bytes: &[u8]) -> Result<Vec<u8>, VkdError> {
        let local_fp = self.require_login().await?;

        let env = match envelope::decode(envelope_bytes)? {
            DecodedEnvelope::Packaged(env) => env,
            DecodedEnvelope::Legacy { .. } => {
                warn!("Refusing legacy ciphertext without envelope marker");
                return Err(VkdError::LegacyFormat);
            }
        };

        let tsk = TransportSecretKey::random().map_err(crypto_error)?;
        let (key_material, current_dpk, caller_fp) = tokio::try_join!(
            async {
                self.keys
                    .encrypted_key_material(tsk.public_key_bytes(), &self.scope)
                    .await
                    .map_err(VkdError::from)
            },
            async { self.keys.derived_public_key(&self.scope).await.map_err(VkdError::from) },
            async { self.observer.observed_caller_fingerprint().await.map_err(VkdError::from) },
        )?;
        debug!(
            key_material_len = key_material.len(),
            "Fetched key material and current derived key"
        );

        if !constant_time_compare(&current_dpk, &env.derived_public_key) {
            warn!(
                key_name = %self.scope.key_name,
                "Envelope was produced under a different derived public key"
            );
            return Err(VkdError::EpochMismatch);
        }

        if !constant_time_compare(&local_fp, &caller_fp) {
            warn!(
                local = hex::encode(&local_fp),
                observed = hex::encode(&caller_fp),
                "Local identity differs from the caller observed by the key service"
            );
        }

        if !constant_time_compare(&env.recipient_fingerprint, &caller_fp) {
            warn!(
                intended = hex::encode(&env.recipient_fingerprint),
                current = hex::encode(&caller_fp),
                "Envelope is addressed to another identity"
            );
            return Err(VkdError::recipient_mismatch(&env.recipient_fingerprint, &caller_fp));
        }

        let plaintext = open_envelope(&env, &tsk, &key_material, &caller_fp).map_err(|e| {
            debug!(reason = %e, "Decryption step failed");
            VkdError::DecryptionDenied
        })?;

        info!(
            recipient = hex::encode(&caller_fp),
            plaintext_len = plaintext.len(),
            "Decrypted message"
        );
        Ok(plaintext)
    }

    /// Decrypt an envelope carried as hex text.
    pub async fn decrypt_hex(&self, envelope_hex: &str) -> Result<Vec<u8>, VkdError> {
        let bytes = vkd_crypto::encoding::hex_to_bytes(envelope_hex)?;
        self.decrypt(&bytes).await
    }

    /// Request key material for a fresh transport key and check it unwraps
    /// to the observed caller's key.
    pub async fn derive_key_material(&self) -> Result<KeyMaterialReport, VkdError> {
        let tsk = TransportSecretKey::random().map_err(crypto_error)?;
        let (key_material, dpk_bytes, caller_fp) = tokio::try_join!(
            async {
                self.keys
                    .encrypted_key_material(tsk.public_key_bytes(), &self.scope)
                    .await
                    .map_err(VkdError::from)
            },
            async { self.keys.derived_public_key(&self.scope).await.map_err(VkdError::from) },
            async { self.observer.observed_caller_fingerprint().await.map_err(VkdError::from) },
        )?;

        let dpk = DerivedPublicKey::deserialize(&dpk_bytes)
            .map_err(|e| VkdError::KeyFormat(e.to_string()))?;
        let verified = EncryptedKeyMaterial::deserialize(&key_material)
            .and_then(|ekm| ekm.decrypt_and_verify(&tsk, &dpk, &caller_fp))
            .is_ok();

        Ok(KeyMaterialReport {
            transport_public_key: tsk.public_key_bytes().to_vec(),
            encrypted_key_material: key_material,
            caller_fingerprint: caller_fp,
            verified,
        })
    }
}

fn open_envelope(
    env: &Envelope,
    tsk: &TransportSecretKey,
    key_material: &[u8],
    caller_fp: &[u8],
) -> Result<Vec<u8>, IbeError> {
    let dpk = DerivedPublicKey::deserialize(&env.derived_public_key)?;
    let vetkey = EncryptedKeyMaterial::deserialize(key_material)?.decrypt_and_verify(tsk, &dpk, caller_fp)?;
    IbeCiphertext::deserialize(&env.ciphertext)?.decrypt(&vetkey)
}

fn crypto_error(e: IbeError) -> VkdError {
    VkdError::Crypto(e.to_string())
}

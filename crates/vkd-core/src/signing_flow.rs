//! Recoverable-signature workflow.
//!
//! Signing asks the external signer for its public key and a compact
//! signature over the personal-message hash, then finds the recovery id
//! locally. Verification needs only the message, the signature and the
//! signer's address.

use std::sync::Arc;

use tracing::{debug, info, warn};

use vkd_crypto::address::{derive_address, Address};
use vkd_crypto::encoding::hex_to_bytes;
use vkd_crypto::message::personal_message_hash;
use vkd_crypto::recoverable::{self, RecoverableSignature, VerificationOutcome};

use crate::collaborators::RawSigner;
use crate::errors::VkdError;

#[derive(Debug, Clone)]
pub struct SignedMessage {
    pub message: String,
    pub hash: [u8; 32],
    pub public_key: Vec<u8>,
    pub address: Address,
    pub signature: RecoverableSignature,
}

pub struct SigningWorkflow {
    signer: Arc<dyn RawSigner>,
    key_name: String,
}

impl SigningWorkflow {
    pub fn new(signer: Arc<dyn RawSigner>, key_name: impl Into<String>) -> Self {
        Self {
            signer,
            key_name: key_name.into(),
        }
    }

    /// Address of the configured signing key.
    pub async fn address(&self) -> Result<Address, VkdError> {
        let public_key = self.signer.public_key(&self.key_name).await?;
        Ok(derive_address(&public_key)?)
    }

    pub async fn sign(&self, message: &str) -> Result<SignedMessage, VkdError> {
        let hash = personal_message_hash(message);

        let (public_key, compact) = tokio::try_join!(
            async { self.signer.public_key(&self.key_name).await.map_err(VkdError::from) },
            async { self.signer.sign_hash(&hash, &self.key_name).await.map_err(VkdError::from) },
        )?;

        let address = derive_address(&public_key)?;
        let signature = recoverable::sign_with_recovery(&hash, &compact, &public_key).map_err(|e| {
            warn!(key_name = %self.key_name, error = %e, "Signer output does not match its public key");
            VkdError::from(e)
        })?;

        info!(
            key_name = %self.key_name,
            %address,
            recovery_id = signature.recovery_id(),
            "Signed message"
        );
        Ok(SignedMessage {
            message: message.to_string(),
            hash,
            public_key,
            address,
            signature,
        })
    }
}

/// Verify `signature` over `message` against the address text.
///
/// Malformed input is an error; a well-formed signature that does not check
/// out is [`VerificationOutcome::Invalid`] or
/// [`VerificationOutcome::Unrecoverable`].
pub fn verify(message: &str, signature: &[u8], address: &str) -> Result<VerificationOutcome, VkdError> {
    let hash = personal_message_hash(message);
    let address = Address::parse(address)?;
    let outcome = recoverable::verify_with_address(&hash, signature, &address)?;
    debug!(%address, ?outcome, "Verified signature");
    Ok(outcome)
}

/// [`verify`] with the signature given as hex text.
pub fn verify_hex(message: &str, signature_hex: &str, address: &str) -> Result<VerificationOutcome, VkdError> {
    let signature = hex_to_bytes(signature_hex)?;
    verify(message, &signature, address)
}

/// Turn a non-valid outcome into an error kind.
pub fn require_valid(outcome: VerificationOutcome) -> Result<Address, VkdError> {
    match outcome {
        VerificationOutcome::Valid { address, .. } => Ok(address),
        VerificationOutcome::Invalid => Err(VkdError::SignatureMismatch),
        VerificationOutcome::Unrecoverable => Err(VkdError::Unrecoverable),
    }
}

//! Error types for the encryption and signing workflows.
//!
//! Every failure is a [`VkdError`] value so callers can branch on kind.
//! Messages carry fingerprints and addresses in hex but never key material.

use thiserror::Error;

use vkd_crypto::address::AddressError;
use vkd_crypto::encoding::EncodingError;
use vkd_crypto::envelope::EnvelopeError;
use vkd_crypto::recoverable::SignatureError;

use crate::collaborators::CollaboratorError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VkdError {
    // Boundary input
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("field too large: {field} is {len} bytes, limit {max}")]
    FieldTooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("legacy ciphertext format, ask the sender to re-encrypt")]
    LegacyFormat,

    #[error("plaintext is empty")]
    EmptyPlaintext,

    // Key material
    #[error("key format error: {0}")]
    KeyFormat(String),

    #[error("invalid public key encoding: {0}")]
    InvalidPublicKeyEncoding(String),

    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    // Identity binding
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("derived public key differs from the current service key, ask the sender to re-encrypt")]
    EpochMismatch,

    #[error("recipient mismatch: ciphertext is for {intended}, current caller is {current}")]
    RecipientMismatch { intended: String, current: String },

    #[error("decryption denied")]
    DecryptionDenied,

    // Signatures
    #[error("no recovery id reproduces the signer's public key")]
    RecoveryIdNotFound,

    #[error("signature is unrecoverable")]
    Unrecoverable,

    #[error("signature does not match the address")]
    SignatureMismatch,

    #[error("invalid address format: {0}")]
    InvalidAddressFormat(String),

    #[error("invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    // Collaborators
    #[error("service error: {0}")]
    Service(String),
}

impl VkdError {
    pub fn recipient_mismatch(intended: &[u8], current: &[u8]) -> Self {
        VkdError::RecipientMismatch {
            intended: hex::encode(intended),
            current: hex::encode(current),
        }
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            VkdError::InvalidEncoding(_) => "invalid_encoding",
            VkdError::FieldTooLarge { .. } => "field_too_large",
            VkdError::InvalidEnvelope(_) => "invalid_envelope",
            VkdError::LegacyFormat => "legacy_format",
            VkdError::EmptyPlaintext => "empty_plaintext",
            VkdError::KeyFormat(_) => "key_format",
            VkdError::InvalidPublicKeyEncoding(_) => "invalid_public_key_encoding",
            VkdError::Crypto(_) => "crypto",
            VkdError::NotAuthenticated => "not_authenticated",
            VkdError::InvalidIdentity(_) => "invalid_identity",
            VkdError::EpochMismatch => "epoch_mismatch",
            VkdError::RecipientMismatch { .. } => "recipient_mismatch",
            VkdError::DecryptionDenied => "decryption_denied",
            VkdError::RecoveryIdNotFound => "recovery_id_not_found",
            VkdError::Unrecoverable => "unrecoverable",
            VkdError::SignatureMismatch => "signature_mismatch",
            VkdError::InvalidAddressFormat(_) => "invalid_address_format",
            VkdError::InvalidSignatureFormat(_) => "invalid_signature_format",
            VkdError::Service(_) => "service",
        }
    }
}

impl From<EncodingError> for VkdError {
    fn from(e: EncodingError) -> Self {
        VkdError::InvalidEncoding(e.to_string())
    }
}

impl From<EnvelopeError> for VkdError {
    fn from(e: EnvelopeError) -> Self {
        match e {
            EnvelopeError::FieldTooLarge { field, len, max } => {
                VkdError::FieldTooLarge { field, len, max }
            }
            EnvelopeError::Invalid(reason) => VkdError::InvalidEnvelope(reason.to_string()),
            EnvelopeError::Encoding(e) => e.into(),
        }
    }
}

impl From<AddressError> for VkdError {
    fn from(e: AddressError) -> Self {
        match e {
            AddressError::InvalidPublicKeyEncoding(reason) => {
                VkdError::InvalidPublicKeyEncoding(reason.to_string())
            }
            AddressError::InvalidAddressFormat(text) => VkdError::InvalidAddressFormat(text),
        }
    }
}

impl From<SignatureError> for VkdError {
    fn from(e: SignatureError) -> Self {
        match e {
            SignatureError::RecoveryIdNotFound => VkdError::RecoveryIdNotFound,
            SignatureError::InvalidFormat(reason) => VkdError::InvalidSignatureFormat(reason),
            SignatureError::Address(e) => e.into(),
        }
    }
}

impl From<CollaboratorError> for VkdError {
    fn from(e: CollaboratorError) -> Self {
        match e {
            CollaboratorError::InvalidIdentity(reason) => VkdError::InvalidIdentity(reason),
            other => VkdError::Service(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipient_mismatch_renders_hex() {
        let err = VkdError::recipient_mismatch(&[0xab, 0xcd], &[0x01]);
        assert_eq!(
            err.to_string(),
            "recipient mismatch: ciphertext is for abcd, current caller is 01"
        );
        assert_eq!(err.kind(), "recipient_mismatch");
    }

    #[test]
    fn test_envelope_errors_map_to_kinds() {
        let err: VkdError = EnvelopeError::Invalid("truncated header").into();
        assert_eq!(err, VkdError::InvalidEnvelope("truncated header".into()));

        let err: VkdError = EnvelopeError::Encoding(EncodingError::Empty).into();
        assert_eq!(err.kind(), "invalid_encoding");
    }

    #[test]
    fn test_collaborator_errors_map_to_service() {
        let err: VkdError = CollaboratorError::Unavailable("down".into()).into();
        assert_eq!(err.kind(), "service");
        let err: VkdError = CollaboratorError::InvalidIdentity("bad".into()).into();
        assert_eq!(err, VkdError::InvalidIdentity("bad".into()));
    }
}

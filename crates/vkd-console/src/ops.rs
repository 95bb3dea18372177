//! Console operations against the local development deployment.
//!
//! Each command runs in a fresh process, so a command that acts as an
//! identity logs in as that identity first.

use serde::Serialize;
use tracing::debug;

use vkd_core::harness::{LocalDeployment, LocalSigner};
use vkd_core::provider::{resolve_provider_url, ProviderError, ProviderSettings};
use vkd_core::signing_flow;
use vkd_core::{KeyScope, VkdError};
use vkd_crypto::encoding::bytes_to_hex;
use vkd_crypto::ibe::MasterKey;
use vkd_crypto::recoverable::VerificationOutcome;

use crate::config::{Config, ConfigError};
use crate::output::Report;

/// Local deployment plus the scope and signing key the console uses.
pub struct Console {
    deployment: LocalDeployment,
    scope: KeyScope,
}

impl Console {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let master = MasterKey::from_seed(&config.master_seed()?);
        let signer = LocalSigner::from_secret(&config.signer_secret()?)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        Ok(Self {
            deployment: LocalDeployment::new(master, signer),
            scope: config.key_scope(),
        })
    }

    pub fn scope(&self) -> &KeyScope {
        &self.scope
    }

    pub async fn public_key(&self) -> Result<PublicKeyReport, VkdError> {
        let dpk = self.deployment.ibe_workflow(self.scope.clone()).derived_public_key().await?;
        Ok(PublicKeyReport {
            key_name: self.scope.key_name.clone(),
            context: String::from_utf8_lossy(&self.scope.context).into_owned(),
            derived_public_key: bytes_to_hex(dpk.as_bytes()),
        })
    }

    pub async fn derive_key(&self, identity: &str) -> Result<KeyMaterialReport, VkdError> {
        self.deployment.login_as(identity).await?;
        let report = self
            .deployment
            .ibe_workflow(self.scope.clone())
            .derive_key_material()
            .await?;
        Ok(KeyMaterialReport {
            identity: identity.trim().to_string(),
            transport_public_key: bytes_to_hex(&report.transport_public_key),
            encrypted_key_material: bytes_to_hex(&report.encrypted_key_material),
            caller_fingerprint: bytes_to_hex(&report.caller_fingerprint),
            verified: report.verified,
        })
    }

    pub async fn caller(&self, identity: &str) -> Result<CallerReport, VkdError> {
        self.deployment.login_as(identity).await?;
        let observed = self.deployment.ibe_workflow(self.scope.clone()).observed_caller().await?;
        Ok(CallerReport {
            identity: identity.trim().to_string(),
            fingerprint: bytes_to_hex(&observed),
        })
    }

    /// Encrypt as `sender` for `recipient`; returns the envelope as hex.
    pub async fn encrypt(&self, sender: &str, recipient: &str, message: &str) -> Result<EncryptReport, VkdError> {
        self.deployment.login_as(sender).await?;
        let envelope = self
            .deployment
            .ibe_workflow(self.scope.clone())
            .encrypt_for(recipient, message.trim().as_bytes())
            .await?;
        Ok(EncryptReport {
            sender: sender.trim().to_string(),
            recipient: recipient.trim().to_string(),
            recipient_fingerprint: bytes_to_hex(&envelope.recipient_fingerprint),
            envelope: envelope.to_hex()?,
        })
    }

    pub async fn decrypt(&self, recipient: &str, envelope_hex: &str) -> Result<DecryptReport, VkdError> {
        self.deployment.login_as(recipient).await?;
        let plaintext = self
            .deployment
            .ibe_workflow(self.scope.clone())
            .decrypt_hex(envelope_hex)
            .await?;
        Ok(DecryptReport::new(recipient, plaintext))
    }

    /// Encrypt from `sender` to `recipient`, then decrypt as `recipient`.
    pub async fn round_trip(&self, sender: &str, recipient: &str, message: &str) -> Result<RoundTripReport, VkdError> {
        let encrypted = self.encrypt(sender, recipient, message).await?;
        debug!(envelope_len = encrypted.envelope.len() / 2, "Encrypted, decrypting as recipient");
        let decrypted = self.decrypt(recipient, &encrypted.envelope).await?;
        Ok(RoundTripReport {
            matches: decrypted.plaintext == message.trim(),
            sender: encrypted.sender,
            recipient: encrypted.recipient,
            envelope: encrypted.envelope,
            plaintext: decrypted.plaintext,
        })
    }

    pub async fn sign(&self, message: &str) -> Result<SignReport, VkdError> {
        let signed = self
            .deployment
            .signing_workflow(&self.scope.key_name)
            .sign(message)
            .await?;
        Ok(SignReport {
            message: signed.message,
            message_hash: bytes_to_hex(&signed.hash),
            public_key: bytes_to_hex(&signed.public_key),
            address: signed.address.to_string(),
            recovery_id: signed.signature.recovery_id(),
            signature: signed.signature.to_hex(),
        })
    }

    pub async fn address(&self) -> Result<AddressReport, VkdError> {
        let address = self
            .deployment
            .signing_workflow(&self.scope.key_name)
            .address()
            .await?;
        Ok(AddressReport {
            key_name: self.scope.key_name.clone(),
            address: address.to_string(),
        })
    }
}

/// Check a signature against an address; needs no deployment.
pub fn verify(message: &str, signature_hex: &str, address: &str) -> Result<VerifyReport, VkdError> {
    let outcome = signing_flow::verify_hex(message, signature_hex, address)?;
    Ok(VerifyReport::new(address, outcome))
}

pub fn provider(settings: &ProviderSettings) -> Result<ProviderReport, ProviderError> {
    Ok(ProviderReport {
        network: settings.network.clone().unwrap_or_default(),
        url: resolve_provider_url(settings)?,
    })
}

#[derive(Debug, Serialize)]
pub struct PublicKeyReport {
    pub key_name: String,
    pub context: String,
    pub derived_public_key: String,
}

impl Report for PublicKeyReport {
    fn command(&self) -> &'static str {
        "public-key"
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Key Name", self.key_name.clone()),
            ("Context", self.context.clone()),
            ("Derived Public Key", self.derived_public_key.clone()),
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct KeyMaterialReport {
    pub identity: String,
    pub transport_public_key: String,
    pub encrypted_key_material: String,
    pub caller_fingerprint: String,
    pub verified: bool,
}

impl Report for KeyMaterialReport {
    fn command(&self) -> &'static str {
        "derive-key"
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Identity", self.identity.clone()),
            ("Caller Fingerprint", self.caller_fingerprint.clone()),
            ("Transport Public Key", self.transport_public_key.clone()),
            ("Encrypted Key Material", self.encrypted_key_material.clone()),
            ("Verified", self.verified.to_string()),
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct CallerReport {
    pub identity: String,
    pub fingerprint: String,
}

impl Report for CallerReport {
    fn command(&self) -> &'static str {
        "caller"
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Identity", self.identity.clone()),
            ("Observed Fingerprint", self.fingerprint.clone()),
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct EncryptReport {
    pub sender: String,
    pub recipient: String,
    pub recipient_fingerprint: String,
    pub envelope: String,
}

impl Report for EncryptReport {
    fn command(&self) -> &'static str {
        "encrypt"
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Sender", self.sender.clone()),
            ("Recipient", self.recipient.clone()),
            ("Recipient Fingerprint", self.recipient_fingerprint.clone()),
            ("Envelope", self.envelope.clone()),
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct DecryptReport {
    pub recipient: String,
    pub plaintext: String,
    /// Set when the plaintext is not valid UTF-8
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plaintext_hex: Option<String>,
}

impl DecryptReport {
    fn new(recipient: &str, plaintext: Vec<u8>) -> Self {
        let (plaintext, plaintext_hex) = match String::from_utf8(plaintext) {
            Ok(text) => (text, None),
            Err(e) => {
                let bytes = e.into_bytes();
                (String::from_utf8_lossy(&bytes).into_owned(), Some(bytes_to_hex(&bytes)))
            }
        };
        Self {
            recipient: recipient.trim().to_string(),
            plaintext,
            plaintext_hex,
        }
    }
}

impl Report for DecryptReport {
    fn command(&self) -> &'static str {
        "decrypt"
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            ("Recipient", self.recipient.clone()),
            ("Plaintext", self.plaintext.clone()),
        ];
        if let Some(ref hex) = self.plaintext_hex {
            rows.push(("Plaintext (hex)", hex.clone()));
        }
        rows
    }
}

#[derive(Debug, Serialize)]
pub struct RoundTripReport {
    pub sender: String,
    pub recipient: String,
    pub envelope: String,
    pub plaintext: String,
    pub matches: bool,
}

impl Report for RoundTripReport {
    fn command(&self) -> &'static str {
        "round-trip"
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Sender", self.sender.clone()),
            ("Recipient", self.recipient.clone()),
            ("Envelope", self.envelope.clone()),
            ("Decrypted", self.plaintext.clone()),
            ("Matches", self.matches.to_string()),
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct SignReport {
    pub message: String,
    pub message_hash: String,
    pub public_key: String,
    pub address: String,
    pub recovery_id: u8,
    pub signature: String,
}

impl Report for SignReport {
    fn command(&self) -> &'static str {
        "sign"
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Message", self.message.clone()),
            ("Message Hash", self.message_hash.clone()),
            ("Public Key", self.public_key.clone()),
            ("Address", self.address.clone()),
            ("Recovery Id", self.recovery_id.to_string()),
            ("Signature", self.signature.clone()),
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyReport {
    pub address: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_id: Option<u8>,
}

impl VerifyReport {
    fn new(address: &str, outcome: VerificationOutcome) -> Self {
        let (outcome, recovery_id) = match outcome {
            VerificationOutcome::Valid { recovery_id, .. } => ("valid", Some(recovery_id)),
            VerificationOutcome::Invalid => ("invalid", None),
            VerificationOutcome::Unrecoverable => ("unrecoverable", None),
        };
        Self {
            address: address.trim().to_string(),
            outcome,
            recovery_id,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.outcome == "valid"
    }
}

impl Report for VerifyReport {
    fn command(&self) -> &'static str {
        "verify"
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            ("Address", self.address.clone()),
            ("Outcome", self.outcome.to_string()),
        ];
        if let Some(id) = self.recovery_id {
            rows.push(("Recovery Id", id.to_string()));
        }
        rows
    }
}

#[derive(Debug, Serialize)]
pub struct AddressReport {
    pub key_name: String,
    pub address: String,
}

impl Report for AddressReport {
    fn command(&self) -> &'static str {
        "address"
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![("Key Name", self.key_name.clone()), ("Address", self.address.clone())]
    }
}

#[derive(Debug, Serialize)]
pub struct ProviderReport {
    pub network: String,
    pub url: String,
}

impl Report for ProviderReport {
    fn command(&self) -> &'static str {
        "provider"
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![("Network", self.network.clone()), ("Login URL", self.url.clone())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = "A broadcast: release 1.2.6 is frozen";

    fn console() -> Console {
        Console::from_config(&Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_round_trip() {
        let report = console().round_trip("alice", "bob", PAYLOAD).await.unwrap();
        assert!(report.matches);
        assert_eq!(report.plaintext, PAYLOAD);
    }

    #[tokio::test]
    async fn test_envelope_survives_across_consoles() {
        let envelope = console().encrypt("alice", "bob", "hi bob").await.unwrap().envelope;
        let report = console().decrypt("bob", &envelope).await.unwrap();
        assert_eq!(report.plaintext, "hi bob");
        assert!(report.plaintext_hex.is_none());
    }

    #[tokio::test]
    async fn test_whitespace_message_is_empty_plaintext() {
        assert_eq!(
            console().encrypt("alice", "bob", "  \n").await.unwrap_err(),
            VkdError::EmptyPlaintext
        );
    }

    #[tokio::test]
    async fn test_wrong_recipient() {
        let envelope = console().encrypt("alice", "bob", "hi bob").await.unwrap().envelope;
        assert!(matches!(
            console().decrypt("carol", &envelope).await,
            Err(VkdError::RecipientMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_other_context_is_epoch_mismatch() {
        let envelope = console().encrypt("alice", "bob", "hi bob").await.unwrap().envelope;
        let mut config = Config::default();
        config.keys.context = "another-app".to_string();
        let other = Console::from_config(&config).unwrap();
        assert_eq!(other.decrypt("bob", &envelope).await.unwrap_err(), VkdError::EpochMismatch);
    }

    #[tokio::test]
    async fn test_invalid_identity() {
        assert!(matches!(
            console().encrypt("alice", "not an id", "hi").await,
            Err(VkdError::InvalidIdentity(_))
        ));
    }

    #[tokio::test]
    async fn test_derive_key_verifies() {
        let report = console().derive_key("alice").await.unwrap();
        assert!(report.verified);
        assert_eq!(report.transport_public_key.len(), 96);
        assert_eq!(report.encrypted_key_material.len(), 384);
        assert_eq!(report.caller_fingerprint, console().caller("alice").await.unwrap().fingerprint);
    }

    #[tokio::test]
    async fn test_public_key_is_stable() {
        let a = console().public_key().await.unwrap();
        let b = console().public_key().await.unwrap();
        assert_eq!(a.derived_public_key, b.derived_public_key);
        assert_eq!(a.derived_public_key.len(), 192);
        assert_eq!(a.context, "vkd-console");
    }

    #[tokio::test]
    async fn test_sign_then_verify() {
        let console = console();
        let signed = console.sign(PAYLOAD).await.unwrap();
        assert_eq!(signed.address, console.address().await.unwrap().address);

        let report = verify(PAYLOAD, &signed.signature, &signed.address).unwrap();
        assert!(report.is_valid());

        let report = verify("A broadcast: release 1.2.7 is frozen", &signed.signature, &signed.address).unwrap();
        assert_eq!(report.outcome, "invalid");
    }

    #[test]
    fn test_provider_report() {
        let settings = ProviderSettings {
            network: Some("ic".to_string()),
            ..Default::default()
        };
        let report = provider(&settings).unwrap();
        assert_eq!(report.url, vkd_core::provider::PRODUCTION_PROVIDER_URL);

        let settings = ProviderSettings {
            network: Some("local".to_string()),
            ..Default::default()
        };
        assert!(provider(&settings).is_err());
    }
}

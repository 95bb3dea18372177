//! In-process collaborators for tests and local development.
//!
//! [`LocalKeyService`] plays the key-derivation service with a single-party
//! master key, [`StaticIdentity`] the session identity, and [`LocalSigner`]
//! the raw signer. [`LocalDeployment`] wires them together.

use std::sync::Arc;

use async_trait::async_trait;
use getrandom::getrandom;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use tokio::sync::RwLock;

use vkd_crypto::hash::derive_fingerprint;
use vkd_crypto::ibe::MasterKey;

use crate::collaborators::{
    CallerObserver, CollaboratorError, IdentityProvider, KeyDerivationService, KeyScope, RawSigner,
};
use crate::errors::VkdError;
use crate::ibe_flow::IbeWorkflow;
use crate::signing_flow::SigningWorkflow;

const MAX_IDENTITY_LEN: usize = 128;

/// Generate a random 32-byte array.
pub fn rand32() -> Result<[u8; 32], VkdError> {
    let mut b = [0u8; 32];
    getrandom(&mut b).map_err(|e| VkdError::Crypto(e.to_string()))?;
    Ok(b)
}

/// Reject identity text that could not name a principal.
pub fn validate_identity(identity: &str) -> Result<&str, CollaboratorError> {
    let trimmed = identity.trim();
    if trimmed.is_empty() {
        return Err(CollaboratorError::InvalidIdentity("empty identity".into()));
    }
    if trimmed.len() > MAX_IDENTITY_LEN {
        return Err(CollaboratorError::InvalidIdentity(format!(
            "identity longer than {MAX_IDENTITY_LEN} bytes"
        )));
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CollaboratorError::InvalidIdentity(format!(
            "identity {trimmed:?} contains whitespace or control characters"
        )));
    }
    Ok(trimmed)
}

/// Key service backed by one master key. The authenticated caller is set
/// explicitly, standing in for the service's own caller authentication.
pub struct LocalKeyService {
    master: RwLock<MasterKey>,
    caller: RwLock<Option<Vec<u8>>>,
}

impl LocalKeyService {
    pub fn new(master: MasterKey) -> Self {
        Self {
            master: RwLock::new(master),
            caller: RwLock::new(None),
        }
    }

    /// Set the caller the service observes; `None` is anonymous.
    pub async fn set_caller(&self, identity: Option<&str>) {
        *self.caller.write().await = identity.map(derive_fingerprint).map(|fp| fp.to_vec());
    }

    /// Replace the master key, as a key rotation would.
    pub async fn rotate(&self, master: MasterKey) {
        *self.master.write().await = master;
    }
}

#[async_trait]
impl KeyDerivationService for LocalKeyService {
    async fn derived_public_key(&self, scope: &KeyScope) -> Result<Vec<u8>, CollaboratorError> {
        let derived = self
            .master
            .read()
            .await
            .derive(&scope.key_name, &scope.context)
            .map_err(|e| CollaboratorError::Rejected(e.to_string()))?;
        Ok(derived.public_key().as_bytes().to_vec())
    }

    async fn encrypted_key_material(
        &self,
        transport_public_key: &[u8],
        scope: &KeyScope,
    ) -> Result<Vec<u8>, CollaboratorError> {
        let caller = self
            .caller
            .read()
            .await
            .clone()
            .ok_or_else(|| CollaboratorError::Rejected("anonymous caller".into()))?;
        let derived = self
            .master
            .read()
            .await
            .derive(&scope.key_name, &scope.context)
            .map_err(|e| CollaboratorError::Rejected(e.to_string()))?;
        derived
            .encrypted_key_material(&caller, transport_public_key)
            .and_then(|ekm| ekm.serialize())
            .map_err(|e| CollaboratorError::Rejected(e.to_string()))
    }
}

#[async_trait]
impl CallerObserver for LocalKeyService {
    async fn observed_caller_fingerprint(&self) -> Result<Vec<u8>, CollaboratorError> {
        self.caller
            .read()
            .await
            .clone()
            .ok_or_else(|| CollaboratorError::Rejected("anonymous caller".into()))
    }
}

/// Session identity held in memory. Fingerprint = SHA-256 of the identity text.
#[derive(Default)]
pub struct StaticIdentity {
    current: RwLock<Option<String>>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn login(&self, identity: &str) -> Result<(), CollaboratorError> {
        let identity = validate_identity(identity)?;
        *self.current.write().await = Some(identity.to_string());
        Ok(())
    }

    pub async fn logout(&self) {
        *self.current.write().await = None;
    }

    pub async fn current(&self) -> Option<String> {
        self.current.read().await.clone()
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_identity_fingerprint(&self) -> Result<Option<Vec<u8>>, CollaboratorError> {
        Ok(self
            .current
            .read()
            .await
            .as_deref()
            .map(|id| derive_fingerprint(id).to_vec()))
    }

    async fn fingerprint_for(&self, identity: &str) -> Result<Vec<u8>, CollaboratorError> {
        Ok(derive_fingerprint(validate_identity(identity)?).to_vec())
    }
}

/// secp256k1 signer holding one key, returning compact signatures only.
pub struct LocalSigner {
    key: SigningKey,
}

impl LocalSigner {
    pub fn from_secret(secret: &[u8]) -> Result<Self, VkdError> {
        let key = SigningKey::from_slice(secret)
            .map_err(|_| VkdError::KeyFormat("invalid secp256k1 secret key".into()))?;
        Ok(Self { key })
    }

    pub fn random() -> Result<Self, VkdError> {
        loop {
            if let Ok(signer) = Self::from_secret(&rand32()?) {
                return Ok(signer);
            }
        }
    }
}

#[async_trait]
impl RawSigner for LocalSigner {
    async fn public_key(&self, key_name: &str) -> Result<Vec<u8>, CollaboratorError> {
        if key_name.is_empty() {
            return Err(CollaboratorError::Rejected("empty key name".into()));
        }
        Ok(self.key.verifying_key().to_encoded_point(true).as_bytes().to_vec())
    }

    async fn sign_hash(&self, hash: &[u8; 32], key_name: &str) -> Result<Vec<u8>, CollaboratorError> {
        if key_name.is_empty() {
            return Err(CollaboratorError::Rejected("empty key name".into()));
        }
        let signature: Signature = self
            .key
            .sign_prehash(hash)
            .map_err(|e| CollaboratorError::Rejected(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}

/// Local key service, identity and signer wired together.
pub struct LocalDeployment {
    pub keys: Arc<LocalKeyService>,
    pub identity: Arc<StaticIdentity>,
    pub signer: Arc<LocalSigner>,
}

impl LocalDeployment {
    pub fn new(master: MasterKey, signer: LocalSigner) -> Self {
        Self {
            keys: Arc::new(LocalKeyService::new(master)),
            identity: Arc::new(StaticIdentity::new()),
            signer: Arc::new(signer),
        }
    }

    /// Deterministic deployment; the signer key is derived from the seed too.
    pub fn from_seed(seed: &[u8]) -> Result<Self, VkdError> {
        let signer_secret = vkd_crypto::hash::sha256_parts(&[seed, b"/signer".as_slice()]);
        let signer = LocalSigner::from_secret(&signer_secret)?;
        Ok(Self::new(MasterKey::from_seed(seed), signer))
    }

    /// Log in locally and as seen by the key service.
    pub async fn login_as(&self, identity: &str) -> Result<(), VkdError> {
        self.identity.login(identity).await?;
        self.keys.set_caller(Some(identity.trim())).await;
        Ok(())
    }

    pub async fn logout(&self) {
        self.identity.logout().await;
        self.keys.set_caller(None).await;
    }

    pub fn ibe_workflow(&self, scope: KeyScope) -> IbeWorkflow {
        IbeWorkflow::new(self.keys.clone(), self.keys.clone(), self.identity.clone(), scope)
    }

    pub fn signing_workflow(&self, key_name: &str) -> SigningWorkflow {
        SigningWorkflow::new(self.signer.clone(), key_name)
    }
}

/// Encrypt from `sender` to `recipient` and decrypt as `recipient`.
pub async fn run_round_trip(
    deployment: &LocalDeployment,
    scope: KeyScope,
    sender: &str,
    recipient: &str,
    plaintext: &[u8],
) -> Result<Vec<u8>, VkdError> {
    let flow = deployment.ibe_workflow(scope);

    deployment.login_as(sender).await?;
    let envelope = flow.encrypt_to_bytes(recipient, plaintext).await?;

    deployment.login_as(recipient).await?;
    flow.decrypt(&envelope).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let dep = LocalDeployment::from_seed(b"harness").unwrap();
        let out = run_round_trip(&dep, KeyScope::default(), "alice", "bob", b"hello bob")
            .await
            .unwrap();
        assert_eq!(out, b"hello bob");
    }

    #[tokio::test]
    async fn test_identity_login_logout() {
        let identity = StaticIdentity::new();
        assert_eq!(identity.current_identity_fingerprint().await.unwrap(), None);

        identity.login(" alice ").await.unwrap();
        assert_eq!(identity.current().await.as_deref(), Some("alice"));
        assert_eq!(
            identity.current_identity_fingerprint().await.unwrap(),
            Some(derive_fingerprint("alice").to_vec())
        );

        identity.logout().await;
        assert_eq!(identity.current().await, None);
    }

    #[test]
    fn test_validate_identity() {
        assert_eq!(validate_identity("  bob "), Ok("bob"));
        assert!(validate_identity("").is_err());
        assert!(validate_identity("two words").is_err());
        assert!(validate_identity(&"x".repeat(129)).is_err());
    }

    #[tokio::test]
    async fn test_key_service_rotation_changes_public_key() {
        let svc = LocalKeyService::new(MasterKey::from_seed(b"one"));
        let scope = KeyScope::default();
        let before = svc.derived_public_key(&scope).await.unwrap();
        assert_eq!(before, svc.derived_public_key(&scope).await.unwrap());

        svc.rotate(MasterKey::from_seed(b"two")).await;
        assert_ne!(before, svc.derived_public_key(&scope).await.unwrap());
    }

    #[tokio::test]
    async fn test_login_as_rejects_bad_identity() {
        let dep = LocalDeployment::from_seed(b"harness").unwrap();
        assert!(matches!(dep.login_as("two words").await, Err(VkdError::InvalidIdentity(_))));
        assert_eq!(dep.identity.current().await, None);
    }

    #[tokio::test]
    async fn test_signer_rejects_empty_key_name() {
        let signer = LocalSigner::random().unwrap();
        assert!(signer.public_key("").await.is_err());
        assert_eq!(signer.public_key("k").await.unwrap().len(), 33);
        assert_eq!(signer.sign_hash(&[1u8; 32], "k").await.unwrap().len(), 64);
    }
}

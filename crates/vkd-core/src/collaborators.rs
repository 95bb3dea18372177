//! Contracts for the external services the workflows call.
//!
//! The key-derivation service, the raw signer and the identity provider are
//! opaque; only their request/response shape matters here. Implementations
//! own transport and retry policy.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_KEY_NAME: &str = "test_key_1";
pub const DEFAULT_CONTEXT: &str = "vkd-console";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Endpoint could not be reached; another endpoint may answer.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Endpoint answered and refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
}

/// (key name, context) pair a derived key is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyScope {
    pub key_name: String,
    pub context: Vec<u8>,
}

impl KeyScope {
    pub fn new(key_name: impl Into<String>, context: impl Into<Vec<u8>>) -> Self {
        Self {
            key_name: key_name.into(),
            context: context.into(),
        }
    }
}

impl Default for KeyScope {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_NAME, DEFAULT_CONTEXT.as_bytes())
    }
}

/// Key-derivation service, scoped to the caller it authenticates.
#[async_trait]
pub trait KeyDerivationService: Send + Sync {
    /// Derived public key for `scope`. Two fetches for the same scope from
    /// the same service epoch are byte-identical.
    async fn derived_public_key(&self, scope: &KeyScope) -> Result<Vec<u8>, CollaboratorError>;

    /// Identity key of the authenticated caller, wrapped under
    /// `transport_public_key`.
    async fn encrypted_key_material(
        &self,
        transport_public_key: &[u8],
        scope: &KeyScope,
    ) -> Result<Vec<u8>, CollaboratorError>;
}

/// The caller identity as the key service sees it.
#[async_trait]
pub trait CallerObserver: Send + Sync {
    async fn observed_caller_fingerprint(&self) -> Result<Vec<u8>, CollaboratorError>;
}

/// Local session identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fingerprint of the logged-in identity, `None` when anonymous.
    async fn current_identity_fingerprint(&self) -> Result<Option<Vec<u8>>, CollaboratorError>;

    /// Fingerprint for an identity given as text.
    async fn fingerprint_for(&self, identity: &str) -> Result<Vec<u8>, CollaboratorError>;
}

/// Signer that returns compact (r | s) signatures without a recovery id.
#[async_trait]
pub trait RawSigner: Send + Sync {
    /// SEC1 public key, compressed or uncompressed.
    async fn public_key(&self, key_name: &str) -> Result<Vec<u8>, CollaboratorError>;

    async fn sign_hash(&self, hash: &[u8; 32], key_name: &str) -> Result<Vec<u8>, CollaboratorError>;
}

/// Ordered list of key-service endpoints tried until one answers.
///
/// Only [`CollaboratorError::Unavailable`] moves on to the next endpoint; an
/// answer that rejects the request is final.
pub struct FallbackKeyService {
    endpoints: Vec<(String, Arc<dyn KeyDerivationService>)>,
}

impl FallbackKeyService {
    pub fn new() -> Self {
        Self { endpoints: Vec::new() }
    }

    pub fn with_endpoint(mut self, name: impl Into<String>, service: Arc<dyn KeyDerivationService>) -> Self {
        self.endpoints.push((name.into(), service));
        self
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl Default for FallbackKeyService {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! try_endpoints {
    ($self:ident, $op:literal, |$svc:ident| $call:expr) => {{
        let mut last = CollaboratorError::Unavailable("no endpoints configured".into());
        for (name, $svc) in &$self.endpoints {
            match $call.await {
                Ok(value) => {
                    debug!(endpoint = %name, op = $op, "endpoint answered");
                    return Ok(value);
                }
                Err(CollaboratorError::Unavailable(reason)) => {
                    warn!(endpoint = %name, op = $op, %reason, "endpoint unavailable, trying next");
                    last = CollaboratorError::Unavailable(reason);
                }
                Err(other) => return Err(other),
            }
        }
        Err(last)
    }};
}

#[async_trait]
impl KeyDerivationService for FallbackKeyService {
    async fn derived_public_key(&self, scope: &KeyScope) -> Result<Vec<u8>, CollaboratorError> {
        try_endpoints!(self, "derived_public_key", |svc| svc.derived_public_key(scope))
    }

    async fn encrypted_key_material(
        &self,
        transport_public_key: &[u8],
        scope: &KeyScope,
    ) -> Result<Vec<u8>, CollaboratorError> {
        try_endpoints!(self, "encrypted_key_material", |svc| svc
            .encrypted_key_material(transport_public_key, scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        answer: Result<Vec<u8>, CollaboratorError>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(answer: Result<Vec<u8>, CollaboratorError>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl KeyDerivationService for Scripted {
        async fn derived_public_key(&self, _scope: &KeyScope) -> Result<Vec<u8>, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }

        async fn encrypted_key_material(
            &self,
            _transport_public_key: &[u8],
            _scope: &KeyScope,
        ) -> Result<Vec<u8>, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }
    }

    #[tokio::test]
    async fn test_fallback_skips_unavailable() {
        let down = Scripted::new(Err(CollaboratorError::Unavailable("timeout".into())));
        let up = Scripted::new(Ok(vec![1, 2, 3]));
        let svc = FallbackKeyService::new()
            .with_endpoint("primary", down.clone())
            .with_endpoint("secondary", up.clone());

        assert_eq!(svc.derived_public_key(&KeyScope::default()).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(down.calls.load(Ordering::SeqCst), 1);
        assert_eq!(up.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_stops_on_rejection() {
        let rejecting = Scripted::new(Err(CollaboratorError::Rejected("anonymous caller".into())));
        let up = Scripted::new(Ok(vec![9]));
        let svc = FallbackKeyService::new()
            .with_endpoint("primary", rejecting)
            .with_endpoint("secondary", up.clone());

        let err = svc
            .encrypted_key_material(&[0u8; 48], &KeyScope::default())
            .await
            .unwrap_err();
        assert_eq!(err, CollaboratorError::Rejected("anonymous caller".into()));
        assert_eq!(up.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_all_unavailable() {
        let svc = FallbackKeyService::new()
            .with_endpoint("a", Scripted::new(Err(CollaboratorError::Unavailable("a down".into()))))
            .with_endpoint("b", Scripted::new(Err(CollaboratorError::Unavailable("b down".into()))));
        assert_eq!(
            svc.derived_public_key(&KeyScope::default()).await,
            Err(CollaboratorError::Unavailable("b down".into()))
        );

        let empty = FallbackKeyService::new();
        assert!(empty.is_empty());
        assert!(matches!(
            empty.derived_public_key(&KeyScope::default()).await,
            Err(CollaboratorError::Unavailable(_))
        ));
    }

    #[test]
    fn test_default_scope() {
        let scope = KeyScope::default();
        assert_eq!(scope.key_name, "test_key_1");
        assert_eq!(scope.context, b"vkd-console");
    }
}

//! Identity-provider endpoint selection.
//!
//! The production network uses the public provider. Any other network needs
//! a locally deployed provider; without one, login cannot proceed.

use thiserror::Error;

pub const PRODUCTION_PROVIDER_URL: &str = "https://identity.ic0.app/#authorize";
pub const PRODUCTION_NETWORK: &str = "ic";
const LOCAL_REPLICA_PORT: u16 = 4943;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("no local identity provider configured for network {network:?}")]
    MissingLocalProvider { network: String },
}

/// Deployment facts the provider URL depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    pub network: Option<String>,
    pub provider_canister_id: Option<String>,
    /// Host the console is serving from, if any.
    pub host: Option<String>,
}

fn is_local_host(host: &str) -> bool {
    host == "localhost" || host == "127.0.0.1" || host.ends_with(".localhost")
}

/// Pick the identity-provider login URL for `settings`.
pub fn resolve_provider_url(settings: &ProviderSettings) -> Result<String, ProviderError> {
    let network = settings
        .network
        .as_deref()
        .map(|n| n.trim().to_ascii_lowercase())
        .filter(|n| !n.is_empty());
    let canister = settings
        .provider_canister_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    if network.as_deref() == Some(PRODUCTION_NETWORK) {
        return Ok(PRODUCTION_PROVIDER_URL.to_string());
    }
    if let Some(id) = canister {
        return Ok(format!("http://{id}.localhost:{LOCAL_REPLICA_PORT}/#authorize"));
    }
    if let Some(network) = network {
        return Err(ProviderError::MissingLocalProvider { network });
    }
    if settings.host.as_deref().is_some_and(is_local_host) {
        return Err(ProviderError::MissingLocalProvider {
            network: "local".to_string(),
        });
    }
    Ok(PRODUCTION_PROVIDER_URL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(network: Option<&str>, canister: Option<&str>, host: Option<&str>) -> ProviderSettings {
        ProviderSettings {
            network: network.map(String::from),
            provider_canister_id: canister.map(String::from),
            host: host.map(String::from),
        }
    }

    #[test]
    fn test_production_network() {
        assert_eq!(
            resolve_provider_url(&settings(Some("IC"), Some("abc"), Some("localhost"))).unwrap(),
            PRODUCTION_PROVIDER_URL
        );
    }

    #[test]
    fn test_local_provider() {
        assert_eq!(
            resolve_provider_url(&settings(Some("local"), Some("rdmx6-jaaaa-aaaaa-aaadq-cai"), None)).unwrap(),
            "http://rdmx6-jaaaa-aaaaa-aaadq-cai.localhost:4943/#authorize"
        );
    }

    #[test]
    fn test_named_network_without_provider() {
        assert_eq!(
            resolve_provider_url(&settings(Some("staging"), None, None)),
            Err(ProviderError::MissingLocalProvider {
                network: "staging".into()
            })
        );
    }

    #[test]
    fn test_localhost_without_network() {
        for host in ["localhost", "127.0.0.1", "app.localhost"] {
            assert!(resolve_provider_url(&settings(None, None, Some(host))).is_err(), "{host}");
        }
    }

    #[test]
    fn test_defaults_to_production() {
        assert_eq!(
            resolve_provider_url(&ProviderSettings::default()).unwrap(),
            PRODUCTION_PROVIDER_URL
        );
        assert_eq!(
            resolve_provider_url(&settings(Some("  "), Some(""), Some("example.org"))).unwrap(),
            PRODUCTION_PROVIDER_URL
        );
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_local_provider_wins_off_production(
                network in "[a-z]{1,8}",
                canister in "[a-z0-9]{5}(-[a-z0-9]{5}){4}",
            ) {
                prop_assume!(network != PRODUCTION_NETWORK);
                let url = resolve_provider_url(&settings(Some(&network), Some(&canister), None)).unwrap();
                prop_assert_eq!(url, format!("http://{canister}.localhost:4943/#authorize"));
            }

            #[test]
            fn prop_production_ignores_everything_else(
                canister in proptest::option::of("[a-z0-9-]{0,30}"),
                host in proptest::option::of("[a-z.]{0,20}"),
            ) {
                let url = resolve_provider_url(&settings(Some("ic"), canister.as_deref(), host.as_deref())).unwrap();
                prop_assert_eq!(url, PRODUCTION_PROVIDER_URL);
            }
        }
    }
}

//! Configuration management for vkd-console
//!
//! Configuration is stored in TOML format.
//!
//! # Configuration File Locations
//!
//! - Unix: `~/.config/vkd/console.toml`
//! - Windows: `%APPDATA%\vkd\console.toml`
//!
//! Command-line flags override file values; `--config` replaces the default
//! location.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use vkd_core::collaborators::{DEFAULT_CONTEXT, DEFAULT_KEY_NAME};
use vkd_core::provider::ProviderSettings;
use vkd_core::KeyScope;

/// Seed for the local development key service ("vkd-console/dev-master").
pub const DEFAULT_DEV_MASTER_SEED: &str = "766b642d636f6e736f6c652f6465762d6d6173746572";
/// Secret key of the local development signer.
pub const DEFAULT_DEV_SECRET_KEY: &str =
    "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

const SECRET_KEY_LEN: usize = 32;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Console configuration
///
/// # Example TOML
///
/// ```toml
/// [keys]
/// key_name = "test_key_1"
/// context = "vkd-console"
///
/// [service]
/// network = "local"  # "ic" | "local" | ...
/// provider_canister_id = ""
/// dev_master_seed = "..."
///
/// [signer]
/// dev_secret_key = "..."
///
/// [output]
/// format = "table"  # "table" | "json" | "quiet"
///
/// [logging]
/// level = "warn"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub keys: KeysConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub signer: SignerConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scope of the derived key the console works under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    #[serde(default = "default_key_name")]
    pub key_name: String,

    /// Derivation context, used as UTF-8 bytes
    #[serde(default = "default_context")]
    pub context: String,
}

fn default_key_name() -> String {
    DEFAULT_KEY_NAME.to_string()
}

fn default_context() -> String {
    DEFAULT_CONTEXT.to_string()
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            key_name: default_key_name(),
            context: default_context(),
        }
    }
}

/// Key service and identity provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Network name: "ic" for production, anything else is local
    #[serde(default = "default_network")]
    pub network: String,

    /// Locally deployed identity provider (empty = none)
    #[serde(default)]
    pub provider_canister_id: String,

    /// Hex seed of the local development key service
    #[serde(default = "default_master_seed")]
    pub dev_master_seed: String,
}

fn default_network() -> String {
    "local".to_string()
}

fn default_master_seed() -> String {
    DEFAULT_DEV_MASTER_SEED.to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            provider_canister_id: String::new(),
            dev_master_seed: default_master_seed(),
        }
    }
}

/// Local development signer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Hex secp256k1 secret key
    #[serde(default = "default_secret_key")]
    pub dev_secret_key: String,
}

fn default_secret_key() -> String {
    DEFAULT_DEV_SECRET_KEY.to_string()
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            dev_secret_key: default_secret_key(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format: "table", "json", "quiet"
    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default)]
    pub verbose: bool,
}

fn default_format() -> String {
    "table".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from custom path or default
    pub fn load_from(custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = custom_path {
            Self::load(path)
        } else {
            Self::load_default()
        }
    }

    /// Platform-specific configuration file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("console.toml"))
    }

    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "vkd", "vkd")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create default configuration file if it doesn't exist
    pub fn create_default_if_missing() -> Result<bool, ConfigError> {
        if let Some(path) = Self::default_path() {
            if !path.exists() {
                Self::default().save(&path)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_formats = ["table", "json", "quiet"];
        if !valid_formats.contains(&self.output.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid output format '{}'. Valid values: {:?}",
                self.output.format, valid_formats
            )));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Valid values: {:?}",
                self.logging.level, valid_levels
            )));
        }

        if self.keys.key_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "key_name must not be empty".to_string(),
            ));
        }

        self.master_seed()?;
        self.signer_secret()?;
        Ok(())
    }

    /// Decoded `service.dev_master_seed`.
    pub fn master_seed(&self) -> Result<Vec<u8>, ConfigError> {
        vkd_crypto::encoding::hex_to_bytes(&self.service.dev_master_seed).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid dev_master_seed: {e}"))
        })
    }

    /// Decoded `signer.dev_secret_key`; exactly 32 bytes.
    pub fn signer_secret(&self) -> Result<Vec<u8>, ConfigError> {
        let secret = vkd_crypto::encoding::hex_to_bytes(&self.signer.dev_secret_key)
            .map_err(|e| ConfigError::ValidationError(format!("Invalid dev_secret_key: {e}")))?;
        if secret.len() != SECRET_KEY_LEN {
            return Err(ConfigError::ValidationError(format!(
                "dev_secret_key must be {SECRET_KEY_LEN} bytes, got {}",
                secret.len()
            )));
        }
        Ok(secret)
    }

    pub fn key_scope(&self) -> KeyScope {
        KeyScope::new(self.keys.key_name.trim(), self.keys.context.as_bytes())
    }

    pub fn provider_settings(&self, host: Option<String>) -> ProviderSettings {
        ProviderSettings {
            network: Some(self.service.network.clone()),
            provider_canister_id: Some(self.service.provider_canister_id.clone()),
            host,
        }
    }

    /// Generate a sample configuration file content
    pub fn sample_toml() -> &'static str {
        r#"# VKD Console Configuration

[keys]
# Name of the derived key and its derivation context
key_name = "test_key_1"
context = "vkd-console"

[service]
# Network: "ic" (production) or a local network name
network = "local"
# Locally deployed identity provider (empty = none)
provider_canister_id = ""
# Hex seed of the local development key service
dev_master_seed = "766b642d636f6e736f6c652f6465762d6d6173746572"

[signer]
# Hex secp256k1 secret key of the local development signer
dev_secret_key = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"

[output]
# Output format: "table", "json", "quiet"
format = "table"
verbose = false

[logging]
# Log level: "error", "warn", "info", "debug", "trace"
level = "warn"
"#
    }
}

/// CLI configuration overrides
///
/// Command-line arguments take precedence over config file values.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub output_format: Option<String>,
    pub verbose: Option<bool>,
    pub debug: Option<bool>,
    pub key_name: Option<String>,
    pub context: Option<String>,
    pub network: Option<String>,
    pub provider_canister_id: Option<String>,
}

impl Config {
    /// Apply CLI overrides to configuration
    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(ref format) = overrides.output_format {
            self.output.format = format.clone();
        }
        if let Some(verbose) = overrides.verbose {
            self.output.verbose = verbose;
        }
        if let Some(true) = overrides.debug {
            self.logging.level = "debug".to_string();
        }
        if let Some(ref key_name) = overrides.key_name {
            self.keys.key_name = key_name.clone();
        }
        if let Some(ref context) = overrides.context {
            self.keys.context = context.clone();
        }
        if let Some(ref network) = overrides.network {
            self.service.network = network.clone();
        }
        if let Some(ref id) = overrides.provider_canister_id {
            self.service.provider_canister_id = id.clone();
        }
        self
    }
}

//! CLI command definitions and argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use vkd_core::VkdError;

use crate::config::{CliOverrides, Config};
use crate::ops::{self, Console};
use crate::output::{OutputFormat, OutputFormatter, Report};
use crate::ExitCode;

/// Default message for `round-trip`
pub const DEFAULT_ROUND_TRIP_MESSAGE: &str = "A broadcast: release 1.2.6 is frozen";

/// VKD Console - identity-bound encryption and recoverable signatures
#[derive(Parser, Debug)]
#[command(name = "vkd-console")]
#[command(version, about = "VKD Console - identity-bound encryption and recoverable signatures")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format [table, json, quiet]; defaults to the config file's
    #[arg(long, global = true)]
    pub output: Option<OutputFormat>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug mode (workflow-level tracing)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file path
    #[arg(long, global = true, env = "VKD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Derived key name
    #[arg(long, global = true)]
    pub key_name: Option<String>,

    /// Derivation context
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Network: "ic" or a local network name
    #[arg(long, global = true, env = "VKD_NETWORK")]
    pub network: Option<String>,

    /// Locally deployed identity provider
    #[arg(long, global = true)]
    pub provider_canister_id: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the derived public key for the configured scope
    PublicKey,
    /// Request key material for a fresh transport key and verify it
    DeriveKey(IdentityArgs),
    /// Show the caller fingerprint the key service observes
    Caller(IdentityArgs),
    /// Encrypt as one identity and decrypt as another
    RoundTrip(RoundTripArgs),
    /// Encrypt a message for a recipient
    Encrypt(EncryptArgs),
    /// Decrypt a hex envelope as the recipient
    Decrypt(DecryptArgs),
    /// Sign a message with the configured signer
    Sign(SignArgs),
    /// Verify a signature against an address
    Verify(VerifyArgs),
    /// Show the signer's address
    Address,
    /// Resolve the identity-provider login URL
    Provider(ProviderArgs),
}

#[derive(Parser, Debug)]
pub struct IdentityArgs {
    /// Identity to act as
    #[arg(long = "as")]
    pub identity: String,
}

#[derive(Parser, Debug)]
pub struct RoundTripArgs {
    #[arg(long, default_value = "alice")]
    pub from: String,

    #[arg(long, default_value = "bob")]
    pub to: String,

    #[arg(default_value = DEFAULT_ROUND_TRIP_MESSAGE)]
    pub message: String,
}

#[derive(Parser, Debug)]
pub struct EncryptArgs {
    /// Sender identity
    #[arg(long = "as")]
    pub sender: String,

    /// Recipient identity
    #[arg(long)]
    pub to: String,

    pub message: String,
}

#[derive(Parser, Debug)]
pub struct DecryptArgs {
    /// Recipient identity
    #[arg(long = "as")]
    pub recipient: String,

    /// Envelope as hex
    pub envelope: String,
}

#[derive(Parser, Debug)]
pub struct SignArgs {
    pub message: String,
}

#[derive(Parser, Debug)]
pub struct VerifyArgs {
    pub message: String,

    /// Signature as hex (64 or 65 bytes)
    pub signature: String,

    /// Expected signer address
    pub address: String,
}

#[derive(Parser, Debug)]
pub struct ProviderArgs {
    /// Host the console is served from
    #[arg(long)]
    pub host: Option<String>,
}

impl Cli {
    /// Flags given on the command line; anything absent keeps the config value.
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            output_format: self.output.map(|format| format.to_string()),
            verbose: self.verbose.then_some(true),
            debug: self.debug.then_some(true),
            key_name: self.key_name.clone(),
            context: self.context.clone(),
            network: self.network.clone(),
            provider_canister_id: self.provider_canister_id.clone(),
        }
    }

    /// Execute the CLI command with a resolved configuration
    pub async fn execute_with_config(self, config: Config) -> anyhow::Result<ExitCode> {
        let format: OutputFormat = config
            .output
            .format
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        let formatter = OutputFormatter::new(format, config.output.verbose);

        if let Commands::Provider(args) = &self.command {
            let settings = config.provider_settings(args.host.clone());
            return Ok(match ops::provider(&settings) {
                Ok(report) => {
                    formatter.emit(&formatter.format_report(&report));
                    ExitCode::Success
                }
                Err(e) => {
                    formatter.emit(&formatter.format_error_with_code(&e, ExitCode::InvalidInput));
                    ExitCode::InvalidInput
                }
            });
        }

        let console = Console::from_config(&config)?;
        formatter.progress(&format!(
            "Using key {} with context {:?}",
            console.scope().key_name,
            config.keys.context
        ));

        let code = match self.command {
            Commands::PublicKey => finish(&formatter, console.public_key().await),
            Commands::DeriveKey(args) => finish(&formatter, console.derive_key(&args.identity).await),
            Commands::Caller(args) => finish(&formatter, console.caller(&args.identity).await),
            Commands::RoundTrip(args) => {
                let result = console.round_trip(&args.from, &args.to, &args.message).await;
                let matched = result.as_ref().is_ok_and(|r| r.matches);
                match finish(&formatter, result) {
                    ExitCode::Success if !matched => ExitCode::GeneralError,
                    code => code,
                }
            }
            Commands::Encrypt(args) => {
                finish(&formatter, console.encrypt(&args.sender, &args.to, &args.message).await)
            }
            Commands::Decrypt(args) => {
                finish(&formatter, console.decrypt(&args.recipient, &args.envelope).await)
            }
            Commands::Sign(args) => finish(&formatter, console.sign(&args.message).await),
            Commands::Verify(args) => {
                let result = ops::verify(&args.message, &args.signature, &args.address);
                let valid = result.as_ref().is_ok_and(|r| r.is_valid());
                match finish(&formatter, result) {
                    ExitCode::Success if !valid => ExitCode::SignatureRejected,
                    code => code,
                }
            }
            Commands::Address => finish(&formatter, console.address().await),
            Commands::Provider(_) => ExitCode::Success,
        };
        Ok(code)
    }
}

/// Print a command result and pick the exit code.
fn finish<R: Report>(formatter: &OutputFormatter, result: Result<R, VkdError>) -> ExitCode {
    match result {
        Ok(report) => {
            formatter.emit(&formatter.format_report(&report));
            ExitCode::Success
        }
        Err(e) => {
            let code = ExitCode::from(&e);
            debug!(kind = e.kind(), code = code.name(), "Command failed");
            let rendered = formatter.format_error_with_code(&e, code);
            if formatter.format() == OutputFormat::Json {
                println!("{rendered}");
            } else if !rendered.is_empty() {
                eprintln!("{rendered}");
            }
            code
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_encrypt() {
        let cli = Cli::try_parse_from([
            "vkd-console", "--output", "json", "encrypt", "--as", "alice", "--to", "bob", "hello",
        ])
        .unwrap();
        assert_eq!(cli.output, Some(OutputFormat::Json));
        match cli.command {
            Commands::Encrypt(args) => {
                assert_eq!(args.sender, "alice");
                assert_eq!(args.to, "bob");
                assert_eq!(args.message, "hello");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_round_trip_defaults() {
        let cli = Cli::try_parse_from(["vkd-console", "round-trip"]).unwrap();
        match cli.command {
            Commands::RoundTrip(args) => {
                assert_eq!(args.from, "alice");
                assert_eq!(args.to, "bob");
                assert_eq!(args.message, DEFAULT_ROUND_TRIP_MESSAGE);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let cli = Cli::try_parse_from([
            "vkd-console", "public-key", "--key-name", "other_key", "--context", "app",
        ])
        .unwrap();
        assert_eq!(cli.key_name.as_deref(), Some("other_key"));
        assert_eq!(cli.context.as_deref(), Some("app"));
    }

    fn json_config() -> Config {
        let mut config = Config::default();
        config.output.format = "json".to_string();
        config
    }

    #[test]
    fn test_config_output_format_kept_without_flag() {
        let cli = Cli::try_parse_from(["vkd-console", "address"]).unwrap();
        assert_eq!(cli.output, None);
        let config = json_config().with_overrides(&cli.overrides());
        assert_eq!(config.output.format, "json");
    }

    #[test]
    fn test_output_flag_overrides_config() {
        let cli = Cli::try_parse_from(["vkd-console", "address", "--output", "quiet"]).unwrap();
        let config = json_config().with_overrides(&cli.overrides());
        assert_eq!(config.output.format, "quiet");
    }

    #[test]
    fn test_unset_flags_leave_config_alone() {
        let cli = Cli::try_parse_from(["vkd-console", "public-key"]).unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.output_format, None);
        assert_eq!(overrides.verbose, None);
        assert_eq!(overrides.key_name, None);

        let config = Config::default().with_overrides(&overrides);
        assert_eq!(config.keys.key_name, Config::default().keys.key_name);
    }

    #[test]
    fn test_verify_requires_three_arguments() {
        assert!(Cli::try_parse_from(["vkd-console", "verify", "msg", "0x00"]).is_err());
    }

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.output.format = "quiet".to_string();
        config
    }

    #[tokio::test]
    async fn test_execute_round_trip() {
        let cli = Cli::try_parse_from(["vkd-console", "round-trip"]).unwrap();
        assert_eq!(cli.execute_with_config(quiet_config()).await.unwrap(), ExitCode::Success);
    }

    #[tokio::test]
    async fn test_execute_verify_bad_signature() {
        let signature = format!("0x{}1b", "11".repeat(64));
        let cli = Cli::try_parse_from([
            "vkd-console",
            "verify",
            "hello",
            signature.as_str(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf",
        ])
        .unwrap();
        assert_eq!(
            cli.execute_with_config(quiet_config()).await.unwrap(),
            ExitCode::SignatureRejected
        );
    }

    #[tokio::test]
    async fn test_execute_decrypt_garbage_is_invalid_input() {
        let cli = Cli::try_parse_from(["vkd-console", "decrypt", "--as", "bob", "zz"]).unwrap();
        assert_eq!(
            cli.execute_with_config(quiet_config()).await.unwrap(),
            ExitCode::InvalidInput
        );
    }

    #[tokio::test]
    async fn test_execute_provider_without_local_provider() {
        let cli = Cli::try_parse_from(["vkd-console", "provider"]).unwrap();
        assert_eq!(
            cli.execute_with_config(quiet_config()).await.unwrap(),
            ExitCode::InvalidInput
        );
    }
}

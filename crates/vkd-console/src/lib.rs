//! VKD Console - operator CLI for the messaging workflows
//!
//! This crate provides a command-line interface for:
//! - Reading the derived public key and requesting key material
//! - Encrypting for a recipient and decrypting as the current caller
//! - Signing messages and verifying them against an address
//! - Resolving the identity-provider login endpoint

pub mod cli;
pub mod config;
pub mod ops;
pub mod output;

pub use cli::Cli;
pub use config::{CliOverrides, Config};
pub use output::{JsonResponse, OutputFormat, OutputFormatter};

use vkd_core::VkdError;

/// Exit codes for CLI operations
///
/// - 0: Success
/// - 1: General error
/// - 2: Not authenticated - a login is required
/// - 3: Binding mismatch - wrong recipient or key epoch
/// - 4: Decryption denied
/// - 5: Invalid input - malformed arguments or data
/// - 6: Signature rejected - invalid or unrecoverable
/// - 7: Service error - a collaborator failed or refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotAuthenticated = 2,
    BindingMismatch = 3,
    DecryptionDenied = 4,
    InvalidInput = 5,
    SignatureRejected = 6,
    ServiceError = 7,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<&VkdError> for ExitCode {
    fn from(err: &VkdError) -> Self {
        match err {
            VkdError::NotAuthenticated => ExitCode::NotAuthenticated,
            VkdError::EpochMismatch | VkdError::RecipientMismatch { .. } => ExitCode::BindingMismatch,
            VkdError::DecryptionDenied => ExitCode::DecryptionDenied,
            VkdError::InvalidEncoding(_)
            | VkdError::FieldTooLarge { .. }
            | VkdError::InvalidEnvelope(_)
            | VkdError::LegacyFormat
            | VkdError::EmptyPlaintext
            | VkdError::InvalidIdentity(_)
            | VkdError::InvalidPublicKeyEncoding(_)
            | VkdError::InvalidAddressFormat(_)
            | VkdError::InvalidSignatureFormat(_) => ExitCode::InvalidInput,
            VkdError::SignatureMismatch
            | VkdError::Unrecoverable
            | VkdError::RecoveryIdNotFound => ExitCode::SignatureRejected,
            VkdError::Service(_) | VkdError::KeyFormat(_) => ExitCode::ServiceError,
            VkdError::Crypto(_) => ExitCode::GeneralError,
        }
    }
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::GeneralError => "GENERAL_ERROR",
            ExitCode::NotAuthenticated => "NOT_AUTHENTICATED",
            ExitCode::BindingMismatch => "BINDING_MISMATCH",
            ExitCode::DecryptionDenied => "DECRYPTION_DENIED",
            ExitCode::InvalidInput => "INVALID_INPUT",
            ExitCode::SignatureRejected => "SIGNATURE_REJECTED",
            ExitCode::ServiceError => "SERVICE_ERROR",
        }
    }

    /// Get a human-readable description of the exit code
    pub fn description(&self) -> &'static str {
        match self {
            ExitCode::Success => "Operation completed successfully",
            ExitCode::GeneralError => "An unspecified error occurred",
            ExitCode::NotAuthenticated => "Log in before using this command",
            ExitCode::BindingMismatch => "Message is bound to another recipient or key",
            ExitCode::DecryptionDenied => "Message could not be decrypted",
            ExitCode::InvalidInput => "Invalid arguments or data provided",
            ExitCode::SignatureRejected => "Signature does not match the address",
            ExitCode::ServiceError => "Key service or signer failed",
        }
    }
}

#[cfg(test)]
mod exit_code_tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success as i32, 0);
        assert_eq!(ExitCode::GeneralError as i32, 1);
        assert_eq!(ExitCode::NotAuthenticated as i32, 2);
        assert_eq!(ExitCode::BindingMismatch as i32, 3);
        assert_eq!(ExitCode::DecryptionDenied as i32, 4);
        assert_eq!(ExitCode::InvalidInput as i32, 5);
        assert_eq!(ExitCode::SignatureRejected as i32, 6);
        assert_eq!(ExitCode::ServiceError as i32, 7);
    }

    #[test]
    fn test_exit_code_names_unique() {
        let codes = [
            ExitCode::Success,
            ExitCode::GeneralError,
            ExitCode::NotAuthenticated,
            ExitCode::BindingMismatch,
            ExitCode::DecryptionDenied,
            ExitCode::InvalidInput,
            ExitCode::SignatureRejected,
            ExitCode::ServiceError,
        ];
        let mut names: Vec<_> = codes.iter().map(|c| c.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), codes.len());
        assert!(codes.iter().all(|c| !c.description().is_empty()));
    }

    #[test]
    fn test_error_kinds_map_to_codes() {
        assert_eq!(ExitCode::from(&VkdError::NotAuthenticated), ExitCode::NotAuthenticated);
        assert_eq!(ExitCode::from(&VkdError::EpochMismatch), ExitCode::BindingMismatch);
        assert_eq!(
            ExitCode::from(&VkdError::recipient_mismatch(&[1], &[2])),
            ExitCode::BindingMismatch
        );
        assert_eq!(ExitCode::from(&VkdError::DecryptionDenied), ExitCode::DecryptionDenied);
        assert_eq!(ExitCode::from(&VkdError::LegacyFormat), ExitCode::InvalidInput);
        assert_eq!(ExitCode::from(&VkdError::EmptyPlaintext), ExitCode::InvalidInput);
        assert_eq!(ExitCode::from(&VkdError::SignatureMismatch), ExitCode::SignatureRejected);
        assert_eq!(ExitCode::from(&VkdError::Unrecoverable), ExitCode::SignatureRejected);
        assert_eq!(
            ExitCode::from(&VkdError::Service("down".into())),
            ExitCode::ServiceError
        );
    }
}

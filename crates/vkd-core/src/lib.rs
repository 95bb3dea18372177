//! VKD Core - identity-bound messaging workflows.
//!
//! This crate implements:
//! - Sender and recipient paths for identity-bound encryption
//! - Recoverable-signature signing and address-only verification
//! - Contracts for the key-derivation service, signer and identity provider
//! - Identity-provider endpoint selection
//! - In-process collaborators for tests and local development

#![forbid(unsafe_code)]

// Workflows
pub mod ibe_flow;
pub mod signing_flow;

// Collaborator contracts
pub mod collaborators;
pub mod provider;

// Supporting modules
pub mod errors;
pub mod harness;

pub use collaborators::KeyScope;
pub use errors::VkdError;

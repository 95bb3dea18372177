#![forbid(unsafe_code)]

//! Cryptographic building blocks for identity-bound messaging.
//!
//! - [`encoding`]: strict hex codec used at every text boundary
//! - [`envelope`]: self-describing container binding a ciphertext to its
//!   recipient fingerprint and derived public key
//! - [`ibe`]: identity-based encryption over BLS12-381 plus transport-key
//!   unwrapping of service-issued key material
//! - [`message`] / [`address`]: personal-message hashing and chain-style
//!   addresses
//! - [`recoverable`]: 65-byte recoverable secp256k1 signatures

pub mod hash;
pub mod encoding;
pub mod envelope;
pub mod ibe;

pub mod message;
pub mod address;
pub mod recoverable;

pub mod utils;

#[cfg(test)]
mod proptests;

pub use address::Address;
pub use envelope::{DecodedEnvelope, Envelope};
pub use recoverable::{RecoverableSignature, VerificationOutcome};

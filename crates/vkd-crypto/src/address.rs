//! Chain-style addresses derived from secp256k1 public keys.

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::VerifyingKey;

use crate::hash::keccak256;

pub const ADDRESS_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("invalid public key encoding: {0}")]
    InvalidPublicKeyEncoding(&'static str),
    #[error("invalid address format: {0:?}")]
    InvalidAddressFormat(String),
}

/// 20-byte address, displayed as `0x` plus 40 lowercase hex digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        Self::from_uncompressed_body(&point.as_bytes()[1..])
    }

    fn from_uncompressed_body(body: &[u8]) -> Self {
        let hash = keccak256(body);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&hash[32 - ADDRESS_LEN..]);
        Self(out)
    }

    /// Parse `0x`-prefixed or bare 40-digit hex, any case.
    ///
    /// Mixed-case checksums are not enforced; the result is always the
    /// canonical lowercase form.
    pub fn parse(text: &str) -> Result<Self, AddressError> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != ADDRESS_LEN * 2 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError::InvalidAddressFormat(text.to_string()));
        }

        let mut out = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(digits, &mut out)
            .map_err(|_| AddressError::InvalidAddressFormat(text.to_string()))?;
        Ok(Self(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Derive the address for a SEC1 public key.
///
/// Accepts a 65-byte uncompressed point (`0x04` tag) or a 33-byte compressed
/// point (`0x02`/`0x03` tag). Both encodings of one point give one address.
pub fn derive_address(public_key: &[u8]) -> Result<Address, AddressError> {
    match (public_key.len(), public_key.first()) {
        (65, Some(0x04)) | (33, Some(0x02 | 0x03)) => {}
        (65, _) | (33, _) => {
            return Err(AddressError::InvalidPublicKeyEncoding("unexpected tag byte"));
        }
        _ => return Err(AddressError::InvalidPublicKeyEncoding("expected 33 or 65 bytes")),
    }

    let key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|_| AddressError::InvalidPublicKeyEncoding("not a point on secp256k1"))?;
    Ok(Address::from_verifying_key(&key))
}

//! Personal-message hashing.
//!
//! hash = keccak256("\x19Ethereum Signed Message:\n" | decimal(len) | message)
//! where `len` is the UTF-8 byte length of the message.

use crate::hash::keccak256_parts;

pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

pub fn personal_message_hash(text: &str) -> [u8; 32] {
    let len = text.len().to_string();
    keccak256_parts(&[
        PERSONAL_MESSAGE_PREFIX.as_bytes(),
        len.as_bytes(),
        text.as_bytes(),
    ])
}

//! Strict hex codec.
//!
//! Input may carry surrounding whitespace and an optional `0x`/`0X` prefix.
//! Output is always lowercase with no prefix or separators.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("invalid encoding: empty hex string")]
    Empty,
    #[error("invalid encoding: odd hex length {0}")]
    OddLength(usize),
    #[error("invalid encoding: non-hex character {ch:?} at position {position}")]
    NonHex { position: usize, ch: char },
}

/// Decode hex text into bytes.
///
/// After trimming and prefix removal the checks run in order: empty, odd
/// length, then non-hex character.
pub fn hex_to_bytes(text: &str) -> Result<Vec<u8>, EncodingError> {
    let trimmed = text.trim();
    let clean = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if clean.is_empty() {
        return Err(EncodingError::Empty);
    }
    if clean.len() % 2 != 0 {
        return Err(EncodingError::OddLength(clean.len()));
    }
    if let Some((position, ch)) = clean.char_indices().find(|(_, c)| !c.is_ascii_hexdigit()) {
        return Err(EncodingError::NonHex { position, ch });
    }

    // Every character was checked above, so decoding cannot fail here.
    hex::decode(clean).map_err(|_| EncodingError::OddLength(clean.len()))
}

/// Encode bytes as lowercase hex. Empty input yields an empty string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

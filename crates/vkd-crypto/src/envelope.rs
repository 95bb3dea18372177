//! Envelope module: the only artifact exchanged between sender and recipient.
//!
//! Wire layout (all lengths in bytes):
//!
//! ```text
//! +--------+-------+--------+-------------+-------------+------------+
//! | marker | fp_len| key_len| fingerprint | derived key | ciphertext |
//! |   4    |  u8   | u16 BE |   fp_len    |   key_len   |    rest    |
//! +--------+-------+--------+-------------+-------------+------------+
//! ```
//!
//! Payloads that do not start with the marker are legacy (pre-envelope raw
//! ciphertext) and decode to [`DecodedEnvelope::Legacy`], never to an error.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::encoding::{bytes_to_hex, hex_to_bytes, EncodingError};

/// Format marker: "VKE" followed by format version 1.
pub const ENVELOPE_MAGIC: [u8; 4] = [0x56, 0x4B, 0x45, 0x01];

/// Marker + fingerprint length + key length.
pub const ENVELOPE_HEADER_LEN: usize = 4 + 1 + 2;

pub const MAX_FINGERPRINT_LEN: usize = u8::MAX as usize;
pub const MAX_DERIVED_KEY_LEN: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("field too large: {field} is {len} bytes, limit {max}")]
    FieldTooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("invalid envelope: {0}")]
    Invalid(&'static str),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// A packaged ciphertext bound to one recipient and one derived public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub recipient_fingerprint: Bytes,
    pub derived_public_key: Bytes,
    pub ciphertext: Bytes,
}

/// Result of parsing arbitrary bytes as an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEnvelope {
    /// No format marker: the whole input is a pre-envelope ciphertext.
    Legacy { ciphertext: Bytes },
    Packaged(Envelope),
}

impl DecodedEnvelope {
    pub fn is_packaged(&self) -> bool {
        matches!(self, DecodedEnvelope::Packaged(_))
    }

    pub fn ciphertext(&self) -> &Bytes {
        match self {
            DecodedEnvelope::Legacy { ciphertext } => ciphertext,
            DecodedEnvelope::Packaged(env) => &env.ciphertext,
        }
    }
}

/// Pack `ciphertext` with its recipient fingerprint and derived public key.
pub fn encode(
    recipient_fingerprint: &[u8],
    derived_public_key: &[u8],
    ciphertext: &[u8],
) -> Result<Bytes, EnvelopeError> {
    if recipient_fingerprint.len() > MAX_FINGERPRINT_LEN {
        return Err(EnvelopeError::FieldTooLarge {
            field: "recipient fingerprint",
            len: recipient_fingerprint.len(),
            max: MAX_FINGERPRINT_LEN,
        });
    }
    if derived_public_key.len() > MAX_DERIVED_KEY_LEN {
        return Err(EnvelopeError::FieldTooLarge {
            field: "derived public key",
            len: derived_public_key.len(),
            max: MAX_DERIVED_KEY_LEN,
        });
    }

    let mut buf = BytesMut::with_capacity(
        ENVELOPE_HEADER_LEN + recipient_fingerprint.len() + derived_public_key.len() + ciphertext.len(),
    );
    buf.put_slice(&ENVELOPE_MAGIC);
    buf.put_u8(recipient_fingerprint.len() as u8);
    buf.put_u16(derived_public_key.len() as u16);
    buf.put_slice(recipient_fingerprint);
    buf.put_slice(derived_public_key);
    buf.put_slice(ciphertext);
    Ok(buf.freeze())
}

/// Parse `data` as an envelope, passing legacy payloads through untouched.
pub fn decode(data: &[u8]) -> Result<DecodedEnvelope, EnvelopeError> {
    if data.len() < ENVELOPE_MAGIC.len() || data[..ENVELOPE_MAGIC.len()] != ENVELOPE_MAGIC {
        return Ok(DecodedEnvelope::Legacy {
            ciphertext: Bytes::copy_from_slice(data),
        });
    }
    if data.len() < ENVELOPE_HEADER_LEN {
        return Err(EnvelopeError::Invalid("truncated header"));
    }

    let mut cur = &data[ENVELOPE_MAGIC.len()..];
    let fp_len = cur.get_u8() as usize;
    let key_len = cur.get_u16() as usize;

    if cur.remaining() < fp_len + key_len {
        return Err(EnvelopeError::Invalid("declared lengths exceed envelope size"));
    }

    let recipient_fingerprint = Bytes::copy_from_slice(&cur[..fp_len]);
    cur.advance(fp_len);
    let derived_public_key = Bytes::copy_from_slice(&cur[..key_len]);
    cur.advance(key_len);
    let ciphertext = Bytes::copy_from_slice(cur);

    Ok(DecodedEnvelope::Packaged(Envelope {
        recipient_fingerprint,
        derived_public_key,
        ciphertext,
    }))
}

impl Envelope {
    pub fn new(
        recipient_fingerprint: impl Into<Bytes>,
        derived_public_key: impl Into<Bytes>,
        ciphertext: impl Into<Bytes>,
    ) -> Self {
        Self {
            recipient_fingerprint: recipient_fingerprint.into(),
            derived_public_key: derived_public_key.into(),
            ciphertext: ciphertext.into(),
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes, EnvelopeError> {
        encode(&self.recipient_fingerprint, &self.derived_public_key, &self.ciphertext)
    }

    /// Hex form for text transports.
    pub fn to_hex(&self) -> Result<String, EnvelopeError> {
        Ok(bytes_to_hex(&self.to_bytes()?))
    }
}

/// Decode an envelope carried as hex text.
pub fn decode_hex(text: &str) -> Result<DecodedEnvelope, EnvelopeError> {
    let bytes = hex_to_bytes(text)?;
    decode(&bytes)
}

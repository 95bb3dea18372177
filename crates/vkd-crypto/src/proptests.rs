#[cfg(test)]
mod tests {
    use proptest::collection::vec;
    use proptest::prelude::*;

    use crate::address::{derive_address, Address};
    use crate::encoding::{bytes_to_hex, hex_to_bytes};
    use crate::envelope::{decode, encode, DecodedEnvelope, EnvelopeError, ENVELOPE_MAGIC};
    use k256::ecdsa::SigningKey;

    proptest! {
        // Empty text is rejected by the decoder, so the law is for non-empty input.
        #[test]
        fn test_hex_round_trip(data in vec(any::<u8>(), 1..256)) {
            let text = bytes_to_hex(&data);
            prop_assert_eq!(text.len(), data.len() * 2);
            prop_assert_eq!(hex_to_bytes(&text).unwrap(), data.clone());
            prop_assert_eq!(hex_to_bytes(&format!(" 0x{} ", text.to_uppercase())).unwrap(), data);
        }

        #[test]
        fn test_envelope_round_trip(
            fp in vec(any::<u8>(), 0..=255),
            key in vec(any::<u8>(), 0..512),
            ct in vec(any::<u8>(), 0..512),
        ) {
            let packed = encode(&fp, &key, &ct).unwrap();
            match decode(&packed).unwrap() {
                DecodedEnvelope::Packaged(env) => {
                    prop_assert_eq!(env.recipient_fingerprint.as_ref(), fp.as_slice());
                    prop_assert_eq!(env.derived_public_key.as_ref(), key.as_slice());
                    prop_assert_eq!(env.ciphertext.as_ref(), ct.as_slice());
                }
                DecodedEnvelope::Legacy { .. } => prop_assert!(false, "decoded as legacy"),
            }
        }

        #[test]
        fn test_unmarked_input_is_legacy(data in vec(any::<u8>(), 0..256)) {
            prop_assume!(data.len() < 4 || data[..4] != ENVELOPE_MAGIC);
            let decoded = decode(&data).unwrap();
            prop_assert!(!decoded.is_packaged());
            prop_assert_eq!(decoded.ciphertext().as_ref(), data.as_slice());
        }

        #[test]
        fn test_truncated_envelope_rejected(
            fp in vec(any::<u8>(), 1..64),
            key in vec(any::<u8>(), 1..128),
            cut in 1usize..64,
        ) {
            let packed = encode(&fp, &key, &[]).unwrap();
            let cut = cut.min(fp.len() + key.len());
            let truncated = &packed[..packed.len() - cut];
            prop_assert_eq!(decode(truncated), Err(EnvelopeError::Invalid("declared lengths exceed envelope size")));
        }

        #[test]
        fn test_address_encoding_independent(secret in any::<[u8; 32]>()) {
            let Ok(key) = SigningKey::from_slice(&secret) else { return Ok(()); };
            let vk = key.verifying_key();
            let compressed = derive_address(vk.to_encoded_point(true).as_bytes()).unwrap();
            let uncompressed = derive_address(vk.to_encoded_point(false).as_bytes()).unwrap();
            prop_assert_eq!(compressed, uncompressed);
            prop_assert_eq!(Address::parse(&compressed.to_string()).unwrap(), compressed);
        }
    }
}

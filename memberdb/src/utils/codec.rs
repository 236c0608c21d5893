//! Wire encoding for 256-bit values.
//!
//! Commitments, roots and sibling hashes travel as 64 hex characters,
//! optionally prefixed with `0x`. Output is always `0x`-prefixed lowercase.

use crate::def::{HEX_HASH_LEN, HEX_PREFIX};
use crate::error::RegistryError;
use crate::utils::hasher::Hash32;

/// Parses a fixed-width hex hash.
///
/// Length and character set are checked before decoding, so a malformed
/// value never reaches any store.
pub fn parse_hash32(s: &str) -> Result<Hash32, RegistryError> {
    let digits = s.strip_prefix(HEX_PREFIX).unwrap_or(s);
    if digits.len() != HEX_HASH_LEN {
        return Err(RegistryError::InvalidFormat(format!(
            "expected {} hex digits, got {}",
            HEX_HASH_LEN,
            digits.len()
        )));
    }
    if !digits.bytes().all(|c| c.is_ascii_hexdigit()) {
        return Err(RegistryError::InvalidFormat(format!(
            "non-hex character in {:?}",
            s
        )));
    }
    let mut out = [0u8; 32];
    hex::decode_to_slice(digits, &mut out)
        .map_err(|e| RegistryError::InvalidFormat(e.to_string()))?;
    Ok(out)
}

/// Formats a hash as `0x` followed by 64 lowercase hex digits.
pub fn hash32_to_hex(h: &Hash32) -> String {
    format!("{}{}", HEX_PREFIX, hex::encode(h))
}

/// Serde adapter for [`Hash32`] fields.
///
/// Human-readable formats (JSON) get the `0x` hex string; binary formats
/// (bincode) get the raw 32 bytes.
pub mod serde_hex32 {
    use super::{hash32_to_hex, parse_hash32};
    use crate::utils::hasher::Hash32;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(h: &Hash32, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hash32_to_hex(h))
        } else {
            serde::Serialize::serialize(h, serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash32, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            parse_hash32(&s).map_err(D::Error::custom)
        } else {
            Hash32::deserialize(deserializer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_prefix() {
        let bare = "aa".repeat(32);
        let prefixed = format!("0x{}", bare);
        assert_eq!(parse_hash32(&bare).unwrap(), [0xaa; 32]);
        assert_eq!(parse_hash32(&prefixed).unwrap(), [0xaa; 32]);
        assert_eq!(hash32_to_hex(&[0xaa; 32]), prefixed);
    }

    #[test]
    fn test_parse_accepts_uppercase_digits() {
        let s = format!("0x{}", "AB".repeat(32));
        assert_eq!(parse_hash32(&s).unwrap(), [0xab; 32]);
        assert_eq!(hash32_to_hex(&[0xab; 32]), format!("0x{}", "ab".repeat(32)));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let cases = [
            String::new(),
            "0x".to_owned(),
            "aa".repeat(31),
            "aa".repeat(33),
            format!("0x{}zz", "aa".repeat(31)),
            format!("0X{}", "aa".repeat(32)),
            format!(" {}", "aa".repeat(32)),
        ];
        for case in cases.iter() {
            match parse_hash32(case) {
                Err(RegistryError::InvalidFormat(_)) => {}
                other => panic!("{:?} parsed as {:?}", case, other),
            }
        }
    }
}

//! FNV-1a content-pack digests.
//!
//! A content digest identifies the parsed form of a content pack. It is a
//! fast cache key and the replay compatibility gate, not a security
//! boundary, so it uses 32-bit FNV-1a over a canonical encoding rather
//! than SHA-256.
//!
//! Unlike the strict [canonical hasher](crate::canonical), values with no
//! JSON rendering (non-finite numbers) are treated as absent: dropped from
//! objects and written as `null` inside arrays.

use serde::{Deserialize, Serialize};

use crate::canonical::{format_number, push_string};
use crate::error::DigestFormatError;
use crate::value::Value;

/// FNV-1a offset basis for 32-bit.
const FNV_OFFSET: u32 = 0x811c_9dc5;
/// FNV-1a prime for 32-bit.
const FNV_PRIME: u32 = 0x0100_0193;

/// Prefix of every digest hash string.
pub const DIGEST_PREFIX: &str = "fnv1a-";

/// Identity of a content pack's parsed contents.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest {
    /// Content schema version the digest was computed for.
    pub version: u32,
    /// `fnv1a-` followed by 8 lowercase hex digits.
    pub hash: String,
}

impl ContentDigest {
    /// Compute the digest of a parsed content document.
    pub fn compute(version: u32, document: &Value) -> Self {
        let mut text = String::new();
        encode_lenient(document, &mut text);
        Self {
            version,
            hash: format!("{DIGEST_PREFIX}{:08x}", fnv1a_32(text.as_bytes())),
        }
    }

    /// Check that `hash` has the `fnv1a-XXXXXXXX` shape.
    pub fn validate(&self) -> Result<(), DigestFormatError> {
        if is_digest_hash(&self.hash) {
            Ok(())
        } else {
            Err(DigestFormatError {
                hash: self.hash.clone(),
            })
        }
    }
}

/// Whether `hash` is `fnv1a-` followed by exactly 8 lowercase hex digits.
pub fn is_digest_hash(hash: &str) -> bool {
    match hash.strip_prefix(DIGEST_PREFIX) {
        Some(hex) => hex.len() == 8 && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')),
        None => false,
    }
}

/// 32-bit FNV-1a over `bytes`.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn encode_lenient(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) if n.is_finite() => out.push_str(&format_number(*n)),
        Value::Number(_) => out.push_str("null"),
        Value::String(s) => push_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                encode_lenient(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .iter()
                .filter(|(_, v)| !matches!(v, Value::Number(n) if !n.is_finite()))
                .map(|(k, _)| k)
                .collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_string(out, key);
                out.push(':');
                encode_lenient(&map[key], out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_matches_reference_vectors() {
        assert_eq!(fnv1a_32(b""), 0x811c9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9cf968);
    }

    #[test]
    fn digest_has_expected_shape() {
        let d = ContentDigest::compute(1, &Value::object([("id", Value::from("pack"))]));
        assert!(d.hash.starts_with("fnv1a-"));
        assert_eq!(d.hash.len(), 14);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn digest_ignores_key_order() {
        let a = Value::object([("a", Value::from(1.0)), ("b", Value::from(2.0))]);
        let b = Value::object([("b", Value::from(2.0)), ("a", Value::from(1.0))]);
        assert_eq!(ContentDigest::compute(1, &a), ContentDigest::compute(1, &b));
    }

    #[test]
    fn non_finite_members_are_treated_as_absent() {
        let with_nan = Value::object([("a", Value::from(1.0)), ("b", Value::from(f64::NAN))]);
        let without = Value::object([("a", Value::from(1.0))]);
        assert_eq!(
            ContentDigest::compute(1, &with_nan),
            ContentDigest::compute(1, &without)
        );
    }

    #[test]
    fn malformed_hashes_are_rejected() {
        for bad in ["fnv1a-123", "fnv1a-ABCDEF12", "sha-00000000", "fnv1a-0000000g"] {
            let d = ContentDigest {
                version: 1,
                hash: bad.into(),
            };
            assert!(d.validate().is_err(), "{bad} should be rejected");
        }
        assert!(is_digest_hash("fnv1a-00000000"));
    }
}

//! Content pack identity.
//!
//! The content compiler lives outside this workspace; the simulation core
//! only needs a pack's identity, its digest, and the parsed document that
//! handlers and systems read balance data from.

use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;
use crate::error::DigestFormatError;
use crate::value::Value;

/// Schema version stamped on digests computed by [`ContentPack::new`].
pub const CONTENT_DIGEST_VERSION: u32 = 1;

/// An immutable, parsed content pack.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentPack {
    /// Pack identifier.
    pub id: String,
    /// Pack release version.
    pub version: String,
    /// Identity of `document`.
    pub digest: ContentDigest,
    /// Parsed pack contents.
    pub document: Value,
}

impl ContentPack {
    /// Build a pack and compute its digest from `document`.
    pub fn new(id: impl Into<String>, version: impl Into<String>, document: Value) -> Self {
        let digest = ContentDigest::compute(CONTENT_DIGEST_VERSION, &document);
        Self {
            id: id.into(),
            version: version.into(),
            digest,
            document,
        }
    }

    /// Build a pack whose digest was computed elsewhere (e.g. by the content
    /// compiler's manifest). The digest shape is still checked.
    pub fn with_digest(
        id: impl Into<String>,
        version: impl Into<String>,
        digest: ContentDigest,
        document: Value,
    ) -> Result<Self, DigestFormatError> {
        digest.validate()?;
        Ok(Self {
            id: id.into(),
            version: version.into(),
            digest,
            document,
        })
    }

    /// The identity triple recorded in replays.
    pub fn identity(&self) -> ContentIdentity {
        ContentIdentity {
            pack_id: self.id.clone(),
            pack_version: self.version.clone(),
            digest: self.digest.clone(),
        }
    }

    /// Whether the stored digest matches a fresh computation over `document`.
    pub fn digest_matches_document(&self) -> bool {
        ContentDigest::compute(self.digest.version, &self.document) == self.digest
    }
}

/// Pack id, version, and digest, as written into replay `content` records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentIdentity {
    /// Pack identifier.
    pub pack_id: String,
    /// Pack release version.
    pub pack_version: String,
    /// Content digest.
    pub digest: ContentDigest,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Value {
        Value::object([(
            "resources",
            Value::Array(vec![Value::object([("id", Value::from("gold"))])]),
        )])
    }

    #[test]
    fn new_computes_matching_digest() {
        let pack = ContentPack::new("demo", "1.0.0", doc());
        assert!(pack.digest_matches_document());
        assert_eq!(pack.digest.version, CONTENT_DIGEST_VERSION);
    }

    #[test]
    fn with_digest_rejects_malformed_hash() {
        let digest = ContentDigest {
            version: 1,
            hash: "md5-nope".into(),
        };
        assert!(ContentPack::with_digest("demo", "1", digest, doc()).is_err());
    }

    #[test]
    fn identity_serializes_camel_case() {
        let pack = ContentPack::new("demo", "1.0.0", doc());
        let json = serde_json::to_string(&pack.identity()).unwrap();
        assert!(json.contains("\"packId\":\"demo\""), "{json}");
        assert!(json.contains("\"packVersion\":\"1.0.0\""), "{json}");
    }
}

//! Core types for the Stepwise deterministic simulation core.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! restricted-JSON [`Value`] model, the strict serde conversion into it,
//! the canonical SHA-256 hasher used for checksums, the FNV-1a content
//! digest, and the [`Command`] type that flows through the queue, the save
//! format, and replays.

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod canonical;
pub mod command;
pub mod content;
pub mod digest;
pub mod error;
pub mod id;
pub mod ser;
pub mod value;

pub use canonical::{
    canonical_encode, canonical_hash, canonical_hash_of, is_canonical_hash, CANONICAL_HASH_LEN,
};
pub use command::{Command, CommandPriority};
pub use content::{ContentIdentity, ContentPack, CONTENT_DIGEST_VERSION};
pub use digest::{is_digest_hash, ContentDigest, DIGEST_PREFIX};
pub use error::{CommandError, DigestFormatError, ValueError};
pub use id::Step;
pub use ser::to_value;
pub use value::{from_value, Map, Value, MAX_SAFE_INTEGER};

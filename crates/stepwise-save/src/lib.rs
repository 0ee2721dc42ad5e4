//! Versioned save format for Stepwise simulations.
//!
//! A [`SaveDocument`] captures everything needed to resume a [`Runtime`]:
//! the consumer's state sections, PRD counters, pending commands, the
//! step counter, and the RNG stream position.
//!
//! - [`serialize_save`] / [`hydrate_save`] convert between a live runtime
//!   and a document
//! - [`load_save`] walks a [`MigrationRegistry`] to bring an old document
//!   up to date before parsing it
//! - [`encode_save`] / [`decode_save`] add a one-byte compression header
//! - [`state_checksum`] hashes the state a document would capture
//!
//! [`Runtime`]: stepwise_engine::Runtime

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod format;
pub mod hydrate;
pub mod migrate;
pub mod serialize;

pub use codec::{decode_save, encode_save, CompressionMethod};
pub use error::SaveError;
pub use format::{validate_saved_at, RuntimeSection, SaveDocument, SAVE_FORMAT_VERSION};
pub use hydrate::{hydrate_save, HydrateOptions};
pub use migrate::{
    detect_version, load_save, LoadOptions, LoadedSave, MigrateFn, Migration, MigrationRegistry,
    MigrationReport,
};
pub use serialize::{serialize_save, state_checksum};

//! Error type for save serialization, hydration, migration, and decoding.

use std::error::Error;
use std::fmt;
use std::io;

use stepwise_core::ValueError;
use stepwise_engine::{QueueRestoreError, RestoreError, RngStateError};

/// Errors from the save pipeline.
#[derive(Debug)]
pub enum SaveError {
    /// A required top-level field is absent.
    MissingField {
        /// The missing field.
        field: &'static str,
    },
    /// A field is present but has the wrong shape.
    InvalidField {
        /// Path of the offending field.
        field: String,
        /// What was wrong with it.
        reason: String,
    },
    /// `savedAt` is not a finite, non-negative timestamp.
    InvalidSavedAt {
        /// The rejected value.
        value: f64,
    },
    /// The document carries no usable `version` field.
    UndetectableVersion,
    /// The document was written by a newer format than the loader targets.
    UnsupportedVersion {
        /// Version found in the document.
        found: u32,
        /// Highest version the loader accepts.
        supported: u32,
    },
    /// No registered migration leads from `from` toward `to`.
    NoMigrationPath {
        /// Version the walk is stuck at.
        from: u32,
        /// Target version.
        to: u32,
    },
    /// A migration returned a document whose version is not its declared target.
    MigrationDidNotAdvance {
        /// Source version of the migration.
        from: u32,
        /// Version the migration promised to produce.
        expected: u32,
        /// Version found afterwards, if any.
        found: Option<u32>,
    },
    /// Two migrations share a source version.
    DuplicateMigration {
        /// The repeated source version.
        from_version: u32,
    },
    /// A migration's target version does not exceed its source version.
    NonAdvancingMigration {
        /// Source version.
        from: u32,
        /// Declared target version.
        to: u32,
    },
    /// A migration function rejected its input.
    MigrationFailed {
        /// Source version of the failing migration.
        from: u32,
        /// Why it failed.
        reason: String,
    },
    /// The save targets a different format version than this build hydrates.
    VersionMismatch {
        /// Version this build hydrates.
        expected: u32,
        /// Version in the document.
        found: u32,
    },
    /// Encoded bytes were empty.
    EmptyInput,
    /// The compression header byte is not a known method.
    UnknownCompression {
        /// The header byte.
        byte: u8,
    },
    /// Compressing or decompressing failed.
    Compression(io::Error),
    /// JSON encoding or decoding failed.
    Json(serde_json::Error),
    /// Captured state is not representable as restricted JSON.
    Value(ValueError),
    /// The command queue snapshot is invalid.
    Queue(QueueRestoreError),
    /// The RNG or PRD snapshot is invalid.
    Rng(RngStateError),
    /// An external state section refused to restore.
    Restore(RestoreError),
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "save is missing required field '{field}'"),
            Self::InvalidField { field, reason } => {
                write!(f, "save field '{field}' is invalid: {reason}")
            }
            Self::InvalidSavedAt { value } => write!(
                f,
                "savedAt must be a finite, non-negative timestamp (got {value})"
            ),
            Self::UndetectableVersion => write!(f, "cannot detect save version"),
            Self::UnsupportedVersion { found, supported } => write!(
                f,
                "save version {found} is newer than supported version {supported}"
            ),
            Self::NoMigrationPath { from, to } => {
                write!(f, "no migration path from save version {from} to {to}")
            }
            Self::MigrationDidNotAdvance {
                from,
                expected,
                found,
            } => match found {
                Some(found) => write!(
                    f,
                    "migration from version {from} did not set the expected version \
                     {expected} (found {found})"
                ),
                None => write!(
                    f,
                    "migration from version {from} did not set the expected version \
                     {expected} (version missing)"
                ),
            },
            Self::DuplicateMigration { from_version } => write!(
                f,
                "duplicate migration registered from version {from_version}"
            ),
            Self::NonAdvancingMigration { from, to } => write!(
                f,
                "migration from version {from} to {to} does not advance the version"
            ),
            Self::MigrationFailed { from, reason } => {
                write!(f, "migration from version {from} failed: {reason}")
            }
            Self::VersionMismatch { expected, found } => write!(
                f,
                "cannot hydrate save version {found}; expected version {expected}"
            ),
            Self::EmptyInput => write!(f, "encoded save is empty"),
            Self::UnknownCompression { byte } => {
                write!(f, "unknown save compression header byte {byte}")
            }
            Self::Compression(e) => write!(f, "save compression error: {e}"),
            Self::Json(e) => write!(f, "save JSON error: {e}"),
            Self::Value(e) => write!(f, "save state is not recordable: {e}"),
            Self::Queue(e) => write!(f, "invalid commandQueue: {e}"),
            Self::Rng(e) => write!(f, "invalid rng state: {e}"),
            Self::Restore(e) => write!(f, "{e}"),
        }
    }
}

impl Error for SaveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Compression(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Value(e) => Some(e),
            Self::Queue(e) => Some(e),
            Self::Rng(e) => Some(e),
            Self::Restore(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SaveError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<ValueError> for SaveError {
    fn from(e: ValueError) -> Self {
        Self::Value(e)
    }
}

impl From<QueueRestoreError> for SaveError {
    fn from(e: QueueRestoreError) -> Self {
        Self::Queue(e)
    }
}

impl From<RngStateError> for SaveError {
    fn from(e: RngStateError) -> Self {
        Self::Rng(e)
    }
}

impl From<RestoreError> for SaveError {
    fn from(e: RestoreError) -> Self {
        Self::Restore(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_missing_field() {
        let err = SaveError::MissingField {
            field: "commandQueue",
        };
        assert_eq!(
            err.to_string(),
            "save is missing required field 'commandQueue'"
        );
    }

    #[test]
    fn display_migration_did_not_advance() {
        let err = SaveError::MigrationDidNotAdvance {
            from: 0,
            expected: 1,
            found: Some(0),
        };
        let msg = err.to_string();
        assert!(msg.contains("did not set the expected version"));
        assert!(msg.contains("found 0"));
    }

    #[test]
    fn display_unknown_compression() {
        let err = SaveError::UnknownCompression { byte: 7 };
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn source_chains_wrapped_errors() {
        let err = SaveError::from(RestoreError::new("resources", "bad"));
        assert!(err.source().is_some());
        assert!(SaveError::EmptyInput.source().is_none());
    }
}

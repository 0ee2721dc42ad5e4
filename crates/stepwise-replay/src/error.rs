//! Error types for replay recording, decoding, and verification.

use std::error::Error;
use std::fmt;

use stepwise_core::{CommandError, ContentDigest, Step, ValueError};
use stepwise_engine::{ConfigError, StepError};
use stepwise_save::SaveError;

use crate::runner::FrameMismatch;
use crate::types::FrameKind;

/// Errors that can occur while recording, encoding, decoding, or
/// re-running a replay.
#[derive(Debug)]
pub enum ReplayError {
    /// A line is not a well-formed record.
    Decode {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        reason: String,
    },
    /// A record appeared out of the fixed order.
    UnexpectedRecord {
        /// 1-based line number.
        line: usize,
        /// What was allowed at this point.
        expected: &'static str,
        /// Record type found.
        found: String,
    },
    /// The input ended before the `end` record.
    Truncated {
        /// Record type still expected.
        expected: &'static str,
    },
    /// The header names a different file type.
    UnsupportedFileType {
        /// The file type found.
        found: String,
    },
    /// The header names a schema version this build cannot read.
    UnsupportedSchemaVersion {
        /// The version found.
        found: u32,
    },
    /// A content digest does not have the `fnv1a-XXXXXXXX` shape.
    MalformedDigest {
        /// The rejected hash.
        hash: String,
    },
    /// A checksum or frame hash is not a canonical SHA-256 hex digest.
    MalformedChecksum {
        /// Which field carried it.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
    /// A `commands` or `frames` chunk arrived out of sequence.
    ChunkIndex {
        /// 1-based line number.
        line: usize,
        /// Index expected next.
        expected: u32,
        /// Index found.
        found: u32,
    },
    /// Commands were given both inline in `sim` and as chunks.
    InlineAndChunkedCommands {
        /// 1-based line number of the first chunk.
        line: usize,
    },
    /// The `end` record's command count disagrees with the decoded commands.
    CommandCountMismatch {
        /// Count declared by `end`.
        declared: u64,
        /// Commands actually decoded.
        decoded: u64,
    },
    /// The `end` record disagrees with the `sim` record.
    EndMismatch {
        /// The disagreeing field.
        field: &'static str,
    },
    /// A decode limit was exceeded.
    LimitExceeded {
        /// Name of the limit.
        limit: &'static str,
        /// Its configured maximum.
        max: usize,
    },
    /// The replay document is internally inconsistent.
    InvalidReplay {
        /// What is wrong.
        reason: String,
    },
    /// Encoder options are unusable.
    InvalidOptions {
        /// What is wrong.
        reason: String,
    },
    /// A recorded command failed validation.
    InvalidCommand {
        /// Index of the command in the recording.
        index: usize,
        /// The validation failure.
        reason: CommandError,
    },
    /// The live content pack is not the one the replay was recorded against.
    ContentDigestMismatch {
        /// Digest in the replay.
        recorded: ContentDigest,
        /// Digest of the supplied pack.
        live: ContentDigest,
    },
    /// The reconstructed simulation does not agree with the replay.
    SnapshotMismatch {
        /// The disagreeing property.
        field: &'static str,
        /// Value the replay declares.
        expected: String,
        /// Value found.
        found: String,
    },
    /// A recorded command is due before the replay's start step.
    CommandBeforeStartStep {
        /// Index of the command in the recording.
        index: usize,
        /// The command's step.
        step: Step,
        /// The replay's start step.
        start_step: Step,
    },
    /// The restored queue refused a recorded command.
    CommandRejected {
        /// Index of the command in the recording.
        index: usize,
        /// The command's type.
        command_type: String,
        /// The command's step.
        step: Step,
    },
    /// The recomputed end-state checksum differs from the recorded one.
    ChecksumMismatch {
        /// Step at which the checksum was taken.
        end_step: Step,
        /// Checksum in the replay.
        recorded: String,
        /// Checksum of the replayed state.
        computed: String,
    },
    /// A recorded frame hash differs from the recomputed one.
    FrameMismatch(FrameMismatch),
    /// Frames of `kind` exist but no callback was supplied to rebuild them.
    MissingFrameCallback {
        /// The frame kind.
        kind: FrameKind,
    },
    /// Recorded frames cannot be matched one-to-one with replayed steps.
    FrameSequence {
        /// Index of the offending frame.
        index: usize,
        /// What is wrong.
        reason: String,
    },
    /// A value could not be represented as restricted JSON.
    Value(ValueError),
    /// The runtime factory rejected the reconstructed config.
    Config(ConfigError),
    /// A replayed step failed.
    Step(StepError),
    /// Capturing or hydrating the snapshot failed.
    Save(SaveError),
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode { line, reason } => write!(f, "line {line}: {reason}"),
            Self::UnexpectedRecord {
                line,
                expected,
                found,
            } => write!(f, "line {line}: expected {expected}, found '{found}' record"),
            Self::Truncated { expected } => {
                write!(f, "replay ended before the {expected} record")
            }
            Self::UnsupportedFileType { found } => {
                write!(f, "unsupported replay file type '{found}'")
            }
            Self::UnsupportedSchemaVersion { found } => {
                write!(f, "unsupported replay schema version {found}")
            }
            Self::MalformedDigest { hash } => write!(f, "malformed content digest '{hash}'"),
            Self::MalformedChecksum { field, value } => {
                write!(f, "malformed {field} '{value}'")
            }
            Self::ChunkIndex {
                line,
                expected,
                found,
            } => write!(
                f,
                "line {line}: expected chunkIndex {expected}, found {found}"
            ),
            Self::InlineAndChunkedCommands { line } => write!(
                f,
                "line {line}: commands chunk after sim record with inline commands"
            ),
            Self::CommandCountMismatch { declared, decoded } => write!(
                f,
                "end record declares {declared} commands but {decoded} were decoded"
            ),
            Self::EndMismatch { field } => {
                write!(f, "end record {field} disagrees with sim record")
            }
            Self::LimitExceeded { limit, max } => {
                write!(f, "replay exceeds {limit} ({max})")
            }
            Self::InvalidReplay { reason } => write!(f, "invalid replay: {reason}"),
            Self::InvalidOptions { reason } => write!(f, "invalid options: {reason}"),
            Self::InvalidCommand { index, reason } => {
                write!(f, "recorded command {index} is invalid: {reason}")
            }
            Self::ContentDigestMismatch { recorded, live } => write!(
                f,
                "content digest mismatch: replay={}, live={}",
                recorded.hash, live.hash
            ),
            Self::SnapshotMismatch {
                field,
                expected,
                found,
            } => write!(
                f,
                "replay snapshot mismatch on {field}: expected {expected}, found {found}"
            ),
            Self::CommandBeforeStartStep {
                index,
                step,
                start_step,
            } => write!(
                f,
                "recorded command {index} is due at step {step}, before start step {start_step}"
            ),
            Self::CommandRejected {
                index,
                command_type,
                step,
            } => write!(
                f,
                "Replay command rejected: command {index} ('{command_type}' at step {step}) \
                 did not fit the restored queue"
            ),
            Self::ChecksumMismatch {
                end_step,
                recorded,
                computed,
            } => write!(
                f,
                "checksum mismatch at step {end_step}: recorded={recorded}, computed={computed}"
            ),
            Self::FrameMismatch(mismatch) => write!(f, "frame hash mismatch: {mismatch}"),
            Self::MissingFrameCallback { kind } => {
                write!(f, "replay has {kind} frames but no builder was supplied")
            }
            Self::FrameSequence { index, reason } => write!(f, "frame {index}: {reason}"),
            Self::Value(e) => write!(f, "{e}"),
            Self::Config(e) => write!(f, "cannot rebuild runtime: {e}"),
            Self::Step(e) => write!(f, "replayed step failed: {e}"),
            Self::Save(e) => write!(f, "{e}"),
        }
    }
}

impl Error for ReplayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidCommand { reason, .. } => Some(reason),
            Self::Value(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Step(e) => Some(e),
            Self::Save(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValueError> for ReplayError {
    fn from(e: ValueError) -> Self {
        Self::Value(e)
    }
}

impl From<ConfigError> for ReplayError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StepError> for ReplayError {
    fn from(e: StepError) -> Self {
        Self::Step(e)
    }
}

impl From<SaveError> for ReplayError {
    fn from(e: SaveError) -> Self {
        Self::Save(e)
    }
}

impl From<FrameMismatch> for ReplayError {
    fn from(m: FrameMismatch) -> Self {
        Self::FrameMismatch(m)
    }
}

//! Replay document types.
//!
//! A [`SimReplay`] is the decoded form of a replay: every singleton record
//! plus the folded command list and the recorded visual frames. On the
//! wire each part is one JSON line (see [`crate::codec`]).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use stepwise_core::{is_canonical_hash, Command, ContentIdentity, Step};
use stepwise_engine::DEFAULT_MAX_QUEUE_SIZE;
use stepwise_save::SaveDocument;

use crate::error::ReplayError;

/// `fileType` of every replay header.
pub const REPLAY_FILE_TYPE: &str = "stepwise-sim-replay";

/// Current replay schema version.
pub const REPLAY_SCHEMA_VERSION: u32 = 1;

/// Recording metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayHeader {
    /// Always [`REPLAY_FILE_TYPE`].
    pub file_type: String,
    /// Always [`REPLAY_SCHEMA_VERSION`] for replays written by this build.
    pub schema_version: u32,
    /// Wall-clock export time in milliseconds.
    pub recorded_at: f64,
    /// Version of the engine that recorded the replay.
    pub engine_version: String,
}

impl ReplayHeader {
    /// A header for a replay exported now by this build.
    pub fn new(recorded_at: f64) -> Self {
        Self {
            file_type: REPLAY_FILE_TYPE.to_owned(),
            schema_version: REPLAY_SCHEMA_VERSION,
            recorded_at,
            engine_version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

/// Optional asset manifest identity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetsRecord {
    /// Hash of the asset manifest the recording ran with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_hash: Option<String>,
}

/// Everything needed to rebuild and re-run the simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimRecord {
    /// Feature wiring flags of the recorded runtime.
    #[serde(default)]
    pub wiring: BTreeMap<String, bool>,
    /// Step duration.
    pub step_size_ms: f64,
    /// Command queue capacity of the recorded runtime. Replays written
    /// before this field existed used the default capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Step at which the initial snapshot was taken.
    pub start_step: Step,
    /// Step the recording ended at.
    pub end_step: Step,
    /// State at `start_step`.
    pub initial_snapshot: SaveDocument,
    /// Canonical checksum of the live state at `end_step`.
    pub checksum: String,
    /// Every accepted command, in acceptance order. Omitted on the wire
    /// when commands travel in chunks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,
}

fn default_queue_capacity() -> usize {
    DEFAULT_MAX_QUEUE_SIZE
}

/// Which visual output a frame hash covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameKind {
    /// A UI view model.
    ViewModel,
    /// A render command buffer.
    RenderCommandBuffer,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ViewModel => f.write_str("viewModel"),
            Self::RenderCommandBuffer => f.write_str("renderCommandBuffer"),
        }
    }
}

/// One recorded visual-output hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    /// What was hashed.
    pub kind: FrameKind,
    /// Step the output was built at (steps executed so far).
    pub step: Step,
    /// Renderer frame counter. Required for render command buffers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_frame: Option<u64>,
    /// Canonical hash of the output.
    pub hash: String,
}

/// Terminal record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayEnd {
    /// Must equal `sim.end_step`.
    pub end_step: Step,
    /// Must equal `sim.checksum`.
    pub checksum: String,
    /// Number of recorded commands.
    pub command_count: u64,
}

/// A decoded replay.
#[derive(Clone, Debug, PartialEq)]
pub struct SimReplay {
    /// Recording metadata.
    pub header: ReplayHeader,
    /// Content pack identity and digest.
    pub content: ContentIdentity,
    /// Asset manifest identity.
    pub assets: AssetsRecord,
    /// Simulation block with the full command list.
    pub sim: SimRecord,
    /// Recorded visual frames, in recording order.
    pub frames: Vec<FrameRecord>,
    /// Terminal record.
    pub end: ReplayEnd,
}

impl SimReplay {
    /// Check the cross-record invariants: supported header, well-formed
    /// digest and hashes, a sane step range, and an `end` record that
    /// agrees with `sim`.
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.header.file_type != REPLAY_FILE_TYPE {
            return Err(ReplayError::UnsupportedFileType {
                found: self.header.file_type.clone(),
            });
        }
        if self.header.schema_version != REPLAY_SCHEMA_VERSION {
            return Err(ReplayError::UnsupportedSchemaVersion {
                found: self.header.schema_version,
            });
        }
        self.content
            .digest
            .validate()
            .map_err(|e| ReplayError::MalformedDigest { hash: e.hash })?;
        check_hash("sim.checksum", &self.sim.checksum)?;
        check_hash("end.checksum", &self.end.checksum)?;
        for frame in &self.frames {
            check_hash("frame hash", &frame.hash)?;
        }

        let sim = &self.sim;
        if !(sim.step_size_ms.is_finite() && sim.step_size_ms > 0.0) {
            return Err(ReplayError::InvalidReplay {
                reason: format!("stepSizeMs must be positive (got {})", sim.step_size_ms),
            });
        }
        if sim.queue_capacity == 0 {
            return Err(ReplayError::InvalidReplay {
                reason: "queueCapacity must be at least 1".to_owned(),
            });
        }
        if sim.start_step > sim.end_step {
            return Err(ReplayError::InvalidReplay {
                reason: format!(
                    "startStep {} is after endStep {}",
                    sim.start_step, sim.end_step
                ),
            });
        }
        if self.end.end_step != sim.end_step {
            return Err(ReplayError::EndMismatch { field: "endStep" });
        }
        if self.end.checksum != sim.checksum {
            return Err(ReplayError::EndMismatch { field: "checksum" });
        }
        let decoded = sim.commands.len() as u64;
        if self.end.command_count != decoded {
            return Err(ReplayError::CommandCountMismatch {
                declared: self.end.command_count,
                decoded,
            });
        }
        Ok(())
    }
}

fn check_hash(field: &'static str, value: &str) -> Result<(), ReplayError> {
    if is_canonical_hash(value) {
        Ok(())
    } else {
        Err(ReplayError::MalformedChecksum {
            field,
            value: value.to_owned(),
        })
    }
}

/// A chunk of commands on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommandsChunk {
    pub chunk_index: u32,
    pub commands: Vec<Command>,
}

/// A chunk of frames on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FramesChunk {
    pub chunk_index: u32,
    pub frames: Vec<FrameRecord>,
}

/// One line of the wire format, discriminated by `type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub(crate) enum ReplayRecord {
    Header(ReplayHeader),
    Content(ContentIdentity),
    Assets(AssetsRecord),
    Sim(Box<SimRecord>),
    Commands(CommandsChunk),
    Frames(FramesChunk),
    End(ReplayEnd),
}

impl ReplayRecord {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Header(_) => "header",
            Self::Content(_) => "content",
            Self::Assets(_) => "assets",
            Self::Sim(_) => "sim",
            Self::Commands(_) => "commands",
            Self::Frames(_) => "frames",
            Self::End(_) => "end",
        }
    }
}

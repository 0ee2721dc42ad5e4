//! JSON-lines wire format for replays.
//!
//! One JSON object per line, each with a `type` field, in this order:
//!
//! ```text
//! header
//! content
//! assets
//! sim                      (commands inline, or omitted when chunked)
//! commands  chunkIndex=0   (zero or more, consecutive indices)
//! frames    chunkIndex=0   (zero or more, consecutive indices)
//! end
//! ```
//!
//! Chunking bounds the size of a single line for long recordings. The
//! decoder folds `commands` chunks back into `sim.commands`, so chunked
//! and inline encodings decode to the same [`SimReplay`].

use tracing::debug;

use stepwise_core::{to_value, Command, ContentIdentity};

use crate::error::ReplayError;
use crate::types::{
    AssetsRecord, CommandsChunk, FrameRecord, FramesChunk, ReplayEnd, ReplayHeader, ReplayRecord,
    SimRecord, SimReplay, REPLAY_FILE_TYPE, REPLAY_SCHEMA_VERSION,
};

/// Encoder options.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    /// Commands per `commands` chunk; `None` writes them inline in `sim`.
    /// Default: `Some(1000)`.
    pub max_commands_per_chunk: Option<usize>,
    /// Frames per `frames` chunk; `None` writes a single chunk.
    /// Default: `Some(1000)`.
    pub max_frames_per_chunk: Option<usize>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            max_commands_per_chunk: Some(1_000),
            max_frames_per_chunk: Some(1_000),
        }
    }
}

impl EncodeOptions {
    /// Check that chunk sizes are non-zero.
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.max_commands_per_chunk == Some(0) {
            return Err(ReplayError::InvalidOptions {
                reason: "max_commands_per_chunk must be at least 1".into(),
            });
        }
        if self.max_frames_per_chunk == Some(0) {
            return Err(ReplayError::InvalidOptions {
                reason: "max_frames_per_chunk must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Guards against unbounded input.
#[derive(Clone, Debug)]
pub struct DecodeLimits {
    /// Maximum number of lines. Default: 100 000.
    pub max_lines: usize,
    /// Maximum number of commands across `sim` and all chunks.
    /// Default: 1 000 000.
    pub max_commands: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_lines: 100_000,
            max_commands: 1_000_000,
        }
    }
}

// ── encode ─────────────────────────────────────────────────────────

/// Encode `replay` as JSON lines, with a trailing newline.
///
/// The replay is validated first, and every record goes through the
/// strict serializer, so the output always decodes.
pub fn encode_sim_replay_json_lines(
    replay: &SimReplay,
    options: &EncodeOptions,
) -> Result<String, ReplayError> {
    options.validate()?;
    replay.validate()?;

    let mut out = String::new();
    push_record(&mut out, &ReplayRecord::Header(replay.header.clone()))?;
    push_record(&mut out, &ReplayRecord::Content(replay.content.clone()))?;
    push_record(&mut out, &ReplayRecord::Assets(replay.assets.clone()))?;

    let sim = &replay.sim;
    match options.max_commands_per_chunk {
        None => push_record(&mut out, &ReplayRecord::Sim(Box::new(sim.clone())))?,
        Some(per_chunk) => {
            let header = SimRecord {
                wiring: sim.wiring.clone(),
                step_size_ms: sim.step_size_ms,
                queue_capacity: sim.queue_capacity,
                start_step: sim.start_step,
                end_step: sim.end_step,
                initial_snapshot: sim.initial_snapshot.clone(),
                checksum: sim.checksum.clone(),
                commands: Vec::new(),
            };
            push_record(&mut out, &ReplayRecord::Sim(Box::new(header)))?;
            for (index, commands) in sim.commands.chunks(per_chunk).enumerate() {
                let chunk = CommandsChunk {
                    chunk_index: chunk_index(index)?,
                    commands: commands.to_vec(),
                };
                push_record(&mut out, &ReplayRecord::Commands(chunk))?;
            }
        }
    }

    if !replay.frames.is_empty() {
        let per_chunk = options
            .max_frames_per_chunk
            .unwrap_or(replay.frames.len());
        for (index, frames) in replay.frames.chunks(per_chunk).enumerate() {
            let chunk = FramesChunk {
                chunk_index: chunk_index(index)?,
                frames: frames.to_vec(),
            };
            push_record(&mut out, &ReplayRecord::Frames(chunk))?;
        }
    }

    push_record(&mut out, &ReplayRecord::End(replay.end.clone()))?;
    Ok(out)
}

fn push_record(out: &mut String, record: &ReplayRecord) -> Result<(), ReplayError> {
    let line = to_value(record)?.to_json_string()?;
    out.push_str(&line);
    out.push('\n');
    Ok(())
}

fn chunk_index(index: usize) -> Result<u32, ReplayError> {
    u32::try_from(index).map_err(|_| ReplayError::InvalidOptions {
        reason: format!("chunk index {index} exceeds u32"),
    })
}

// ── decode ─────────────────────────────────────────────────────────

/// Where the decoder is in the fixed record order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Header,
    Content,
    Assets,
    Sim,
    Commands,
    Frames,
    Done,
}

impl Stage {
    fn expected(self) -> &'static str {
        match self {
            Self::Header => "a header record",
            Self::Content => "a content record",
            Self::Assets => "an assets record",
            Self::Sim => "a sim record",
            Self::Commands => "a commands, frames or end record",
            Self::Frames => "a frames or end record",
            Self::Done => "end of input",
        }
    }
}

/// Decode a JSON-lines replay.
///
/// Enforces the record order, the header's file type and schema version,
/// consecutive chunk indices, the `end` record's cross-checks, and
/// `limits`.
pub fn decode_sim_replay_json_lines(
    text: &str,
    limits: &DecodeLimits,
) -> Result<SimReplay, ReplayError> {
    let mut stage = Stage::Header;
    let mut header: Option<ReplayHeader> = None;
    let mut content: Option<ContentIdentity> = None;
    let mut assets: Option<AssetsRecord> = None;
    let mut sim: Option<SimRecord> = None;
    let mut chunked: Vec<Command> = Vec::new();
    let mut command_chunks = 0u32;
    let mut frames: Vec<FrameRecord> = Vec::new();
    let mut frame_chunks = 0u32;
    let mut end: Option<ReplayEnd> = None;

    for (index, text_line) in text.lines().enumerate() {
        let line = index + 1;
        if line > limits.max_lines {
            return Err(ReplayError::LimitExceeded {
                limit: "maxLines",
                max: limits.max_lines,
            });
        }
        if text_line.trim().is_empty() {
            return Err(ReplayError::Decode {
                line,
                reason: "empty line".into(),
            });
        }
        let record: ReplayRecord =
            serde_json::from_str(text_line).map_err(|e| ReplayError::Decode {
                line,
                reason: e.to_string(),
            })?;

        match (stage, record) {
            (Stage::Header, ReplayRecord::Header(h)) => {
                if h.file_type != REPLAY_FILE_TYPE {
                    return Err(ReplayError::UnsupportedFileType { found: h.file_type });
                }
                if h.schema_version != REPLAY_SCHEMA_VERSION {
                    return Err(ReplayError::UnsupportedSchemaVersion {
                        found: h.schema_version,
                    });
                }
                header = Some(h);
                stage = Stage::Content;
            }
            (Stage::Content, ReplayRecord::Content(c)) => {
                c.digest
                    .validate()
                    .map_err(|e| ReplayError::MalformedDigest { hash: e.hash })?;
                content = Some(c);
                stage = Stage::Assets;
            }
            (Stage::Assets, ReplayRecord::Assets(a)) => {
                assets = Some(a);
                stage = Stage::Sim;
            }
            (Stage::Sim, ReplayRecord::Sim(s)) => {
                check_command_limit(s.commands.len(), limits)?;
                sim = Some(*s);
                stage = Stage::Commands;
            }
            (Stage::Commands, ReplayRecord::Commands(chunk)) => {
                let inline = sim.as_ref().map_or(0, |s| s.commands.len());
                if inline > 0 {
                    return Err(ReplayError::InlineAndChunkedCommands { line });
                }
                if chunk.chunk_index != command_chunks {
                    return Err(ReplayError::ChunkIndex {
                        line,
                        expected: command_chunks,
                        found: chunk.chunk_index,
                    });
                }
                command_chunks += 1;
                check_command_limit(chunked.len() + chunk.commands.len(), limits)?;
                chunked.extend(chunk.commands);
            }
            (Stage::Commands | Stage::Frames, ReplayRecord::Frames(chunk)) => {
                if chunk.chunk_index != frame_chunks {
                    return Err(ReplayError::ChunkIndex {
                        line,
                        expected: frame_chunks,
                        found: chunk.chunk_index,
                    });
                }
                frame_chunks += 1;
                frames.extend(chunk.frames);
                stage = Stage::Frames;
            }
            (Stage::Commands | Stage::Frames, ReplayRecord::End(e)) => {
                end = Some(e);
                stage = Stage::Done;
            }
            (stage, record) => {
                return Err(ReplayError::UnexpectedRecord {
                    line,
                    expected: stage.expected(),
                    found: record.name().to_owned(),
                });
            }
        }
    }

    let (Some(header), Some(content), Some(assets), Some(mut sim), Some(end)) =
        (header, content, assets, sim, end)
    else {
        let expected = match stage {
            Stage::Commands | Stage::Frames => "end",
            Stage::Header => "header",
            Stage::Content => "content",
            Stage::Assets => "assets",
            Stage::Sim => "sim",
            Stage::Done => "end",
        };
        return Err(ReplayError::Truncated { expected });
    };

    if command_chunks > 0 {
        sim.commands = chunked;
    }
    let replay = SimReplay {
        header,
        content,
        assets,
        sim,
        frames,
        end,
    };
    replay.validate()?;
    debug!(
        commands = replay.sim.commands.len(),
        command_chunks,
        frames = replay.frames.len(),
        start_step = replay.sim.start_step.0,
        end_step = replay.sim.end_step.0,
        "decoded replay"
    );
    Ok(replay)
}

fn check_command_limit(count: usize, limits: &DecodeLimits) -> Result<(), ReplayError> {
    if count > limits.max_commands {
        Err(ReplayError::LimitExceeded {
            limit: "maxCommands",
            max: limits.max_commands,
        })
    } else {
        Ok(())
    }
}

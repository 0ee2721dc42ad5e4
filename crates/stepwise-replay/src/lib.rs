//! Deterministic replay recording and verification for Stepwise.
//!
//! A replay is a newline-delimited JSON file: a header, the content
//! identity, an asset record, the simulation block (initial snapshot,
//! step range, end checksum), optional command and frame chunks, and a
//! terminal `end` record.
//!
//! - [`RecordingSession`] records every accepted command while a runtime
//!   runs, and [`ReplayRecorder::export`] turns the recording into a
//!   [`SimReplay`]
//! - [`encode_sim_replay_json_lines`] / [`decode_sim_replay_json_lines`]
//!   convert to and from the wire format
//! - [`run_sim_replay`] re-runs a replay and verifies its end checksum;
//!   [`run_combined_replay`] also rebuilds and matches recorded frames

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod recorder;
pub mod runner;
pub mod types;

pub use codec::{
    decode_sim_replay_json_lines, encode_sim_replay_json_lines, DecodeLimits, EncodeOptions,
};
pub use error::ReplayError;
pub use recorder::{ExportOptions, RecordingSession, ReplayRecorder};
pub use runner::{
    run_combined_replay, run_sim_replay, FrameBuilder, FrameBuilders, FrameMismatch,
    ReplayOutcome, FRAME_MISMATCH_EVENT,
};
pub use types::{
    AssetsRecord, FrameKind, FrameRecord, ReplayEnd, ReplayHeader, SimRecord, SimReplay,
    REPLAY_FILE_TYPE, REPLAY_SCHEMA_VERSION,
};

//! Recording replays from a live runtime.
//!
//! [`ReplayRecorder`] captures the initial snapshot and content identity
//! when it is created, then accumulates commands and frame hashes.
//! [`RecordingSession`] wraps a runtime so every accepted command
//! (including handler follow-ups) is recorded without the host having to
//! remember to.

use std::collections::BTreeMap;

use tracing::debug;

use stepwise_core::{canonical_hash, Command, ContentIdentity, Step, Value};
use stepwise_engine::{AdvanceReport, CatchUpReport, Runtime, SimulationState};
use stepwise_save::{serialize_save, state_checksum, SaveDocument};

use crate::error::ReplayError;
use crate::types::{
    AssetsRecord, FrameKind, FrameRecord, ReplayEnd, ReplayHeader, SimRecord, SimReplay,
};

/// Options for [`ReplayRecorder::export`].
#[derive(Clone, Debug, Default)]
pub struct ExportOptions {
    /// Wall-clock export time in milliseconds.
    pub captured_at: f64,
}

/// Accumulates everything a replay needs.
#[derive(Clone, Debug)]
pub struct ReplayRecorder {
    content: ContentIdentity,
    assets: AssetsRecord,
    wiring: BTreeMap<String, bool>,
    step_size_ms: f64,
    queue_capacity: usize,
    start_step: Step,
    initial_snapshot: SaveDocument,
    commands: Vec<Command>,
    frames: Vec<FrameRecord>,
}

impl ReplayRecorder {
    /// Start recording from the current state of `runtime`.
    pub fn new<S: SimulationState>(runtime: &Runtime<S>) -> Result<Self, ReplayError> {
        let initial_snapshot = serialize_save(runtime, 0.0)?;
        Ok(Self {
            content: runtime.content().identity(),
            assets: AssetsRecord::default(),
            wiring: runtime.wiring().clone(),
            step_size_ms: runtime.step_size_ms(),
            queue_capacity: runtime.queue().capacity(),
            start_step: runtime.current_step(),
            initial_snapshot,
            commands: Vec::new(),
            frames: Vec::new(),
        })
    }

    /// Attach the hash of the asset manifest the session runs with.
    pub fn with_asset_manifest_hash(mut self, hash: impl Into<String>) -> Self {
        self.assets.manifest_hash = Some(hash.into());
        self
    }

    /// Append an accepted command.
    ///
    /// The command must be recordable: a malformed type, non-finite
    /// timestamp or unrecordable payload is an error, and the recording is
    /// left unchanged.
    pub fn record_command(&mut self, command: &Command) -> Result<(), ReplayError> {
        command
            .validate()
            .map_err(|reason| ReplayError::InvalidCommand {
                index: self.commands.len(),
                reason,
            })?;
        self.commands.push(command.clone());
        Ok(())
    }

    /// Hash `output` and record it as a frame of `kind` at `step`.
    pub fn record_frame(
        &mut self,
        kind: FrameKind,
        step: Step,
        render_frame: Option<u64>,
        output: &Value,
    ) -> Result<(), ReplayError> {
        if kind == FrameKind::RenderCommandBuffer && render_frame.is_none() {
            return Err(ReplayError::FrameSequence {
                index: self.frames.len(),
                reason: "render command buffer frames need a renderFrame".into(),
            });
        }
        let hash = canonical_hash(output)?;
        self.frames.push(FrameRecord {
            kind,
            step,
            render_frame,
            hash,
        });
        Ok(())
    }

    /// Commands recorded so far.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Frames recorded so far.
    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    /// Step the recording started at.
    pub fn start_step(&self) -> Step {
        self.start_step
    }

    /// Build the replay document, checksumming the live state of `runtime`.
    pub fn export<S: SimulationState>(
        &self,
        runtime: &Runtime<S>,
        options: &ExportOptions,
    ) -> Result<SimReplay, ReplayError> {
        if !(options.captured_at.is_finite() && options.captured_at >= 0.0) {
            return Err(ReplayError::InvalidOptions {
                reason: format!("capturedAt must be non-negative (got {})", options.captured_at),
            });
        }
        let end_step = runtime.current_step();
        let checksum = state_checksum(runtime)?;
        debug!(
            commands = self.commands.len(),
            frames = self.frames.len(),
            start_step = self.start_step.0,
            end_step = end_step.0,
            "exporting replay"
        );
        let replay = SimReplay {
            header: ReplayHeader::new(options.captured_at),
            content: self.content.clone(),
            assets: self.assets.clone(),
            sim: SimRecord {
                wiring: self.wiring.clone(),
                step_size_ms: self.step_size_ms,
                queue_capacity: self.queue_capacity,
                start_step: self.start_step,
                end_step,
                initial_snapshot: self.initial_snapshot.clone(),
                checksum: checksum.clone(),
                commands: self.commands.clone(),
            },
            frames: self.frames.clone(),
            end: ReplayEnd {
                end_step,
                checksum,
                command_count: self.commands.len() as u64,
            },
        };
        replay.validate()?;
        Ok(replay)
    }
}

// ── RecordingSession ───────────────────────────────────────────────

/// A runtime whose every accepted command is recorded.
///
/// The runtime's journal is enabled for the lifetime of the session and
/// drained into the recorder after each call, so follow-up commands
/// enqueued by handlers are recorded at the step they were actually
/// scheduled for.
pub struct RecordingSession<S> {
    runtime: Runtime<S>,
    recorder: ReplayRecorder,
}

impl<S: SimulationState> RecordingSession<S> {
    /// Start recording `runtime` from its current state.
    pub fn start(mut runtime: Runtime<S>) -> Result<Self, ReplayError> {
        let recorder = ReplayRecorder::new(&runtime)?;
        runtime.start_journal();
        Ok(Self { runtime, recorder })
    }

    /// Like [`start`](Self::start), with an asset manifest hash.
    pub fn start_with_assets(
        runtime: Runtime<S>,
        manifest_hash: impl Into<String>,
    ) -> Result<Self, ReplayError> {
        let mut session = Self::start(runtime)?;
        session.recorder = session.recorder.with_asset_manifest_hash(manifest_hash);
        Ok(session)
    }

    /// Enqueue a command. Returns `Ok(false)` when the queue is full.
    pub fn enqueue(&mut self, command: Command) -> Result<bool, ReplayError> {
        let index = self.recorder.commands().len();
        let accepted = self
            .runtime
            .enqueue(command)
            .map_err(|reason| ReplayError::InvalidCommand { index, reason })?;
        self.drain_journal()?;
        Ok(accepted)
    }

    /// Advance by `delta_ms` of wall-clock time.
    pub fn tick(&mut self, delta_ms: f64) -> Result<AdvanceReport, ReplayError> {
        let result = self.runtime.tick(delta_ms);
        self.drain_journal()?;
        Ok(result?)
    }

    /// Apply time that passed while suspended.
    pub fn catch_up(&mut self, elapsed_ms: f64) -> Result<CatchUpReport, ReplayError> {
        let result = self.runtime.catch_up(elapsed_ms);
        self.drain_journal()?;
        Ok(result?)
    }

    /// Execute exactly one step.
    pub fn step_once(&mut self) -> Result<(), ReplayError> {
        let result = self.runtime.step_once();
        self.drain_journal()?;
        Ok(result?)
    }

    /// Execute steps until `target`.
    pub fn run_until(&mut self, target: Step) -> Result<u64, ReplayError> {
        let result = self.runtime.run_until(target);
        self.drain_journal()?;
        Ok(result?)
    }

    /// Record a view model built at the current step.
    pub fn record_view_model(&mut self, view_model: &Value) -> Result<(), ReplayError> {
        let step = self.runtime.current_step();
        self.recorder
            .record_frame(FrameKind::ViewModel, step, None, view_model)
    }

    /// Record render command buffers for `render_frame` at the current step.
    pub fn record_render_command_buffers(
        &mut self,
        render_frame: u64,
        buffers: &Value,
    ) -> Result<(), ReplayError> {
        let step = self.runtime.current_step();
        self.recorder.record_frame(
            FrameKind::RenderCommandBuffer,
            step,
            Some(render_frame),
            buffers,
        )
    }

    /// The recorded runtime.
    pub fn runtime(&self) -> &Runtime<S> {
        &self.runtime
    }

    /// The recorder.
    pub fn recorder(&self) -> &ReplayRecorder {
        &self.recorder
    }

    /// Export the replay at the current step.
    pub fn export(&mut self, options: &ExportOptions) -> Result<SimReplay, ReplayError> {
        self.drain_journal()?;
        self.recorder.export(&self.runtime, options)
    }

    /// Stop recording and hand back the runtime.
    pub fn into_runtime(mut self) -> Runtime<S> {
        self.runtime.stop_journal();
        self.runtime
    }

    fn drain_journal(&mut self) -> Result<(), ReplayError> {
        for command in self.runtime.take_journal() {
            self.recorder.record_command(&command)?;
        }
        Ok(())
    }
}

//! Re-running replays and verifying them.
//!
//! [`run_sim_replay`] rebuilds a runtime from the replay's initial
//! snapshot, re-enqueues every recorded command, runs to the end step,
//! and compares the end-state checksum. [`run_combined_replay`] does the
//! same while rebuilding and hashing every recorded visual frame at the
//! step it was captured.
//!
//! Both take a factory that builds the consumer's runtime (state,
//! handlers, systems) from a config and content pack, so the runner never
//! needs to know what the simulation does.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use stepwise_core::{canonical_hash, ContentPack, Step, Value};
use stepwise_engine::{ConfigError, Runtime, RuntimeConfig, SchedulerConfig, SimulationState};
use stepwise_save::{hydrate_save, state_checksum, HydrateOptions, SAVE_FORMAT_VERSION};

use crate::error::ReplayError;
use crate::types::{FrameKind, FrameRecord, SimReplay};

/// Name of the structured frame mismatch event.
pub const FRAME_MISMATCH_EVENT: &str = "sim_replay_frame_hash_mismatch";

/// Summary of a verified replay.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayOutcome {
    /// Step the replay ran to.
    pub end_step: Step,
    /// Verified end-state checksum.
    pub checksum: String,
    /// Steps executed.
    pub executed_steps: u64,
    /// Commands re-enqueued.
    pub commands: usize,
    /// Frames rebuilt and matched.
    pub frames_validated: usize,
}

/// Structured description of a frame hash mismatch.
///
/// Its `Display` form is a single JSON object with an `event` field, so
/// tooling can pull it out of a failure message.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMismatch {
    /// Always [`FRAME_MISMATCH_EVENT`].
    pub event: &'static str,
    /// Kind of the mismatched frame.
    pub kind: FrameKind,
    /// Index of the frame in the replay.
    pub frame_index: usize,
    /// Step the frame was captured at.
    pub step: Step,
    /// Renderer frame counter, for render command buffers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_frame: Option<u64>,
    /// Hash in the replay.
    pub recorded: String,
    /// Hash of the rebuilt output.
    pub computed: String,
}

impl fmt::Display for FrameMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(
                f,
                "{} frame {} at step {}",
                self.kind, self.frame_index, self.step
            ),
        }
    }
}

/// Rebuilds one kind of visual output from replayed state.
pub type FrameBuilder<'a, S> = Box<dyn FnMut(&Runtime<S>, &FrameRecord) -> Value + 'a>;

/// Callbacks [`run_combined_replay`] uses to rebuild recorded frames.
///
/// A builder is required for every frame kind present in the replay.
pub struct FrameBuilders<'a, S> {
    view_model: Option<FrameBuilder<'a, S>>,
    render_command_buffers: Option<FrameBuilder<'a, S>>,
}

impl<S> Default for FrameBuilders<'_, S> {
    fn default() -> Self {
        Self {
            view_model: None,
            render_command_buffers: None,
        }
    }
}

impl<'a, S> FrameBuilders<'a, S> {
    /// No builders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the view model builder.
    pub fn with_view_model<F>(mut self, build: F) -> Self
    where
        F: FnMut(&Runtime<S>, &FrameRecord) -> Value + 'a,
    {
        self.view_model = Some(Box::new(build));
        self
    }

    /// Set the render command buffer builder.
    pub fn with_render_command_buffers<F>(mut self, build: F) -> Self
    where
        F: FnMut(&Runtime<S>, &FrameRecord) -> Value + 'a,
    {
        self.render_command_buffers = Some(Box::new(build));
        self
    }

    fn get(&mut self, kind: FrameKind) -> Option<&mut FrameBuilder<'a, S>> {
        match kind {
            FrameKind::ViewModel => self.view_model.as_mut(),
            FrameKind::RenderCommandBuffer => self.render_command_buffers.as_mut(),
        }
    }

    fn has(&self, kind: FrameKind) -> bool {
        match kind {
            FrameKind::ViewModel => self.view_model.is_some(),
            FrameKind::RenderCommandBuffer => self.render_command_buffers.is_some(),
        }
    }
}

// ── runners ────────────────────────────────────────────────────────

/// Re-run `replay` against `content` and verify the end-state checksum.
///
/// `factory` receives the config reconstructed from the replay and must
/// return a runtime wired with the same handlers and systems as the
/// recorded one.
pub fn run_sim_replay<S, F>(
    content: ContentPack,
    replay: &SimReplay,
    factory: F,
) -> Result<ReplayOutcome, ReplayError>
where
    S: SimulationState,
    F: FnOnce(RuntimeConfig, ContentPack) -> Result<Runtime<S>, ConfigError>,
{
    let mut runtime = prepare(content, replay, factory)?;
    let executed_steps = runtime.run_until(replay.sim.end_step)?;
    finish(&runtime, replay, executed_steps, 0)
}

/// [`run_sim_replay`], also rebuilding and matching every recorded frame.
///
/// Frames are validated in recording order, each exactly once, at the
/// step they were captured, before that step executes.
pub fn run_combined_replay<S, F>(
    content: ContentPack,
    replay: &SimReplay,
    factory: F,
    mut builders: FrameBuilders<'_, S>,
) -> Result<ReplayOutcome, ReplayError>
where
    S: SimulationState,
    F: FnOnce(RuntimeConfig, ContentPack) -> Result<Runtime<S>, ConfigError>,
{
    for kind in [FrameKind::ViewModel, FrameKind::RenderCommandBuffer] {
        if !builders.has(kind) && replay.frames.iter().any(|f| f.kind == kind) {
            return Err(ReplayError::MissingFrameCallback { kind });
        }
    }
    check_frame_order(replay)?;

    let mut runtime = prepare(content, replay, factory)?;
    let frames = &replay.frames;
    let mut next = 0;
    let mut executed_steps = 0;
    loop {
        let step = runtime.current_step();
        while let Some(frame) = frames.get(next).filter(|f| f.step == step) {
            validate_frame(&runtime, next, frame, &mut builders)?;
            next += 1;
        }
        if step >= replay.sim.end_step {
            break;
        }
        runtime.step_once()?;
        executed_steps += 1;
    }
    if next != frames.len() {
        return Err(ReplayError::FrameSequence {
            index: next,
            reason: "frame was never reached".into(),
        });
    }
    finish(&runtime, replay, executed_steps, next)
}

/// Rebuild the runtime at the replay's start step with every recorded
/// command queued.
fn prepare<S, F>(
    content: ContentPack,
    replay: &SimReplay,
    factory: F,
) -> Result<Runtime<S>, ReplayError>
where
    S: SimulationState,
    F: FnOnce(RuntimeConfig, ContentPack) -> Result<Runtime<S>, ConfigError>,
{
    replay.validate()?;
    if replay.content.digest != content.digest {
        warn!(
            recorded = %replay.content.digest.hash,
            live = %content.digest.hash,
            "replay content digest mismatch"
        );
        return Err(ReplayError::ContentDigestMismatch {
            recorded: replay.content.digest.clone(),
            live: content.digest,
        });
    }

    let sim = &replay.sim;
    let snapshot = &sim.initial_snapshot;
    if snapshot.version != SAVE_FORMAT_VERSION {
        return Err(mismatch(
            "snapshot version",
            SAVE_FORMAT_VERSION,
            snapshot.version,
        ));
    }
    if snapshot.runtime.step != sim.start_step {
        return Err(mismatch("startStep", sim.start_step, snapshot.runtime.step));
    }
    if snapshot.runtime.step_size_ms != sim.step_size_ms {
        return Err(mismatch(
            "stepSizeMs",
            sim.step_size_ms,
            snapshot.runtime.step_size_ms,
        ));
    }

    let config = RuntimeConfig {
        scheduler: SchedulerConfig {
            step_size_ms: sim.step_size_ms,
            ..SchedulerConfig::default()
        },
        queue_capacity: sim.queue_capacity,
        start_step: sim.start_step,
        rng_seed: snapshot.runtime.rng_seed,
        wiring: sim.wiring.clone(),
    };
    let mut runtime = factory(config, content)?;
    if runtime.step_size_ms() != sim.step_size_ms {
        return Err(mismatch(
            "stepSizeMs",
            sim.step_size_ms,
            runtime.step_size_ms(),
        ));
    }
    if runtime.queue().capacity() != sim.queue_capacity {
        return Err(mismatch(
            "queueCapacity",
            sim.queue_capacity,
            runtime.queue().capacity(),
        ));
    }
    if runtime.wiring() != &sim.wiring {
        return Err(ReplayError::SnapshotMismatch {
            field: "wiring",
            expected: format!("{:?}", sim.wiring),
            found: format!("{:?}", runtime.wiring()),
        });
    }

    hydrate_save(snapshot, &mut runtime, &HydrateOptions::default())?;
    runtime.set_follow_ups_suppressed(true);

    for (index, command) in sim.commands.iter().enumerate() {
        if command.step < sim.start_step {
            return Err(ReplayError::CommandBeforeStartStep {
                index,
                step: command.step,
                start_step: sim.start_step,
            });
        }
        let accepted = runtime
            .enqueue(command.clone())
            .map_err(|reason| ReplayError::InvalidCommand { index, reason })?;
        if !accepted {
            warn!(
                index,
                command_type = %command.kind,
                step = command.step.0,
                "replay command rejected by restored queue"
            );
            return Err(ReplayError::CommandRejected {
                index,
                command_type: command.kind.clone(),
                step: command.step,
            });
        }
    }

    info!(
        pack = %replay.content.pack_id,
        start_step = sim.start_step.0,
        end_step = sim.end_step.0,
        commands = sim.commands.len(),
        "replaying recording"
    );
    Ok(runtime)
}

fn finish<S: SimulationState>(
    runtime: &Runtime<S>,
    replay: &SimReplay,
    executed_steps: u64,
    frames_validated: usize,
) -> Result<ReplayOutcome, ReplayError> {
    let computed = state_checksum(runtime)?;
    let end_step = runtime.current_step();
    if computed != replay.sim.checksum {
        warn!(
            end_step = end_step.0,
            recorded = %replay.sim.checksum,
            computed = %computed,
            "replay checksum mismatch"
        );
        return Err(ReplayError::ChecksumMismatch {
            end_step,
            recorded: replay.sim.checksum.clone(),
            computed,
        });
    }
    info!(
        end_step = end_step.0,
        executed_steps,
        frames_validated,
        "replay verified"
    );
    Ok(ReplayOutcome {
        end_step,
        checksum: computed,
        executed_steps,
        commands: replay.sim.commands.len(),
        frames_validated,
    })
}

fn mismatch(
    field: &'static str,
    expected: impl fmt::Display,
    found: impl fmt::Display,
) -> ReplayError {
    ReplayError::SnapshotMismatch {
        field,
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

/// Frames must lie within the replay, never go back in step, and render
/// frames must carry strictly increasing frame numbers.
fn check_frame_order(replay: &SimReplay) -> Result<(), ReplayError> {
    let sim = &replay.sim;
    let mut last_step = sim.start_step;
    let mut last_render_frame: Option<u64> = None;
    for (index, frame) in replay.frames.iter().enumerate() {
        if frame.step < sim.start_step || frame.step > sim.end_step {
            return Err(ReplayError::FrameSequence {
                index,
                reason: format!(
                    "step {} is outside {}..={}",
                    frame.step, sim.start_step, sim.end_step
                ),
            });
        }
        if frame.step < last_step {
            return Err(ReplayError::FrameSequence {
                index,
                reason: format!("step {} precedes step {last_step}", frame.step),
            });
        }
        last_step = frame.step;

        if frame.kind == FrameKind::RenderCommandBuffer {
            let Some(render_frame) = frame.render_frame else {
                return Err(ReplayError::FrameSequence {
                    index,
                    reason: "render command buffer frame has no renderFrame".into(),
                });
            };
            if last_render_frame.is_some_and(|last| render_frame <= last) {
                return Err(ReplayError::FrameSequence {
                    index,
                    reason: format!("renderFrame {render_frame} does not advance"),
                });
            }
            last_render_frame = Some(render_frame);
        }
    }
    Ok(())
}

fn validate_frame<S>(
    runtime: &Runtime<S>,
    index: usize,
    frame: &FrameRecord,
    builders: &mut FrameBuilders<'_, S>,
) -> Result<(), ReplayError> {
    let build = builders
        .get(frame.kind)
        .ok_or(ReplayError::MissingFrameCallback { kind: frame.kind })?;
    let output = build(runtime, frame);
    let computed = canonical_hash(&output)?;
    if computed == frame.hash {
        return Ok(());
    }
    let mismatch = FrameMismatch {
        event: FRAME_MISMATCH_EVENT,
        kind: frame.kind,
        frame_index: index,
        step: frame.step,
        render_frame: frame.render_frame,
        recorded: frame.hash.clone(),
        computed,
    };
    warn!(%mismatch, "replay frame mismatch");
    Err(mismatch.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{ExportOptions, RecordingSession};
    use stepwise_engine::DEFAULT_MAX_QUEUE_SIZE;
    use stepwise_test_utils::{
        build_runtime, collect, default_runtime, fixture_content, FixtureState,
    };
    use tracing_test::traced_test;

    fn recorded() -> SimReplay {
        let mut session = RecordingSession::start(default_runtime()).unwrap();
        session.enqueue(collect(5.0, 0)).unwrap();
        session.enqueue(collect(3.0, 2)).unwrap();
        session.run_until(Step(5)).unwrap();
        session.export(&ExportOptions::default()).unwrap()
    }

    // ── checksum verification ──────────────────────────────────

    #[test]
    fn replay_reproduces_the_recorded_checksum() {
        let replay = recorded();
        let outcome = run_sim_replay(fixture_content(), &replay, build_runtime).unwrap();
        assert_eq!(outcome.checksum, replay.sim.checksum);
        assert_eq!(outcome.end_step, Step(5));
        assert_eq!(outcome.executed_steps, 5);
        assert_eq!(outcome.commands, 2);
    }

    #[test]
    #[traced_test]
    fn checksum_mismatch_is_logged_and_returned() {
        let mut replay = recorded();
        replay.sim.commands[0]
            .payload
            .insert("amount", Value::from(6.0));

        match run_sim_replay(fixture_content(), &replay, build_runtime) {
            Err(ReplayError::ChecksumMismatch {
                end_step, recorded, ..
            }) => {
                assert_eq!(end_step, Step(5));
                assert_eq!(recorded, replay.sim.checksum);
            }
            other => panic!("expected ChecksumMismatch, got {other:?}"),
        }
        assert!(logs_contain("replay checksum mismatch"));
    }

    #[test]
    fn content_digest_must_match() {
        let replay = recorded();
        let mut content = fixture_content();
        content.digest.hash = "fnv1a-ffffffff".into();
        assert!(matches!(
            run_sim_replay(content, &replay, build_runtime),
            Err(ReplayError::ContentDigestMismatch { .. })
        ));
    }

    #[test]
    fn snapshot_step_must_match_start_step() {
        let mut replay = recorded();
        replay.sim.initial_snapshot.runtime.step = Step(1);
        match run_sim_replay(fixture_content(), &replay, build_runtime) {
            Err(ReplayError::SnapshotMismatch { field, .. }) => assert_eq!(field, "startStep"),
            other => panic!("expected SnapshotMismatch, got {other:?}"),
        }
    }

    #[test]
    fn factory_that_changes_wiring_is_rejected() {
        let replay = recorded();
        let result = run_sim_replay(fixture_content(), &replay, |mut config, content| {
            config.wiring.insert("automation".into(), true);
            build_runtime(config, content)
        });
        match result {
            Err(ReplayError::SnapshotMismatch { field, .. }) => assert_eq!(field, "wiring"),
            other => panic!("expected SnapshotMismatch, got {other:?}"),
        }
    }

    #[test]
    fn factory_that_changes_queue_capacity_is_rejected() {
        let replay = recorded();
        let result = run_sim_replay(fixture_content(), &replay, |config, content| {
            let config = RuntimeConfig {
                queue_capacity: config.queue_capacity / 2,
                ..config
            };
            build_runtime(config, content)
        });
        match result {
            Err(ReplayError::SnapshotMismatch {
                field,
                expected,
                found,
            }) => {
                assert_eq!(field, "queueCapacity");
                assert_eq!(expected, DEFAULT_MAX_QUEUE_SIZE.to_string());
                assert_eq!(found, (DEFAULT_MAX_QUEUE_SIZE / 2).to_string());
            }
            other => panic!("expected SnapshotMismatch, got {other:?}"),
        }
    }

    #[test]
    fn command_before_start_step_is_rejected() {
        let mut session = RecordingSession::start({
            let mut runtime = default_runtime();
            runtime.run_until(Step(3)).unwrap();
            runtime
        })
        .unwrap();
        session.enqueue(collect(1.0, 4)).unwrap();
        session.run_until(Step(6)).unwrap();
        let mut replay = session.export(&ExportOptions::default()).unwrap();
        replay.sim.commands[0].step = Step(1);

        assert!(matches!(
            run_sim_replay(fixture_content(), &replay, build_runtime),
            Err(ReplayError::CommandBeforeStartStep { index: 0, .. })
        ));
    }

    // ── frames ─────────────────────────────────────────────────

    fn gold_view(runtime: &Runtime<FixtureState>, _: &FrameRecord) -> Value {
        Value::object([("gold", Value::from(runtime.state().gold()))])
    }

    fn recorded_with_frames() -> SimReplay {
        let mut session = RecordingSession::start(default_runtime()).unwrap();
        session.enqueue(collect(5.0, 0)).unwrap();
        session.enqueue(collect(3.0, 2)).unwrap();
        for step in 1..=4u64 {
            session.run_until(Step(step)).unwrap();
            let gold = session.runtime().state().gold();
            session
                .record_view_model(&Value::object([("gold", Value::from(gold))]))
                .unwrap();
        }
        session
            .record_render_command_buffers(9, &Value::Array(vec![Value::from("clear")]))
            .unwrap();
        session.run_until(Step(5)).unwrap();
        session.export(&ExportOptions::default()).unwrap()
    }

    #[test]
    fn combined_replay_validates_every_frame() {
        let replay = recorded_with_frames();
        let builders = FrameBuilders::new()
            .with_view_model(gold_view)
            .with_render_command_buffers(|_, _| Value::Array(vec![Value::from("clear")]));
        let outcome =
            run_combined_replay(fixture_content(), &replay, build_runtime, builders).unwrap();
        assert_eq!(outcome.frames_validated, 5);
        assert_eq!(outcome.checksum, replay.sim.checksum);
    }

    #[test]
    fn missing_builder_is_rejected_up_front() {
        let replay = recorded_with_frames();
        let builders = FrameBuilders::new().with_view_model(gold_view);
        assert!(matches!(
            run_combined_replay(fixture_content(), &replay, build_runtime, builders),
            Err(ReplayError::MissingFrameCallback {
                kind: FrameKind::RenderCommandBuffer
            })
        ));
    }

    #[test]
    #[traced_test]
    fn frame_mismatch_carries_a_json_event() {
        let replay = recorded_with_frames();
        let builders = FrameBuilders::new()
            .with_view_model(|runtime: &Runtime<_>, frame: &FrameRecord| {
                let mut view = gold_view(runtime, frame);
                if frame.step == Step(3) {
                    view.insert("gold", Value::from(-1.0));
                }
                view
            })
            .with_render_command_buffers(|_, _| Value::Array(vec![Value::from("clear")]));
        let err = run_combined_replay(fixture_content(), &replay, build_runtime, builders)
            .unwrap_err();
        let ReplayError::FrameMismatch(mismatch) = &err else {
            panic!("expected FrameMismatch, got {err:?}");
        };
        assert_eq!(mismatch.step, Step(3));
        assert_eq!(mismatch.frame_index, 2);

        let message = err.to_string();
        let json = &message[message.find('{').unwrap()..];
        let event = Value::from_json_str(json).unwrap();
        assert_eq!(
            event.get("event").and_then(Value::as_str),
            Some(FRAME_MISMATCH_EVENT)
        );
        assert_eq!(event.get("kind").and_then(Value::as_str), Some("viewModel"));
        assert!(logs_contain("replay frame mismatch"));
    }

    #[test]
    fn frames_out_of_order_are_rejected() {
        let mut replay = recorded_with_frames();
        replay.frames.swap(0, 1);
        let builders = FrameBuilders::new()
            .with_view_model(gold_view)
            .with_render_command_buffers(|_, _| Value::Null);
        assert!(matches!(
            run_combined_replay(fixture_content(), &replay, build_runtime, builders),
            Err(ReplayError::FrameSequence { index: 1, .. })
        ));
    }

    #[test]
    fn render_frames_must_advance() {
        let mut replay = recorded_with_frames();
        let mut repeat = replay.frames[4].clone();
        repeat.step = Step(5);
        replay.frames.push(repeat);
        let builders = FrameBuilders::new()
            .with_view_model(gold_view)
            .with_render_command_buffers(|_, _| Value::Null);
        assert!(matches!(
            run_combined_replay(fixture_content(), &replay, build_runtime, builders),
            Err(ReplayError::FrameSequence { index: 5, .. })
        ));
    }
}

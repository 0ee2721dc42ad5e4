//! Simulation runtime: queue, scheduler, handlers, and systems wired together.
//!
//! [`Runtime`] is the primary user-facing API. The host pumps it with
//! elapsed milliseconds via [`tick()`](Runtime::tick) (or
//! [`catch_up()`](Runtime::catch_up) after a suspension); each executed
//! step runs:
//!
//! 1. drain due commands from the [`CommandQueue`] in deterministic order,
//! 2. dispatch each to the handler registered for its type,
//! 3. run every [`System`] in registration order,
//! 4. advance the step counter,
//! 5. enqueue follow-up commands buffered during the step.
//!
//! Any handler or system failure aborts the step and is returned to the
//! caller; the step counter does not advance past a failed step.
//!
//! # Recording hooks
//!
//! When the journal is on, every accepted enqueue (host commands and
//! follow-ups alike) is appended to it, so a recorder sees the exact
//! command stream the queue saw. In replay, follow-ups are suppressed
//! because the recorded stream already contains them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use stepwise_core::{Command, CommandError, ContentPack, Step, Value, ValueError};

use crate::config::{ConfigError, RuntimeConfig};
use crate::error::{HandlerError, RestoreError, StepError};
use crate::handler::{CommandHandler, HandlerRegistry, StepContext, System};
use crate::prd::PrdRegistry;
use crate::queue::CommandQueue;
use crate::rng::RngContext;
use crate::scheduler::{AdvanceReport, CatchUpReport, FixedTimestep, StepInfo};

// ── SimulationState ────────────────────────────────────────────────

/// Captured external state, one restricted-JSON value per save section.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSections {
    /// Resource amounts and capacities.
    pub resources: Value,
    /// Generator and upgrade purchase state.
    pub progression: Value,
    /// Automation cooldowns and toggles.
    pub automation: Value,
    /// Transform cooldowns and in-flight batches.
    pub transforms: Value,
    /// Entity instances.
    pub entities: Value,
}

/// Simulation state that can be captured into, and restored from, save
/// sections.
///
/// `capture` must be a pure function of the live state: capturing twice
/// without an intervening step must produce equal sections.
pub trait SimulationState: 'static {
    /// Snapshot the state.
    fn capture(&self) -> Result<StateSections, ValueError>;

    /// Replace the state with a previously captured snapshot.
    fn restore(&mut self, sections: &StateSections) -> Result<(), RestoreError>;
}

// ── Runtime ────────────────────────────────────────────────────────

/// Everything a step touches. Split from the scheduler so the step
/// callback can borrow it while the scheduler is borrowed mutably.
struct SimCore<S> {
    content: ContentPack,
    state: S,
    queue: CommandQueue,
    handlers: HandlerRegistry<S>,
    systems: Vec<Box<dyn System<S>>>,
    rng: RngContext,
    prd: PrdRegistry,
    current_step: Step,
    step_size_ms: f64,
    wiring: BTreeMap<String, bool>,
    journal: Option<Vec<Command>>,
    suppress_follow_ups: bool,
}

/// A single deterministic simulation instance.
///
/// # Example
///
/// ```ignore
/// let mut runtime = Runtime::new(RuntimeConfig::default(), content, state)?;
/// runtime.register_handler("COLLECT", CollectHandler);
/// runtime.enqueue(command)?;
/// let report = runtime.tick(frame_ms)?;
/// ```
pub struct Runtime<S> {
    scheduler: FixedTimestep,
    core: SimCore<S>,
}

impl<S: 'static> Runtime<S> {
    /// Create a runtime from a validated [`RuntimeConfig`].
    pub fn new(config: RuntimeConfig, content: ContentPack, state: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let step_size_ms = config.scheduler.step_size_ms;
        Ok(Self {
            scheduler: FixedTimestep::new(config.scheduler)?,
            core: SimCore {
                content,
                state,
                queue: CommandQueue::new(config.queue_capacity),
                handlers: HandlerRegistry::new(),
                systems: Vec::new(),
                rng: RngContext::new(config.rng_seed),
                prd: PrdRegistry::new(),
                current_step: config.start_step,
                step_size_ms,
                wiring: config.wiring,
                journal: None,
                suppress_follow_ups: false,
            },
        })
    }

    // ── wiring ─────────────────────────────────────────────────

    /// Register `handler` for `command_type`, returning any handler it replaces.
    pub fn register_handler(
        &mut self,
        command_type: impl Into<String>,
        handler: impl CommandHandler<S>,
    ) -> Option<Box<dyn CommandHandler<S>>> {
        self.core.handlers.register(command_type, handler)
    }

    /// Register a closure as the handler for `command_type`.
    pub fn register_fn<F>(
        &mut self,
        command_type: impl Into<String>,
        f: F,
    ) -> Option<Box<dyn CommandHandler<S>>>
    where
        F: Fn(&Command, &mut StepContext<'_, S>) -> Result<(), HandlerError> + 'static,
    {
        self.core.handlers.register_fn(command_type, f)
    }

    /// Append a system; systems run in the order they were added.
    pub fn add_system(&mut self, system: impl System<S>) {
        self.core.systems.push(Box::new(system));
    }

    /// The handler registry.
    pub fn handlers(&self) -> &HandlerRegistry<S> {
        &self.core.handlers
    }

    /// Names of the registered systems, in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.core.systems.iter().map(|s| s.name()).collect()
    }

    // ── driving ────────────────────────────────────────────────

    /// Submit a command.
    ///
    /// Commands naming a step that has already executed are raised to the
    /// current step, so the recorded stream always matches what ran.
    /// Returns `Ok(false)` when the queue is full.
    pub fn enqueue(&mut self, command: Command) -> Result<bool, CommandError> {
        self.core.enqueue(command)
    }

    /// Advance by `delta_ms` of wall-clock time, executing whole steps up to
    /// the active step cap.
    pub fn tick(&mut self, delta_ms: f64) -> Result<AdvanceReport, StepError> {
        let core = &mut self.core;
        self.scheduler
            .advance(delta_ms, |info| core.execute_step(info))
    }

    /// Apply time that passed while the simulation was suspended.
    pub fn catch_up(&mut self, elapsed_ms: f64) -> Result<CatchUpReport, StepError> {
        let core = &mut self.core;
        self.scheduler
            .catch_up(elapsed_ms, |info| core.execute_step(info))
    }

    /// Execute exactly one step, bypassing the scheduler.
    pub fn step_once(&mut self) -> Result<(), StepError> {
        self.core.execute_step(StepInfo::single())
    }

    /// Execute steps until the current step reaches `target`.
    ///
    /// Returns the number of steps executed (zero if already at or past
    /// `target`).
    pub fn run_until(&mut self, target: Step) -> Result<u64, StepError> {
        let mut executed = 0;
        while self.core.current_step < target {
            self.core.execute_step(StepInfo::single())?;
            executed += 1;
        }
        Ok(executed)
    }

    /// Select the background step cap for [`tick()`](Runtime::tick).
    pub fn set_background(&mut self, background: bool) {
        self.scheduler.set_background(background);
    }

    /// The scheduler.
    pub fn scheduler(&self) -> &FixedTimestep {
        &self.scheduler
    }

    /// Mutable scheduler, for hosts that restore a persisted backlog.
    pub fn scheduler_mut(&mut self) -> &mut FixedTimestep {
        &mut self.scheduler
    }

    // ── state access ───────────────────────────────────────────

    /// The step that will execute next.
    pub fn current_step(&self) -> Step {
        self.core.current_step
    }

    /// Move the step counter, e.g. when hydrating from a save.
    pub fn set_current_step(&mut self, step: Step) {
        self.core.current_step = step;
    }

    /// Duration of one step in milliseconds.
    pub fn step_size_ms(&self) -> f64 {
        self.core.step_size_ms
    }

    /// Simulation state.
    pub fn state(&self) -> &S {
        &self.core.state
    }

    /// Mutable simulation state.
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.core.state
    }

    /// The content pack the runtime was built with.
    pub fn content(&self) -> &ContentPack {
        &self.core.content
    }

    /// Pending commands.
    pub fn queue(&self) -> &CommandQueue {
        &self.core.queue
    }

    /// Mutable queue access, bypassing the journal.
    ///
    /// Commands inserted here are never journaled, so a recording session
    /// wrapping this runtime will not capture them and its replay will
    /// diverge. Use [`Runtime::enqueue`] for anything that must replay.
    pub fn queue_mut(&mut self) -> &mut CommandQueue {
        &mut self.core.queue
    }

    /// The random stream.
    pub fn rng(&self) -> &RngContext {
        &self.core.rng
    }

    /// Mutable random stream.
    pub fn rng_mut(&mut self) -> &mut RngContext {
        &mut self.core.rng
    }

    /// PRD counters.
    pub fn prd(&self) -> &PrdRegistry {
        &self.core.prd
    }

    /// Mutable PRD counters.
    pub fn prd_mut(&mut self) -> &mut PrdRegistry {
        &mut self.core.prd
    }

    /// Feature flags describing which optional systems are wired in.
    pub fn wiring(&self) -> &BTreeMap<String, bool> {
        &self.core.wiring
    }

    // ── recording hooks ────────────────────────────────────────

    /// Start recording accepted enqueues. Clears any previous journal.
    pub fn start_journal(&mut self) {
        self.core.journal = Some(Vec::new());
    }

    /// Stop recording and return what was journaled.
    pub fn stop_journal(&mut self) -> Vec<Command> {
        self.core.journal.take().unwrap_or_default()
    }

    /// Drain the journal, leaving it on.
    pub fn take_journal(&mut self) -> Vec<Command> {
        match self.core.journal.as_mut() {
            Some(journal) => std::mem::take(journal),
            None => Vec::new(),
        }
    }

    /// Whether the journal is on.
    pub fn is_journaling(&self) -> bool {
        self.core.journal.is_some()
    }

    /// Drop follow-up commands instead of enqueueing them (replay mode).
    pub fn set_follow_ups_suppressed(&mut self, suppressed: bool) {
        self.core.suppress_follow_ups = suppressed;
    }

    /// Whether follow-ups are being dropped.
    pub fn follow_ups_suppressed(&self) -> bool {
        self.core.suppress_follow_ups
    }
}

impl<S: 'static> SimCore<S> {
    fn enqueue(&mut self, mut command: Command) -> Result<bool, CommandError> {
        if command.step < self.current_step {
            debug!(
                command_type = %command.kind,
                requested = command.step.0,
                current = self.current_step.0,
                "command names an executed step, raising to current step"
            );
            command.step = self.current_step;
        }
        let journaled = self.journal.is_some().then(|| command.clone());
        let accepted = self.queue.enqueue(command)?;
        if accepted {
            if let (Some(journal), Some(command)) = (self.journal.as_mut(), journaled) {
                journal.push(command);
            }
        }
        Ok(accepted)
    }

    fn execute_step(&mut self, info: StepInfo) -> Result<(), StepError> {
        let step = self.current_step;
        let due = self.queue.dequeue_due(step);
        let mut follow_ups = Vec::new();

        for command in &due {
            let handler =
                self.handlers
                    .get(&command.kind)
                    .ok_or_else(|| StepError::UnknownCommand {
                        command_type: command.kind.clone(),
                        step,
                    })?;
            let mut ctx = StepContext::new(
                &mut self.state,
                &self.content,
                &mut self.rng,
                &mut self.prd,
                step,
                self.step_size_ms,
                info,
                &mut follow_ups,
            );
            handler
                .handle(command, &mut ctx)
                .map_err(|reason| StepError::HandlerFailed {
                    command_type: command.kind.clone(),
                    step,
                    reason,
                })?;
        }

        for system in &mut self.systems {
            let mut ctx = StepContext::new(
                &mut self.state,
                &self.content,
                &mut self.rng,
                &mut self.prd,
                step,
                self.step_size_ms,
                info,
                &mut follow_ups,
            );
            system
                .tick(&mut ctx)
                .map_err(|reason| StepError::SystemFailed {
                    name: system.name().to_owned(),
                    step,
                    reason,
                })?;
        }

        for command in &follow_ups {
            command
                .validate()
                .map_err(|reason| StepError::InvalidFollowUp { step, reason })?;
        }
        if !self.suppress_follow_ups {
            let free = self.queue.capacity().saturating_sub(self.queue.len());
            if let Some(rejected) = follow_ups.get(free) {
                warn!(
                    step = step.0,
                    command_type = %rejected.kind,
                    requested = follow_ups.len(),
                    free,
                    "follow-up commands do not fit the command queue"
                );
                return Err(StepError::FollowUpRejected {
                    step,
                    command_type: rejected.kind.clone(),
                    capacity: self.queue.capacity(),
                });
            }
        }

        self.current_step = step.next();
        trace!(step = step.0, commands = due.len(), "step executed");

        if self.suppress_follow_ups {
            if !follow_ups.is_empty() {
                trace!(count = follow_ups.len(), "follow-ups suppressed");
            }
            return Ok(());
        }
        for mut command in follow_ups {
            if command.step < self.current_step {
                command.step = self.current_step;
            }
            let command_type = command.kind.clone();
            let accepted = self
                .enqueue(command)
                .map_err(|reason| StepError::InvalidFollowUp { step, reason })?;
            if !accepted {
                return Err(StepError::FollowUpRejected {
                    step,
                    command_type,
                    capacity: self.queue.capacity(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::CommandPriority;

    #[derive(Default)]
    struct Counter {
        total: f64,
        ticks: u64,
    }

    impl SimulationState for Counter {
        fn capture(&self) -> Result<StateSections, ValueError> {
            Ok(StateSections {
                resources: Value::object([("total", Value::from(self.total))]),
                ..StateSections::default()
            })
        }

        fn restore(&mut self, sections: &StateSections) -> Result<(), RestoreError> {
            self.total = sections
                .resources
                .get("total")
                .and_then(Value::as_f64)
                .ok_or_else(|| RestoreError::new("resources", "missing total"))?;
            Ok(())
        }
    }

    struct TickCounter;

    impl System<Counter> for TickCounter {
        fn name(&self) -> &str {
            "tick_counter"
        }

        fn tick(&mut self, ctx: &mut StepContext<'_, Counter>) -> Result<(), HandlerError> {
            ctx.state_mut().ticks += 1;
            Ok(())
        }
    }

    fn runtime() -> Runtime<Counter> {
        let content = ContentPack::new("test", "0", Value::empty_object());
        let mut rt = Runtime::new(RuntimeConfig::default(), content, Counter::default()).unwrap();
        rt.register_fn("ADD", |cmd, ctx| {
            let amount = cmd
                .payload
                .as_f64()
                .ok_or_else(|| HandlerError::invalid_payload("payload", "expected a number"))?;
            ctx.state_mut().total += amount;
            Ok(())
        });
        rt.add_system(TickCounter);
        rt
    }

    fn add(amount: f64, step: u64) -> Command {
        Command::new("ADD", CommandPriority::Player, Step(step)).with_payload(Value::from(amount))
    }

    // ── stepping ───────────────────────────────────────────────

    #[test]
    fn tick_executes_due_commands_and_systems() {
        let mut rt = runtime();
        rt.enqueue(add(5.0, 0)).unwrap();
        rt.enqueue(add(3.0, 2)).unwrap();
        let report = rt.tick(250.0).unwrap();
        assert_eq!(report.executed_steps, 2);
        assert_eq!(rt.current_step(), Step(2));
        assert_eq!(rt.state().total, 5.0);
        assert_eq!(rt.state().ticks, 2);
        rt.step_once().unwrap();
        assert_eq!(rt.state().total, 8.0);
    }

    #[test]
    fn run_until_stops_at_target() {
        let mut rt = runtime();
        assert_eq!(rt.run_until(Step(4)).unwrap(), 4);
        assert_eq!(rt.run_until(Step(2)).unwrap(), 0);
        assert_eq!(rt.state().ticks, 4);
    }

    #[test]
    fn unknown_command_aborts_step() {
        let mut rt = runtime();
        rt.enqueue(Command::new("NOPE", CommandPriority::Player, Step(0)))
            .unwrap();
        let err = rt.step_once().unwrap_err();
        assert!(matches!(err, StepError::UnknownCommand { .. }));
        assert_eq!(rt.current_step(), Step(0));
    }

    #[test]
    fn handler_error_propagates_with_context() {
        let mut rt = runtime();
        rt.enqueue(
            Command::new("ADD", CommandPriority::Player, Step(0)).with_payload(Value::from("x")),
        )
        .unwrap();
        match rt.tick(100.0) {
            Err(StepError::HandlerFailed {
                command_type, step, ..
            }) => {
                assert_eq!(command_type, "ADD");
                assert_eq!(step, Step(0));
            }
            other => panic!("expected handler failure, got {other:?}"),
        }
    }

    #[test]
    fn late_commands_are_raised_to_current_step() {
        let mut rt = runtime();
        rt.run_until(Step(3)).unwrap();
        rt.start_journal();
        rt.enqueue(add(1.0, 0)).unwrap();
        let journal = rt.take_journal();
        assert_eq!(journal[0].step, Step(3));
        assert_eq!(rt.queue().peek_next_step(), Some(Step(3)));
    }

    // ── follow-ups and journal ─────────────────────────────────

    fn with_echo(rt: &mut Runtime<Counter>) {
        rt.register_fn("ECHO", |cmd, ctx| {
            let next = Command::new("ADD", CommandPriority::System, ctx.step())
                .with_payload(cmd.payload.clone());
            ctx.enqueue(next);
            Ok(())
        });
    }

    #[test]
    fn follow_ups_run_on_the_next_step_and_are_journaled() {
        let mut rt = runtime();
        with_echo(&mut rt);
        rt.start_journal();
        rt.enqueue(Command::new("ECHO", CommandPriority::Player, Step(0)).with_payload(Value::from(2.0)))
            .unwrap();
        rt.step_once().unwrap();
        assert_eq!(rt.state().total, 0.0);
        rt.step_once().unwrap();
        assert_eq!(rt.state().total, 2.0);

        let journal = rt.stop_journal();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[1].kind, "ADD");
        assert_eq!(journal[1].step, Step(1));
        assert!(!rt.is_journaling());
    }

    #[test]
    fn suppressed_follow_ups_are_dropped() {
        let mut rt = runtime();
        with_echo(&mut rt);
        rt.set_follow_ups_suppressed(true);
        rt.enqueue(Command::new("ECHO", CommandPriority::Player, Step(0)).with_payload(Value::from(2.0)))
            .unwrap();
        rt.run_until(Step(3)).unwrap();
        assert_eq!(rt.state().total, 0.0);
        assert!(rt.queue().is_empty());
    }

    #[test]
    fn invalid_follow_up_aborts_step() {
        let mut rt = runtime();
        rt.register_fn("BAD", |_, ctx| {
            ctx.enqueue(Command::new("", CommandPriority::System, Step(0)));
            Ok(())
        });
        rt.enqueue(Command::new("BAD", CommandPriority::Player, Step(0)))
            .unwrap();
        assert!(matches!(
            rt.step_once(),
            Err(StepError::InvalidFollowUp { .. })
        ));
        assert_eq!(rt.current_step(), Step(0));
    }

    #[test]
    fn rejected_enqueue_is_not_journaled() {
        let content = ContentPack::new("test", "0", Value::empty_object());
        let config = RuntimeConfig {
            queue_capacity: 1,
            ..RuntimeConfig::default()
        };
        let mut rt = Runtime::new(config, content, Counter::default()).unwrap();
        rt.start_journal();
        assert_eq!(rt.enqueue(add(1.0, 0)), Ok(true));
        assert_eq!(rt.enqueue(add(1.0, 0)), Ok(false));
        assert_eq!(rt.take_journal().len(), 1);
    }

    #[test]
    fn direct_queue_access_is_not_journaled() {
        let mut rt = runtime();
        rt.start_journal();
        assert_eq!(rt.queue_mut().enqueue(add(4.0, 0)), Ok(true));
        rt.step_once().unwrap();
        assert_eq!(rt.state().total, 4.0);
        assert!(rt.take_journal().is_empty());
    }

    #[test]
    fn unsaveable_seed_is_rejected_at_construction() {
        let content = ContentPack::new("test", "0", Value::empty_object());
        let config = RuntimeConfig {
            rng_seed: u64::MAX,
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            Runtime::new(config, content, Counter::default()),
            Err(ConfigError::UnrecordableSeed { seed: u64::MAX })
        ));
    }

    #[test]
    fn follow_ups_that_overflow_the_queue_abort_step() {
        let content = ContentPack::new("test", "0", Value::empty_object());
        let config = RuntimeConfig {
            queue_capacity: 1,
            ..RuntimeConfig::default()
        };
        let mut rt = Runtime::new(config, content, Counter::default()).unwrap();
        rt.register_fn("SPLIT", |_, ctx| {
            ctx.enqueue(add(1.0, ctx.step().0 + 1));
            ctx.enqueue(add(2.0, ctx.step().0 + 1));
            Ok(())
        });
        rt.start_journal();
        rt.enqueue(Command::new("SPLIT", CommandPriority::Player, Step(0)))
            .unwrap();

        match rt.step_once() {
            Err(StepError::FollowUpRejected {
                step,
                command_type,
                capacity,
            }) => {
                assert_eq!(step, Step(0));
                assert_eq!(command_type, "ADD");
                assert_eq!(capacity, 1);
            }
            other => panic!("expected FollowUpRejected, got {other:?}"),
        }
        assert_eq!(rt.current_step(), Step(0));
        assert!(rt.queue().is_empty());
        assert_eq!(rt.take_journal().len(), 1);
    }

    #[test]
    fn catch_up_flags_steps() {
        let mut rt = runtime();
        let report = rt.catch_up(1_000.0).unwrap();
        assert_eq!(report.executed_steps, 10);
        assert_eq!(rt.state().ticks, 10);
    }
}

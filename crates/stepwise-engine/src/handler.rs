//! Command handlers, systems, and the context they run in.
//!
//! What a command *does* is supplied by the consumer: one
//! [`CommandHandler`] per command type, plus any number of [`System`]s that
//! run once per step after the step's commands. Both see the simulation
//! through a [`StepContext`], which also carries the runtime's RNG/PRD
//! context and a buffer for follow-up commands.
//!
//! Follow-ups are never dispatched re-entrantly. The runtime enqueues them
//! after the step completes, due no earlier than the next step.

use indexmap::IndexMap;

use stepwise_core::{Command, ContentPack, Step};

use crate::error::HandlerError;
use crate::prd::PrdRegistry;
use crate::rng::RngContext;
use crate::scheduler::StepInfo;

// ── StepContext ────────────────────────────────────────────────────

/// Mutable view of one simulation step.
pub struct StepContext<'a, S> {
    state: &'a mut S,
    content: &'a ContentPack,
    rng: &'a mut RngContext,
    prd: &'a mut PrdRegistry,
    step: Step,
    step_size_ms: f64,
    info: StepInfo,
    follow_ups: &'a mut Vec<Command>,
}

impl<'a, S> StepContext<'a, S> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        state: &'a mut S,
        content: &'a ContentPack,
        rng: &'a mut RngContext,
        prd: &'a mut PrdRegistry,
        step: Step,
        step_size_ms: f64,
        info: StepInfo,
        follow_ups: &'a mut Vec<Command>,
    ) -> Self {
        Self {
            state,
            content,
            rng,
            prd,
            step,
            step_size_ms,
            info,
            follow_ups,
        }
    }

    /// Simulation state.
    pub fn state(&self) -> &S {
        &*self.state
    }

    /// Mutable simulation state.
    pub fn state_mut(&mut self) -> &mut S {
        &mut *self.state
    }

    /// The content pack the simulation runs against.
    pub fn content(&self) -> &ContentPack {
        self.content
    }

    /// The step being executed.
    pub fn step(&self) -> Step {
        self.step
    }

    /// Duration of one step in milliseconds.
    pub fn step_size_ms(&self) -> f64 {
        self.step_size_ms
    }

    /// Scheduler information for this step.
    pub fn info(&self) -> StepInfo {
        self.info
    }

    /// The runtime's random stream.
    pub fn rng(&mut self) -> &mut RngContext {
        &mut *self.rng
    }

    /// PRD draw for `id`, using the runtime's random stream.
    pub fn roll_prd(&mut self, id: &str, probability: f64) -> bool {
        self.prd.roll(id, probability, &mut *self.rng)
    }

    /// Queue a follow-up command.
    ///
    /// It is validated and enqueued after this step completes. Its step is
    /// raised to the next step if it names this step or an earlier one.
    pub fn enqueue(&mut self, command: Command) {
        self.follow_ups.push(command);
    }
}

// ── Handler and System traits ──────────────────────────────────────

/// Applies one command type to simulation state.
///
/// Returning an error aborts the current step: a partially applied step
/// would break replay determinism.
pub trait CommandHandler<S>: 'static {
    /// Apply `command`.
    fn handle(&self, command: &Command, ctx: &mut StepContext<'_, S>) -> Result<(), HandlerError>;
}

/// Adapter letting a closure act as a [`CommandHandler`].
pub struct FnHandler<F>(pub F);

impl<S, F> CommandHandler<S> for FnHandler<F>
where
    F: Fn(&Command, &mut StepContext<'_, S>) -> Result<(), HandlerError> + 'static,
{
    fn handle(&self, command: &Command, ctx: &mut StepContext<'_, S>) -> Result<(), HandlerError> {
        (self.0)(command, ctx)
    }
}

/// Per-step simulation logic (production, automation, transforms).
///
/// Systems run in registration order after the step's commands.
pub trait System<S>: 'static {
    /// Human-readable name for error reporting.
    fn name(&self) -> &str;

    /// Execute the system for one step.
    fn tick(&mut self, ctx: &mut StepContext<'_, S>) -> Result<(), HandlerError>;
}

// ── HandlerRegistry ────────────────────────────────────────────────

/// Command type to handler lookup, in registration order.
pub struct HandlerRegistry<S> {
    handlers: IndexMap<String, Box<dyn CommandHandler<S>>>,
}

impl<S> Default for HandlerRegistry<S> {
    fn default() -> Self {
        Self {
            handlers: IndexMap::new(),
        }
    }
}

impl<S: 'static> HandlerRegistry<S> {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `command_type`, returning any handler it replaces.
    pub fn register(
        &mut self,
        command_type: impl Into<String>,
        handler: impl CommandHandler<S>,
    ) -> Option<Box<dyn CommandHandler<S>>> {
        self.handlers.insert(command_type.into(), Box::new(handler))
    }

    /// Register a closure for `command_type`.
    pub fn register_fn<F>(
        &mut self,
        command_type: impl Into<String>,
        f: F,
    ) -> Option<Box<dyn CommandHandler<S>>>
    where
        F: Fn(&Command, &mut StepContext<'_, S>) -> Result<(), HandlerError> + 'static,
    {
        self.register(command_type, FnHandler(f))
    }

    /// Handler for `command_type`.
    pub fn get(&self, command_type: &str) -> Option<&dyn CommandHandler<S>> {
        self.handlers.get(command_type).map(|h| h.as_ref())
    }

    /// Whether `command_type` has a handler.
    pub fn contains(&self, command_type: &str) -> bool {
        self.handlers.contains_key(command_type)
    }

    /// Registered command types in registration order.
    pub fn command_types(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

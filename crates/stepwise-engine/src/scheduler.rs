//! Fixed-timestep scheduler.
//!
//! [`FixedTimestep`] converts wall-clock milliseconds into whole steps.
//! Its only state is an accumulator of time owed but not yet stepped.
//!
//! # Policies
//!
//! - [`advance()`](FixedTimestep::advance): foreground/background ticking.
//!   Steps per call are capped; anything over the cap stays in the
//!   accumulator for the next call, so a long frame never causes a
//!   runaway burst and no simulated time is lost.
//! - [`catch_up()`](FixedTimestep::catch_up): resume after suspension.
//!   Elapsed time is clamped to `max_offline_ms` (the remainder is
//!   returned as overflow for the host to persist) and executed in
//!   batches of `offline_batch_size` steps.
//!
//! Non-finite, negative, or zero deltas are a no-op. The scheduler is
//! pumped from unconditional frame loops, so it never panics on bad input.

use tracing::{debug, info, warn};

use crate::config::{ConfigError, SchedulerConfig};

/// Per-step information passed to the step callback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepInfo {
    /// Accumulator contents after this step was deducted.
    pub backlog_ms: f64,
    /// Whether the step is part of an offline catch-up.
    pub is_catch_up: bool,
    /// Whether this is the first step of its call (or of its catch-up batch).
    pub is_first_in_batch: bool,
}

impl StepInfo {
    /// Info for a step executed directly, outside any scheduler call.
    pub fn single() -> Self {
        Self {
            backlog_ms: 0.0,
            is_catch_up: false,
            is_first_in_batch: true,
        }
    }
}

/// Outcome of [`FixedTimestep::advance`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdvanceReport {
    /// Steps executed by this call.
    pub executed_steps: u64,
    /// Time left in the accumulator.
    pub backlog_ms: f64,
}

/// Outcome of [`FixedTimestep::catch_up`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CatchUpReport {
    /// Steps executed by this call.
    pub executed_steps: u64,
    /// Time left in the accumulator.
    pub backlog_ms: f64,
    /// Requested time beyond `max_offline_ms` that was not applied.
    pub overflow_ms: f64,
    /// Number of batches executed.
    pub batches: u64,
}

/// Fixed-timestep accumulator with foreground, background, and offline policies.
#[derive(Clone, Debug)]
pub struct FixedTimestep {
    config: SchedulerConfig,
    accumulator_ms: f64,
    background: bool,
}

impl FixedTimestep {
    /// Create a scheduler with an empty accumulator.
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            accumulator_ms: 0.0,
            background: false,
        })
    }

    /// The scheduler's configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Duration of one step in milliseconds.
    pub fn step_size_ms(&self) -> f64 {
        self.config.step_size_ms
    }

    /// Time owed but not yet stepped.
    pub fn backlog_ms(&self) -> f64 {
        self.accumulator_ms
    }

    /// Whether the background step cap is in effect.
    pub fn is_background(&self) -> bool {
        self.background
    }

    /// Select the background (`true`) or foreground (`false`) step cap.
    pub fn set_background(&mut self, background: bool) {
        self.background = background;
    }

    /// Drop any accumulated backlog.
    pub fn reset(&mut self) {
        self.accumulator_ms = 0.0;
    }

    /// Add `delta_ms` and execute as many whole steps as the active cap allows.
    ///
    /// The accumulator is decremented before each callback, so
    /// [`StepInfo::backlog_ms`] is the time still owed after that step. If
    /// the callback fails, the error is returned immediately and no further
    /// steps run in this call.
    pub fn advance<E, F>(&mut self, delta_ms: f64, mut on_step: F) -> Result<AdvanceReport, E>
    where
        F: FnMut(StepInfo) -> Result<(), E>,
    {
        if !delta_ms.is_finite() || delta_ms <= 0.0 {
            return Ok(self.advance_report(0));
        }
        self.accumulator_ms += delta_ms;

        let available = self.available_steps();
        let cap = if self.background {
            self.config.max_background_steps
        } else {
            self.config.max_foreground_steps
        };
        let to_run = available.min(cap);
        if available > cap {
            debug!(
                available,
                cap,
                background = self.background,
                "step cap reached, deferring backlog"
            );
        }

        for i in 0..to_run {
            self.accumulator_ms -= self.config.step_size_ms;
            on_step(StepInfo {
                backlog_ms: self.accumulator_ms,
                is_catch_up: false,
                is_first_in_batch: i == 0,
            })?;
        }
        Ok(self.advance_report(to_run))
    }

    /// Apply a suspension's elapsed time in bounded batches.
    ///
    /// At most `max_offline_ms` is applied; the rest is reported as
    /// [`CatchUpReport::overflow_ms`]. Every whole step owed (including any
    /// prior backlog) is executed, in batches of `offline_batch_size`.
    pub fn catch_up<E, F>(&mut self, elapsed_ms: f64, mut on_step: F) -> Result<CatchUpReport, E>
    where
        F: FnMut(StepInfo) -> Result<(), E>,
    {
        if !elapsed_ms.is_finite() || elapsed_ms <= 0.0 {
            return Ok(CatchUpReport {
                executed_steps: 0,
                backlog_ms: self.accumulator_ms,
                overflow_ms: 0.0,
                batches: 0,
            });
        }

        let applied_ms = elapsed_ms.min(self.config.max_offline_ms);
        let overflow_ms = elapsed_ms - applied_ms;
        if overflow_ms > 0.0 {
            warn!(
                elapsed_ms,
                max_offline_ms = self.config.max_offline_ms,
                overflow_ms,
                "offline time exceeds cap, returning overflow"
            );
        }
        self.accumulator_ms += applied_ms;

        let total = self.available_steps();
        info!(applied_ms, steps = total, "offline catch-up started");

        let mut executed = 0u64;
        let mut batches = 0u64;
        while executed < total {
            let batch = (total - executed).min(self.config.offline_batch_size);
            for i in 0..batch {
                self.accumulator_ms -= self.config.step_size_ms;
                on_step(StepInfo {
                    backlog_ms: self.accumulator_ms,
                    is_catch_up: true,
                    is_first_in_batch: i == 0,
                })?;
            }
            executed += batch;
            batches += 1;
        }

        info!(executed, batches, "offline catch-up finished");
        Ok(CatchUpReport {
            executed_steps: executed,
            backlog_ms: self.accumulator_ms,
            overflow_ms,
            batches,
        })
    }

    fn available_steps(&self) -> u64 {
        (self.accumulator_ms / self.config.step_size_ms).floor() as u64
    }

    fn advance_report(&self, executed_steps: u64) -> AdvanceReport {
        AdvanceReport {
            executed_steps,
            backlog_ms: self.accumulator_ms,
        }
    }
}

//! Restoring a runtime from a [`SaveDocument`].

use tracing::{debug, warn};

use stepwise_engine::{PrdRegistry, RngContext, RngSnapshot, Runtime, SimulationState};

use crate::error::SaveError;
use crate::format::{SaveDocument, SAVE_FORMAT_VERSION};

/// Options for [`hydrate_save`].
#[derive(Clone, Debug)]
pub struct HydrateOptions {
    /// Replace the runtime's RNG with the saved stream. Default: `true`.
    ///
    /// Set to `false` to keep an RNG the host has already seeded.
    pub apply_rng_seed: bool,
}

impl Default for HydrateOptions {
    fn default() -> Self {
        Self {
            apply_rng_seed: true,
        }
    }
}

/// Restore every component of `runtime` from `save`.
///
/// Every engine-owned section is validated before anything is written, so
/// a malformed save leaves the runtime untouched. The consumer state is
/// restored first; if it refuses, nothing else has changed either.
/// The scheduler backlog is cleared.
pub fn hydrate_save<S: SimulationState>(
    save: &SaveDocument,
    runtime: &mut Runtime<S>,
    options: &HydrateOptions,
) -> Result<(), SaveError> {
    if save.version != SAVE_FORMAT_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_FORMAT_VERSION,
            found: save.version,
        });
    }
    save.validate()?;
    runtime.queue().validate_snapshot(&save.command_queue)?;

    let mut prd = PrdRegistry::new();
    prd.restore(&save.prd)?;

    let rng = if options.apply_rng_seed {
        let mut rng = RngContext::new(save.runtime.rng_seed);
        rng.restore(RngSnapshot {
            seed: save.runtime.rng_seed,
            position: save.runtime.rng_position.unwrap_or(0),
        })?;
        Some(rng)
    } else {
        None
    };

    if save.runtime.step_size_ms != runtime.step_size_ms() {
        warn!(
            saved = save.runtime.step_size_ms,
            runtime = runtime.step_size_ms(),
            "hydrating a save taken with a different step size"
        );
    }

    runtime.state_mut().restore(&save.sections())?;
    runtime.queue_mut().restore(save.command_queue.clone())?;
    runtime.set_current_step(save.runtime.step);
    if let Some(rng) = rng {
        *runtime.rng_mut() = rng;
    }
    *runtime.prd_mut() = prd;
    runtime.scheduler_mut().reset();

    debug!(
        step = save.runtime.step.0,
        queued = save.command_queue.entries.len(),
        "hydrated save"
    );
    Ok(())
}

//! Capturing a live runtime into a [`SaveDocument`].

use stepwise_core::canonical_hash;
use stepwise_engine::{Runtime, SimulationState};

use crate::error::SaveError;
use crate::format::{validate_saved_at, RuntimeSection, SaveDocument, SAVE_FORMAT_VERSION};

/// Snapshot every component of `runtime`.
///
/// A pure function of the live state: two calls without an intervening
/// step produce documents that differ only in `savedAt`. Fails if any
/// captured value is not recordable, so a bad save is caught at capture
/// time rather than on load.
pub fn serialize_save<S: SimulationState>(
    runtime: &Runtime<S>,
    saved_at: f64,
) -> Result<SaveDocument, SaveError> {
    validate_saved_at(saved_at)?;
    let sections = runtime.state().capture()?;
    let rng = runtime.rng().snapshot()?;

    let document = SaveDocument {
        version: SAVE_FORMAT_VERSION,
        saved_at,
        resources: sections.resources,
        progression: sections.progression,
        automation: sections.automation,
        transforms: sections.transforms,
        entities: sections.entities,
        prd: runtime.prd().snapshot(),
        command_queue: runtime.queue().snapshot(),
        runtime: RuntimeSection {
            step: runtime.current_step(),
            step_size_ms: runtime.step_size_ms(),
            rng_seed: rng.seed,
            rng_position: Some(rng.position),
        },
    };
    document.to_value()?;
    Ok(document)
}

/// Canonical SHA-256 of the runtime's full state.
///
/// Hashes the save document with `savedAt` removed, so the checksum
/// depends only on simulation state.
pub fn state_checksum<S: SimulationState>(runtime: &Runtime<S>) -> Result<String, SaveError> {
    let mut value = serialize_save(runtime, 0.0)?.to_value()?;
    value.remove("savedAt");
    Ok(canonical_hash(&value)?)
}

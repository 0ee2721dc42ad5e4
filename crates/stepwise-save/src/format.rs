//! The versioned save document.
//!
//! ```text
//! { version, savedAt,
//!   resources, progression, automation, transforms, entities,
//!   prd, commandQueue,
//!   runtime: { step, stepSizeMs, rngSeed, rngPosition? } }
//! ```
//!
//! The five state sections are opaque restricted-JSON values produced by
//! the consumer's [`SimulationState`](stepwise_engine::SimulationState).
//! Everything else belongs to the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stepwise_core::{from_value, to_value, Step, Value, ValueError};
use stepwise_engine::{PrdState, QueueSnapshot, StateSections};

use crate::error::SaveError;

/// Current save format version.
///
/// History:
/// - v0: queue stored under `queue`, no PRD section, runtime without `rngPosition`
/// - v1: `commandQueue`, `prd`, and `runtime.rngPosition`
pub const SAVE_FORMAT_VERSION: u32 = 1;

/// Top-level fields a document must carry before it is parsed.
const REQUIRED_FIELDS: [&str; 6] = [
    "version",
    "savedAt",
    "resources",
    "progression",
    "commandQueue",
    "runtime",
];

/// A complete save.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDocument {
    /// Format version; [`SAVE_FORMAT_VERSION`] for documents written by this build.
    pub version: u32,
    /// Wall-clock capture time in milliseconds.
    pub saved_at: f64,
    /// Resource amounts and capacities.
    pub resources: Value,
    /// Generator and upgrade purchase state.
    pub progression: Value,
    /// Automation state.
    #[serde(default)]
    pub automation: Value,
    /// Transform state.
    #[serde(default)]
    pub transforms: Value,
    /// Entity state.
    #[serde(default)]
    pub entities: Value,
    /// PRD attempt counters, keyed by PRD id.
    #[serde(default)]
    pub prd: BTreeMap<String, PrdState>,
    /// Pending commands.
    pub command_queue: QueueSnapshot,
    /// Engine clock and RNG state.
    pub runtime: RuntimeSection,
}

/// The `runtime` block of a save.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSection {
    /// Next step to execute.
    pub step: Step,
    /// Step duration the save was taken with.
    pub step_size_ms: f64,
    /// RNG seed.
    pub rng_seed: u64,
    /// Words consumed from the RNG stream. Absent means a fresh stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_position: Option<u64>,
}

impl SaveDocument {
    /// The five state sections, in the shape
    /// [`SimulationState::restore`](stepwise_engine::SimulationState::restore) expects.
    pub fn sections(&self) -> StateSections {
        StateSections {
            resources: self.resources.clone(),
            progression: self.progression.clone(),
            automation: self.automation.clone(),
            transforms: self.transforms.clone(),
            entities: self.entities.clone(),
        }
    }

    /// Convert to a restricted-JSON value, rejecting anything unrecordable.
    pub fn to_value(&self) -> Result<Value, ValueError> {
        to_value(self)
    }

    /// Parse a document, failing on the first missing or malformed field.
    pub fn from_value(value: &Value) -> Result<Self, SaveError> {
        let object = value.as_object().ok_or_else(|| SaveError::InvalidField {
            field: "$".into(),
            reason: format!("expected an object, got {}", value.kind()),
        })?;
        for field in REQUIRED_FIELDS {
            if !object.contains_key(field) {
                return Err(SaveError::MissingField { field });
            }
        }
        let saved_at = object
            .get("savedAt")
            .and_then(Value::as_f64)
            .ok_or_else(|| SaveError::InvalidField {
                field: "savedAt".into(),
                reason: "expected a number".into(),
            })?;
        validate_saved_at(saved_at)?;

        let document: SaveDocument = from_value(value).map_err(|e| SaveError::InvalidField {
            field: "$".into(),
            reason: e.to_string(),
        })?;
        document.validate()?;
        Ok(document)
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), SaveError> {
        validate_saved_at(self.saved_at)?;
        if !(self.runtime.step_size_ms.is_finite() && self.runtime.step_size_ms > 0.0) {
            return Err(SaveError::InvalidField {
                field: "runtime.stepSizeMs".into(),
                reason: format!("must be positive and finite (got {})", self.runtime.step_size_ms),
            });
        }
        Ok(())
    }
}

/// `savedAt` must be a finite, non-negative timestamp.
pub fn validate_saved_at(saved_at: f64) -> Result<(), SaveError> {
    if saved_at.is_finite() && saved_at >= 0.0 {
        Ok(())
    } else {
        Err(SaveError::InvalidSavedAt { value: saved_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Value {
        Value::object([
            ("version", Value::from(1u32)),
            ("savedAt", Value::from(1_000.0)),
            ("resources", Value::empty_object()),
            ("progression", Value::empty_object()),
            (
                "commandQueue",
                Value::object([
                    ("entries", Value::Array(Vec::new())),
                    ("nextSequence", Value::from(0u32)),
                ]),
            ),
            (
                "runtime",
                Value::object([
                    ("step", Value::from(4u32)),
                    ("stepSizeMs", Value::from(100.0)),
                    ("rngSeed", Value::from(9u32)),
                ]),
            ),
        ])
    }

    // ── parsing ────────────────────────────────────────────────

    #[test]
    fn parses_minimal_document_with_defaults() {
        let doc = SaveDocument::from_value(&minimal()).unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.runtime.step, Step(4));
        assert_eq!(doc.runtime.rng_position, None);
        assert!(doc.prd.is_empty());
        assert!(doc.automation.is_null());
    }

    #[test]
    fn each_required_field_is_checked() {
        for field in ["resources", "progression", "commandQueue"] {
            let mut value = minimal();
            value.remove(field);
            match SaveDocument::from_value(&value) {
                Err(SaveError::MissingField { field: missing }) => assert_eq!(missing, field),
                other => panic!("expected MissingField for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn negative_saved_at_is_rejected() {
        let mut value = minimal();
        value.insert("savedAt", Value::from(-1.0));
        assert!(matches!(
            SaveDocument::from_value(&value),
            Err(SaveError::InvalidSavedAt { .. })
        ));
    }

    #[test]
    fn non_numeric_saved_at_is_rejected() {
        let mut value = minimal();
        value.insert("savedAt", Value::from("yesterday"));
        match SaveDocument::from_value(&value) {
            Err(SaveError::InvalidField { field, .. }) => assert_eq!(field, "savedAt"),
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn malformed_queue_is_reported() {
        let mut value = minimal();
        value.insert("commandQueue", Value::from(3.0));
        assert!(matches!(
            SaveDocument::from_value(&value),
            Err(SaveError::InvalidField { .. })
        ));
    }

    #[test]
    fn non_object_document_is_rejected() {
        assert!(matches!(
            SaveDocument::from_value(&Value::Array(Vec::new())),
            Err(SaveError::InvalidField { .. })
        ));
    }

    // ── serialization ──────────────────────────────────────────

    #[test]
    fn to_value_uses_camel_case_and_omits_absent_position() {
        let doc = SaveDocument::from_value(&minimal()).unwrap();
        let value = doc.to_value().unwrap();
        assert!(value.get("commandQueue").is_some());
        assert!(value.get("savedAt").is_some());
        let runtime = value.get("runtime").unwrap();
        assert!(runtime.get("stepSizeMs").is_some());
        assert!(runtime.get("rngPosition").is_none());
    }

    #[test]
    fn zero_step_size_fails_validation() {
        let mut doc = SaveDocument::from_value(&minimal()).unwrap();
        doc.runtime.step_size_ms = 0.0;
        assert!(doc.validate().is_err());
    }
}

//! Stepwise: a deterministic fixed-timestep simulation core for idle games.
//!
//! This is the facade crate that re-exports the public API of every
//! Stepwise sub-crate. Most consumers only need this one dependency.
//!
//! # Quick start
//!
//! ```rust
//! use stepwise::prelude::*;
//!
//! struct Counter {
//!     clicks: f64,
//! }
//!
//! impl SimulationState for Counter {
//!     fn capture(&self) -> Result<StateSections, ValueError> {
//!         Ok(StateSections {
//!             resources: Value::object([("clicks", Value::from(self.clicks))]),
//!             progression: Value::empty_object(),
//!             automation: Value::empty_object(),
//!             transforms: Value::empty_object(),
//!             entities: Value::empty_object(),
//!         })
//!     }
//!
//!     fn restore(&mut self, sections: &StateSections) -> Result<(), RestoreError> {
//!         self.clicks = sections
//!             .resources
//!             .get("clicks")
//!             .and_then(Value::as_f64)
//!             .ok_or_else(|| RestoreError::new("resources", "missing clicks"))?;
//!         Ok(())
//!     }
//! }
//!
//! let content = ContentPack::new("demo", "1.0.0", Value::empty_object());
//! let mut runtime = Runtime::new(RuntimeConfig::default(), content, Counter { clicks: 0.0 })?;
//! runtime.register_fn("CLICK", |_cmd: &Command, ctx: &mut StepContext<'_, Counter>| {
//!     ctx.state_mut().clicks += 1.0;
//!     Ok(())
//! });
//!
//! runtime.enqueue(Command::new("CLICK", CommandPriority::Player, Step(0)))?;
//! let report = runtime.tick(250.0)?;
//! assert_eq!(report.executed_steps, 2);
//! assert_eq!(runtime.state().clicks, 1.0);
//!
//! let save = serialize_save(&runtime, 0.0)?;
//! assert_eq!(save.runtime.step, Step(2));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `stepwise-core` | Restricted JSON values, canonical hashing, commands, content identity |
//! | [`engine`] | `stepwise-engine` | Runtime, scheduler, command queue, RNG and PRD |
//! | [`save`] | `stepwise-save` | Save documents, hydration, migrations, compression |
//! | [`replay`] | `stepwise-replay` | Replay recording, wire format, verification |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Values, hashing, and commands (`stepwise-core`).
pub use stepwise_core as types;

/// Step execution (`stepwise-engine`).
///
/// [`engine::Runtime`] owns a simulation instance and drives it with a
/// [`engine::FixedTimestep`] scheduler.
pub use stepwise_engine as engine;

/// Versioned saves (`stepwise-save`).
pub use stepwise_save as save;

/// Deterministic replays (`stepwise-replay`).
///
/// Record with [`replay::RecordingSession`], verify with
/// [`replay::run_sim_replay`].
pub use stepwise_replay as replay;

/// Common imports for typical Stepwise usage.
///
/// ```rust
/// use stepwise::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use stepwise_core::{
        canonical_hash, Command, CommandPriority, ContentDigest, ContentPack, Step, Value,
    };

    // Errors
    pub use stepwise_core::{CommandError, ValueError};
    pub use stepwise_engine::{ConfigError, HandlerError, RestoreError, StepError};
    pub use stepwise_replay::ReplayError;
    pub use stepwise_save::SaveError;

    // Engine
    pub use stepwise_engine::{
        CommandHandler, Runtime, RuntimeConfig, SchedulerConfig, SimulationState, StateSections,
        StepContext, System,
    };

    // Saves
    pub use stepwise_save::{
        decode_save, encode_save, hydrate_save, load_save, serialize_save, HydrateOptions,
        LoadOptions, MigrationRegistry, SaveDocument,
    };

    // Replays
    pub use stepwise_replay::{
        decode_sim_replay_json_lines, encode_sim_replay_json_lines, run_sim_replay, ExportOptions,
        RecordingSession, SimReplay,
    };
}

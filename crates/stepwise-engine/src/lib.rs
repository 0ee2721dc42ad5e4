//! Deterministic step execution for Stepwise simulations.
//!
//! Provides the [`Runtime`] that owns a simulation instance and drives it
//! with a [`FixedTimestep`] scheduler, pulling due commands from a bounded,
//! priority-ordered [`CommandQueue`] and dispatching them to
//! consumer-registered handlers. Random draws go through an explicit
//! [`RngContext`]/[`PrdRegistry`] owned by the runtime, so independent
//! instances never share random state.

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod handler;
pub mod prd;
pub mod queue;
pub mod rng;
pub mod runtime;
pub mod scheduler;

pub use config::{ConfigError, RuntimeConfig, SchedulerConfig, MAX_RNG_SEED};
pub use error::{HandlerError, QueueRestoreError, RestoreError, RngStateError, StepError};
pub use handler::{CommandHandler, FnHandler, HandlerRegistry, StepContext, System};
pub use prd::{PrdRegistry, PrdState};
pub use queue::{CommandQueue, QueueEntry, QueueSnapshot, DEFAULT_MAX_QUEUE_SIZE};
pub use rng::{RngContext, RngSnapshot};
pub use runtime::{Runtime, SimulationState, StateSections};
pub use scheduler::{AdvanceReport, CatchUpReport, FixedTimestep, StepInfo};

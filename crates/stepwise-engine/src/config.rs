//! Scheduler and runtime configuration, validation, and error types.
//!
//! [`RuntimeConfig`] is the builder input for a [`Runtime`](crate::Runtime).
//! [`validate()`](RuntimeConfig::validate) checks structural invariants at
//! construction; nothing is re-checked per step.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use stepwise_core::{Step, MAX_SAFE_INTEGER};

use crate::queue::DEFAULT_MAX_QUEUE_SIZE;

/// Largest seed a save or replay can carry.
pub const MAX_RNG_SEED: u64 = MAX_SAFE_INTEGER as u64;

/// Twelve hours in milliseconds.
const TWELVE_HOURS_MS: f64 = 12.0 * 60.0 * 60.0 * 1000.0;

// ── SchedulerConfig ────────────────────────────────────────────────

/// Configuration for the [`FixedTimestep`](crate::FixedTimestep) scheduler.
#[derive(Clone, Debug, PartialEq)]
pub struct SchedulerConfig {
    /// Duration of one step in milliseconds. Default: 100.
    pub step_size_ms: f64,
    /// Maximum steps a single foreground `advance` may execute. Default: 50.
    pub max_foreground_steps: u64,
    /// Maximum steps a single `advance` may execute while throttled. Default: 5.
    pub max_background_steps: u64,
    /// Largest elapsed time a single `catch_up` will apply. Default: 12 hours.
    pub max_offline_ms: f64,
    /// Steps per offline catch-up batch. Default: 500.
    pub offline_batch_size: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            step_size_ms: 100.0,
            max_foreground_steps: 50,
            max_background_steps: 5,
            max_offline_ms: TWELVE_HOURS_MS,
            offline_batch_size: 500,
        }
    }
}

impl SchedulerConfig {
    /// Validate the scheduler invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.step_size_ms.is_finite() || self.step_size_ms <= 0.0 {
            return Err(ConfigError::InvalidStepSize {
                value: self.step_size_ms,
            });
        }
        if self.max_foreground_steps == 0 {
            return Err(ConfigError::ZeroStepCap {
                which: "max_foreground_steps",
            });
        }
        if self.max_background_steps == 0 {
            return Err(ConfigError::ZeroStepCap {
                which: "max_background_steps",
            });
        }
        if !self.max_offline_ms.is_finite() || self.max_offline_ms < 0.0 {
            return Err(ConfigError::InvalidOfflineCap {
                value: self.max_offline_ms,
            });
        }
        if self.offline_batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(())
    }
}

// ── RuntimeConfig ──────────────────────────────────────────────────

/// Complete configuration for constructing a [`Runtime`](crate::Runtime).
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeConfig {
    /// Scheduler policy.
    pub scheduler: SchedulerConfig,
    /// Maximum pending commands. Default: [`DEFAULT_MAX_QUEUE_SIZE`].
    pub queue_capacity: usize,
    /// Step the runtime starts at. Default: 0.
    pub start_step: Step,
    /// Seed for the runtime's RNG context. Default: 0. At most
    /// [`MAX_RNG_SEED`].
    pub rng_seed: u64,
    /// Feature flags describing which optional systems are wired in.
    /// Recorded into replays and compared on playback.
    pub wiring: BTreeMap<String, bool>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            queue_capacity: DEFAULT_MAX_QUEUE_SIZE,
            start_step: Step(0),
            rng_seed: 0,
            wiring: BTreeMap::new(),
        }
    }
}

impl RuntimeConfig {
    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate()?;
        if self.queue_capacity == 0 {
            return Err(ConfigError::QueueCapacityZero);
        }
        if self.rng_seed > MAX_RNG_SEED {
            return Err(ConfigError::UnrecordableSeed {
                seed: self.rng_seed,
            });
        }
        if self.wiring.keys().any(String::is_empty) {
            return Err(ConfigError::EmptyWiringFlag);
        }
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during configuration validation.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// `step_size_ms` is NaN, infinite, zero, or negative.
    InvalidStepSize {
        /// The invalid value.
        value: f64,
    },
    /// A per-call step cap is zero.
    ZeroStepCap {
        /// Which cap was zero.
        which: &'static str,
    },
    /// `max_offline_ms` is NaN, infinite, or negative.
    InvalidOfflineCap {
        /// The invalid value.
        value: f64,
    },
    /// `offline_batch_size` is zero.
    ZeroBatchSize,
    /// Command queue capacity is zero.
    QueueCapacityZero,
    /// `rng_seed` is larger than [`MAX_RNG_SEED`].
    UnrecordableSeed {
        /// The rejected seed.
        seed: u64,
    },
    /// A wiring flag has an empty name.
    EmptyWiringFlag,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStepSize { value } => {
                write!(f, "step_size_ms must be finite and positive, got {value}")
            }
            Self::ZeroStepCap { which } => write!(f, "{which} must be at least 1"),
            Self::InvalidOfflineCap { value } => {
                write!(f, "max_offline_ms must be finite and non-negative, got {value}")
            }
            Self::ZeroBatchSize => write!(f, "offline_batch_size must be at least 1"),
            Self::QueueCapacityZero => write!(f, "queue_capacity must be at least 1"),
            Self::UnrecordableSeed { seed } => {
                write!(f, "rng_seed {seed} exceeds the largest saveable seed {MAX_RNG_SEED}")
            }
            Self::EmptyWiringFlag => write!(f, "wiring flag names must be non-empty"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RuntimeConfig::default().validate().is_ok());
        let s = SchedulerConfig::default();
        assert_eq!(s.step_size_ms, 100.0);
        assert_eq!(s.max_offline_ms, 43_200_000.0);
    }

    #[test]
    fn rejects_non_positive_step_size() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let cfg = SchedulerConfig {
                step_size_ms: bad,
                ..SchedulerConfig::default()
            };
            assert!(matches!(
                cfg.validate(),
                Err(ConfigError::InvalidStepSize { .. })
            ));
        }
    }

    #[test]
    fn rejects_zero_caps_and_batch() {
        let cfg = SchedulerConfig {
            max_background_steps: 0,
            ..SchedulerConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ZeroStepCap {
                which: "max_background_steps"
            })
        );
        let cfg = SchedulerConfig {
            offline_batch_size: 0,
            ..SchedulerConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroBatchSize));
    }

    #[test]
    fn rejects_zero_queue_capacity() {
        let cfg = RuntimeConfig {
            queue_capacity: 0,
            ..RuntimeConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::QueueCapacityZero));
    }

    #[test]
    fn rejects_seed_beyond_safe_integer_range() {
        let cfg = RuntimeConfig {
            rng_seed: MAX_RNG_SEED,
            ..RuntimeConfig::default()
        };
        assert!(cfg.validate().is_ok());

        for seed in [MAX_RNG_SEED + 1, u64::MAX] {
            let cfg = RuntimeConfig {
                rng_seed: seed,
                ..RuntimeConfig::default()
            };
            assert_eq!(cfg.validate(), Err(ConfigError::UnrecordableSeed { seed }));
        }
    }

    #[test]
    fn rejects_empty_wiring_flag() {
        let mut cfg = RuntimeConfig::default();
        cfg.wiring.insert(String::new(), true);
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyWiringFlag));
    }
}

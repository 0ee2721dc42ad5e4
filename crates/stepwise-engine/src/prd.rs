//! Pseudo-random distribution registry.
//!
//! A PRD draw succeeds with chance `C * n` on the `n`-th attempt since the
//! last success, where `C` is chosen so the long-run success rate equals
//! the nominal probability. This removes long droughts and streaks while
//! keeping the average. The per-id attempt counters are simulation state
//! and are saved with the game.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::RngStateError;
use crate::rng::RngContext;

/// Bisection rounds when solving for `C`.
const SOLVE_ITERATIONS: usize = 64;

#[derive(Clone, Debug)]
struct PrdEntry {
    probability: f64,
    constant: f64,
    attempts: u32,
}

/// Per-id PRD state, iterated in registration order.
#[derive(Clone, Debug, Default)]
pub struct PrdRegistry {
    entries: IndexMap<String, PrdEntry>,
}

impl PrdRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw for `id` with nominal success `probability`.
    ///
    /// Probabilities outside `(0, 1)` short-circuit: `<= 0` (or NaN) never
    /// succeeds and `>= 1` always does. Changing an id's probability keeps
    /// its attempt counter.
    pub fn roll(&mut self, id: &str, probability: f64, rng: &mut RngContext) -> bool {
        if probability.is_nan() || probability <= 0.0 {
            return false;
        }
        if probability >= 1.0 {
            return true;
        }
        let entry = self
            .entries
            .entry(id.to_owned())
            .or_insert_with(|| PrdEntry {
                probability,
                constant: constant_for(probability),
                attempts: 0,
            });
        if entry.probability != probability {
            entry.probability = probability;
            entry.constant = constant_for(probability);
        }
        entry.attempts += 1;
        let chance = (entry.constant * f64::from(entry.attempts)).min(1.0);
        if rng.next_f64() < chance {
            entry.attempts = 0;
            true
        } else {
            false
        }
    }

    /// Failed attempts recorded for `id` since its last success.
    pub fn attempts(&self, id: &str) -> u32 {
        self.entries.get(id).map_or(0, |e| e.attempts)
    }

    /// Number of registered ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no id has been rolled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every id.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Capture `id -> {probability, attempts}` in sorted key order.
    pub fn snapshot(&self) -> BTreeMap<String, PrdState> {
        self.entries
            .iter()
            .map(|(id, e)| {
                (
                    id.clone(),
                    PrdState {
                        probability: e.probability,
                        attempts: e.attempts,
                    },
                )
            })
            .collect()
    }

    /// Replace all entries with `snapshot`. Validated in full before any change.
    pub fn restore(&mut self, snapshot: &BTreeMap<String, PrdState>) -> Result<(), RngStateError> {
        for (id, state) in snapshot {
            if state.probability.is_nan() || state.probability <= 0.0 || state.probability >= 1.0 {
                return Err(RngStateError::InvalidPrdEntry {
                    id: id.clone(),
                    reason: format!("probability {} is outside (0, 1)", state.probability),
                });
            }
        }
        self.entries = snapshot
            .iter()
            .map(|(id, state)| {
                (
                    id.clone(),
                    PrdEntry {
                        probability: state.probability,
                        constant: constant_for(state.probability),
                        attempts: state.attempts,
                    },
                )
            })
            .collect();
        Ok(())
    }
}

/// Saved state of one PRD id.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrdState {
    /// Nominal success probability.
    pub probability: f64,
    /// Failed attempts since the last success.
    pub attempts: u32,
}

/// Long-run success rate produced by increment `c`.
fn rate_for(c: f64) -> f64 {
    let mut expected_attempts = 0.0;
    let mut reached = 1.0;
    let mut n = 1u32;
    loop {
        let p_here = (c * f64::from(n)).min(1.0);
        expected_attempts += f64::from(n) * reached * p_here;
        reached *= 1.0 - p_here;
        if p_here >= 1.0 || reached <= 0.0 {
            break;
        }
        n += 1;
    }
    1.0 / expected_attempts
}

/// Solve `rate_for(c) == p` by bisection. `rate_for` is increasing in `c`.
fn constant_for(p: f64) -> f64 {
    let (mut lo, mut hi) = (0.0, p);
    for _ in 0..SOLVE_ITERATIONS {
        let mid = (lo + hi) / 2.0;
        if rate_for(mid) < p {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) / 2.0
}

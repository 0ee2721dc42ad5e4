//! Strongly-typed step identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A discrete simulation tick.
///
/// Time advances only in whole steps of fixed duration; `Step(n)` is the
/// step about to execute after `n` steps have completed since step zero.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Step(pub u64);

impl Step {
    /// The step after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Step {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

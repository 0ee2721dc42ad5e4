//! Seeded random-number context.
//!
//! Every random draw inside a simulation goes through an [`RngContext`]
//! owned by the runtime, never a global generator, so two runtimes in one
//! process cannot perturb each other. The stream position is part of the
//! snapshot: restoring `{seed, position}` resumes the exact sequence.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::RngStateError;

/// Largest stream position that survives a round trip through a JSON number.
const MAX_RECORDABLE_POSITION: u128 = (1u128 << 53) - 1;

/// Serializable RNG state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RngSnapshot {
    /// Seed the stream was created from.
    pub seed: u64,
    /// Number of 32-bit words consumed since seeding.
    pub position: u64,
}

/// Deterministic ChaCha8 stream with an explicit seed lifecycle.
#[derive(Clone, Debug)]
pub struct RngContext {
    seed: u64,
    rng: ChaCha8Rng,
}

impl RngContext {
    /// A fresh stream for `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// The seed of the current stream.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart from the beginning of the stream for `seed`.
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    /// Uniform draw in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Uniform integer in `[0, bound)`. Returns 0 when `bound` is 0.
    pub fn next_below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        self.rng.gen_range(0..bound)
    }

    /// Capture seed and stream position.
    pub fn snapshot(&self) -> Result<RngSnapshot, RngStateError> {
        let position = self.rng.get_word_pos();
        if position > MAX_RECORDABLE_POSITION {
            return Err(RngStateError::PositionOutOfRange { position });
        }
        Ok(RngSnapshot {
            seed: self.seed,
            position: position as u64,
        })
    }

    /// Resume the stream described by `snapshot`.
    pub fn restore(&mut self, snapshot: RngSnapshot) -> Result<(), RngStateError> {
        let position = u128::from(snapshot.position);
        if position > MAX_RECORDABLE_POSITION {
            return Err(RngStateError::PositionOutOfRange { position });
        }
        let mut rng = ChaCha8Rng::seed_from_u64(snapshot.seed);
        rng.set_word_pos(position);
        self.seed = snapshot.seed;
        self.rng = rng;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = RngContext::new(42);
        let mut b = RngContext::new(42);
        for _ in 0..16 {
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
    }

    #[test]
    fn independent_contexts_do_not_interfere() {
        let mut a = RngContext::new(1);
        let mut reference = RngContext::new(1);
        let mut other = RngContext::new(1);
        for _ in 0..8 {
            other.next_f64();
        }
        assert_eq!(a.next_f64().to_bits(), reference.next_f64().to_bits());
    }

    #[test]
    fn snapshot_restore_resumes_sequence() {
        let mut a = RngContext::new(7);
        for _ in 0..5 {
            a.next_f64();
        }
        let snap = a.snapshot().unwrap();
        let expected: Vec<u64> = (0..4).map(|_| a.next_f64().to_bits()).collect();

        let mut b = RngContext::new(0);
        b.restore(snap).unwrap();
        let actual: Vec<u64> = (0..4).map(|_| b.next_f64().to_bits()).collect();
        assert_eq!(expected, actual);
        assert_eq!(b.seed(), 7);
    }

    #[test]
    fn restore_rejects_unrecordable_position() {
        let mut a = RngContext::new(0);
        let snap = RngSnapshot {
            seed: 0,
            position: u64::MAX,
        };
        assert!(matches!(
            a.restore(snap),
            Err(RngStateError::PositionOutOfRange { .. })
        ));
    }

    #[test]
    fn next_below_stays_in_range() {
        let mut a = RngContext::new(3);
        assert!((0..100).all(|_| a.next_below(6) < 6));
        assert_eq!(a.next_below(0), 0);
    }
}

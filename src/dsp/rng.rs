//! Seedable PRNG — Drives lock mutation, routing odds and sample & hold.
//!
//! The generator state is captured in every persisted record so a restored
//! engine continues the exact same random stream.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_SEED;

/// A pseudorandom number generator for audio-rate decisions that don't
/// require cryptographic quality.
#[derive(Debug, Clone, PartialEq)]
pub struct Rng(oorandom::Rand64);

impl Default for Rng {
    fn default() -> Self {
        Self::new_with_seed(DEFAULT_SEED as u128)
    }
}

impl Rng {
    /// Pass the same number to get the same stream back again.
    pub fn new_with_seed(seed: u128) -> Self {
        Self(oorandom::Rand64::new(seed))
    }

    pub fn rand_u64(&mut self) -> u64 {
        self.0.rand_u64()
    }

    pub fn rand_float(&mut self) -> f64 {
        self.0.rand_float()
    }

    /// Uniform draw in `[0, 1)`.
    #[inline]
    pub fn uniform(&mut self) -> f32 {
        // Narrowing can round up to exactly 1.0.
        (self.0.rand_float() as f32).min(1.0 - f32::EPSILON)
    }

    pub fn snapshot(&self) -> RngState {
        let (state, inc) = self.0.state();
        let mut words = [0u32; 8];
        for (i, word) in words.iter_mut().enumerate() {
            let source = if i < 4 { state } else { inc };
            *word = (source >> ((i % 4) * 32)) as u32;
        }
        RngState { words }
    }

    /// Rebuild a generator from a snapshot. An all-zero snapshot (a record
    /// written without one) falls back to the default seed.
    pub fn from_snapshot(snapshot: &RngState) -> Self {
        if snapshot.words.iter().all(|&w| w == 0) {
            return Self::default();
        }
        let mut state = 0u128;
        let mut inc = 0u128;
        for (i, &word) in snapshot.words.iter().enumerate() {
            let target = if i < 4 { &mut state } else { &mut inc };
            *target |= (word as u128) << ((i % 4) * 32);
        }
        Self(oorandom::Rand64::from_state((state, inc)))
    }
}

/// Generator state as 32-bit words, which every JSON consumer can hold
/// without precision loss.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RngState {
    words: [u32; 8],
}

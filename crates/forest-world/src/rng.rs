//! Injectable random source.
//!
//! The ecosystem draws every movement direction, spawn trial and culling
//! choice from one [`RandomSource`]. Production code uses the seeded ChaCha
//! stream; tests substitute scripted sources to force outcomes.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub trait RandomSource {
    /// Uniform draw from [0, 1)
    fn uniform(&mut self) -> f64;

    /// Uniform integer from [min, max). Returns `min` when the range is empty.
    fn random_int(&mut self, min: usize, max: usize) -> usize;
}

impl<T: RandomSource + ?Sized> RandomSource for &mut T {
    fn uniform(&mut self) -> f64 {
        (**self).uniform()
    }

    fn random_int(&mut self, min: usize, max: usize) -> usize {
        (**self).random_int(min, max)
    }
}

/// ChaCha8-backed random source
#[derive(Debug, Clone)]
pub struct SeededRandom {
    inner: ChaCha8Rng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            inner: ChaCha8Rng::from_entropy(),
        }
    }

    /// Seeded when a seed is given, entropy otherwise
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        seed.map(Self::new).unwrap_or_else(Self::from_entropy)
    }
}

impl RandomSource for SeededRandom {
    fn uniform(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    fn random_int(&mut self, min: usize, max: usize) -> usize {
        if max <= min {
            return min;
        }
        self.inner.gen_range(min..max)
    }
}

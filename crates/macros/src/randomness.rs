//! Injectable randomness source for the nondeterministic macros.
//!
//! `{{random:...}}` and `{{roll:N}}` draw from whatever [`Randomness`] the
//! processor was built with. Production uses the thread-local generator;
//! tests inject a seeded generator for reproducible assertions.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform random draws.
pub trait Randomness: Send + Sync {
    /// Uniform index in `[0, upper)`. Callers guarantee `upper >= 1`.
    fn index(&self, upper: usize) -> usize;

    /// Uniform roll in `[1, sides]`. Callers guarantee `sides >= 1`.
    fn roll(&self, sides: u64) -> u64;
}

/// The default source, backed by the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandomness;

impl Randomness for ThreadRandomness {
    fn index(&self, upper: usize) -> usize {
        rand::rng().random_range(0..upper)
    }

    fn roll(&self, sides: u64) -> u64 {
        rand::rng().random_range(1..=sides)
    }
}

/// A seeded source for deterministic tests.
#[derive(Debug)]
pub struct SeededRandomness {
    rng: Mutex<StdRng>,
}

impl SeededRandomness {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Randomness for SeededRandomness {
    fn index(&self, upper: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random_range(0..upper)
    }

    fn roll(&self, sides: u64) -> u64 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random_range(1..=sides)
    }
}

//! Injected random number service.
//!
//! The engine never draws random numbers itself; it forwards a
//! [`RandomService`] to hook calls. [`SeededRandom`] is the deterministic
//! default, backed by ChaCha8 so that a seed reproduces a run on any
//! platform.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of random numbers handed to scripted hooks.
pub trait RandomService: Send {
    /// Returns a number in `[min, max]`.
    ///
    /// Reversed bounds are swapped; equal bounds return `min`.
    fn random_in_range(&mut self, min: f64, max: f64) -> f64;

    /// Restarts the sequence from `seed`.
    fn reseed(&mut self, seed: u64);
}

/// ChaCha8-backed [`RandomService`].
///
/// # Example
///
/// ```
/// use warband_core::random::{RandomService, SeededRandom};
///
/// let mut a = SeededRandom::new(7);
/// let mut b = SeededRandom::new(7);
/// assert_eq!(a.random_in_range(0.0, 800.0), b.random_in_range(0.0, 800.0));
/// ```
#[derive(Debug, Clone)]
pub struct SeededRandom {
    seed: u64,
    rng: ChaCha8Rng,
}

impl SeededRandom {
    /// Creates a generator seeded with `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Seed the current sequence started from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }
}

impl RandomService for SeededRandom {
    fn random_in_range(&mut self, min: f64, max: f64) -> f64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        if lo == hi || !(lo.is_finite() && hi.is_finite()) {
            return min;
        }
        self.rng.gen_range(lo..=hi)
    }

    fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }
}

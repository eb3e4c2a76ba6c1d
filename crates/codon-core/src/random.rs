//! Thread-local seeded randomness for simulation replicates. `scoped_seed`
//! mirrors a scoped floating-point trap ([`crate::fptrap::scoped_strict`]):
//! RAII-restore the prior RNG state so one seeded replay can't leak into
//! the next call on the same thread.

use std::cell::RefCell;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

thread_local! {
    static RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

/// Runs `f` with the thread-local RNG seeded to `seed`, restoring its prior
/// state afterward so same-seed replays are independent of call order.
pub fn scoped_seed<R>(seed: u64, f: impl FnOnce() -> R) -> R {
    RNG.with(|cell| {
        let original = cell.replace(SmallRng::seed_from_u64(seed));
        let result = f();
        cell.replace(original);
        result
    })
}

/// Draws a single uniform value in `[0, 1)` from the thread-local RNG.
pub fn uniform01() -> f64 {
    RNG.with(|cell| cell.borrow_mut().random())
}

/// Draws a codon index `0..n_codons` from a discrete distribution given by
/// unnormalized weights (e.g. a site's stationary distribution).
pub fn weighted_choice(weights: &[f64]) -> usize {
    RNG.with(|cell| {
        let mut rng = cell.borrow_mut();
        let total: f64 = weights.iter().sum();
        let mut x: f64 = rng.random::<f64>() * total;
        for (i, &w) in weights.iter().enumerate() {
            x -= w;
            if x <= 0.0 {
                return i;
            }
        }
        weights.len() - 1
    })
}

//! Thread-local worker identity and randomness.
//!
//! Random transforms (flip, rotation, color jitter) never own an RNG. They draw
//! from the RNG of the thread they run on, which the DataLoader seeds per worker
//! and per epoch so that a seeded loader reproduces the same augmentations.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng as _;
use rand::SeedableRng;
use std::cell::RefCell;

thread_local! {
    /// Worker ID (0 to num_workers-1), assigned when the worker thread is spawned.
    /// The calling thread of a single-threaded loader is worker 0.
    pub static WORKER_ID: RefCell<usize> = const { RefCell::new(0) };

    /// Thread-local RNG for deterministic randomness in workers
    pub static WORKER_RNG: RefCell<Option<StdRng>> = const { RefCell::new(None) };
}

/// RNG of worker `worker_id` in `epoch`.
/// Seed formula: base_seed + (epoch << 32) + worker_id
pub(crate) fn worker_rng(worker_id: usize, epoch: usize, base_seed: u64) -> StdRng {
    let seed = base_seed
        .wrapping_add((epoch as u64) << 32)
        .wrapping_add(worker_id as u64);
    StdRng::seed_from_u64(seed)
}

/// Initialize worker's RNG based on worker_id, epoch, and base seed.
pub fn init_worker_rng(worker_id: usize, epoch: usize, base_seed: u64) {
    WORKER_RNG.with(|rng| *rng.borrow_mut() = Some(worker_rng(worker_id, epoch, base_seed)));
}

/// Installs `next` as this thread's RNG and returns the one it replaces.
pub(crate) fn swap_worker_rng(next: Option<StdRng>) -> Option<StdRng> {
    WORKER_RNG.with(|rng| std::mem::replace(&mut *rng.borrow_mut(), next))
}

/// Clears the seeded RNG so later draws on this thread use the thread RNG again.
pub fn reset_worker_rng() {
    WORKER_RNG.with(|rng| *rng.borrow_mut() = None);
}

/// Get a random bool from worker RNG, or thread_rng if not in worker context.
pub fn worker_gen_bool(p: f64) -> bool {
    WORKER_RNG.with(|rng| match rng.borrow_mut().as_mut() {
        Some(rng) => rng.random_bool(p),
        None => rand::rng().random_bool(p),
    })
}

/// Uniform draw from `[low, high]`. A degenerate range returns `low`.
pub fn worker_gen_range(low: f64, high: f64) -> f64 {
    if high <= low {
        return low;
    }
    WORKER_RNG.with(|rng| match rng.borrow_mut().as_mut() {
        Some(rng) => rng.random_range(low..=high),
        None => rand::rng().random_range(low..=high),
    })
}

/// Shuffles `items` in place with the worker RNG.
pub fn worker_shuffle<T>(items: &mut [T]) {
    WORKER_RNG.with(|rng| match rng.borrow_mut().as_mut() {
        Some(rng) => items.shuffle(rng),
        None => items.shuffle(&mut rand::rng()),
    })
}

//! Determinism testing utilities.
//!
//! Provides a harness for verifying that battles produce identical results
//! given identical inputs.
//!
//! # Testing Strategy
//!
//! Battles must be 100% deterministic so replays and snapshots match.
//! Sources of non-determinism include:
//!
//! - **Floating-point math**: the core uses integers and
//!   [`battle_core::math::Fixed`] throughout.
//! - **HashMap iteration order**: entities are always visited in sorted id
//!   order.
//! - **System randomness**: every random draw goes through a seeded
//!   [`battle_core::world::SeededRandom`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use battle_core::battle::Battle;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Every distinct hash (one for a deterministic battle).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Battle is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine several times and compare the final hashes.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `ticks` - Number of steps per run
/// * `setup` - Creates the initial state
/// * `step` - Advances the state by one tick
/// * `hash` - Computes the state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a battle `runs` times for `ticks` ticks and compare state hashes.
pub fn verify_battle_determinism<F>(setup_fn: F, runs: usize, ticks: u64) -> DeterminismResult
where
    F: Fn() -> Battle,
{
    verify_determinism(
        runs,
        ticks,
        &setup_fn,
        |battle| {
            battle.tick();
        },
        Battle::state_hash,
    )
}

/// Run `num_battles` battles on scoped threads and collect final hashes.
///
/// # Panics
///
/// Panics if a battle thread panics.
pub fn run_parallel_battles<F>(setup_fn: F, num_battles: usize, ticks: u64) -> DeterminismResult
where
    F: Fn() -> Battle + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_battles)
            .map(|_| {
                s.spawn(|| {
                    let mut battle = setup_fn();
                    for _ in 0..ticks {
                        battle.tick();
                    }
                    battle.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("battle thread panicked"))
            .collect()
    });

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Tick two battles side by side and return the first tick after which
/// their hashes differ (0 when they already differ before ticking).
pub fn find_first_divergence<F>(setup_fn: F, ticks: u64) -> Option<u64>
where
    F: Fn() -> Battle,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    if first.state_hash() != second.state_hash() {
        return Some(0);
    }

    for tick in 1..=ticks {
        first.tick();
        second.tick();
        if first.state_hash() != second.state_hash() {
            tracing::warn!(tick, "Battles diverged");
            return Some(tick);
        }
    }
    None
}

/// Snapshot a battle after `ticks` ticks, restore it, tick both for
/// `ticks_after` more ticks and compare hashes.
pub fn verify_snapshot_determinism<F>(setup_fn: F, ticks: u64, ticks_after: u64) -> bool
where
    F: Fn() -> Battle,
{
    let mut battle = setup_fn();
    for _ in 0..ticks {
        battle.tick();
    }

    let Ok(bytes) = battle.serialize() else {
        return false;
    };
    let Ok(mut restored) = Battle::deserialize(&bytes) else {
        return false;
    };
    if restored.state_hash() != battle.state_hash() {
        return false;
    }

    for _ in 0..ticks_after {
        battle.tick();
        restored.tick();
    }
    restored.state_hash() == battle.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::skirmish;

    #[test]
    fn test_skirmish_is_deterministic() {
        verify_battle_determinism(|| skirmish(7), 3, 50).assert_deterministic();
    }

    #[test]
    fn test_parallel_skirmishes_match() {
        run_parallel_battles(|| skirmish(7), 4, 30).assert_deterministic();
    }

    #[test]
    fn test_no_divergence() {
        assert_eq!(find_first_divergence(|| skirmish(3), 40), None);
    }

    #[test]
    fn test_snapshot_resumes_identically() {
        assert!(verify_snapshot_determinism(|| skirmish(11), 5, 20));
    }

    #[test]
    fn test_battles_progress() {
        let mut battle = skirmish(5);
        let start = battle.state_hash();
        battle.tick();
        assert_ne!(battle.state_hash(), start);
    }

    #[test]
    fn test_verify_determinism_detects_differences() {
        let counter = std::cell::Cell::new(0_u64);
        let result = verify_determinism(
            2,
            1,
            || {
                counter.set(counter.get() + 1);
                counter.get()
            },
            |_| {},
            compute_hash,
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes().len(), 2);
    }
}

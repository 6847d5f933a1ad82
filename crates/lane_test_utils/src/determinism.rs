//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a lane battle produces identical
//! results given identical inputs, and that a copied simulation evolves
//! exactly like the one it was copied from.
//!
//! # Testing Strategy
//!
//! Sources of non-determinism this harness is meant to catch:
//!
//! - **Floating-point math**: all positions and stats use
//!   [`lane_core::math::Fixed`].
//!
//! - **Map iteration order**: entities live in an ordered arena and every
//!   pass walks ascending ids.
//!
//! - **Shared randomness**: each [`Simulator`] owns its random source, so a
//!   clone continues the same stream without touching the original.
//!
//! # Test Levels
//!
//! 1. **Repeat runs**: the same setup run twice hashes the same
//! 2. **Copies**: a mid-match clone stays in lockstep with its origin
//! 3. **Parallel runs**: N threads running the same match all agree
//! 4. **Property tests**: random command scripts stay reproducible

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use lane_core::commands::PlayerCommand;
use lane_core::rng::RandomSource;
use lane_core::simulation::Simulator;

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
    /// Get all unique hashes (should be 1 for a deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique = self.hashes.clone();
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
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                self.unique_hashes().len(),
                self.hashes
            );
        }
    }
}

/// Run any stepped state multiple times and compare final hashes.
///
/// # Example
///
/// ```
/// use lane_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(3, 10, || 0u64, |n| *n += 2, |n| *n);
/// assert_eq!(result.hashes, vec![20, 20, 20]);
/// result.assert_deterministic();
/// ```
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
    let hashes: Vec<u64> = (0..runs)
        .map(|_| {
            let mut state = setup();
            for _ in 0..ticks {
                step(&mut state);
            }
            hash(&state)
        })
        .collect();

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks,
    }
}

/// Run the same match setup twice and compare final state hashes.
///
/// # Example
///
/// ```
/// use lane_core::simulation::Simulator;
/// use lane_test_utils::determinism::verify_simulation_determinism;
///
/// assert!(verify_simulation_determinism(|| Simulator::new(3), 200));
/// ```
pub fn verify_simulation_determinism<R, F>(setup_fn: F, num_ticks: u64) -> bool
where
    R: RandomSource,
    F: Fn() -> Simulator<R>,
{
    verify_determinism(2, num_ticks, &setup_fn, Simulator::step, Simulator::state_hash).is_deterministic
}

/// Replay a tick-stamped command script on a simulation.
///
/// Commands are applied before the step of their tick. Rejected commands are
/// ignored, the same way a client's stale order would be.
pub fn run_script<R: RandomSource>(
    sim: &mut Simulator<R>,
    script: &[(u64, String, PlayerCommand)],
    num_ticks: u64,
) {
    for tick in 0..num_ticks {
        for (_, player, command) in script.iter().filter(|(at, _, _)| *at == tick) {
            let _ = sim.apply_command(player, command.clone());
        }
        sim.step();
    }
}

/// Clone a simulation after `warmup` ticks and step both for `num_ticks`,
/// comparing hashes after every step.
///
/// # Returns
///
/// `None` if the copy stayed in lockstep, `Some(tick)` of the first step
/// after which the two differed.
pub fn find_copy_divergence<R, F>(setup_fn: F, warmup: u64, num_ticks: u64) -> Option<u64>
where
    R: RandomSource + Clone,
    F: Fn() -> Simulator<R>,
{
    let mut original = setup_fn();
    original.step_n(warmup);
    let mut copy = original.clone();

    if original.state_hash() != copy.state_hash() {
        return Some(original.get_tick());
    }
    for _ in 0..num_ticks {
        original.step();
        copy.step();
        if original.state_hash() != copy.state_hash() {
            return Some(original.get_tick());
        }
    }
    None
}

/// Whether a mid-match copy and its origin reach identical states.
///
/// # Example
///
/// ```
/// use lane_core::simulation::Simulator;
/// use lane_test_utils::determinism::verify_copy_determinism;
///
/// assert!(verify_copy_determinism(|| Simulator::new(8), 50, 100));
/// ```
pub fn verify_copy_determinism<R, F>(setup_fn: F, warmup: u64, num_ticks: u64) -> bool
where
    R: RandomSource + Clone,
    F: Fn() -> Simulator<R>,
{
    find_copy_divergence(setup_fn, warmup, num_ticks).is_none()
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic(),
            "Parallel simulations diverged!\nSimulations: {}\nTicks: {}\nAll hashes: {:?}",
            self.num_sims,
            self.ticks,
            self.hashes
        );
    }
}

/// Run N simulations on scoped threads and collect final hashes.
pub fn run_parallel_simulations<R, F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> ParallelSimResult
where
    R: RandomSource,
    F: Fn() -> Simulator<R> + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    sim.step_n(num_ticks);
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two runs tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs agree, `Some(tick)` where they first differ.
pub fn find_first_divergence<R, F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    R: RandomSource,
    F: Fn() -> Simulator<R>,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }
    for tick in 1..=num_ticks {
        sim1.step();
        sim2.step();
        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }
    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism and property testing.
pub mod strategies {
    use lane_core::combat::CombatId;
    use lane_core::commands::PlayerCommand;
    use lane_core::layout::{MAP_WIDTH, ROSTER};
    use lane_core::math::{Fixed, Vec2Fixed};
    use lane_core::stats::{DamageStats, HealthStats};
    use proptest::prelude::*;

    /// A map position, covering the lanes and a margin around them.
    pub fn arb_position() -> impl Strategy<Value = Vec2Fixed> {
        (-25..MAP_WIDTH + 25, -275i32..275).prop_map(|(x, y)| Vec2Fixed::from_ints(x, y))
    }

    /// One of the six roster ids.
    pub fn arb_player_id() -> impl Strategy<Value = String> {
        prop::sample::select(ROSTER.iter().map(|(id, ..)| (*id).to_string()).collect::<Vec<_>>())
    }

    /// Any player command. Entity and combat references are small ids that
    /// may or may not exist, so rejections are exercised too.
    pub fn arb_player_command() -> impl Strategy<Value = PlayerCommand> {
        prop_oneof![
            3 => arb_position().prop_map(|target| PlayerCommand::MoveTo { target }),
            1 => (1u64..40).prop_map(|target| PlayerCommand::Follow { target }),
            1 => Just(PlayerCommand::StartRecall),
            1 => Just(PlayerCommand::StopRecall),
            2 => Just(PlayerCommand::AttackLaneEntity),
            1 => Just(PlayerCommand::StopAttacking),
            2 => Just(PlayerCommand::EngageCombat),
            1 => Just(PlayerCommand::JoinCombat),
            1 => (1u32..5).prop_map(|id| PlayerCommand::Disengage { combat: CombatId(id) }),
            1 => prop::sample::select(vec!["Sword", "Shield", "Staff", "Mega", "Nothing"])
                .prop_map(|item| PlayerCommand::BuyItem { item: item.to_string() }),
        ]
    }

    /// A tick-stamped command script within the first `max_tick` ticks.
    pub fn arb_command_script(
        max_len: usize,
        max_tick: u64,
    ) -> impl Strategy<Value = Vec<(u64, String, PlayerCommand)>> {
        proptest::collection::vec((0..max_tick, arb_player_id(), arb_player_command()), 0..max_len)
    }

    /// Seeds for the combat random source.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }

    /// Defensive stats in a playable range.
    pub fn arb_defense() -> impl Strategy<Value = HealthStats> {
        (1i32..2000, 0i32..300, 0i32..300).prop_map(|(max_health, armor, magic_resist)| HealthStats {
            max_health: Fixed::from_num(max_health),
            regen: Fixed::ZERO,
            armor: Fixed::from_num(armor),
            magic_resist: Fixed::from_num(magic_resist),
        })
    }

    /// Damage packets in a playable range.
    pub fn arb_damage() -> impl Strategy<Value = DamageStats> {
        (0i32..200, 0i32..200, 0i32..50).prop_map(|(physical, magic, true_damage)| DamageStats {
            physical: Fixed::from_num(physical),
            magic: Fixed::from_num(magic),
            true_damage: Fixed::from_num(true_damage),
        })
    }
}

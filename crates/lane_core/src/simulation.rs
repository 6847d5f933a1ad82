//! Fixed-timestep clock around the [`Map`].
//!
//! # Determinism
//!
//! All operations in this module are fully deterministic:
//! - No floating-point math (uses fixed-point via [`Fixed`](crate::math::Fixed))
//! - Randomness only through the owned [`RandomSource`]
//! - Consistent iteration order (ascending entity ids)
//! - Same inputs always produce same outputs
//!
//! A [`Simulator`] is a plain value. Cloning it produces an independent copy
//! that, stepped the same number of times, reaches exactly the same state.
//!
//! # Example
//!
//! ```
//! use lane_core::commands::PlayerCommand;
//! use lane_core::math::Vec2Fixed;
//! use lane_core::simulation::Simulator;
//!
//! let mut sim = Simulator::new(42);
//! sim.apply_command("A", PlayerCommand::MoveTo { target: Vec2Fixed::from_ints(100, 0) })
//!     .unwrap();
//!
//! let mut branch = sim.clone();
//! for _ in 0..50 {
//!     sim.step();
//!     branch.step();
//! }
//! assert_eq!(sim.state_hash(), branch.state_hash());
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::combat::CombatId;
use crate::commands::{ActionKind, PlayerCommand};
use crate::config::SimConfig;
use crate::entity::{Entity, EntityId, EntityState, Team};
use crate::error::{Result, SimError};
use crate::map::Map;
use crate::math::{Fixed, Vec2Fixed};
use crate::rng::{RandomSource, SeededRng};

/// The lane battle simulation.
///
/// Owns the whole match state. Each [`step`](Self::step) advances one fixed
/// timestep; every [`SimConfig::damage_period_ticks`] steps is a damage tick
/// on which attacks and combat hits land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Simulator<R = SeededRng> {
    map: Map,
    tick: u64,
    damage_accumulator: u32,
    rng: R,
}

impl Simulator<SeededRng> {
    /// Standard match with default configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use lane_core::simulation::Simulator;
    ///
    /// let sim = Simulator::new(7);
    /// assert_eq!(sim.get_tick(), 0);
    /// assert_eq!(sim.get_players().len(), 6);
    /// ```
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::from_map(Map::default(), SeededRng::new(seed))
    }

    /// Standard match with a custom configuration.
    pub fn with_config(config: SimConfig, seed: u64) -> Result<Self> {
        Ok(Self::from_map(Map::new(config)?, SeededRng::new(seed)))
    }
}

impl<R: RandomSource> Simulator<R> {
    /// Wrap a prepared map with a random source.
    #[must_use]
    pub fn from_map(map: Map, rng: R) -> Self {
        Self {
            map,
            tick: 0,
            damage_accumulator: 0,
            rng,
        }
    }

    /// Number of steps taken.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// The match world.
    #[must_use]
    pub const fn map(&self) -> &Map {
        &self.map
    }

    /// Mutable world access, for scenario setup.
    pub fn map_mut(&mut self) -> &mut Map {
        &mut self.map
    }

    /// The random source.
    #[must_use]
    pub const fn rng(&self) -> &R {
        &self.rng
    }

    /// Whether the next step is a damage tick.
    #[must_use]
    pub fn next_is_damage_tick(&self) -> bool {
        self.damage_accumulator + 1 >= self.map.config().damage_period_ticks()
    }

    /// Advance one fixed timestep.
    pub fn step(&mut self) {
        self.damage_accumulator += 1;
        let damage_tick = self.damage_accumulator >= self.map.config().damage_period_ticks();
        if damage_tick {
            self.damage_accumulator = 0;
        }

        self.map.step(self.tick, damage_tick, &mut self.rng);
        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }
    }

    /// Advance `n` timesteps.
    pub fn step_n(&mut self, n: u64) {
        for _ in 0..n {
            self.step();
        }
    }

    /// Validate and apply a player command.
    ///
    /// # Errors
    /// Any precondition failure; the simulation is unchanged in that case.
    pub fn apply_command(&mut self, player_id: &str, command: PlayerCommand) -> Result<()> {
        self.map.apply_command(player_id, &command)
    }

    /// Entities near a point. See [`Map::find_entities_in_range`].
    #[must_use]
    pub fn find_entities_in_range(
        &self,
        position: Vec2Fixed,
        radius: Fixed,
        team: Option<Team>,
        state: Option<EntityState>,
        exclude: Option<EntityId>,
    ) -> Vec<EntityId> {
        self.map
            .find_entities_in_range(position, radius, team, state, exclude)
    }

    /// Nearest joinable combat for a player.
    pub fn find_combat_in_range(&self, player_id: &str) -> Result<Option<CombatId>> {
        let player = self
            .get_player_by_id(player_id)
            .ok_or_else(|| SimError::PlayerNotFound(player_id.to_string()))?;
        Ok(self.map.find_combat_in_range(player.id))
    }

    /// All players in id order.
    #[must_use]
    pub fn get_players(&self) -> Vec<&Entity> {
        self.map.get_players()
    }

    /// Player by roster id.
    #[must_use]
    pub fn get_player_by_id(&self, player_id: &str) -> Option<&Entity> {
        self.map.get_player_by_id(player_id)
    }

    /// Commands currently valid for a player.
    pub fn available_actions(&self, player_id: &str) -> Result<Vec<ActionKind>> {
        self.map.available_actions(player_id)
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.damage_accumulator.hash(&mut hasher);
        self.map.hash_state(&mut hasher);
        hasher.finish()
    }
}

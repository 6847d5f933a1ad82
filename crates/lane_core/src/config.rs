//! Match configuration.
//!
//! Every threshold, timer and economy constant the simulation uses lives in
//! [`SimConfig`]. Values are plain integers so configuration files stay
//! readable; the accessors convert them into ticks and fixed-point ranges.
//!
//! This module contains no IO. The headless runner reads files and hands the
//! text to [`SimConfig::from_ron_str`].
//!
//! # Example RON
//!
//! ```ron
//! SimConfig(
//!     steps_per_second: 5,
//!     combat_start_radius: 30,
//!     combat_include_radius: 45,
//!     miss_chance_percent: 20,
//! )
//! ```
//!
//! Omitted fields take their [`Default`] values.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::items::ItemDef;
use crate::math::Fixed;

/// All fixed match constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulation steps per simulated second.
    pub steps_per_second: u32,
    /// Reward eligibility distance, also used for "at spawn" checks.
    pub presence_radius: u32,
    /// Distance at which opposing entities start fighting.
    pub combat_start_radius: u32,
    /// Distance at which entities are gathered into (or may join) a combat.
    pub combat_include_radius: u32,
    /// Maximum lane distance between two same-team waves for them to merge.
    pub wave_merge_distance: u32,
    /// Slack added to the step size when deciding a path target is reached.
    pub arrival_tolerance: u32,
    /// Seconds between damage ticks.
    pub damage_interval_secs: u32,
    /// Seconds a disengaging combat lasts before it ends.
    pub disengage_secs: u32,
    /// Seconds a recall takes.
    pub recall_secs: u32,
    /// Seconds a dead player waits before respawning.
    pub respawn_secs: u32,
    /// Seconds between wave spawns.
    pub wave_spawn_interval_secs: u32,
    /// Lane merge pass runs on ticks divisible by this value.
    pub merge_period_ticks: u32,
    /// Chance in percent that a combatant misses its action.
    pub miss_chance_percent: u32,
    /// Pool multiplier in percent applied when a reward is shared.
    pub reward_share_percent: u32,
    /// Reward paid for damage equal to the reference health.
    pub wave_reward: u32,
    /// Health amount that pays out the full `wave_reward`.
    pub wave_reward_reference_health: u32,
    /// Every `n`-th wave (counting from 0, index `n - 1`) is a cannon wave.
    pub cannon_wave_period: u32,
    /// Maximum number of items a player may hold.
    pub max_items: usize,
    /// Purchasable items.
    pub items: Vec<ItemDef>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            steps_per_second: 5,
            presence_radius: 30,
            combat_start_radius: 30,
            combat_include_radius: 45,
            wave_merge_distance: 15,
            arrival_tolerance: 3,
            damage_interval_secs: 1,
            disengage_secs: 2,
            recall_secs: 8,
            respawn_secs: 10,
            wave_spawn_interval_secs: 100,
            merge_period_ticks: 5,
            miss_chance_percent: 20,
            reward_share_percent: 130,
            wave_reward: 100,
            wave_reward_reference_health: 100,
            cannon_wave_period: 3,
            max_items: 6,
            items: ItemDef::default_catalog(),
        }
    }
}

impl SimConfig {
    /// Parse a configuration from RON text and validate it.
    ///
    /// # Errors
    /// Returns [`SimError::ConfigParse`] if the text is malformed or a value is
    /// out of range.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| SimError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns [`SimError::ConfigParse`] describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(SimError::ConfigParse(msg.to_string()));
        if self.steps_per_second == 0 {
            return fail("steps_per_second must be positive");
        }
        if self.combat_include_radius < self.combat_start_radius {
            return fail("combat_include_radius must be at least combat_start_radius");
        }
        if self.miss_chance_percent > 100 {
            return fail("miss_chance_percent must be at most 100");
        }
        if self.merge_period_ticks == 0 || self.cannon_wave_period == 0 {
            return fail("merge_period_ticks and cannon_wave_period must be positive");
        }
        if self.wave_reward_reference_health == 0 {
            return fail("wave_reward_reference_health must be positive");
        }
        for item in &self.items {
            for dep in &item.dependencies {
                if !self.items.iter().any(|other| &other.name == dep) {
                    return Err(SimError::ConfigParse(format!(
                        "item '{}' depends on unknown item '{}'",
                        item.name, dep
                    )));
                }
            }
        }
        Ok(())
    }

    /// Convert a duration in seconds into a whole number of ticks (at least one).
    #[must_use]
    pub fn ticks_for(&self, secs: u32) -> u32 {
        (secs * self.steps_per_second).max(1)
    }

    /// Ticks between damage ticks.
    #[must_use]
    pub fn damage_period_ticks(&self) -> u32 {
        self.ticks_for(self.damage_interval_secs)
    }

    /// Ticks a disengage countdown lasts.
    #[must_use]
    pub fn disengage_ticks(&self) -> u32 {
        self.ticks_for(self.disengage_secs)
    }

    /// Ticks a recall lasts.
    #[must_use]
    pub fn recall_ticks(&self) -> u32 {
        self.ticks_for(self.recall_secs)
    }

    /// Ticks a respawn lasts.
    #[must_use]
    pub fn respawn_ticks(&self) -> u32 {
        self.ticks_for(self.respawn_secs)
    }

    /// Ticks between wave spawns.
    #[must_use]
    pub fn wave_spawn_interval_ticks(&self) -> u64 {
        u64::from(self.ticks_for(self.wave_spawn_interval_secs))
    }

    /// Reward/vision presence range.
    #[must_use]
    pub fn presence_range(&self) -> Fixed {
        Fixed::from_num(self.presence_radius)
    }

    /// Range at which fighting starts.
    #[must_use]
    pub fn engage_range(&self) -> Fixed {
        Fixed::from_num(self.combat_start_radius)
    }

    /// Range used to gather or join combat participants.
    #[must_use]
    pub fn include_range(&self) -> Fixed {
        Fixed::from_num(self.combat_include_radius)
    }

    /// Lane distance within which same-team waves merge.
    #[must_use]
    pub fn merge_range(&self) -> Fixed {
        Fixed::from_num(self.wave_merge_distance)
    }

    /// Path arrival slack.
    #[must_use]
    pub fn arrival_range(&self) -> Fixed {
        Fixed::from_num(self.arrival_tolerance)
    }

    /// Miss probability as a fraction in `[0, 1]`.
    #[must_use]
    pub fn miss_chance(&self) -> Fixed {
        Fixed::from_num(self.miss_chance_percent) / Fixed::from_num(100)
    }

    /// Multiplier applied to a reward pool shared by more than one player.
    #[must_use]
    pub fn reward_share_multiplier(&self) -> Fixed {
        Fixed::from_num(self.reward_share_percent) / Fixed::from_num(100)
    }

    /// Reward accrued per point of damage a wave takes.
    #[must_use]
    pub fn reward_per_damage(&self) -> Fixed {
        Fixed::from_num(self.wave_reward) / Fixed::from_num(self.wave_reward_reference_health)
    }

    /// Whether the `wave_number`-th spawned wave is the stronger variant.
    #[must_use]
    pub fn is_cannon_wave(&self, wave_number: u64) -> bool {
        let period = u64::from(self.cannon_wave_period);
        wave_number % period == period - 1
    }
}

//! Stat layers and damage mitigation.
//!
//! Stats are immutable value structs. An entity's effective stats are always
//! rebuilt from the leveled layer and the item layer with [`compose`]; nothing
//! mutates a combined result in place.

use std::ops::{Add, Mul};

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed};

/// Experience needed to reach each level, indexed by `level - 1`.
pub const EXPERIENCE_THRESHOLDS: [u32; 10] = [0, 100, 200, 350, 500, 700, 900, 1150, 1400, 2000];

/// Highest reachable level.
pub const MAX_LEVEL: u32 = 10;

const MITIGATION_BASE: i32 = 100;

/// Health and defensive stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct HealthStats {
    /// Maximum health.
    #[serde(with = "fixed_serde")]
    pub max_health: Fixed,
    /// Health regenerated per second (informational; healing happens at spawn).
    #[serde(with = "fixed_serde")]
    pub regen: Fixed,
    /// Reduces physical damage.
    #[serde(with = "fixed_serde")]
    pub armor: Fixed,
    /// Reduces magic damage.
    #[serde(with = "fixed_serde")]
    pub magic_resist: Fixed,
}

/// Raw damage output split by damage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DamageStats {
    /// Mitigated by armor.
    #[serde(with = "fixed_serde")]
    pub physical: Fixed,
    /// Mitigated by magic resist.
    #[serde(with = "fixed_serde")]
    pub magic: Fixed,
    /// Never mitigated.
    #[serde(with = "fixed_serde")]
    pub true_damage: Fixed,
}

/// Complete stat block for one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AllStats {
    /// Health and defenses.
    pub health: HealthStats,
    /// Damage output.
    pub damage: DamageStats,
    /// Distance moved per second.
    #[serde(with = "fixed_serde")]
    pub move_speed: Fixed,
}

impl Add for HealthStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            max_health: self.max_health + rhs.max_health,
            regen: self.regen + rhs.regen,
            armor: self.armor + rhs.armor,
            magic_resist: self.magic_resist + rhs.magic_resist,
        }
    }
}

impl Mul<Fixed> for HealthStats {
    type Output = Self;

    fn mul(self, rhs: Fixed) -> Self {
        Self {
            max_health: self.max_health * rhs,
            regen: self.regen * rhs,
            armor: self.armor * rhs,
            magic_resist: self.magic_resist * rhs,
        }
    }
}

impl Add for DamageStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            physical: self.physical + rhs.physical,
            magic: self.magic + rhs.magic,
            true_damage: self.true_damage + rhs.true_damage,
        }
    }
}

impl Mul<Fixed> for DamageStats {
    type Output = Self;

    fn mul(self, rhs: Fixed) -> Self {
        Self {
            physical: self.physical * rhs,
            magic: self.magic * rhs,
            true_damage: self.true_damage * rhs,
        }
    }
}

impl Add for AllStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            health: self.health + rhs.health,
            damage: self.damage + rhs.damage,
            move_speed: self.move_speed + rhs.move_speed,
        }
    }
}

impl Mul<Fixed> for AllStats {
    type Output = Self;

    fn mul(self, rhs: Fixed) -> Self {
        Self {
            health: self.health * rhs,
            damage: self.damage * rhs,
            move_speed: self.move_speed * rhs,
        }
    }
}

impl std::iter::Sum for AllStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Damage left after armor and magic resist are applied.
///
/// `physical * 100/(100+armor) + magic * 100/(100+magic_resist) + true`
#[must_use]
pub fn mitigate(defense: &HealthStats, damage: &DamageStats) -> Fixed {
    let base = Fixed::from_num(MITIGATION_BASE);
    damage.physical * base / (base + defense.armor)
        + damage.magic * base / (base + defense.magic_resist)
        + damage.true_damage
}

/// Combine the leveled and item layers into effective stats.
#[must_use]
pub fn compose(leveled: &AllStats, items: &AllStats) -> AllStats {
    *leveled + *items
}

/// Level reached with `experience` points, capped at [`MAX_LEVEL`].
#[must_use]
pub fn level_for_experience(experience: Fixed) -> u32 {
    let mut level = 1;
    for (idx, threshold) in EXPERIENCE_THRESHOLDS.iter().enumerate() {
        if experience >= Fixed::from_num(*threshold) {
            level = idx as u32 + 1;
        }
    }
    level.min(MAX_LEVEL)
}

/// Base stats plus a per-level increase, driven by experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeveledStats {
    /// Level 1 stats.
    pub base: AllStats,
    /// Added once per level above 1.
    pub level_increase: AllStats,
    level: u32,
    #[serde(with = "fixed_serde")]
    experience: Fixed,
}

impl LeveledStats {
    /// Level 1 stats with no experience.
    #[must_use]
    pub fn new(base: AllStats, level_increase: AllStats) -> Self {
        Self {
            base,
            level_increase,
            level: 1,
            experience: Fixed::ZERO,
        }
    }

    /// Stats that never change with level.
    #[must_use]
    pub fn flat(base: AllStats) -> Self {
        Self::new(base, AllStats::default())
    }

    /// Current level.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Total experience gained.
    #[must_use]
    pub const fn experience(&self) -> Fixed {
        self.experience
    }

    /// `base + level_increase * (level - 1)`.
    #[must_use]
    pub fn effective(&self) -> AllStats {
        self.base + self.level_increase * Fixed::from_num(self.level - 1)
    }

    /// Add experience. Returns the new level if it changed.
    ///
    /// Levels never decrease and may skip when a grant crosses several
    /// thresholds at once.
    pub fn gain_experience(&mut self, amount: Fixed) -> Option<u32> {
        self.experience += amount;
        let level = level_for_experience(self.experience);
        if level > self.level {
            self.level = level;
            Some(level)
        } else {
            None
        }
    }
}

/// Sum of equipped item bonuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ItemStats {
    /// Combined bonus of every held item.
    pub effective: AllStats,
}

impl ItemStats {
    /// Sum a set of item bonuses.
    pub fn from_bonuses<'a>(bonuses: impl IntoIterator<Item = &'a AllStats>) -> Self {
        Self {
            effective: bonuses.into_iter().copied().sum(),
        }
    }
}

/// Live stats owned by every entity.
///
/// `health` is tracked separately from `effective.health.max_health` so that
/// missing health survives recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DynamicStats {
    #[serde(with = "fixed_serde")]
    health: Fixed,
    effective: AllStats,
    leveled: LeveledStats,
    items: ItemStats,
}

impl DynamicStats {
    /// Full-health stats from a leveled layer and no items.
    #[must_use]
    pub fn new(leveled: LeveledStats) -> Self {
        let effective = compose(&leveled.effective(), &AllStats::default());
        Self {
            health: effective.health.max_health,
            effective,
            leveled,
            items: ItemStats::default(),
        }
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> Fixed {
        self.health
    }

    /// Effective maximum health.
    #[must_use]
    pub const fn max_health(&self) -> Fixed {
        self.effective.health.max_health
    }

    /// Combined stats.
    #[must_use]
    pub const fn effective(&self) -> &AllStats {
        &self.effective
    }

    /// Leveled layer.
    #[must_use]
    pub const fn leveled(&self) -> &LeveledStats {
        &self.leveled
    }

    /// Item layer.
    #[must_use]
    pub const fn items(&self) -> &ItemStats {
        &self.items
    }

    /// `health / max_health`, zero when max health is zero.
    #[must_use]
    pub fn health_fraction(&self) -> Fixed {
        let max = self.max_health();
        if max <= Fixed::ZERO {
            Fixed::ZERO
        } else {
            self.health / max
        }
    }

    /// Rebuild `effective` from the layers, keeping missing health.
    fn reevaluate(&mut self) {
        let missing = self.max_health() - self.health;
        self.effective = compose(&self.leveled.effective(), &self.items.effective);
        let max = self.max_health();
        self.health = (max - missing).clamp(Fixed::ZERO, max);
    }

    /// Replace the item layer.
    pub fn set_items(&mut self, items: ItemStats) {
        self.items = items;
        self.reevaluate();
    }

    /// Add experience, recomputing stats on level-up. Returns the new level if it changed.
    pub fn gain_experience(&mut self, amount: Fixed) -> Option<u32> {
        let leveled_up = self.leveled.gain_experience(amount);
        if leveled_up.is_some() {
            self.reevaluate();
        }
        leveled_up
    }

    /// Mitigate `damage` and subtract it, clamping at zero.
    ///
    /// Returns the health actually removed.
    pub fn take_damage(&mut self, damage: &DamageStats) -> Fixed {
        let mitigated = mitigate(&self.effective.health, damage).max(Fixed::ZERO);
        let applied = mitigated.min(self.health);
        self.health -= applied;
        applied
    }

    /// Restore health to maximum.
    pub fn heal_full(&mut self) {
        self.health = self.max_health();
    }

    /// Fold another entity's stats into this one: effective stats and current
    /// health are summed.
    pub fn absorb(&mut self, other: &Self) {
        self.leveled.base = self.leveled.base + other.effective;
        let health = self.health + other.health;
        self.reevaluate();
        self.health = health.clamp(Fixed::ZERO, self.max_health());
    }
}

/// Stat block helper for unit templates.
#[must_use]
pub fn stat_block(
    max_health: i32,
    armor: i32,
    magic_resist: i32,
    physical: i32,
    magic: i32,
    move_speed: i32,
) -> AllStats {
    AllStats {
        health: HealthStats {
            max_health: Fixed::from_num(max_health),
            regen: Fixed::ZERO,
            armor: Fixed::from_num(armor),
            magic_resist: Fixed::from_num(magic_resist),
        },
        damage: DamageStats {
            physical: Fixed::from_num(physical),
            magic: Fixed::from_num(magic),
            true_damage: Fixed::ZERO,
        },
        move_speed: Fixed::from_num(move_speed),
    }
}

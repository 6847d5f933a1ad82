//! Entities, their lifecycle state machine, and the owning arena.
//!
//! Every unit on the map (wave, turret or player) is an [`Entity`] stored in
//! [`EntityStorage`] under a stable [`EntityId`]. Lanes, combats and paths
//! refer to entities only by id.
//!
//! # Lifecycle
//!
//! ```text
//! NORMAL <-> COMBAT
//! NORMAL <-> RECALLING        (completion snaps to spawn)
//! alive  --> DEAD             (health reaches zero inside take_damage)
//! DEAD   --> RESPAWNING       (players only)
//! RESPAWNING --> NORMAL       (timer expiry, full reset)
//! DEAD   --> removed          (waves and turrets)
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::items::Inventory;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::path::Path;
use crate::stats::{stat_block, AllStats, DamageStats, DynamicStats, HealthStats, LeveledStats};

/// Unique identifier for an entity.
pub type EntityId = u64;

/// Team affiliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    /// Traverses lanes backward.
    Red,
    /// Traverses lanes forward.
    Blue,
    /// Belongs to nobody, has no enemy.
    Neutral,
}

impl Team {
    /// The opposing team, `None` for [`Team::Neutral`].
    #[must_use]
    pub const fn enemy(self) -> Option<Self> {
        match self {
            Self::Red => Some(Self::Blue),
            Self::Blue => Some(Self::Red),
            Self::Neutral => None,
        }
    }

    /// Whether `other` is this team's enemy.
    #[must_use]
    pub fn is_enemy_of(self, other: Self) -> bool {
        self.enemy() == Some(other)
    }
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    /// Free to act.
    Normal,
    /// Owned by a combat.
    Combat,
    /// Channeling a recall to spawn.
    Recalling,
    /// Health reached zero this tick.
    Dead,
    /// Player waiting to re-enter.
    Respawning,
    /// Wave reached the end of its lane.
    Finished,
}

impl EntityState {
    /// Alive means not dead, respawning or finished.
    #[must_use]
    pub const fn is_alive(self) -> bool {
        !matches!(self, Self::Dead | Self::Respawning | Self::Finished)
    }
}

/// Wave-specific data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaveData {
    /// Reward accrued from damage taken, paid out to nearby enemy players.
    #[serde(with = "fixed_serde")]
    pub pending_reward: Fixed,
    /// Reward accrued per point of applied damage.
    #[serde(with = "fixed_serde")]
    pub reward_per_damage: Fixed,
}

/// Player-specific data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerData {
    /// Roster id ("A".."F").
    pub player_id: String,
    /// Gold and items.
    pub inventory: Inventory,
    /// Ticks left until respawn.
    pub respawn_timer: Option<u32>,
    /// Ticks left until a recall completes.
    pub recall_timer: Option<u32>,
}

/// Entity variant tag with per-variant data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Lane minion group.
    Wave(WaveData),
    /// Stationary lane defense.
    Turret,
    /// Controlled by a player.
    Player(PlayerData),
}

/// A unit on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Assigned by [`EntityStorage::insert`].
    pub id: EntityId,
    /// Map position.
    pub position: Vec2Fixed,
    /// Affiliation.
    pub team: Team,
    /// Stat layers and current health.
    pub stats: DynamicStats,
    state: EntityState,
    /// Active movement order.
    pub path: Option<Path>,
    /// Current attack target outside of combats.
    pub attacking: Option<EntityId>,
    /// Variant data.
    pub kind: EntityKind,
}

fn wave_stats(cannon: bool) -> AllStats {
    stat_block(if cannon { 125 } else { 100 }, 20, 0, 7, 0, 15)
}

fn turret_stats() -> AllStats {
    stat_block(500, 50, 0, 25, 0, 0)
}

fn player_base_stats() -> AllStats {
    let mut stats = stat_block(300, 30, 10, 15, 5, 17);
    stats.health.regen = Fixed::ONE;
    stats
}

fn player_level_stats() -> AllStats {
    AllStats {
        health: HealthStats {
            max_health: Fixed::from_num(50),
            regen: Fixed::from_num(1) / Fixed::from_num(5),
            armor: Fixed::from_num(5),
            magic_resist: Fixed::from_num(2),
        },
        damage: DamageStats {
            physical: Fixed::from_num(7),
            magic: Fixed::from_num(2),
            true_damage: Fixed::ZERO,
        },
        move_speed: Fixed::ZERO,
    }
}

impl Entity {
    /// Build an entity in NORMAL state. The id is assigned on insertion.
    #[must_use]
    pub fn new(team: Team, position: Vec2Fixed, stats: DynamicStats, kind: EntityKind) -> Self {
        Self {
            id: 0,
            position,
            team,
            stats,
            state: EntityState::Normal,
            path: None,
            attacking: None,
            kind,
        }
    }

    /// A fresh lane wave.
    #[must_use]
    pub fn wave(team: Team, position: Vec2Fixed, cannon: bool, reward_per_damage: Fixed) -> Self {
        Self::new(
            team,
            position,
            DynamicStats::new(LeveledStats::flat(wave_stats(cannon))),
            EntityKind::Wave(WaveData {
                pending_reward: Fixed::ZERO,
                reward_per_damage,
            }),
        )
    }

    /// A lane turret.
    #[must_use]
    pub fn turret(team: Team, position: Vec2Fixed) -> Self {
        Self::new(
            team,
            position,
            DynamicStats::new(LeveledStats::flat(turret_stats())),
            EntityKind::Turret,
        )
    }

    /// A level 1 player with no gold.
    #[must_use]
    pub fn new_player(player_id: &str, team: Team, position: Vec2Fixed) -> Self {
        Self::new(
            team,
            position,
            DynamicStats::new(LeveledStats::new(player_base_stats(), player_level_stats())),
            EntityKind::Player(PlayerData {
                player_id: player_id.to_string(),
                inventory: Inventory::default(),
                respawn_timer: None,
                recall_timer: None,
            }),
        )
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> EntityState {
        self.state
    }

    /// Change state. Leaving RECALLING cancels the recall timer.
    pub fn set_state(&mut self, state: EntityState) {
        if state != EntityState::Recalling {
            if let Some(player) = self.player_mut() {
                player.recall_timer = None;
            }
        }
        self.state = state;
    }

    /// Whether the entity is alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> Fixed {
        self.stats.health()
    }

    /// Whether this entity never moves.
    #[must_use]
    pub fn is_static(&self) -> bool {
        matches!(self.kind, EntityKind::Turret) || self.stats.effective().move_speed == Fixed::ZERO
    }

    /// Whether this is a player.
    #[must_use]
    pub const fn is_player(&self) -> bool {
        matches!(self.kind, EntityKind::Player(_))
    }

    /// Whether this is a wave.
    #[must_use]
    pub const fn is_wave(&self) -> bool {
        matches!(self.kind, EntityKind::Wave(_))
    }

    /// Whether this is a turret.
    #[must_use]
    pub const fn is_turret(&self) -> bool {
        matches!(self.kind, EntityKind::Turret)
    }

    /// Player data, if this is a player.
    #[must_use]
    pub const fn player(&self) -> Option<&PlayerData> {
        match &self.kind {
            EntityKind::Player(data) => Some(data),
            _ => None,
        }
    }

    /// Mutable player data, if this is a player.
    pub fn player_mut(&mut self) -> Option<&mut PlayerData> {
        match &mut self.kind {
            EntityKind::Player(data) => Some(data),
            _ => None,
        }
    }

    /// Damage dealt per hit. Waves hit softer as they lose health.
    #[must_use]
    pub fn get_damage(&self) -> DamageStats {
        let damage = self.stats.effective().damage;
        match self.kind {
            EntityKind::Wave(_) => damage * self.stats.health_fraction(),
            _ => damage,
        }
    }

    /// Distance covered in one step at `steps_per_second`.
    #[must_use]
    pub fn step_distance(&self, steps_per_second: u32) -> Fixed {
        self.stats.effective().move_speed / Fixed::from_num(steps_per_second.max(1))
    }

    /// Apply raw damage through mitigation.
    ///
    /// Waves accrue reward for the applied amount. Reaching zero health
    /// moves the entity to DEAD before returning. Non-alive entities ignore
    /// damage. Returns the health removed.
    pub fn take_damage(&mut self, damage: &DamageStats) -> Fixed {
        if !self.is_alive() {
            return Fixed::ZERO;
        }
        let applied = self.stats.take_damage(damage);
        if let EntityKind::Wave(wave) = &mut self.kind {
            wave.pending_reward += applied * wave.reward_per_damage;
        }
        if self.stats.health() == Fixed::ZERO {
            self.path = None;
            self.attacking = None;
            self.set_state(EntityState::Dead);
        }
        applied
    }

    /// Drain a wave's pending reward. Zero for other kinds.
    pub fn take_reward(&mut self) -> Fixed {
        match &mut self.kind {
            EntityKind::Wave(wave) => std::mem::replace(&mut wave.pending_reward, Fixed::ZERO),
            _ => Fixed::ZERO,
        }
    }

    /// Pending reward of a wave.
    #[must_use]
    pub fn pending_reward(&self) -> Fixed {
        match &self.kind {
            EntityKind::Wave(wave) => wave.pending_reward,
            _ => Fixed::ZERO,
        }
    }

    /// Fold a trailing wave into this one: stats, health and pending reward add up.
    pub fn absorb_wave(&mut self, other: &Self) {
        self.stats.absorb(&other.stats);
        let extra = other.pending_reward();
        if let EntityKind::Wave(wave) = &mut self.kind {
            wave.pending_reward += extra;
        }
    }

    /// Start a recall of `ticks` ticks.
    pub fn begin_recall(&mut self, ticks: u32) {
        self.path = None;
        self.attacking = None;
        self.set_state(EntityState::Recalling);
        if let Some(player) = self.player_mut() {
            player.recall_timer = Some(ticks);
        }
    }

    /// Enter RESPAWNING at `spawn` with a `ticks` countdown.
    pub fn begin_respawn(&mut self, spawn: Vec2Fixed, ticks: u32) {
        self.position = spawn;
        self.path = None;
        self.attacking = None;
        self.set_state(EntityState::Respawning);
        if let Some(player) = self.player_mut() {
            player.respawn_timer = Some(ticks);
        }
    }

    /// Return to NORMAL at full health with every order and timer cleared.
    pub fn finish_respawn(&mut self) {
        self.path = None;
        self.attacking = None;
        self.set_state(EntityState::Normal);
        if let Some(player) = self.player_mut() {
            player.respawn_timer = None;
        }
        self.stats.heal_full();
    }
}

/// Owning arena for all entities.
///
/// Ids come from a counter owned by the storage, and iteration is always in
/// ascending id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStorage {
    entities: BTreeMap<EntityId, Entity>,
    next_id: EntityId,
}

impl Default for EntityStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStorage {
    /// Create empty entity storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new entity and return its ID.
    pub fn insert(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        entity.id = id;
        self.entities.insert(id, entity);
        id
    }

    /// Remove an entity by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Get an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity IDs in ascending order.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Iterate in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Iterate mutably in ascending id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    /// Whether the entity exists and is alive.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.get(id).is_some_and(Entity::is_alive)
    }
}

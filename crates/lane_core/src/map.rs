//! The match world: entity arena, lanes, combats and the per-tick order.
//!
//! # Tick order
//!
//! 1. Players not in combat: respawn and recall countdowns, attack or
//!    movement, and a full heal while standing at spawn.
//! 2. Lanes: wave spawning on its cadence, then merge/targeting/advance.
//! 3. Combats: step each, release and drop the ones that ended.
//! 4. Death sweep: dead players start respawning, dead or finished waves and
//!    turrets leave the arena and their lane.
//! 5. Rewards: pending wave rewards go to enemy players in presence range.
//!
//! Later phases see what earlier ones did, so the order is fixed.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::combat::{Combat, CombatId};
use crate::commands::{ActionKind, PlayerCommand};
use crate::config::SimConfig;
use crate::entity::{Entity, EntityId, EntityKind, EntityState, EntityStorage, Team};
use crate::error::{Result, SimError};
use crate::items::find_item;
use crate::lane::{Lane, LaneStepContext};
use crate::layout::{self, spawn_point, LaneId, ROSTER};
use crate::math::{Fixed, Vec2Fixed};
use crate::path::{Path, PathStep, PathTarget};
use crate::rng::RandomSource;

/// Reward waiting to be paid out around a wave's position.
#[derive(Debug, Clone, Copy)]
struct RewardSource {
    position: Vec2Fixed,
    team: Team,
    amount: Fixed,
}

/// Owns every entity, lane and combat of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map {
    config: SimConfig,
    entities: EntityStorage,
    lanes: Vec<Lane>,
    combats: Vec<Combat>,
    next_combat_id: u32,
    waves_spawned: u64,
}

impl Default for Map {
    fn default() -> Self {
        Self::bare(SimConfig::default()).populate()
    }
}

impl Map {
    /// Standard match: turrets on every lane and the six-player roster.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::bare(config).populate())
    }

    /// Lanes without any units and no players. Used to build scenarios.
    pub fn empty(config: SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::bare(config))
    }

    fn bare(config: SimConfig) -> Self {
        Self {
            config,
            entities: EntityStorage::new(),
            lanes: LaneId::ALL.into_iter().map(Lane::new).collect(),
            combats: Vec::new(),
            next_combat_id: 1,
            waves_spawned: 0,
        }
    }

    fn populate(mut self) -> Self {
        for (player_id, team, x, y) in ROSTER {
            self.spawn_player(player_id, team, Vec2Fixed::from_ints(x, y));
        }
        for lane_id in LaneId::ALL {
            for team in [Team::Blue, Team::Red] {
                for site in lane_id.turret_sites(team) {
                    self.spawn_turret(lane_id, team, site);
                }
            }
        }
        self
    }

    /// Add a player.
    pub fn spawn_player(&mut self, player_id: &str, team: Team, position: Vec2Fixed) -> EntityId {
        self.entities.insert(Entity::new_player(player_id, team, position))
    }

    /// Add a turret and register it on `lane`.
    pub fn spawn_turret(&mut self, lane: LaneId, team: Team, position: Vec2Fixed) -> EntityId {
        let id = self.entities.insert(Entity::turret(team, position));
        if let Some(lane) = self.lanes.iter_mut().find(|l| l.id() == lane) {
            lane.add_turret(team, id);
        }
        id
    }

    /// Add a wave at `team`'s start of `lane`. `None` for NEUTRAL.
    pub fn spawn_wave(&mut self, lane: LaneId, team: Team, cannon: bool) -> Option<EntityId> {
        let reward_rate = self.config.reward_per_damage();
        let lane = self.lanes.iter_mut().find(|l| l.id() == lane)?;
        let start = lane.start_point(team)?;
        let id = self.entities.insert(Entity::wave(team, start, cannon, reward_rate));
        lane.add_wave(team, id);
        Some(id)
    }

    /// Match configuration.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Entity arena.
    #[must_use]
    pub const fn entities(&self) -> &EntityStorage {
        &self.entities
    }

    /// Look up an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Mutable access to an entity, for scenario setup.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// All lanes.
    #[must_use]
    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    /// One lane.
    #[must_use]
    pub fn lane(&self, id: LaneId) -> Option<&Lane> {
        self.lanes.iter().find(|l| l.id() == id)
    }

    /// Active combats.
    #[must_use]
    pub fn combats(&self) -> &[Combat] {
        &self.combats
    }

    /// Look up an active combat.
    #[must_use]
    pub fn combat(&self, id: CombatId) -> Option<&Combat> {
        self.combats.iter().find(|c| c.id() == id)
    }

    /// Number of wave spawns so far.
    #[must_use]
    pub const fn waves_spawned(&self) -> u64 {
        self.waves_spawned
    }

    /// All players in id order.
    #[must_use]
    pub fn get_players(&self) -> Vec<&Entity> {
        self.entities.iter().filter(|e| e.is_player()).collect()
    }

    /// Player by roster id.
    #[must_use]
    pub fn get_player_by_id(&self, player_id: &str) -> Option<&Entity> {
        self.entities
            .iter()
            .find(|e| e.player().is_some_and(|p| p.player_id == player_id))
    }

    fn player_entity(&self, player_id: &str) -> Result<EntityId> {
        self.get_player_by_id(player_id)
            .map(|e| e.id)
            .ok_or_else(|| SimError::PlayerNotFound(player_id.to_string()))
    }

    /// Entities within `radius` of `position`, in id order, optionally
    /// filtered by team and state and excluding one id.
    #[must_use]
    pub fn find_entities_in_range(
        &self,
        position: Vec2Fixed,
        radius: Fixed,
        team: Option<Team>,
        state: Option<EntityState>,
        exclude: Option<EntityId>,
    ) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|e| e.position.within(position, radius))
            .filter(|e| team.map_or(true, |t| e.team == t))
            .filter(|e| state.map_or(true, |s| e.state() == s))
            .filter(|e| exclude != Some(e.id))
            .map(|e| e.id)
            .collect()
    }

    /// Nearest active combat within joining range of the player.
    #[must_use]
    pub fn find_combat_in_range(&self, player: EntityId) -> Option<CombatId> {
        let position = self.entities.get(player)?.position;
        let range = self.config.include_range();
        self.combats
            .iter()
            .filter(|c| c.is_active() && c.position().within(position, range))
            .min_by_key(|c| (c.position().distance_squared(position), c.id()))
            .map(Combat::id)
    }

    /// Nearest enemy wave or turret that is NORMAL and within attack range.
    fn nearest_lane_target(&self, player: &Entity) -> Option<EntityId> {
        let enemy = player.team.enemy()?;
        let range = self.config.engage_range();
        self.entities
            .iter()
            .filter(|e| {
                (e.is_wave() || e.is_turret())
                    && e.team == enemy
                    && e.state() == EntityState::Normal
                    && e.position.within(player.position, range)
            })
            .min_by_key(|e| (e.position.distance_squared(player.position), e.id))
            .map(|e| e.id)
    }

    fn at_spawn(&self, entity: &Entity) -> bool {
        spawn_point(entity.team)
            .is_some_and(|spawn| entity.position.within(spawn, self.config.presence_range()))
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the world one tick. `tick` is the index of the step being run.
    pub fn step<R: RandomSource>(&mut self, tick: u64, damage_tick: bool, rng: &mut R) {
        self.step_players(damage_tick);
        self.step_lanes(tick, damage_tick);
        self.step_combats(damage_tick, rng);
        let fallen = self.sweep_dead();
        self.distribute_rewards(fallen);

        #[cfg(any(debug_assertions, feature = "debug-validation"))]
        if let Err(violation) = self.check_invariants() {
            tracing::error!(tick, %violation, "Invariant violated");
            #[cfg(feature = "debug-validation")]
            panic!("invariant violated at tick {tick}: {violation}");
        }
    }

    fn step_players(&mut self, damage_tick: bool) {
        let ids: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|e| e.is_player())
            .map(|e| e.id)
            .collect();
        for id in ids {
            self.step_player(id, damage_tick);
        }
    }

    fn step_player(&mut self, id: EntityId, damage_tick: bool) {
        let Some(player) = self.entities.get(id) else {
            return;
        };
        match player.state() {
            EntityState::Combat | EntityState::Dead | EntityState::Finished => return,
            EntityState::Respawning => self.tick_respawn(id),
            EntityState::Recalling => self.tick_recall(id),
            EntityState::Normal => {
                if player.attacking.is_some() {
                    self.player_attack(id, damage_tick);
                } else if player.path.is_some() {
                    self.player_move(id);
                }
            }
        }

        let presence = self.config.presence_range();
        if let Some(player) = self.entities.get_mut(id) {
            let home = spawn_point(player.team);
            if player.is_alive() && home.is_some_and(|spawn| player.position.within(spawn, presence)) {
                player.stats.heal_full();
            }
        }
    }

    fn tick_respawn(&mut self, id: EntityId) {
        let Some(player) = self.entities.get_mut(id) else {
            return;
        };
        let Some(data) = player.player_mut() else {
            return;
        };
        let remaining = data.respawn_timer.unwrap_or(0).saturating_sub(1);
        data.respawn_timer = Some(remaining);
        if remaining == 0 {
            player.finish_respawn();
            info!(id, "Player respawned");
        }
    }

    fn tick_recall(&mut self, id: EntityId) {
        let Some(player) = self.entities.get_mut(id) else {
            return;
        };
        let Some(data) = player.player_mut() else {
            return;
        };
        let remaining = data.recall_timer.unwrap_or(0).saturating_sub(1);
        data.recall_timer = Some(remaining);
        if remaining == 0 {
            if let Some(spawn) = spawn_point(player.team) {
                player.position = spawn;
            }
            player.set_state(EntityState::Normal);
            info!(id, "Recall complete");
        }
    }

    fn player_attack(&mut self, id: EntityId, damage_tick: bool) {
        let Some(player) = self.entities.get(id) else {
            return;
        };
        let Some(target) = player.attacking else {
            return;
        };
        let range = self.config.include_range();
        let valid = self.entities.get(target).is_some_and(|t| {
            t.is_alive() && t.state() == EntityState::Normal && t.position.within(player.position, range)
        });
        if !valid {
            if let Some(player) = self.entities.get_mut(id) {
                player.attacking = None;
            }
            return;
        }
        if damage_tick {
            let damage = player.get_damage();
            if let Some(victim) = self.entities.get_mut(target) {
                victim.take_damage(&damage);
            }
        }
    }

    fn player_move(&mut self, id: EntityId) {
        let Some(player) = self.entities.get(id) else {
            return;
        };
        let Some(path) = player.path else {
            return;
        };
        let destination = match path.target {
            PathTarget::Point(point) => Some(point),
            PathTarget::Entity(target) => self
                .entities
                .get(target)
                .filter(|e| e.is_alive())
                .map(|e| e.position),
        };
        let step = player.step_distance(self.config.steps_per_second);
        let tolerance = self.config.arrival_range();
        if let Some(player) = self.entities.get_mut(id) {
            let outcome = Path::advance(&mut player.position, destination, step, tolerance);
            if outcome != PathStep::Moving {
                player.path = None;
            }
        }
    }

    fn step_lanes(&mut self, tick: u64, damage_tick: bool) {
        if tick % self.config.wave_spawn_interval_ticks() == 0 {
            self.spawn_waves();
        }
        let ctx = LaneStepContext {
            run_merge: tick % u64::from(self.config.merge_period_ticks) == 0,
            damage_tick,
            steps_per_second: self.config.steps_per_second,
            merge_range: self.config.merge_range(),
            engage_range: self.config.engage_range(),
        };
        for lane in &mut self.lanes {
            lane.step(&mut self.entities, &ctx);
        }
    }

    fn spawn_waves(&mut self) {
        let cannon = self.config.is_cannon_wave(self.waves_spawned);
        for lane in LaneId::ALL {
            for team in [Team::Blue, Team::Red] {
                self.spawn_wave(lane, team, cannon);
            }
        }
        info!(wave = self.waves_spawned, cannon, "Waves spawned");
        self.waves_spawned += 1;
    }

    fn step_combats<R: RandomSource>(&mut self, damage_tick: bool, rng: &mut R) {
        let miss_chance = self.config.miss_chance();
        for combat in &mut self.combats {
            combat.step(&mut self.entities, rng, damage_tick, miss_chance);
        }
        let (active, ended): (Vec<Combat>, Vec<Combat>) =
            std::mem::take(&mut self.combats).into_iter().partition(Combat::is_active);
        self.combats = active;
        for mut combat in ended {
            combat.release(&mut self.entities);
        }
    }

    fn sweep_dead(&mut self) -> Vec<RewardSource> {
        let respawn_ticks = self.config.respawn_ticks();
        let mut fallen = Vec::new();
        for id in self.entities.sorted_ids() {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            match entity.state() {
                EntityState::Dead if entity.is_player() => {
                    if let Some(spawn) = spawn_point(entity.team) {
                        entity.begin_respawn(spawn, respawn_ticks);
                        info!(id, ticks = respawn_ticks, "Player died");
                    }
                }
                EntityState::Dead | EntityState::Finished => {
                    let amount = entity.take_reward();
                    fallen.push(RewardSource {
                        position: entity.position,
                        team: entity.team,
                        amount,
                    });
                    for lane in &mut self.lanes {
                        lane.remove(id);
                    }
                    self.entities.remove(id);
                    debug!(id, "Lane entity removed");
                }
                _ => {}
            }
        }
        fallen
    }

    fn distribute_rewards(&mut self, fallen: Vec<RewardSource>) {
        let mut sources = fallen;
        for entity in self.entities.iter_mut() {
            if entity.is_wave() {
                let amount = entity.take_reward();
                sources.push(RewardSource {
                    position: entity.position,
                    team: entity.team,
                    amount,
                });
            }
        }

        let range = self.config.presence_range();
        let share_multiplier = self.config.reward_share_multiplier();
        for source in sources {
            if source.amount <= Fixed::ZERO {
                continue;
            }
            let Some(enemy) = source.team.enemy() else {
                continue;
            };
            let recipients: Vec<EntityId> = self
                .entities
                .iter()
                .filter(|e| {
                    e.is_player()
                        && e.team == enemy
                        && e.is_alive()
                        && e.position.within(source.position, range)
                })
                .map(|e| e.id)
                .collect();
            if recipients.is_empty() {
                continue;
            }
            let pool = if recipients.len() > 1 {
                source.amount * share_multiplier
            } else {
                source.amount
            };
            let share = pool / Fixed::from_num(recipients.len());
            for id in recipients {
                let Some(player) = self.entities.get_mut(id) else {
                    continue;
                };
                if let Some(data) = player.player_mut() {
                    data.inventory.gold += share;
                }
                if let Some(level) = player.stats.gain_experience(share) {
                    info!(id, level, "Player leveled up");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Validate and apply a command for the player with roster id `player_id`.
    ///
    /// # Errors
    /// Any precondition failure; state is unchanged in that case.
    pub fn apply_command(&mut self, player_id: &str, command: &PlayerCommand) -> Result<()> {
        let result = self.player_entity(player_id).and_then(|id| match command {
            PlayerCommand::MoveTo { target } => self.move_player(id, Path::to_point(*target)),
            PlayerCommand::Follow { target } => {
                if !self.entities.contains(*target) {
                    return Err(SimError::EntityNotFound(*target));
                }
                self.move_player(id, Path::to_entity(*target))
            }
            PlayerCommand::StartRecall => self.start_recall(id),
            PlayerCommand::StopRecall => self.stop_recall(id),
            PlayerCommand::AttackLaneEntity => self.attack_lane_entity(id),
            PlayerCommand::StopAttacking => self.stop_attacking(id),
            PlayerCommand::EngageCombat => self.engage_combat(id).map(|_| ()),
            PlayerCommand::JoinCombat => self.join_combat(id).map(|_| ()),
            PlayerCommand::Disengage { combat } => self.disengage(*combat),
            PlayerCommand::BuyItem { item } => self.buy_item(id, item),
        });
        if let Err(err) = &result {
            warn!(player = player_id, command = command.name(), %err, "Command rejected");
        }
        result
    }

    fn get_checked(&self, id: EntityId) -> Result<&Entity> {
        self.entities.get(id).ok_or(SimError::EntityNotFound(id))
    }

    fn get_checked_mut(&mut self, id: EntityId) -> Result<&mut Entity> {
        self.entities.get_mut(id).ok_or(SimError::EntityNotFound(id))
    }

    fn require_free(entity: &Entity, action: &'static str) -> Result<()> {
        match entity.state() {
            EntityState::Normal | EntityState::Recalling => Ok(()),
            state => Err(SimError::InvalidState {
                entity: entity.id,
                state,
                action,
            }),
        }
    }

    /// Give a movement order. Cancels recall and any attack target.
    pub fn move_player(&mut self, id: EntityId, path: Path) -> Result<()> {
        if let PathTarget::Point(point) = path.target {
            if !layout::contains(point) {
                return Err(SimError::OutOfBounds {
                    x: point.x,
                    y: point.y,
                });
            }
        }
        let player = self.get_checked_mut(id)?;
        Self::require_free(player, "move")?;
        player.set_state(EntityState::Normal);
        player.attacking = None;
        player.path = Some(path);
        Ok(())
    }

    /// Begin recalling. The player must be idle.
    pub fn start_recall(&mut self, id: EntityId) -> Result<()> {
        let ticks = self.config.recall_ticks();
        let player = self.get_checked_mut(id)?;
        let idle = player.state() == EntityState::Normal && player.path.is_none() && player.attacking.is_none();
        if !idle {
            return Err(SimError::InvalidState {
                entity: id,
                state: player.state(),
                action: "recall",
            });
        }
        player.begin_recall(ticks);
        info!(id, ticks, "Recall started");
        Ok(())
    }

    /// Cancel a recall.
    pub fn stop_recall(&mut self, id: EntityId) -> Result<()> {
        let player = self.get_checked_mut(id)?;
        if player.state() != EntityState::Recalling {
            return Err(SimError::InvalidState {
                entity: id,
                state: player.state(),
                action: "stop recall",
            });
        }
        player.set_state(EntityState::Normal);
        Ok(())
    }

    /// Target the nearest enemy wave or turret in range. Cancels recall and movement.
    pub fn attack_lane_entity(&mut self, id: EntityId) -> Result<()> {
        let player = self.get_checked(id)?;
        Self::require_free(player, "attack")?;
        let target = self.nearest_lane_target(player).ok_or(SimError::NoTargetInRange(id))?;
        let player = self.get_checked_mut(id)?;
        player.set_state(EntityState::Normal);
        player.path = None;
        player.attacking = Some(target);
        Ok(())
    }

    /// Drop the current attack target.
    pub fn stop_attacking(&mut self, id: EntityId) -> Result<()> {
        let player = self.get_checked_mut(id)?;
        if player.attacking.take().is_none() {
            return Err(SimError::NotAttacking(id));
        }
        Ok(())
    }

    /// Start a combat centred on the player.
    ///
    /// Both teams must have a NORMAL entity within engagement range (the
    /// player counts for its own team). Every NORMAL entity within the wider
    /// inclusion range joins.
    pub fn engage_combat(&mut self, id: EntityId) -> Result<CombatId> {
        let player = self.get_checked(id)?;
        Self::require_free(player, "engage")?;
        let center = player.position;
        let enemy = player.team.enemy().ok_or(SimError::NoOpposingTeams)?;

        let enemy_near = self
            .find_entities_in_range(center, self.config.engage_range(), Some(enemy), Some(EntityState::Normal), None);
        if enemy_near.is_empty() {
            return Err(SimError::NoOpposingTeams);
        }

        let mut participants: Vec<EntityId> = self
            .find_entities_in_range(center, self.config.include_range(), None, Some(EntityState::Normal), Some(id))
            .into_iter()
            .filter(|p| self.entities.get(*p).is_some_and(|e| e.team != Team::Neutral))
            .collect();
        participants.push(id);
        participants.sort_unstable();

        let combat_id = CombatId(self.next_combat_id);
        let combat = Combat::new(combat_id, center, &participants, &mut self.entities)?;
        self.next_combat_id += 1;
        self.combats.push(combat);
        Ok(combat_id)
    }

    /// Join the nearest active combat in range.
    pub fn join_combat(&mut self, id: EntityId) -> Result<CombatId> {
        Self::require_free(self.get_checked(id)?, "join combat")?;
        let combat_id = self.find_combat_in_range(id).ok_or(SimError::NoCombatInRange(id))?;
        let combat = self
            .combats
            .iter_mut()
            .find(|c| c.id() == combat_id)
            .ok_or(SimError::CombatNotFound(combat_id))?;
        combat.add_member(id, &mut self.entities)?;
        info!(id, combat = %combat_id, "Joined combat");
        Ok(combat_id)
    }

    /// Start a combat's disengage countdown.
    pub fn disengage(&mut self, combat_id: CombatId) -> Result<()> {
        let ticks = self.config.disengage_ticks();
        self.combats
            .iter_mut()
            .find(|c| c.id() == combat_id && c.is_active())
            .ok_or(SimError::CombatNotFound(combat_id))?
            .start_disengage(ticks)
    }

    /// Buy an item at spawn.
    pub fn buy_item(&mut self, id: EntityId, item_name: &str) -> Result<()> {
        let item = find_item(&self.config.items, item_name)?.clone();
        let player = self.get_checked(id)?;
        if !player.is_alive() {
            return Err(SimError::InvalidState {
                entity: id,
                state: player.state(),
                action: "buy item",
            });
        }
        if !self.at_spawn(player) {
            return Err(SimError::NotAtSpawn(id));
        }
        let data = player.player().ok_or(SimError::NotAPlayer(id))?;
        let plan = data
            .inventory
            .plan_purchase(&item, &self.config.items, self.config.max_items)?;

        let catalog = &self.config.items;
        let player = self.entities.get_mut(id).ok_or(SimError::EntityNotFound(id))?;
        let EntityKind::Player(data) = &mut player.kind else {
            return Err(SimError::NotAPlayer(id));
        };
        data.inventory.commit(&item, plan);
        let item_stats = data.inventory.item_stats(catalog);
        player.stats.set_items(item_stats);
        info!(id, item = %item.name, "Item purchased");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Action listing
    // ------------------------------------------------------------------

    /// Commands currently valid for a player.
    pub fn available_actions(&self, player_id: &str) -> Result<Vec<ActionKind>> {
        let id = self.player_entity(player_id)?;
        let player = self.get_checked(id)?;
        let state = player.state();
        let free = matches!(state, EntityState::Normal | EntityState::Recalling);
        let mut actions = Vec::new();

        if free {
            let enemy_player_near = player.team.enemy().is_some_and(|enemy| {
                self.entities.iter().any(|e| {
                    e.is_player()
                        && e.team == enemy
                        && e.state() == EntityState::Normal
                        && e.position.within(player.position, self.config.engage_range())
                })
            });
            if enemy_player_near {
                actions.push(ActionKind::Engage);
            }
            if self.find_combat_in_range(id).is_some() {
                actions.push(ActionKind::Join);
            }
            if player.attacking.is_none() && self.nearest_lane_target(player).is_some() {
                actions.push(ActionKind::Attack);
            }
        }
        if player.attacking.is_some() {
            actions.push(ActionKind::StopAttacking);
        }
        if state == EntityState::Normal {
            actions.push(ActionKind::Move);
            if player.path.is_none() && player.attacking.is_none() {
                actions.push(ActionKind::StartRecall);
            }
        }
        if state == EntityState::Recalling {
            actions.push(ActionKind::StopRecall);
        }
        Ok(actions)
    }

    /// Active combats that have not started disengaging.
    #[must_use]
    pub fn disengageable_combats(&self) -> Vec<CombatId> {
        self.combats
            .iter()
            .filter(|c| c.is_active() && !c.is_disengaging())
            .map(Combat::id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Invariants and hashing
    // ------------------------------------------------------------------

    /// Check cross-structure invariants, describing the first violation.
    ///
    /// - health within `[0, max]` for every entity
    /// - every COMBAT entity belongs to exactly one active combat, and every
    ///   combat member is in COMBAT
    /// - every wave and turret is registered on exactly one lane, players on none
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        for entity in self.entities.iter() {
            let health = entity.health();
            if health < Fixed::ZERO || health > entity.stats.max_health() {
                return Err(format!("entity {} health {} outside [0, {}]", entity.id, health, entity.stats.max_health()));
            }

            let memberships = self.combats.iter().filter(|c| c.contains(entity.id)).count();
            let in_combat = entity.state() == EntityState::Combat;
            if memberships > 1 || (in_combat && memberships != 1) || (!in_combat && memberships != 0) {
                return Err(format!(
                    "entity {} in state {:?} belongs to {} combats",
                    entity.id,
                    entity.state(),
                    memberships
                ));
            }

            let lanes = self.lanes.iter().filter(|l| l.contains(entity.id)).count();
            let expected = usize::from(!entity.is_player());
            if lanes != expected {
                return Err(format!("entity {} registered on {} lanes", entity.id, lanes));
            }
        }
        for lane in &self.lanes {
            if let Some(missing) = lane.ids().find(|id| !self.entities.contains(*id)) {
                return Err(format!("lane {:?} references removed entity {}", lane.id(), missing));
            }
        }
        Ok(())
    }

    /// Feed all match state into `hasher` in a fixed order.
    pub fn hash_state<H: Hasher>(&self, hasher: &mut H) {
        self.entities.len().hash(hasher);
        for entity in self.entities.iter() {
            entity.id.hash(hasher);
            entity.position.x.to_bits().hash(hasher);
            entity.position.y.to_bits().hash(hasher);
            entity.team.hash(hasher);
            entity.state().hash(hasher);
            entity.stats.hash(hasher);
            entity.path.hash(hasher);
            entity.attacking.hash(hasher);
            entity.kind.hash(hasher);
        }
        for lane in &self.lanes {
            for team in [Team::Blue, Team::Red] {
                lane.units(team).hash(hasher);
            }
        }
        self.combats.len().hash(hasher);
        for combat in &self.combats {
            combat.id().hash(hasher);
            combat.members().hash(hasher);
            combat.disengage_remaining().hash(hasher);
        }
        self.next_combat_id.hash(hasher);
        self.waves_spawned.hash(hasher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeededRng;

    fn blank() -> Map {
        Map::empty(SimConfig::default()).unwrap()
    }

    #[test]
    fn test_standard_map_setup() {
        let map = Map::new(SimConfig::default()).unwrap();
        assert_eq!(map.get_players().len(), 6);
        assert_eq!(map.get_player_by_id("D").unwrap().team, Team::Red);
        let turrets = map.entities().iter().filter(|e| e.is_turret()).count();
        assert_eq!(turrets, 12);
        assert!(map.check_invariants().is_ok());
    }

    #[test]
    fn test_first_step_spawns_waves() {
        let mut map = Map::new(SimConfig::default()).unwrap();
        map.step(0, false, &mut SeededRng::new(0));
        let waves = map.entities().iter().filter(|e| e.is_wave()).count();
        assert_eq!(waves, 6);
        assert_eq!(map.waves_spawned(), 1);
    }

    #[test]
    fn test_find_entities_in_range_filters() {
        let mut map = blank();
        let a = map.spawn_player("A", Team::Blue, Vec2Fixed::from_ints(100, 0));
        let b = map.spawn_player("B", Team::Blue, Vec2Fixed::from_ints(110, 0));
        let d = map.spawn_player("D", Team::Red, Vec2Fixed::from_ints(120, 0));
        map.spawn_player("E", Team::Red, Vec2Fixed::from_ints(400, 0));
        let center = Vec2Fixed::from_ints(100, 0);
        let r = Fixed::from_num(30);

        assert_eq!(map.find_entities_in_range(center, r, None, None, None), vec![a, b, d]);
        assert_eq!(map.find_entities_in_range(center, r, Some(Team::Red), None, None), vec![d]);
        assert_eq!(map.find_entities_in_range(center, r, Some(Team::Blue), None, Some(a)), vec![b]);
        assert!(map
            .find_entities_in_range(center, r, None, Some(EntityState::Combat), None)
            .is_empty());
    }

    #[test]
    fn test_unknown_player_is_rejected() {
        let mut map = blank();
        let err = map.apply_command("Z", &PlayerCommand::StartRecall).unwrap_err();
        assert_eq!(err, SimError::PlayerNotFound("Z".to_string()));
    }

    #[test]
    fn test_available_actions_idle_player() {
        let mut map = blank();
        map.spawn_player("A", Team::Blue, Vec2Fixed::from_ints(0, 25));
        let actions = map.available_actions("A").unwrap();
        assert_eq!(actions, vec![ActionKind::Move, ActionKind::StartRecall]);
    }

    #[test]
    fn test_available_actions_near_enemy() {
        let mut map = blank();
        map.spawn_player("A", Team::Blue, Vec2Fixed::from_ints(300, 0));
        map.spawn_player("D", Team::Red, Vec2Fixed::from_ints(310, 0));
        let actions = map.available_actions("A").unwrap();
        assert!(actions.contains(&ActionKind::Engage));
        assert!(!actions.contains(&ActionKind::Join));

        map.apply_command("A", &PlayerCommand::EngageCombat).unwrap();
        assert_eq!(map.available_actions("A").unwrap(), Vec::<ActionKind>::new());
        assert_eq!(map.disengageable_combats(), vec![CombatId(1)]);
    }
}

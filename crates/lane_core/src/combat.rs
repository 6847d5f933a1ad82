//! Group skirmish resolution.
//!
//! A [`Combat`] owns its members for as long as it is active: every member
//! is in [`EntityState::Combat`] and skipped by lane and player movement.
//! On each damage tick every living member either misses or hits a random
//! living enemy. A combat ends when one side is wiped out or its disengage
//! countdown runs out, and then releases survivors back to NORMAL.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::entity::{EntityId, EntityState, EntityStorage, Team};
use crate::error::{Result, SimError};
use crate::math::{Fixed, Vec2Fixed};
use crate::rng::RandomSource;

/// Identifier of a combat, unique within a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CombatId(pub u32);

impl fmt::Display for CombatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "combat#{}", self.0)
    }
}

/// An active skirmish anchored at a map position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combat {
    id: CombatId,
    position: Vec2Fixed,
    members: Vec<EntityId>,
    red: Vec<EntityId>,
    blue: Vec<EntityId>,
    disengage_remaining: Option<u32>,
    active: bool,
}

impl Combat {
    /// Start a combat with `participants`, moving each into COMBAT.
    ///
    /// Fails without touching any entity if a participant is missing, not
    /// NORMAL/RECALLING, already fighting, or if both teams are not present.
    pub fn new(
        id: CombatId,
        position: Vec2Fixed,
        participants: &[EntityId],
        entities: &mut EntityStorage,
    ) -> Result<Self> {
        let mut has_red = false;
        let mut has_blue = false;
        for &pid in participants {
            let entity = entities.get(pid).ok_or(SimError::EntityNotFound(pid))?;
            check_joinable(entity.id, entity.state())?;
            match entity.team {
                Team::Red => has_red = true,
                Team::Blue => has_blue = true,
                Team::Neutral => {}
            }
        }
        if !(has_red && has_blue) {
            return Err(SimError::NoOpposingTeams);
        }

        let mut combat = Self {
            id,
            position,
            members: Vec::new(),
            red: Vec::new(),
            blue: Vec::new(),
            disengage_remaining: None,
            active: true,
        };
        for &pid in participants {
            combat.add_member(pid, entities)?;
        }
        info!(%id, members = combat.members.len(), "Combat started");
        Ok(combat)
    }

    /// Pull another entity into this combat.
    ///
    /// # Errors
    /// [`SimError::AlreadyInCombat`] if the entity is fighting elsewhere; the
    /// entity is left untouched.
    pub fn add_member(&mut self, id: EntityId, entities: &mut EntityStorage) -> Result<()> {
        let entity = entities.get_mut(id).ok_or(SimError::EntityNotFound(id))?;
        check_joinable(id, entity.state())?;
        let bucket = match entity.team {
            Team::Red => &mut self.red,
            Team::Blue => &mut self.blue,
            Team::Neutral => {
                return Err(SimError::InvalidState {
                    entity: id,
                    state: entity.state(),
                    action: "join combat",
                })
            }
        };
        entity.path = None;
        entity.attacking = None;
        entity.set_state(EntityState::Combat);
        bucket.push(id);
        self.members.push(id);
        Ok(())
    }

    /// Identifier.
    #[must_use]
    pub const fn id(&self) -> CombatId {
        self.id
    }

    /// Anchor position.
    #[must_use]
    pub const fn position(&self) -> Vec2Fixed {
        self.position
    }

    /// All members in join order.
    #[must_use]
    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    /// Members fighting for `team`.
    #[must_use]
    pub fn bucket(&self, team: Team) -> &[EntityId] {
        match team {
            Team::Red => &self.red,
            Team::Blue => &self.blue,
            Team::Neutral => &[],
        }
    }

    /// Whether `id` is a member.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.members.contains(&id)
    }

    /// Whether the combat is still running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Ticks left on the disengage countdown, if started.
    #[must_use]
    pub const fn disengage_remaining(&self) -> Option<u32> {
        self.disengage_remaining
    }

    /// Whether disengage has been started.
    #[must_use]
    pub const fn is_disengaging(&self) -> bool {
        self.disengage_remaining.is_some()
    }

    /// Start the disengage countdown.
    pub fn start_disengage(&mut self, ticks: u32) -> Result<()> {
        if self.disengage_remaining.is_some() {
            return Err(SimError::AlreadyDisengaging(self.id));
        }
        self.disengage_remaining = Some(ticks);
        info!(id = %self.id, ticks, "Combat disengaging");
        Ok(())
    }

    fn drop_member(&mut self, id: EntityId) {
        self.members.retain(|&m| m != id);
        self.red.retain(|&m| m != id);
        self.blue.retain(|&m| m != id);
    }

    /// Advance one tick.
    ///
    /// Members that died or vanished elsewhere are pruned first. The
    /// disengage countdown runs every tick; damage only on damage ticks. A
    /// member with no living enemy skips its turn.
    pub fn step<R: RandomSource>(
        &mut self,
        entities: &mut EntityStorage,
        rng: &mut R,
        damage_tick: bool,
        miss_chance: Fixed,
    ) {
        if !self.active {
            return;
        }

        let gone: Vec<EntityId> = self
            .members
            .iter()
            .copied()
            .filter(|&m| !entities.is_alive(m))
            .collect();
        for id in gone {
            self.drop_member(id);
        }

        if let Some(remaining) = self.disengage_remaining {
            let remaining = remaining.saturating_sub(1);
            self.disengage_remaining = Some(remaining);
            if remaining == 0 {
                self.active = false;
                return;
            }
        }

        if damage_tick {
            self.resolve_attacks(entities, rng, miss_chance);
        }

        if self.red.is_empty() || self.blue.is_empty() {
            self.active = false;
        }
    }

    fn resolve_attacks<R: RandomSource>(
        &mut self,
        entities: &mut EntityStorage,
        rng: &mut R,
        miss_chance: Fixed,
    ) {
        let mut fallen = Vec::new();
        for attacker in self.members.clone() {
            let Some(entity) = entities.get(attacker) else {
                continue;
            };
            if !entity.is_alive() {
                continue;
            }
            let Some(enemy) = entity.team.enemy() else {
                continue;
            };
            let damage = entity.get_damage();
            let opposing = self.bucket(enemy);
            if opposing.is_empty() {
                continue;
            }
            if rng.roll() < miss_chance {
                continue;
            }
            let target = opposing[rng.pick(opposing.len())];
            let Some(victim) = entities.get_mut(target) else {
                continue;
            };
            let dealt = victim.take_damage(&damage);
            debug!(combat = %self.id, attacker, target, %dealt, "Combat hit");
            if !victim.is_alive() {
                match enemy {
                    Team::Red => self.red.retain(|&m| m != target),
                    _ => self.blue.retain(|&m| m != target),
                }
                fallen.push(target);
            }
        }
        for id in fallen {
            self.drop_member(id);
        }
    }

    /// Return surviving members to NORMAL and mark the combat inactive.
    pub fn release(&mut self, entities: &mut EntityStorage) {
        self.active = false;
        for &id in &self.members {
            if let Some(entity) = entities.get_mut(id) {
                if entity.state() == EntityState::Combat {
                    entity.set_state(EntityState::Normal);
                }
            }
        }
        info!(id = %self.id, survivors = self.members.len(), "Combat ended");
    }
}

fn check_joinable(id: EntityId, state: EntityState) -> Result<()> {
    match state {
        EntityState::Normal | EntityState::Recalling => Ok(()),
        EntityState::Combat => Err(SimError::AlreadyInCombat(id)),
        other => Err(SimError::InvalidState {
            entity: id,
            state: other,
            action: "join combat",
        }),
    }
}

//! Lane simulation: wave movement, merging and priority targeting.
//!
//! A [`Lane`] keeps one bucket of [`LaneUnit`]s per team, in spawn order.
//! Waves carry [`LaneProgress`]; turrets have none and never move. The
//! entities themselves live in [`EntityStorage`], the lane only tracks ids.
//!
//! Each tick runs three passes in order:
//!
//! 1. **Merge** (only when the caller asks, see [`LaneStepContext::run_merge`]):
//!    adjacent NORMAL waves of one team that are within the merge distance are
//!    folded together, trailing into leading. A wave takes part in at most one
//!    merge per pass.
//! 2. **Targeting**: all lane attack targets are cleared, then every opposing
//!    lane pair within engagement range targets each other. A unit already
//!    targeting a turret keeps it over a wave. Units still without a target
//!    fall back to the nearest enemy player in range.
//! 3. **Advance**: units that are not NORMAL are skipped. Units with a target
//!    hit it on damage ticks; waves without a target walk the lane.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::{EntityId, EntityState, EntityStorage, Team};
use crate::layout::LaneId;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::path::Polyline;

/// Lane-local progress of a wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LaneProgress {
    /// Segment index in the team's walking order.
    pub segment: usize,
    /// Distance walked within the current segment.
    #[serde(with = "fixed_serde")]
    pub distance_along: Fixed,
    /// Distance walked since spawning.
    #[serde(with = "fixed_serde")]
    pub overall_distance: Fixed,
}

/// A wave or turret registered on a lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaneUnit {
    /// Arena id.
    pub entity: EntityId,
    /// `None` for turrets.
    pub progress: Option<LaneProgress>,
}

/// Per-tick parameters for [`Lane::step`].
#[derive(Debug, Clone, Copy)]
pub struct LaneStepContext {
    /// Run the merge pass this tick.
    pub run_merge: bool,
    /// Apply attack damage this tick.
    pub damage_tick: bool,
    /// Simulation steps per second.
    pub steps_per_second: u32,
    /// Merge distance.
    pub merge_range: Fixed,
    /// Engagement distance.
    pub engage_range: Fixed,
}

/// One lane with its per-team unit buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lane {
    id: LaneId,
    line: Polyline,
    blue: Vec<LaneUnit>,
    red: Vec<LaneUnit>,
}

impl Lane {
    /// Empty lane with the fixed geometry for `id`.
    #[must_use]
    pub fn new(id: LaneId) -> Self {
        Self {
            id,
            line: Polyline::new(id.points()),
            blue: Vec::new(),
            red: Vec::new(),
        }
    }

    /// Which lane this is.
    #[must_use]
    pub const fn id(&self) -> LaneId {
        self.id
    }

    /// Lane geometry.
    #[must_use]
    pub const fn polyline(&self) -> &Polyline {
        &self.line
    }

    /// Units of `team` in spawn order.
    #[must_use]
    pub fn units(&self, team: Team) -> &[LaneUnit] {
        match team {
            Team::Blue => &self.blue,
            Team::Red => &self.red,
            Team::Neutral => &[],
        }
    }

    fn units_mut(&mut self, team: Team) -> Option<&mut Vec<LaneUnit>> {
        match team {
            Team::Blue => Some(&mut self.blue),
            Team::Red => Some(&mut self.red),
            Team::Neutral => None,
        }
    }

    /// Ids of every registered unit, BLUE bucket first.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.blue.iter().chain(&self.red).map(|u| u.entity)
    }

    /// Whether `id` is registered on this lane.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.ids().any(|e| e == id)
    }

    /// Progress of a registered wave.
    #[must_use]
    pub fn progress_of(&self, id: EntityId) -> Option<LaneProgress> {
        self.blue
            .iter()
            .chain(&self.red)
            .find(|u| u.entity == id)
            .and_then(|u| u.progress)
    }

    /// Where `team`'s waves enter the lane.
    #[must_use]
    pub fn start_point(&self, team: Team) -> Option<Vec2Fixed> {
        match team {
            Team::Blue => Some(self.line.start()),
            Team::Red => Some(self.line.end()),
            Team::Neutral => None,
        }
    }

    /// Register a turret.
    pub fn add_turret(&mut self, team: Team, id: EntityId) {
        if let Some(units) = self.units_mut(team) {
            units.push(LaneUnit {
                entity: id,
                progress: None,
            });
        }
    }

    /// Register a freshly spawned wave at the team's lane start.
    pub fn add_wave(&mut self, team: Team, id: EntityId) {
        if let Some(units) = self.units_mut(team) {
            units.push(LaneUnit {
                entity: id,
                progress: Some(LaneProgress::default()),
            });
        }
    }

    /// Drop `id` from the buckets. Returns whether it was registered.
    pub fn remove(&mut self, id: EntityId) -> bool {
        let before = self.blue.len() + self.red.len();
        self.blue.retain(|u| u.entity != id);
        self.red.retain(|u| u.entity != id);
        before != self.blue.len() + self.red.len()
    }

    /// Run merge (optional), targeting and advance for one tick.
    pub fn step(&mut self, entities: &mut EntityStorage, ctx: &LaneStepContext) {
        if ctx.run_merge {
            self.merge_pass(entities, ctx.merge_range);
        }
        self.targeting_pass(entities, ctx.engage_range);
        self.advance_pass(entities, ctx);
    }

    fn merge_pass(&mut self, entities: &mut EntityStorage, merge_range: Fixed) {
        for team in [Team::Blue, Team::Red] {
            let candidates: Vec<(EntityId, Fixed)> = self
                .units(team)
                .iter()
                .filter_map(|unit| {
                    let progress = unit.progress?;
                    let entity = entities.get(unit.entity)?;
                    (entity.is_wave() && entity.state() == EntityState::Normal)
                        .then_some((unit.entity, progress.overall_distance))
                })
                .collect();

            let mut idx = 0;
            while idx + 1 < candidates.len() {
                let (a, dist_a) = candidates[idx];
                let (b, dist_b) = candidates[idx + 1];
                if (dist_a - dist_b).abs() <= merge_range {
                    let (lead, trail) = if dist_a >= dist_b { (a, b) } else { (b, a) };
                    self.merge(entities, lead, trail);
                    idx += 2;
                } else {
                    idx += 1;
                }
            }
        }
    }

    fn merge(&mut self, entities: &mut EntityStorage, lead: EntityId, trail: EntityId) {
        let Some(trailing) = entities.get_mut(trail) else {
            return;
        };
        let absorbed = trailing.clone();
        trailing.take_reward();
        trailing.set_state(EntityState::Dead);
        if let Some(leading) = entities.get_mut(lead) {
            leading.absorb_wave(&absorbed);
            debug!(lane = ?self.id, lead, trail, health = %leading.health(), "Waves merged");
        }
        self.remove(trail);
    }

    /// Alive NORMAL units of `team`.
    fn active(&self, entities: &EntityStorage, team: Team) -> Vec<EntityId> {
        self.units(team)
            .iter()
            .filter(|u| {
                entities
                    .get(u.entity)
                    .is_some_and(|e| e.state() == EntityState::Normal)
            })
            .map(|u| u.entity)
            .collect()
    }

    fn targeting_pass(&self, entities: &mut EntityStorage, engage_range: Fixed) {
        for id in self.ids() {
            if let Some(entity) = entities.get_mut(id) {
                entity.attacking = None;
            }
        }

        let blue = self.active(entities, Team::Blue);
        let red = self.active(entities, Team::Red);
        for &b in &blue {
            for &r in &red {
                let (Some(pb), Some(pr)) = (
                    entities.get(b).map(|e| e.position),
                    entities.get(r).map(|e| e.position),
                ) else {
                    continue;
                };
                if pb.within(pr, engage_range) {
                    assign_target(entities, b, r);
                    assign_target(entities, r, b);
                }
            }
        }

        for &id in blue.iter().chain(&red) {
            let Some(entity) = entities.get(id) else {
                continue;
            };
            if entity.attacking.is_some() {
                continue;
            }
            if let Some(player) = nearest_enemy_player(entities, entity.team, entity.position, engage_range) {
                if let Some(entity) = entities.get_mut(id) {
                    entity.attacking = Some(player);
                }
            }
        }
    }

    fn advance_pass(&mut self, entities: &mut EntityStorage, ctx: &LaneStepContext) {
        for team in [Team::Blue, Team::Red] {
            let count = self.units(team).len();
            for idx in 0..count {
                let unit = self.units(team)[idx];
                let Some(entity) = entities.get(unit.entity) else {
                    continue;
                };
                if entity.state() != EntityState::Normal {
                    continue;
                }

                if let Some(target) = entity.attacking {
                    if ctx.damage_tick {
                        let damage = entity.get_damage();
                        if let Some(victim) = entities.get_mut(target) {
                            victim.take_damage(&damage);
                        }
                    }
                    continue;
                }

                let Some(progress) = unit.progress else {
                    continue;
                };
                let step = entity.step_distance(ctx.steps_per_second);
                let (next, position, finished) = walk(&self.line, team, progress, step);
                if let Some(entity) = entities.get_mut(unit.entity) {
                    entity.position = position;
                    if finished {
                        entity.set_state(EntityState::Finished);
                        debug!(lane = ?self.id, id = unit.entity, "Wave reached lane end");
                    }
                }
                if let Some(units) = self.units_mut(team) {
                    units[idx].progress = Some(next);
                }
            }
        }
    }
}

/// Point `attacker` at `target`, unless it already targets a turret.
fn assign_target(entities: &mut EntityStorage, attacker: EntityId, target: EntityId) {
    let current_is_turret = entities
        .get(attacker)
        .and_then(|e| e.attacking)
        .and_then(|id| entities.get(id))
        .is_some_and(|e| e.is_turret());
    if current_is_turret {
        return;
    }
    if let Some(entity) = entities.get_mut(attacker) {
        entity.attacking = Some(target);
    }
}

/// Nearest enemy player that is NORMAL or RECALLING within `range`, ties to the lowest id.
fn nearest_enemy_player(
    entities: &EntityStorage,
    team: Team,
    position: Vec2Fixed,
    range: Fixed,
) -> Option<EntityId> {
    entities
        .iter()
        .filter(|e| {
            e.is_player()
                && team.is_enemy_of(e.team)
                && matches!(e.state(), EntityState::Normal | EntityState::Recalling)
                && e.position.within(position, range)
        })
        .min_by_key(|e| (e.position.distance_squared(position), e.id))
        .map(|e| e.id)
}

/// Polyline segment index for a team's walking-order segment.
fn segment_index(line: &Polyline, team: Team, segment: usize) -> usize {
    match team {
        Team::Red => line.segment_count() - 1 - segment,
        _ => segment,
    }
}

/// World position for lane progress.
fn locate(line: &Polyline, team: Team, progress: &LaneProgress) -> Vec2Fixed {
    let idx = segment_index(line, team, progress.segment);
    match team {
        Team::Red => line.point(idx + 1) - line.direction(idx).scale(progress.distance_along),
        _ => line.point(idx) + line.direction(idx).scale(progress.distance_along),
    }
}

/// Walk `step` along the lane. Distance left over past a vertex carries into
/// the following segment. Returns new progress, position and whether the
/// lane end was reached.
fn walk(line: &Polyline, team: Team, progress: LaneProgress, step: Fixed) -> (LaneProgress, Vec2Fixed, bool) {
    let mut next = progress;
    next.distance_along += step;
    next.overall_distance += step;
    while next.segment < line.segment_count() {
        let length = line.length(segment_index(line, team, next.segment));
        if next.distance_along < length {
            break;
        }
        next.distance_along -= length;
        next.segment += 1;
    }
    if next.segment >= line.segment_count() {
        let end = match team {
            Team::Red => line.start(),
            _ => line.end(),
        };
        return (next, end, true);
    }
    (next, locate(line, team, &next), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::stats::DamageStats;

    fn ctx(run_merge: bool, damage_tick: bool) -> LaneStepContext {
        LaneStepContext {
            run_merge,
            damage_tick,
            steps_per_second: 5,
            merge_range: Fixed::from_num(15),
            engage_range: Fixed::from_num(30),
        }
    }

    fn spawn_wave(lane: &mut Lane, entities: &mut EntityStorage, team: Team) -> EntityId {
        let start = lane.start_point(team).unwrap();
        let id = entities.insert(Entity::wave(team, start, false, Fixed::ONE));
        lane.add_wave(team, id);
        id
    }

    #[test]
    fn test_blue_walks_mid_forward() {
        let mut lane = Lane::new(LaneId::Mid);
        let mut entities = EntityStorage::new();
        let id = spawn_wave(&mut lane, &mut entities, Team::Blue);
        lane.step(&mut entities, &ctx(false, false));
        // speed 15 at 5 steps per second
        assert_eq!(entities.get(id).unwrap().position, Vec2Fixed::from_ints(28, 0));
        assert_eq!(lane.progress_of(id).unwrap().overall_distance, Fixed::from_num(3));
    }

    #[test]
    fn test_red_walks_mid_backward() {
        let mut lane = Lane::new(LaneId::Mid);
        let mut entities = EntityStorage::new();
        let id = spawn_wave(&mut lane, &mut entities, Team::Red);
        lane.step(&mut entities, &ctx(false, false));
        assert_eq!(entities.get(id).unwrap().position, Vec2Fixed::from_ints(722, 0));
    }

    #[test]
    fn test_wave_finishes_at_lane_end() {
        let mut line_lane = Lane::new(LaneId::Mid);
        let mut entities = EntityStorage::new();
        let id = spawn_wave(&mut line_lane, &mut entities, Team::Blue);
        // 700 long at 3 per step
        for _ in 0..234 {
            line_lane.step(&mut entities, &ctx(false, false));
        }
        let wave = entities.get(id).unwrap();
        assert_eq!(wave.state(), EntityState::Finished);
        assert_eq!(wave.position, Vec2Fixed::from_ints(725, 0));
    }

    #[test]
    fn test_adjacent_waves_merge() {
        let mut lane = Lane::new(LaneId::Mid);
        let mut entities = EntityStorage::new();
        let lead = spawn_wave(&mut lane, &mut entities, Team::Blue);
        for _ in 0..3 {
            lane.step(&mut entities, &ctx(false, false));
        }
        let trail = spawn_wave(&mut lane, &mut entities, Team::Blue);
        entities.get_mut(trail).unwrap().take_damage(&DamageStats {
            true_damage: Fixed::from_num(20),
            ..DamageStats::default()
        });

        lane.step(&mut entities, &ctx(true, false));

        assert!(!lane.contains(trail));
        assert_eq!(entities.get(trail).unwrap().state(), EntityState::Dead);
        let merged = entities.get(lead).unwrap();
        assert_eq!(merged.health(), Fixed::from_num(180));
        assert_eq!(merged.pending_reward(), Fixed::from_num(20));
        assert_eq!(entities.get(trail).unwrap().pending_reward(), Fixed::ZERO);
    }

    #[test]
    fn test_distant_waves_do_not_merge() {
        let mut lane = Lane::new(LaneId::Mid);
        let mut entities = EntityStorage::new();
        spawn_wave(&mut lane, &mut entities, Team::Blue);
        for _ in 0..10 {
            lane.step(&mut entities, &ctx(false, false));
        }
        let trail = spawn_wave(&mut lane, &mut entities, Team::Blue);
        lane.step(&mut entities, &ctx(true, false));
        assert!(lane.contains(trail));
    }

    #[test]
    fn test_opposing_waves_target_each_other_and_stop() {
        let mut lane = Lane::new(LaneId::Mid);
        let mut entities = EntityStorage::new();
        let blue = spawn_wave(&mut lane, &mut entities, Team::Blue);
        let red = spawn_wave(&mut lane, &mut entities, Team::Red);
        entities.get_mut(blue).unwrap().position = Vec2Fixed::from_ints(400, 0);
        entities.get_mut(red).unwrap().position = Vec2Fixed::from_ints(420, 0);

        lane.step(&mut entities, &ctx(false, true));

        let b = entities.get(blue).unwrap();
        let r = entities.get(red).unwrap();
        assert_eq!(b.attacking, Some(red));
        assert_eq!(r.attacking, Some(blue));
        assert_eq!(b.position, Vec2Fixed::from_ints(400, 0));
        assert!(b.health() < b.stats.max_health());
        assert!(r.health() < r.stats.max_health());
    }

    #[test]
    fn test_turret_target_has_priority() {
        let mut lane = Lane::new(LaneId::Mid);
        let mut entities = EntityStorage::new();
        let turret = entities.insert(Entity::turret(Team::Red, Vec2Fixed::from_ints(500, 0)));
        lane.add_turret(Team::Red, turret);
        let blue = spawn_wave(&mut lane, &mut entities, Team::Blue);
        let red_wave = spawn_wave(&mut lane, &mut entities, Team::Red);
        entities.get_mut(blue).unwrap().position = Vec2Fixed::from_ints(480, 0);
        entities.get_mut(red_wave).unwrap().position = Vec2Fixed::from_ints(490, 0);

        lane.step(&mut entities, &ctx(false, false));

        assert_eq!(entities.get(blue).unwrap().attacking, Some(turret));
        assert_eq!(entities.get(red_wave).unwrap().attacking, Some(blue));
        assert_eq!(entities.get(turret).unwrap().attacking, Some(blue));
    }

    #[test]
    fn test_leftover_step_carries_past_vertex() {
        let mut lane = Lane::new(LaneId::Top);
        let mut entities = EntityStorage::new();
        let id = spawn_wave(&mut lane, &mut entities, Team::Blue);
        // First top segment is about 364 long; 125 steps of 3 cross its end.
        for _ in 0..125 {
            lane.step(&mut entities, &ctx(false, false));
        }
        let progress = lane.progress_of(id).unwrap();
        assert_eq!(progress.segment, 1);
        assert_eq!(progress.overall_distance, Fixed::from_num(375));

        let line = lane.polyline();
        let position = entities.get(id).unwrap().position;
        let walked = line.length(0) + line.point(1).distance(position);
        let drift = (walked - progress.overall_distance).abs();
        assert!(drift < Fixed::from_num(1) / Fixed::from_num(100), "drift {drift}");
    }

    #[test]
    fn test_first_turret_target_is_kept() {
        let mut lane = Lane::new(LaneId::Mid);
        let mut entities = EntityStorage::new();
        let near = entities.insert(Entity::turret(Team::Red, Vec2Fixed::from_ints(500, 0)));
        let far = entities.insert(Entity::turret(Team::Red, Vec2Fixed::from_ints(505, 0)));
        lane.add_turret(Team::Red, near);
        lane.add_turret(Team::Red, far);
        let blue = spawn_wave(&mut lane, &mut entities, Team::Blue);
        entities.get_mut(blue).unwrap().position = Vec2Fixed::from_ints(485, 0);

        lane.step(&mut entities, &ctx(false, false));

        assert_eq!(entities.get(blue).unwrap().attacking, Some(near));
        assert_eq!(entities.get(far).unwrap().attacking, Some(blue));
    }

    #[test]
    fn test_fallback_to_enemy_player() {
        let mut lane = Lane::new(LaneId::Mid);
        let mut entities = EntityStorage::new();
        let turret = entities.insert(Entity::turret(Team::Red, Vec2Fixed::from_ints(500, 0)));
        lane.add_turret(Team::Red, turret);
        let player = entities.insert(Entity::new_player("A", Team::Blue, Vec2Fixed::from_ints(480, 10)));

        lane.step(&mut entities, &ctx(false, true));

        assert_eq!(entities.get(turret).unwrap().attacking, Some(player));
        let hit = entities.get(player).unwrap();
        assert!(hit.health() < hit.stats.max_health());
    }

    #[test]
    fn test_remove_unit() {
        let mut lane = Lane::new(LaneId::Top);
        let mut entities = EntityStorage::new();
        let id = spawn_wave(&mut lane, &mut entities, Team::Red);
        assert!(lane.remove(id));
        assert!(!lane.remove(id));
        assert!(lane.units(Team::Red).is_empty());
    }
}

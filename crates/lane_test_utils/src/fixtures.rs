//! Test fixtures and helpers.
//!
//! Scripted random sources and small hand-built scenarios for consistent
//! testing of combats, rewards and lane behavior.

use std::collections::VecDeque;

use lane_core::config::SimConfig;
use lane_core::entity::{EntityId, Team};
use lane_core::map::Map;
use lane_core::math::{Fixed, Vec2Fixed};
use lane_core::rng::RandomSource;
use lane_core::simulation::Simulator;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

/// Exact fraction `num / den` in fixed-point.
#[must_use]
pub fn ratio(num: i32, den: i32) -> Fixed {
    Fixed::from_num(num) / Fixed::from_num(den)
}

/// Largest roll a [`RandomSource`] can produce. Never a miss.
#[must_use]
pub fn max_roll() -> Fixed {
    Fixed::ONE - Fixed::DELTA
}

/// Random source that replays queued values.
///
/// Once a queue runs dry, rolls fall back to [`max_roll`] (every action
/// lands) and picks fall back to index 0 (the lowest-id enemy).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedRng {
    rolls: VecDeque<Fixed>,
    picks: VecDeque<usize>,
}

impl ScriptedRng {
    /// Queue the given rolls and picks.
    #[must_use]
    pub fn new(rolls: impl IntoIterator<Item = Fixed>, picks: impl IntoIterator<Item = usize>) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
            picks: picks.into_iter().collect(),
        }
    }

    /// Never misses, always picks the first enemy.
    #[must_use]
    pub fn always_hit() -> Self {
        Self::default()
    }

    /// Rolls and picks not consumed yet.
    #[must_use]
    pub fn remaining(&self) -> (usize, usize) {
        (self.rolls.len(), self.picks.len())
    }
}

impl RandomSource for ScriptedRng {
    fn roll(&mut self) -> Fixed {
        self.rolls.pop_front().unwrap_or_else(max_roll)
    }

    fn pick(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.picks.pop_front().unwrap_or(0) % len
    }
}

/// Random source that always rolls zero: every action misses whenever the
/// miss chance is above zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlwaysMiss;

impl RandomSource for AlwaysMiss {
    fn roll(&mut self) -> Fixed {
        Fixed::ZERO
    }

    fn pick(&mut self, _len: usize) -> usize {
        0
    }
}

/// Default configuration with combat misses disabled.
#[must_use]
pub fn no_miss_config() -> SimConfig {
    SimConfig {
        miss_chance_percent: 0,
        ..SimConfig::default()
    }
}

/// Lanes with no units and no players.
///
/// # Panics
///
/// Panics if `config` does not validate.
#[must_use]
pub fn blank_map(config: SimConfig) -> Map {
    match Map::empty(config) {
        Ok(map) => map,
        Err(err) => panic!("invalid scenario config: {err}"),
    }
}

/// Open ground between the mid and top lanes, well away from lane traffic
/// and both spawns.
#[must_use]
pub fn field(dx: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(375 + dx, 100)
}

/// Ids of a hand-built duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duel {
    /// Blue player "A".
    pub blue: EntityId,
    /// Red player "D".
    pub red: EntityId,
}

/// Blue "A" and red "D" ten units apart in open ground, with a scripted
/// random source.
#[must_use]
pub fn duel(rng: ScriptedRng) -> (Simulator<ScriptedRng>, Duel) {
    let mut map = blank_map(no_miss_config());
    let blue = map.spawn_player("A", Team::Blue, field(0));
    let red = map.spawn_player("D", Team::Red, field(10));
    (Simulator::from_map(map, rng), Duel { blue, red })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_rng_replays_then_falls_back() {
        let mut rng = ScriptedRng::new([ratio(1, 10)], [3]);
        assert_eq!(rng.roll(), ratio(1, 10));
        assert_eq!(rng.pick(2), 1);
        assert_eq!(rng.remaining(), (0, 0));
        assert_eq!(rng.roll(), max_roll());
        assert_eq!(rng.pick(5), 0);
        assert_eq!(rng.pick(0), 0);
    }

    #[test]
    fn test_duel_setup() {
        let (sim, ids) = duel(ScriptedRng::always_hit());
        assert_eq!(sim.get_players().len(), 2);
        assert_eq!(sim.get_player_by_id("A").map(|p| p.id), Some(ids.blue));
        assert_eq!(sim.get_player_by_id("D").map(|p| p.id), Some(ids.red));
    }

    #[test]
    fn test_max_roll_below_one() {
        assert!(max_roll() < Fixed::ONE);
        assert!(max_roll() > ratio(99, 100));
        assert_eq!(ratio(10, 5), fixed(2));
        assert_eq!(AlwaysMiss.roll(), Fixed::ZERO);
    }
}

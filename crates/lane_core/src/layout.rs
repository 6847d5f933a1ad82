//! Fixed map geometry: lanes, turret sites, spawn points and starting roster.
//!
//! The map is 750 wide, centred vertically on `y = 0`. BLUE starts on the
//! left and walks lanes forward; RED starts on the right and walks them
//! backward. RED turret sites mirror BLUE's around `x = 375`.

use serde::{Deserialize, Serialize};

use crate::entity::Team;
use crate::math::{Fixed, Vec2Fixed};

/// Map width.
pub const MAP_WIDTH: i32 = 750;

/// Lane identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LaneId {
    /// Upper lane.
    Top,
    /// Straight middle lane.
    Mid,
    /// Lower lane.
    Bottom,
}

impl LaneId {
    /// All lanes in processing order.
    pub const ALL: [Self; 3] = [Self::Top, Self::Mid, Self::Bottom];

    /// Lane polyline, BLUE end first.
    #[must_use]
    pub fn points(self) -> Vec<Vec2Fixed> {
        match self {
            Self::Top => vec![
                Vec2Fixed::from_ints(25, 150),
                Vec2Fixed::from_ints(375, 250),
                Vec2Fixed::from_ints(725, 150),
            ],
            Self::Mid => vec![Vec2Fixed::from_ints(25, 0), Vec2Fixed::from_ints(725, 0)],
            Self::Bottom => vec![
                Vec2Fixed::from_ints(25, -150),
                Vec2Fixed::from_ints(375, -250),
                Vec2Fixed::from_ints(725, -150),
            ],
        }
    }

    /// Turret sites for `team` on this lane. NEUTRAL has none.
    #[must_use]
    pub fn turret_sites(self, team: Team) -> Vec<Vec2Fixed> {
        let blue: [(i32, i32); 2] = match self {
            Self::Top => [(25, 150), (250, 250)],
            Self::Mid => [(25, 0), (250, 0)],
            Self::Bottom => [(25, -150), (250, -250)],
        };
        match team {
            Team::Blue => blue.iter().map(|&(x, y)| Vec2Fixed::from_ints(x, y)).collect(),
            Team::Red => blue
                .iter()
                .map(|&(x, y)| Vec2Fixed::from_ints(MAP_WIDTH - x, y))
                .collect(),
            Team::Neutral => Vec::new(),
        }
    }
}

/// Team spawn point. NEUTRAL has no spawn.
#[must_use]
pub fn spawn_point(team: Team) -> Option<Vec2Fixed> {
    match team {
        Team::Blue => Some(Vec2Fixed::from_ints(0, 25)),
        Team::Red => Some(Vec2Fixed::from_ints(MAP_WIDTH, 25)),
        Team::Neutral => None,
    }
}

/// Whether `position` lies on the map: `0..=MAP_WIDTH` across and
/// `MAP_WIDTH / 2` either side of `y = 0`.
#[must_use]
pub fn contains(position: Vec2Fixed) -> bool {
    let width = Fixed::from_num(MAP_WIDTH);
    let half = width / Fixed::from_num(2);
    (Fixed::ZERO..=width).contains(&position.x) && (-half..=half).contains(&position.y)
}

/// Starting players: id, team and position.
pub const ROSTER: [(&str, Team, i32, i32); 6] = [
    ("A", Team::Blue, 0, 25),
    ("B", Team::Blue, 25, 25),
    ("C", Team::Blue, 50, 25),
    ("D", Team::Red, 750, 25),
    ("E", Team::Red, 725, 25),
    ("F", Team::Red, 700, 25),
];

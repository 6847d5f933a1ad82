//! Point-to-point and polyline movement.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::math::{Fixed, Vec2Fixed};

/// Where a path leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathTarget {
    /// A fixed map location.
    Point(Vec2Fixed),
    /// A live entity, followed as it moves.
    Entity(EntityId),
}

/// Outcome of one movement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStep {
    /// Still travelling.
    Moving,
    /// Snapped onto the target this step.
    Arrived,
    /// The followed entity no longer exists or is not alive.
    TargetLost,
}

/// An active movement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    /// Destination.
    pub target: PathTarget,
}

impl Path {
    /// Path to a fixed location.
    #[must_use]
    pub const fn to_point(point: Vec2Fixed) -> Self {
        Self {
            target: PathTarget::Point(point),
        }
    }

    /// Path following an entity.
    #[must_use]
    pub const fn to_entity(id: EntityId) -> Self {
        Self {
            target: PathTarget::Entity(id),
        }
    }

    /// Move `position` one step toward `target`.
    ///
    /// `target` is the resolved destination for this tick, `None` when the
    /// followed entity is gone.
    pub fn advance(
        position: &mut Vec2Fixed,
        target: Option<Vec2Fixed>,
        step: Fixed,
        tolerance: Fixed,
    ) -> PathStep {
        let Some(target) = target else {
            return PathStep::TargetLost;
        };
        let (next, arrived) = step_toward(*position, target, step, tolerance);
        *position = next;
        if arrived {
            PathStep::Arrived
        } else {
            PathStep::Moving
        }
    }
}

/// Move from `from` toward `to` by `step`.
///
/// Snaps exactly onto `to` (and reports arrival) when the remaining distance
/// is at most `step + tolerance`.
#[must_use]
pub fn step_toward(from: Vec2Fixed, to: Vec2Fixed, step: Fixed, tolerance: Fixed) -> (Vec2Fixed, bool) {
    let offset = to - from;
    let remaining = offset.length();
    if remaining <= step + tolerance {
        return (to, true);
    }
    (from + offset.normalize().scale(step), false)
}

/// A fixed polyline with precomputed segment lengths and directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Vec2Fixed>,
    #[serde(with = "fixed_vec_serde")]
    lengths: Vec<Fixed>,
    directions: Vec<Vec2Fixed>,
}

mod fixed_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::math::Fixed;

    pub fn serialize<S: Serializer>(values: &[Fixed], serializer: S) -> Result<S::Ok, S::Error> {
        let bits: Vec<i64> = values.iter().map(|v| v.to_bits()).collect();
        bits.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Fixed>, D::Error> {
        let bits = Vec::<i64>::deserialize(deserializer)?;
        Ok(bits.into_iter().map(Fixed::from_bits).collect())
    }
}

impl Polyline {
    /// Build from at least two points.
    #[must_use]
    pub fn new(points: Vec<Vec2Fixed>) -> Self {
        let lengths = points.windows(2).map(|w| w[0].distance(w[1])).collect();
        let directions = points.windows(2).map(|w| (w[1] - w[0]).normalize()).collect();
        Self {
            points,
            lengths,
            directions,
        }
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.lengths.len()
    }

    /// Vertex `idx`.
    #[must_use]
    pub fn point(&self, idx: usize) -> Vec2Fixed {
        self.points[idx]
    }

    /// First vertex.
    #[must_use]
    pub fn start(&self) -> Vec2Fixed {
        self.points[0]
    }

    /// Last vertex.
    #[must_use]
    pub fn end(&self) -> Vec2Fixed {
        self.points[self.points.len() - 1]
    }

    /// Length of segment `idx`.
    #[must_use]
    pub fn length(&self, idx: usize) -> Fixed {
        self.lengths[idx]
    }

    /// Unit direction of segment `idx`, pointing from vertex `idx` to `idx + 1`.
    #[must_use]
    pub fn direction(&self, idx: usize) -> Vec2Fixed {
        self.directions[idx]
    }

    /// Sum of segment lengths.
    #[must_use]
    pub fn total_length(&self) -> Fixed {
        self.lengths.iter().copied().fold(Fixed::ZERO, |acc, l| acc + l)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_moves_along_direction() {
        let (pos, arrived) = step_toward(
            Vec2Fixed::ZERO,
            Vec2Fixed::from_ints(100, 0),
            Fixed::from_num(3),
            Fixed::from_num(3),
        );
        assert!(!arrived);
        assert_eq!(pos, Vec2Fixed::from_ints(3, 0));
    }

    #[test]
    fn test_snap_within_tolerance() {
        let target = Vec2Fixed::from_ints(5, 0);
        let (pos, arrived) = step_toward(Vec2Fixed::ZERO, target, Fixed::from_num(3), Fixed::from_num(3));
        assert!(arrived);
        assert_eq!(pos, target);
    }

    #[test]
    fn test_zero_distance_arrives() {
        let p = Vec2Fixed::from_ints(4, 4);
        let mut pos = p;
        let step = Path::advance(&mut pos, Some(p), Fixed::from_num(3), Fixed::from_num(3));
        assert_eq!(step, PathStep::Arrived);
        assert_eq!(pos, p);
    }

    #[test]
    fn test_lost_target_does_not_move() {
        let mut pos = Vec2Fixed::from_ints(1, 2);
        let step = Path::advance(&mut pos, None, Fixed::from_num(3), Fixed::from_num(3));
        assert_eq!(step, PathStep::TargetLost);
        assert_eq!(pos, Vec2Fixed::from_ints(1, 2));
    }

    #[test]
    fn test_polyline_segments() {
        let line = Polyline::new(vec![
            Vec2Fixed::from_ints(0, 0),
            Vec2Fixed::from_ints(30, 40),
            Vec2Fixed::from_ints(30, 0),
        ]);
        assert_eq!(line.segment_count(), 2);
        assert_eq!(line.length(0), Fixed::from_num(50));
        assert_eq!(line.length(1), Fixed::from_num(40));
        assert_eq!(line.total_length(), Fixed::from_num(90));
        assert_eq!(line.direction(1), Vec2Fixed::from_ints(0, -1));
        assert_eq!(line.end(), Vec2Fixed::from_ints(30, 0));
    }
}

//! Player commands and the action listing.

use serde::{Deserialize, Serialize};

use crate::combat::CombatId;
use crate::entity::EntityId;
use crate::math::Vec2Fixed;

/// A discrete order issued on behalf of a player.
///
/// Every command is checked against the player's current state before it
/// takes effect; a rejected command changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerCommand {
    /// Walk to a map location.
    MoveTo {
        /// Destination.
        target: Vec2Fixed,
    },
    /// Walk after another entity until reaching it.
    Follow {
        /// Entity to follow.
        target: EntityId,
    },
    /// Begin channeling a recall to spawn.
    StartRecall,
    /// Cancel an ongoing recall.
    StopRecall,
    /// Attack the nearest enemy wave or turret in range.
    AttackLaneEntity,
    /// Drop the current attack target.
    StopAttacking,
    /// Start a combat around the player.
    EngageCombat,
    /// Join the nearest active combat in range.
    JoinCombat,
    /// Start the disengage countdown of a combat.
    Disengage {
        /// Combat to wind down.
        combat: CombatId,
    },
    /// Buy an item at spawn.
    BuyItem {
        /// Catalog name.
        item: String,
    },
}

impl PlayerCommand {
    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MoveTo { .. } => "move",
            Self::Follow { .. } => "follow",
            Self::StartRecall => "start recall",
            Self::StopRecall => "stop recall",
            Self::AttackLaneEntity => "attack",
            Self::StopAttacking => "stop attacking",
            Self::EngageCombat => "engage",
            Self::JoinCombat => "join combat",
            Self::Disengage { .. } => "disengage",
            Self::BuyItem { .. } => "buy item",
        }
    }
}

/// Kinds of command currently available to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// An enemy player is close enough to start a fight.
    Engage,
    /// An active combat is close enough to join.
    Join,
    /// An enemy lane entity is in attack range.
    Attack,
    /// The player has an attack target.
    StopAttacking,
    /// The player may move.
    Move,
    /// The player may start recalling.
    StartRecall,
    /// The player is recalling.
    StopRecall,
}

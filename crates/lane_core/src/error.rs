//! Error types for the lane battle simulation.
//!
//! Commands that fail a precondition are rejected with a [`SimError`] before
//! any state is touched, so a rejected command is always a no-op.

use thiserror::Error;

use crate::combat::CombatId;
use crate::entity::{EntityId, EntityState};
use crate::math::Fixed;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for all simulation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// No player with this roster id.
    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    /// The entity exists but is not a player.
    #[error("Entity {0} is not a player")]
    NotAPlayer(EntityId),

    /// No active combat with this id.
    #[error("Combat not found: {0}")]
    CombatNotFound(CombatId),

    /// The item is not in the catalog.
    #[error("Unknown item: {0}")]
    UnknownItem(String),

    /// The entity's lifecycle state does not allow the action.
    #[error("Entity {entity} cannot {action} while {state:?}")]
    InvalidState {
        /// Entity the action was issued to.
        entity: EntityId,
        /// Its state when the action was rejected.
        state: EntityState,
        /// Short name of the rejected action.
        action: &'static str,
    },

    /// Purchases require standing at the team spawn.
    #[error("Entity {0} is not at its spawn point")]
    NotAtSpawn(EntityId),

    /// The inventory has no free slot for the item.
    #[error("Inventory full: {held} items held, capacity {capacity}")]
    InventoryFull {
        /// Items currently held.
        held: usize,
        /// Maximum number of items.
        capacity: usize,
    },

    /// Not enough gold for the purchase.
    #[error("Insufficient gold: need {required}, have {available}")]
    InsufficientGold {
        /// Gold required after dependency discounts.
        required: Fixed,
        /// Gold available.
        available: Fixed,
    },

    /// A movement target outside the map.
    #[error("Target ({x}, {y}) is outside the map")]
    OutOfBounds {
        /// Requested horizontal coordinate.
        x: Fixed,
        /// Requested vertical coordinate.
        y: Fixed,
    },

    /// No enemy lane entity within attack range.
    #[error("No enemy lane entity in range of {0}")]
    NoTargetInRange(EntityId),

    /// No combat close enough to join.
    #[error("No combat in range of {0}")]
    NoCombatInRange(EntityId),

    /// Engaging requires both teams to be present near the location.
    #[error("No opposing entities present at the engagement location")]
    NoOpposingTeams,

    /// Disengage was already started for this combat.
    #[error("Combat {0} is already disengaging")]
    AlreadyDisengaging(CombatId),

    /// Stop-attack issued to a player with no attack target.
    #[error("Entity {0} is not attacking")]
    NotAttacking(EntityId),

    /// Invariant violation: an entity can belong to at most one combat.
    #[error("Entity {0} is already in combat")]
    AlreadyInCombat(EntityId),

    /// Configuration text could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),
}

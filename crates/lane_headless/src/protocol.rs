//! JSON-lines protocol for driving a match from another process.
//!
//! **Input (stdin):** one [`Request`] per line
//! **Output (stdout):** one [`Response`] per line
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"command","player":"A","action":"move_to","x":120,"y":0}
//! <- {"type":"ack","cmd":"command"}
//! -> {"cmd":"tick","count":50}
//! <- {"type":"state_hash","tick":50,"hash":1234}
//! -> {"cmd":"actions","player":"A"}
//! <- {"type":"actions","player":"A","actions":["move","start_recall"]}
//! -> {"cmd":"quit"}
//! <- {"type":"bye"}
//! ```

use lane_core::combat::CombatId;
use lane_core::commands::{ActionKind, PlayerCommand};
use lane_core::entity::{EntityId, EntityState, Team};
use lane_core::math::Vec2Fixed;
use serde::{Deserialize, Serialize};

// ============================================================================
// Input (controller -> runner)
// ============================================================================

/// Requests accepted by the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    /// Advance the simulation by `count` ticks (default 1).
    Tick {
        /// Number of steps.
        #[serde(default = "default_tick_count")]
        count: u32,
    },
    /// Report the full state without advancing.
    Query,
    /// Issue an order for a player.
    Command {
        /// Roster id ("A".."F").
        player: String,
        /// The order.
        #[serde(flatten)]
        action: Action,
    },
    /// List the orders a player may currently give.
    Actions {
        /// Roster id.
        player: String,
    },
    /// Report the state hash.
    Hash,
    /// Stop the session.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

/// A player order with integer map coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Walk to `(x, y)`.
    MoveTo {
        /// Horizontal coordinate.
        x: i32,
        /// Vertical coordinate.
        y: i32,
    },
    /// Walk after an entity.
    Follow {
        /// Entity id.
        target: EntityId,
    },
    /// Begin a recall.
    StartRecall,
    /// Cancel a recall.
    StopRecall,
    /// Attack the nearest enemy lane entity.
    Attack,
    /// Drop the attack target.
    StopAttacking,
    /// Start a combat.
    Engage,
    /// Join a nearby combat.
    Join,
    /// Start a combat's disengage countdown.
    Disengage {
        /// Combat number.
        combat: u32,
    },
    /// Buy an item at spawn.
    Buy {
        /// Catalog name.
        item: String,
    },
}

impl From<Action> for PlayerCommand {
    fn from(action: Action) -> Self {
        match action {
            Action::MoveTo { x, y } => Self::MoveTo {
                target: Vec2Fixed::from_ints(x, y),
            },
            Action::Follow { target } => Self::Follow { target },
            Action::StartRecall => Self::StartRecall,
            Action::StopRecall => Self::StopRecall,
            Action::Attack => Self::AttackLaneEntity,
            Action::StopAttacking => Self::StopAttacking,
            Action::Engage => Self::EngageCombat,
            Action::Join => Self::JoinCombat,
            Action::Disengage { combat } => Self::Disengage {
                combat: CombatId(combat),
            },
            Action::Buy { item } => Self::BuyItem { item },
        }
    }
}

impl Request {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Request name for acknowledgments.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::Command { .. } => "command",
            Self::Actions { .. } => "actions",
            Self::Hash => "hash",
            Self::Quit => "quit",
        }
    }
}

// ============================================================================
// Output (runner -> controller)
// ============================================================================

/// Responses written by the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept requests.
    Ready {
        /// Protocol version.
        version: String,
        /// Current tick.
        tick: u64,
    },
    /// A request was applied.
    Ack {
        /// Request name.
        cmd: String,
    },
    /// A request failed or could not be parsed.
    Error {
        /// What went wrong.
        message: String,
        /// Request name, if it parsed.
        cmd: Option<String>,
    },
    /// Full match view.
    State(MatchView),
    /// Orders currently available to a player.
    Actions {
        /// Roster id.
        player: String,
        /// Available order kinds.
        actions: Vec<ActionKind>,
    },
    /// State hash for determinism checks.
    StateHash {
        /// Current tick.
        tick: u64,
        /// Hash of the whole match.
        hash: u64,
    },
    /// Sent before the runner exits.
    Bye,
}

impl Response {
    /// Create a ready response.
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: "1.0".to_string(),
            tick,
        }
    }

    /// Create an acknowledgment.
    pub fn ack(cmd: &str) -> Self {
        Self::Ack { cmd: cmd.to_string() }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to a JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

// ============================================================================
// State views
// ============================================================================

/// Snapshot of a match for reporting. Coordinates are rounded for display;
/// the simulation itself never sees these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchView {
    /// Current tick.
    pub tick: u64,
    /// State hash.
    pub hash: u64,
    /// Wave spawns so far.
    pub waves_spawned: u64,
    /// Players in roster order.
    pub players: Vec<PlayerView>,
    /// Living waves per team.
    pub waves: TeamCounts,
    /// Standing turrets per team.
    pub turrets: TeamCounts,
    /// Active combats.
    pub combats: Vec<CombatView>,
}

/// One player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    /// Roster id.
    pub player: String,
    /// Entity id.
    pub entity: EntityId,
    /// Affiliation.
    pub team: Team,
    /// Lifecycle state.
    pub state: EntityState,
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
    /// Current health.
    pub health: f64,
    /// Maximum health.
    pub max_health: f64,
    /// Level.
    pub level: u32,
    /// Spendable gold.
    pub gold: f64,
    /// Held items.
    pub items: Vec<String>,
}

/// Per-team entity counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamCounts {
    /// Blue side.
    pub blue: usize,
    /// Red side.
    pub red: usize,
}

/// One active combat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatView {
    /// Combat number.
    pub id: u32,
    /// Blue members.
    pub blue: Vec<EntityId>,
    /// Red members.
    pub red: Vec<EntityId>,
    /// Disengage ticks left, if disengaging.
    pub disengage_remaining: Option<u32>,
}

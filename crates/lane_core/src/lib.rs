//! # Lane Core
//!
//! Deterministic simulation core for a two-team lane battle.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness (combat rolls go through a seeded, injectable source)
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Headless match runners
//! - Branching history by cloning the whole simulation
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`stats`] - Stat layers and damage mitigation
//! - [`entity`] - Entities, lifecycle states and the entity arena
//! - [`path`] - Point and polyline movement
//! - [`lane`] - Wave movement, merging and lane targeting
//! - [`combat`] - Group skirmish resolution
//! - [`map`] - World orchestration, queries and player commands
//! - [`simulation`] - Fixed-timestep clock and state hashing
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod commands;
pub mod config;
pub mod entity;
pub mod error;
pub mod items;
pub mod lane;
pub mod layout;
pub mod map;
pub mod math;
pub mod path;
pub mod rng;
pub mod simulation;
pub mod stats;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::combat::{Combat, CombatId};
    pub use crate::commands::{ActionKind, PlayerCommand};
    pub use crate::config::SimConfig;
    pub use crate::entity::{Entity, EntityId, EntityKind, EntityState, EntityStorage, Team};
    pub use crate::error::{Result, SimError};
    pub use crate::items::{Inventory, ItemDef};
    pub use crate::layout::LaneId;
    pub use crate::map::Map;
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::rng::{RandomSource, SeededRng};
    pub use crate::simulation::Simulator;
    pub use crate::stats::{AllStats, DamageStats, DynamicStats, HealthStats};
}

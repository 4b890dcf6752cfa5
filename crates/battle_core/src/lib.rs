//! # Battle Core
//!
//! Deterministic combat resolution core for hex-grid auto battles.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness
//! - No floating-point math (integers and fixed-point only)
//!
//! Equal inputs and equal seeds give bit-identical battles, which makes
//! replays, snapshots and desync hunting possible.
//!
//! ## Crate Structure
//!
//! - [`hex`] - Axial hex coordinates and directions
//! - [`grid_config`] - Board size, limits and team halves
//! - [`grid`] - Obstacle map, position search and path search
//! - [`intersection`] - Zone, triangle and beam intersection tests
//! - [`data`] - Authored ability and skill data
//! - [`components`] - Entities and their components
//! - [`world`] - The world and the traits the core reads through
//! - [`targeting`] - Receiver selection for skills
//! - [`abilities`] - Ability and skill state machine
//! - [`aura`] - Aura lifecycle
//! - [`battle`] - Tick driver, state hash and snapshots
//! - [`config`] - Battle config and scenarios

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod abilities;
pub mod aura;
pub mod battle;
pub mod components;
pub mod config;
pub mod data;
pub mod error;
pub mod grid;
pub mod grid_config;
pub mod hex;
pub mod intersection;
pub mod math;
pub mod targeting;
pub mod time;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::abilities::{
        AbilitiesComponent, AbilityRef, AbilitySelector, AbilityState, SelectionPolicy, SkillState,
        SkillStateType,
    };
    pub use crate::aura::AuraSystem;
    pub use crate::battle::Battle;
    pub use crate::components::*;
    pub use crate::config::{BattleConfig, EntityPlacement, PlacementIssue, Scenario};
    pub use crate::data::*;
    pub use crate::error::{BattleError, Result};
    pub use crate::grid::{
        do_hexagons_intersect, is_hexagon_position_taken, ObstacleBuildParams, PathSearchResult,
        PositionComparer, ReservationMode, SpatialGrid,
    };
    pub use crate::grid_config::{HexGridConfig, Team};
    pub use crate::hex::{HexGridCardinalDirection, HexGridPosition};
    pub use crate::math::Fixed;
    pub use crate::targeting::{SkillTargetFindResult, TargetingEngine};
    pub use crate::world::{BattleEvent, EventSink, RandomSource, SeededRandom, StatsSource, World};
}

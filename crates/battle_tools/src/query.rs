//! Queries against a scenario's board and a headless battle runner.

use std::fs;
use std::path::Path;

use battle_core::battle::Battle;
use battle_core::components::EntityId;
use battle_core::config::Scenario;
use battle_core::error::BattleError;
use battle_core::grid::{ObstacleBuildParams, PathSearchResult};
use battle_core::grid_config::Team;
use battle_core::hex::HexGridPosition;
use battle_core::world::{BattleEvent, World};
use serde::Serialize;

use crate::error::{Result, ToolError};

/// Read and parse a scenario file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let text = fs::read_to_string(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Scenario::from_ron_str(&text)?)
}

/// Where to look for a free footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenPositionQuery {
    /// Center of the search.
    pub target: HexGridPosition,
    /// Radius of the footprint to place.
    pub radius: i32,
    /// Prefer the side of `target` away from this position.
    pub behind_from: Option<HexGridPosition>,
    /// Unit that never blocks the search, usually the one being moved.
    pub ignore: Option<EntityId>,
}

/// Every collidable unit stays clear of `radius` footprints, except `ignore`.
fn obstacle_params(radius: i32, ignore: Option<EntityId>) -> ObstacleBuildParams {
    ObstacleBuildParams {
        source: ignore,
        radius_needed: Some(radius),
        ..ObstacleBuildParams::default()
    }
}

fn check_in_bounds(world: &World, position: HexGridPosition) -> Result<()> {
    if world.grid_config().contains(position) {
        Ok(())
    } else {
        Err(BattleError::PositionOutOfBounds {
            q: position.q,
            r: position.r,
        }
        .into())
    }
}

/// Closest free position to the query target, `None` when the board is full.
///
/// # Errors
///
/// Returns an error if the scenario config is invalid or the target lies
/// off the board.
pub fn open_position(scenario: &Scenario, query: &OpenPositionQuery) -> Result<Option<HexGridPosition>> {
    let mut world = scenario.build_world()?;
    check_in_bounds(&world, query.target)?;
    world.rebuild_obstacles(&obstacle_params(query.radius, query.ignore));

    let grid = world.grid();
    let found = match query.behind_from {
        Some(source) => grid.open_position_behind(source, query.target, query.radius, 0),
        None => grid.open_position_nearby(query.target, query.radius, 0),
    };
    tracing::debug!(target = %query.target, found = %found, "Open position query");
    Ok(found.is_valid().then_some(found))
}

/// Endpoints of a path query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathQuery {
    /// Start cell.
    pub from: HexGridPosition,
    /// Destination cell.
    pub to: HexGridPosition,
    /// Radius of the moving footprint.
    pub radius: i32,
    /// Stop once within this distance of the destination.
    pub reach: i32,
    /// Unit that never blocks the search, usually the one moving.
    pub ignore: Option<EntityId>,
}

/// Path search on the scenario's board with its iteration cap.
///
/// # Errors
///
/// Returns an error if the scenario config is invalid or an endpoint lies
/// off the board.
pub fn find_path(scenario: &Scenario, query: &PathQuery) -> Result<PathSearchResult> {
    let mut world = scenario.build_world()?;
    check_in_bounds(&world, query.from)?;
    check_in_bounds(&world, query.to)?;
    world.rebuild_obstacles(&obstacle_params(query.radius, query.ignore));

    let result = world.grid().find_path_on_grid(
        query.from,
        query.radius,
        query.to,
        query.reach,
        scenario.config.max_path_iterations,
    );
    tracing::debug!(
        from = %query.from,
        to = %query.to,
        reached = result.reached,
        iterations = result.iterations,
        "Path query"
    );
    Ok(result)
}

/// Outcome of a headless battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    /// Ticks simulated.
    pub ticks: u32,
    /// State hash after the last tick.
    pub state_hash: u64,
    /// Active Blue units at the end.
    pub blue_active: usize,
    /// Active Red units at the end.
    pub red_active: usize,
    /// Every event, in order.
    pub events: Vec<BattleEvent>,
}

/// Run a scenario for `ticks` ticks, or until one team has no active units.
///
/// # Errors
///
/// Returns an error if the scenario config is invalid.
pub fn simulate(scenario: &Scenario, ticks: u32) -> Result<SimulationReport> {
    let mut battle = Battle::from_scenario(scenario)?;
    let active = |battle: &Battle, team: Team| {
        battle
            .world()
            .entities()
            .iter_sorted()
            .filter(|e| e.team == team && e.active && e.is_combat_unit())
            .count()
    };

    let mut ran = 0;
    while ran < ticks {
        battle.tick();
        ran += 1;
        if active(&battle, Team::Blue) == 0 || active(&battle, Team::Red) == 0 {
            tracing::info!(tick = ran, "One team has no units left");
            break;
        }
    }

    Ok(SimulationReport {
        ticks: ran,
        state_hash: battle.state_hash(),
        blue_active: active(&battle, Team::Blue),
        red_active: active(&battle, Team::Red),
        events: battle.events().to_vec(),
    })
}

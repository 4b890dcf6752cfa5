//! Battle configuration and scenarios.
//!
//! Both are authored in RON. The core only parses strings; reading files
//! is left to the tools crate.
//!
//! # Example RON
//!
//! ```ron
//! Scenario(
//!     config: (grid_width: 21, grid_height: 21, random_seed: 7),
//!     entities: [
//!         (team: Blue, q: 0, r: 5),
//!         (team: Red, q: 0, r: -5, radius: 2, focus: Some(1)),
//!     ],
//! )
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::abilities::AbilitiesComponent;
use crate::components::{CombatUnit, Entity, EntityId, EntityKind, Position, INVALID_ENTITY_ID};
use crate::data::{AbilitiesData, CombatSynergy, StatType};
use crate::error::{BattleError, Result};
use crate::grid::{do_hexagons_intersect, DEFAULT_MAX_PATH_ITERATIONS};
use crate::grid_config::{HexGridConfig, Team};
use crate::hex::HexGridPosition;
use crate::math::{fixed_map_serde, Fixed};
use crate::world::World;

/// Board and simulation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Board columns, odd.
    pub grid_width: i32,
    /// Board rows, odd.
    pub grid_height: i32,
    /// World units per hex.
    pub grid_scale: i32,
    /// Iteration cap of path searches.
    pub max_path_iterations: u32,
    /// Half height of the no-deploy band across the board center.
    pub middle_line_width: i32,
    /// Seed of the battle's random stream.
    pub random_seed: u64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            grid_width: 51,
            grid_height: 51,
            grid_scale: 10,
            max_path_iterations: DEFAULT_MAX_PATH_ITERATIONS,
            middle_line_width: 0,
            random_seed: 0,
        }
    }
}

impl BattleConfig {
    /// Parse and validate a config.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::DataParseError`] for malformed RON and
    /// [`BattleError::InvalidGridConfig`] for unusable values.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| BattleError::DataParseError {
            path: "battle config".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::InvalidGridConfig`] naming the first bad value.
    pub fn validate(&self) -> Result<()> {
        self.grid_config()?;
        if self.grid_scale < 1 {
            return Err(BattleError::InvalidGridConfig(format!(
                "grid scale must be positive, got {}",
                self.grid_scale
            )));
        }
        if self.max_path_iterations == 0 {
            return Err(BattleError::InvalidGridConfig(
                "max path iterations must be positive".to_string(),
            ));
        }
        if self.middle_line_width < 0 {
            return Err(BattleError::InvalidGridConfig(format!(
                "middle line width must not be negative, got {}",
                self.middle_line_width
            )));
        }
        Ok(())
    }

    /// Board built from the configured size.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::InvalidGridConfig`] for even or non-positive sizes.
    pub fn grid_config(&self) -> Result<HexGridConfig> {
        HexGridConfig::new(self.grid_width, self.grid_height)
    }

    /// Empty world for this config.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::InvalidGridConfig`] when the config is invalid.
    pub fn build_world(&self) -> Result<World> {
        self.validate()?;
        World::new(self.grid_config()?, self.grid_scale, self.middle_line_width)
    }
}

const fn default_radius() -> i32 {
    1
}

const fn default_true() -> bool {
    true
}

/// One combat unit of a scenario.
///
/// Units get ids in placement order starting at 1; `parent` and `focus`
/// refer to those ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPlacement {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Team.
    pub team: Team,
    /// Axial q.
    pub q: i32,
    /// Axial r.
    pub r: i32,
    /// Footprint radius.
    #[serde(default = "default_radius")]
    pub radius: i32,
    /// Blocks other units.
    #[serde(default = "default_true")]
    pub taking_space: bool,
    /// Others may stand on it.
    #[serde(default)]
    pub overlapable: bool,
    /// Enemies cannot pick it.
    #[serde(default)]
    pub untargetable: bool,
    /// Spawned by another unit.
    #[serde(default)]
    pub is_pet: bool,
    /// Excluded from tier targeting.
    #[serde(default)]
    pub is_ranger: bool,
    /// Tier.
    #[serde(default)]
    pub tier: i32,
    /// Owner id.
    #[serde(default)]
    pub parent: Option<EntityId>,
    /// Focus id.
    #[serde(default)]
    pub focus: Option<EntityId>,
    /// Base stats, fixed-point raw bits.
    #[serde(with = "fixed_map_serde", default)]
    pub stats: BTreeMap<StatType, Fixed>,
    /// Combat synergy names.
    #[serde(default)]
    pub synergies: Vec<String>,
    /// Attack abilities.
    #[serde(default)]
    pub attack: AbilitiesData,
    /// Omega abilities.
    #[serde(default)]
    pub omega: AbilitiesData,
    /// Innate abilities.
    #[serde(default)]
    pub innate: AbilitiesData,
}

impl EntityPlacement {
    /// Minimal placement of a radius 1 unit.
    #[must_use]
    pub fn new(team: Team, q: i32, r: i32) -> Self {
        Self {
            name: String::new(),
            team,
            q,
            r,
            radius: default_radius(),
            taking_space: true,
            overlapable: false,
            untargetable: false,
            is_pet: false,
            is_ranger: false,
            tier: 0,
            parent: None,
            focus: None,
            stats: BTreeMap::new(),
            synergies: Vec::new(),
            attack: AbilitiesData::default(),
            omega: AbilitiesData::default(),
            innate: AbilitiesData::default(),
        }
    }

    /// Center of the footprint.
    #[must_use]
    pub const fn position(&self) -> HexGridPosition {
        HexGridPosition::new(self.q, self.r)
    }

    /// The entity this placement spawns.
    #[must_use]
    pub fn to_entity(&self) -> Entity {
        let mut entity = Entity::new(INVALID_ENTITY_ID);
        entity.team = self.team;
        entity.position = Some(Position {
            taking_space: self.taking_space,
            overlapable: self.overlapable,
            ..Position::new(self.position(), self.radius)
        });
        entity.kind = EntityKind::CombatUnit(CombatUnit {
            is_pet: self.is_pet,
            is_ranger: self.is_ranger,
            tier: self.tier,
        });
        entity.parent = self.parent;
        entity.focus = self.focus;
        entity.untargetable = self.untargetable;
        for (&stat, &value) in &self.stats {
            entity.stats.set(stat, value);
        }
        entity.synergies = self.synergies.iter().map(CombatSynergy::new).collect();

        let has_abilities = [&self.attack, &self.omega, &self.innate]
            .iter()
            .any(|group| !group.abilities.is_empty());
        if has_abilities {
            entity.abilities = Some(AbilitiesComponent::from_data(
                self.attack.clone(),
                self.omega.clone(),
                self.innate.clone(),
            ));
        }
        entity
    }
}

/// A problem found while checking a scenario's placements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementIssue {
    /// The footprint does not fit on the board.
    OutOfBounds {
        /// Id the unit would get.
        id: EntityId,
        /// Center.
        position: HexGridPosition,
        /// Radius.
        radius: i32,
    },
    /// Two space-taking footprints overlap.
    Overlap {
        /// Lower id.
        first: EntityId,
        /// Higher id.
        second: EntityId,
    },
    /// A parent or focus refers to no placement.
    UnknownReference {
        /// Id of the referring unit.
        id: EntityId,
        /// Missing id.
        target: EntityId,
    },
}

impl fmt::Display for PlacementIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds { id, position, radius } => write!(
                f,
                "unit {id} at ({}, {}) with radius {radius} does not fit on the board",
                position.q, position.r
            ),
            Self::Overlap { first, second } => write!(f, "units {first} and {second} overlap"),
            Self::UnknownReference { id, target } => write!(f, "unit {id} refers to missing unit {target}"),
        }
    }
}

/// A config plus the units to place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Board and simulation settings.
    #[serde(default)]
    pub config: BattleConfig,
    /// Units, in id order.
    #[serde(default)]
    pub entities: Vec<EntityPlacement>,
}

impl Scenario {
    /// Parse a scenario and validate its config.
    ///
    /// Placements are not checked here; see [`Scenario::placement_issues`].
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::DataParseError`] for malformed RON and
    /// [`BattleError::InvalidGridConfig`] for an unusable config.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let scenario: Self = ron::from_str(text).map_err(|e| BattleError::DataParseError {
            path: "scenario".to_string(),
            message: e.to_string(),
        })?;
        scenario.config.validate()?;
        Ok(scenario)
    }

    /// Every placement problem, in id order.
    #[must_use]
    pub fn placement_issues(&self) -> Vec<PlacementIssue> {
        let Ok(grid) = self.config.grid_config() else {
            return Vec::new();
        };
        let ids: BTreeSet<EntityId> = (1..=self.entities.len() as EntityId).collect();
        let mut issues = Vec::new();

        for (id, placement) in (1..).zip(&self.entities) {
            if !grid.is_hexagon_in_grid_limits(placement.position(), placement.radius, 0, 0) {
                issues.push(PlacementIssue::OutOfBounds {
                    id,
                    position: placement.position(),
                    radius: placement.radius,
                });
            }
            for target in [placement.parent, placement.focus].into_iter().flatten() {
                if !ids.contains(&target) {
                    issues.push(PlacementIssue::UnknownReference { id, target });
                }
            }
        }

        let placed: Vec<(EntityId, &EntityPlacement)> = (1..).zip(&self.entities).collect();
        for (index, &(first, a)) in placed.iter().enumerate() {
            for &(second, b) in &placed[index + 1..] {
                if a.taking_space
                    && b.taking_space
                    && do_hexagons_intersect(a.position(), a.radius, b.position(), b.radius)
                {
                    issues.push(PlacementIssue::Overlap { first, second });
                }
            }
        }
        issues
    }

    /// World with every placement spawned.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::InvalidGridConfig`] when the config is invalid.
    pub fn build_world(&self) -> Result<World> {
        let mut world = self.config.build_world()?;
        for placement in &self.entities {
            world.spawn(placement.to_entity());
        }
        tracing::debug!(entities = self.entities.len(), "Scenario world built");
        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BattleConfig::default();
        assert_eq!(config.grid_width, 51);
        assert_eq!(config.grid_height, 51);
        assert_eq!(config.grid_scale, 10);
        assert_eq!(config.max_path_iterations, 2048);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_ron_str() {
        let config = BattleConfig::from_ron_str("(grid_width: 21, random_seed: 9)").unwrap();
        assert_eq!(config.grid_width, 21);
        assert_eq!(config.grid_height, 51);
        assert_eq!(config.random_seed, 9);
    }

    #[test]
    fn test_rejects_even_size_and_bad_text() {
        assert!(matches!(
            BattleConfig::from_ron_str("(grid_width: 20)"),
            Err(BattleError::InvalidGridConfig(_))
        ));
        assert!(matches!(
            BattleConfig::from_ron_str("(grid_width: "),
            Err(BattleError::DataParseError { .. })
        ));
        assert!(BattleConfig::from_ron_str("(grid_scale: 0)").is_err());
    }

    #[test]
    fn test_scenario_builds_world() {
        let text = r#"
            Scenario(
                config: (grid_width: 21, grid_height: 21),
                entities: [
                    (team: Blue, q: 0, r: 5, stats: { MaxHealth: 429496729600 }),
                    (team: Red, q: 0, r: -5, radius: 2, focus: Some(1), synergies: ["Fire"]),
                ],
            )
        "#;
        let scenario = Scenario::from_ron_str(text).unwrap();
        assert!(scenario.placement_issues().is_empty());

        let world = scenario.build_world().unwrap();
        assert_eq!(world.entities().len(), 2);
        let red = world.get(2).unwrap();
        assert_eq!(red.focus, Some(1));
        assert_eq!(red.radius(), 2);
        assert!(red.synergies.contains(&CombatSynergy::new("Fire")));
        assert_eq!(world.get(1).unwrap().stats.get(StatType::MaxHealth), Fixed::from_num(100));
    }

    #[test]
    fn test_placement_issues() {
        let scenario = Scenario {
            config: BattleConfig {
                grid_width: 11,
                grid_height: 11,
                ..BattleConfig::default()
            },
            entities: vec![
                EntityPlacement::new(Team::Blue, 0, 0),
                EntityPlacement::new(Team::Red, 1, 0),
                EntityPlacement {
                    focus: Some(7),
                    ..EntityPlacement::new(Team::Red, 5, 0)
                },
            ],
        };
        let issues = scenario.placement_issues();
        assert!(issues.contains(&PlacementIssue::Overlap { first: 1, second: 2 }));
        assert!(issues.contains(&PlacementIssue::UnknownReference { id: 3, target: 7 }));
        assert!(issues
            .iter()
            .any(|issue| matches!(issue, PlacementIssue::OutOfBounds { id: 3, .. })));
    }
}

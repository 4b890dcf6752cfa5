//! Density targeting: rank candidates by how many group members the skill's
//! deployment would hit if aimed at them.

use std::collections::BTreeSet;

use super::{sort_entities_by, TargetingEngine};
use crate::components::{Entity, EntityId};
use crate::data::{SkillData, SkillDeploymentType, ZoneShape};
use crate::grid::{ObstacleBuildParams, SpatialGrid};
use crate::hex::{HexGridPosition, SUB_UNITS_PER_UNIT};
use crate::intersection::{does_hex_zone_intersect, does_rectangle_zone_intersect, BeamZone, TriangleZone};
use crate::math::angle_limit_to_360;

/// Footprint of a deployment aimed at one candidate.
#[derive(Debug, Clone, Copy)]
enum DensityShape {
    Hexagon { center: HexGridPosition, radius: i32 },
    Rectangle { center_sub_units: HexGridPosition, width_sub_units: i32, height_sub_units: i32 },
    Triangle(TriangleZone),
    Beam(BeamZone),
    /// Aimed somewhere unreachable; hits nothing but the candidate.
    Empty,
}

impl DensityShape {
    fn intersects(&self, position: HexGridPosition, radius: i32) -> bool {
        match *self {
            Self::Hexagon { center, radius: zone_radius } => does_hex_zone_intersect(zone_radius, center, position),
            Self::Rectangle {
                center_sub_units,
                width_sub_units,
                height_sub_units,
            } => does_rectangle_zone_intersect(center_sub_units, position.to_sub_units(), width_sub_units, height_sub_units),
            Self::Triangle(zone) => zone.contains(position),
            Self::Beam(beam) => beam.intersects(position, radius),
            Self::Empty => false,
        }
    }
}

/// Builds the [`DensityShape`] for each candidate of one skill.
struct ShapeBuilder<'a> {
    engine: &'a TargetingEngine<'a>,
    skill: &'a SkillData,
    sender_position: HexGridPosition,
    sender_radius: i32,
    dash_grid: Option<SpatialGrid>,
}

impl<'a> ShapeBuilder<'a> {
    fn new(engine: &'a TargetingEngine<'a>, sender: Option<&Entity>, skill: &'a SkillData) -> Self {
        let sender_position = sender.and_then(Entity::hex_position).unwrap_or(HexGridPosition::ZERO);
        let sender_radius = sender.and_then(|e| e.position).map_or(1, |p| p.radius);

        let dash_grid = (skill.deployment.deployment_type == SkillDeploymentType::Dash).then(|| {
            let world = engine.world();
            let mut grid = world.grid().clone();
            grid.rebuild_obstacles(world.entities(), &ObstacleBuildParams::for_radius(sender_radius));
            grid
        });

        Self {
            engine,
            skill,
            sender_position,
            sender_radius,
            dash_grid,
        }
    }

    fn beam_towards(&self, target: HexGridPosition, width_units: i32) -> DensityShape {
        let world = self.engine.world();
        let direction = world
            .to_world_position(self.sender_position)
            .angle_to(world.to_world_position(target));
        let length = world
            .to_world_position(self.sender_position - target)
            .to_sub_units()
            .length();
        DensityShape::Beam(BeamZone::new(
            self.sender_position,
            direction,
            width_units * SUB_UNITS_PER_UNIT,
            length,
            world.grid_scale(),
        ))
    }

    fn shape_at(&self, target: HexGridPosition) -> Option<DensityShape> {
        let world = self.engine.world();
        let shape = match self.skill.deployment.deployment_type {
            SkillDeploymentType::Zone => {
                let zone = &self.skill.zone;
                match zone.shape {
                    ZoneShape::Hexagon => DensityShape::Hexagon {
                        center: target,
                        radius: zone.radius_units,
                    },
                    ZoneShape::Rectangle => DensityShape::Rectangle {
                        center_sub_units: target.to_sub_units(),
                        width_sub_units: zone.width_units * SUB_UNITS_PER_UNIT,
                        height_sub_units: zone.height_units * SUB_UNITS_PER_UNIT,
                    },
                    ZoneShape::Triangle => {
                        let spawn_angle = world
                            .to_world_position(self.sender_position)
                            .angle_to(world.to_world_position(target));
                        let direction = angle_limit_to_360(spawn_angle + zone.direction_degrees);
                        DensityShape::Triangle(TriangleZone::new(target, direction, zone.radius_units, world.grid_scale()))
                    }
                }
            }
            SkillDeploymentType::Beam => self.beam_towards(target, self.skill.beam.width_units),
            SkillDeploymentType::Projectile => self.beam_towards(target, 1 + 2 * self.skill.projectile.size_units),
            SkillDeploymentType::Dash => {
                let grid = self.dash_grid.as_ref()?;
                let landing = if self.skill.dash.land_behind {
                    grid.open_position_behind(self.sender_position, target, self.sender_radius, 0)
                } else {
                    grid.open_position_nearby(target, self.sender_radius, 0)
                };
                if landing.is_valid() {
                    self.beam_towards(landing, 1 + 2 * self.sender_radius)
                } else {
                    DensityShape::Empty
                }
            }
            SkillDeploymentType::Direct | SkillDeploymentType::SpawnedCombatUnit => return None,
        };
        Some(shape)
    }
}

impl TargetingEngine<'_> {
    /// Group members ranked by how many other group members the deployment
    /// would hit when aimed at them (the candidate itself counts as one).
    pub(super) fn density_targets(
        &self,
        sender: EntityId,
        skill: &SkillData,
        ignored: &BTreeSet<EntityId>,
    ) -> Vec<EntityId> {
        let targeting = &skill.targeting;
        let deployment_type = skill.deployment.deployment_type;
        if matches!(
            deployment_type,
            SkillDeploymentType::Direct | SkillDeploymentType::SpawnedCombatUnit
        ) {
            tracing::error!(sender, skill = %skill.name, deployment = ?deployment_type, "Density targeting does not support this deployment");
            return Vec::new();
        }

        let mut found = self.group_members(sender, targeting.group, targeting.include_self, |_| false);
        let footprints: Vec<(EntityId, HexGridPosition, i32)> = found
            .iter()
            .filter_map(|&id| self.world().get(id))
            .filter_map(|e| e.position.map(|p| (e.id, p.position, p.radius)))
            .collect();

        let builder = ShapeBuilder::new(self, self.world().get(sender), skill);
        let density_of = |candidate: EntityId| -> usize {
            let Some(&(_, target, _)) = footprints.iter().find(|(id, _, _)| *id == candidate) else {
                return 0;
            };
            let Some(shape) = builder.shape_at(target) else {
                return 0;
            };
            let hits = footprints
                .iter()
                .filter(|(id, _, _)| *id != candidate)
                .filter(|(id, _, _)| self.world().entities().get_active(*id).is_some())
                .filter(|(_, position, radius)| shape.intersects(*position, *radius))
                .count();
            1 + hits
        };

        sort_entities_by(&mut found, targeting.lowest, density_of);
        self.filter_receivers(sender, &found, targeting.num, ignored)
    }
}

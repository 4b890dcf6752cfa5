//! Geometry tests between skill shapes and entity positions.
//!
//! Hexagon zones are tested in hex distance. Rectangles are tested in
//! axial sub units. Triangles and beams are tested in world sub units,
//! which depend on the board's grid scale.

use serde::{Deserialize, Serialize};

use crate::hex::{HexGridPosition, SUB_UNITS_PER_UNIT};
use crate::math::{IVec2, PRECISION_FACTOR, SQRT3_SCALED};

/// Board position in world units.
#[must_use]
pub const fn to_world_position(position: HexGridPosition, grid_scale: i32) -> IVec2 {
    let scaled = position.to_scaled_2d();
    IVec2::new(
        scaled.x * grid_scale / PRECISION_FACTOR,
        scaled.y * grid_scale / PRECISION_FACTOR,
    )
}

/// Hex count converted to world units.
#[must_use]
pub const fn to_world_scalar(value: i32, grid_scale: i32) -> i32 {
    grid_scale * SQRT3_SCALED * value / PRECISION_FACTOR
}

/// Whether `other` is inside a hexagon zone of `zone_radius` around `zone`.
#[must_use]
pub const fn does_hex_zone_intersect(zone_radius: i32, zone: HexGridPosition, other: HexGridPosition) -> bool {
    zone.distance(other) <= zone_radius
}

/// Whether `other` is inside a rectangle centered on `zone`, all in sub units.
#[must_use]
pub const fn does_rectangle_zone_intersect(
    zone_sub_units: HexGridPosition,
    other_sub_units: HexGridPosition,
    width_sub_units: i32,
    height_sub_units: i32,
) -> bool {
    (other_sub_units.q - zone_sub_units.q).abs() <= width_sub_units / 2
        && (other_sub_units.r - zone_sub_units.r).abs() <= height_sub_units / 2
}

/// Equilateral triangle zone with its apex on the zone position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriangleZone {
    vertices: [IVec2; 3],
    area_doubled: i64,
    grid_scale: i32,
}

impl TriangleZone {
    /// Triangle whose median is `radius_units` hexes long and points
    /// towards `direction_degrees`.
    #[must_use]
    pub const fn new(zone: HexGridPosition, direction_degrees: i32, radius_units: i32, grid_scale: i32) -> Self {
        let apex = to_world_position(zone, grid_scale).to_sub_units();
        let median = to_world_scalar(radius_units * SUB_UNITS_PER_UNIT, grid_scale);
        let vertices = apex.triangle_vertices(direction_degrees, median);
        Self {
            vertices,
            area_doubled: IVec2::triangle_area_doubled(vertices[0], vertices[1], vertices[2]),
            grid_scale,
        }
    }

    /// Whether the center of `other` lies inside the triangle or on its edges.
    #[must_use]
    pub const fn contains(&self, other: HexGridPosition) -> bool {
        let p = to_world_position(other, self.grid_scale).to_sub_units();
        let [a, b, c] = self.vertices;
        let sum = IVec2::triangle_area_doubled(p, b, c)
            + IVec2::triangle_area_doubled(a, p, c)
            + IVec2::triangle_area_doubled(a, b, p);
        sum == self.area_doubled
    }
}

/// Whether `other` is inside a triangle zone.
#[must_use]
pub const fn does_triangle_zone_intersect(
    zone: HexGridPosition,
    direction_degrees: i32,
    radius_units: i32,
    other: HexGridPosition,
    grid_scale: i32,
) -> bool {
    TriangleZone::new(zone, direction_degrees, radius_units, grid_scale).contains(other)
}

/// A beam starting at a position and extending along a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeamZone {
    direction_degrees: i32,
    center_rotated_sub_units: IVec2,
    length_half: i32,
    width_half: i32,
    grid_scale: i32,
}

impl BeamZone {
    /// Beam of `width_sub_units` (axial sub units) and `world_length_sub_units`.
    #[must_use]
    pub const fn new(
        origin: HexGridPosition,
        direction_degrees: i32,
        width_sub_units: i32,
        world_length_sub_units: i32,
        grid_scale: i32,
    ) -> Self {
        let length_half = world_length_sub_units / 2;
        let rotated = to_world_position(origin, grid_scale)
            .rotate(-direction_degrees)
            .to_sub_units();
        Self {
            direction_degrees,
            center_rotated_sub_units: IVec2::new(rotated.x + length_half, rotated.y),
            length_half,
            width_half: to_world_scalar(width_sub_units, grid_scale) / 2,
            grid_scale,
        }
    }

    /// Whether a footprint of `other_radius` at `other` touches the beam.
    #[must_use]
    pub const fn intersects(&self, other: HexGridPosition, other_radius: i32) -> bool {
        let rotated = to_world_position(other, self.grid_scale)
            .rotate(-self.direction_degrees)
            .to_sub_units();
        let margin = to_world_scalar(other_radius * SUB_UNITS_PER_UNIT, self.grid_scale);
        let dx = (rotated.x - self.center_rotated_sub_units.x).abs() - margin;
        let dy = (rotated.y - self.center_rotated_sub_units.y).abs() - margin;
        dx <= self.length_half && dy <= self.width_half
    }
}

/// Whether a footprint touches a beam.
#[must_use]
pub const fn does_beam_intersect(
    origin: HexGridPosition,
    direction_degrees: i32,
    width_sub_units: i32,
    world_length_sub_units: i32,
    other: HexGridPosition,
    other_radius: i32,
    grid_scale: i32,
) -> bool {
    BeamZone::new(origin, direction_degrees, width_sub_units, world_length_sub_units, grid_scale)
        .intersects(other, other_radius)
}

//! Obstacle map and spatial queries over the hex board.
//!
//! The obstacle map is a dense array with one [`ObstacleKind`] per grid
//! index. It is rebuilt from entity positions by
//! [`SpatialGrid::rebuild_obstacles`] and never patched incrementally: every
//! query reads the map as it was last built, so callers rebuild before a
//! batch of queries that depends on current occupancy.
//!
//! All searches are bounded by the board size or an explicit iteration cap
//! and report failure through [`HexGridPosition::INVALID`] or an unreached
//! [`PathSearchResult`], never through an error.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use crate::components::{Entity, EntityId, EntityStorage};
use crate::grid_config::{HexGridConfig, Team};
use crate::hex::{HexGridCardinalDirection, HexGridPosition, NEIGHBOUR_OFFSETS};

/// Iteration cap used when a caller does not pick one.
pub const DEFAULT_MAX_PATH_ITERATIONS: u32 = 2048;

/// What occupies a cell of the obstacle map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObstacleKind {
    /// Free cell.
    #[default]
    None,
    /// Covered by an entity footprint or a reserved position.
    Entity,
    /// Inside the border band.
    Border,
    /// On the half of the board owned by the other team.
    EnemySide,
}

impl ObstacleKind {
    /// Whether the cell is blocked.
    #[must_use]
    pub const fn is_obstacle(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Parameters of [`SpatialGrid::rebuild_obstacles`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObstacleBuildParams {
    /// Entity the map is built for. It never blocks itself and lends its
    /// radius when `radius_needed` is unset.
    pub source: Option<EntityId>,
    /// Radius of the footprint that will be placed.
    pub radius_needed: Option<i32>,
    /// Block a band along the board edges.
    pub mark_borders: bool,
    /// Block the half of the board that does not belong to this team.
    pub mark_team_side: Team,
    /// Extra border band width along q.
    pub q_margin: i32,
    /// Extra border band width along r.
    pub r_margin: i32,
}

impl ObstacleBuildParams {
    /// Map built for `source`, using its radius.
    #[must_use]
    pub fn for_source(source: EntityId) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    /// Map built for a footprint of `radius` with no source entity.
    #[must_use]
    pub fn for_radius(radius: i32) -> Self {
        Self {
            radius_needed: Some(radius),
            ..Self::default()
        }
    }
}

/// Where [`SpatialGrid::try_to_reserve_position`] looks for a free spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationMode {
    /// Next to the first receiver.
    NearReceiver,
    /// On the far side of the first receiver.
    BehindReceiver,
    /// At the opposite border of the board.
    Across,
}

/// Ordering used to pick the best candidate of a position search.
///
/// The built-in orderings break ties on the lower grid index, so the best
/// candidate is always the unique minimum.
#[derive(Clone, Copy)]
pub enum PositionComparer<'a> {
    /// Hex distance to the given position.
    HexDistance(HexGridPosition),
    /// Squared distance in scaled 2D space to the given position.
    Scaled2D(HexGridPosition),
    /// Caller supplied ordering.
    Custom(&'a dyn Fn(HexGridPosition, HexGridPosition) -> Ordering),
}

impl std::fmt::Debug for PositionComparer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HexDistance(p) => f.debug_tuple("HexDistance").field(p).finish(),
            Self::Scaled2D(p) => f.debug_tuple("Scaled2D").field(p).finish(),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl PositionComparer<'_> {
    /// Compare two on-board positions.
    #[must_use]
    pub fn compare(&self, config: &HexGridConfig, a: HexGridPosition, b: HexGridPosition) -> Ordering {
        let by_index = || config.grid_index(a).cmp(&config.grid_index(b));
        match self {
            Self::HexDistance(preferred) => a
                .distance(*preferred)
                .cmp(&b.distance(*preferred))
                .then_with(by_index),
            Self::Scaled2D(preferred) => {
                let target = preferred.to_scaled_2d();
                (a.to_scaled_2d() - target)
                    .square_length()
                    .cmp(&(b.to_scaled_2d() - target).square_length())
                    .then_with(by_index)
            }
            Self::Custom(compare) => compare(a, b),
        }
    }
}

/// Outcome of [`SpatialGrid::find_path_on_grid`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSearchResult {
    /// Cells from the source to the settled node, empty when not reached.
    pub path: Vec<HexGridPosition>,
    /// Whether a node within reach of the destination was settled.
    pub reached: bool,
    /// Nodes expanded.
    pub iterations: u32,
}

/// Whether two hexagonal footprints overlap.
///
/// Footprints whose centers are exactly `radius_a + radius_b` apart touch
/// without overlapping.
#[must_use]
pub const fn do_hexagons_intersect(
    center_a: HexGridPosition,
    radius_a: i32,
    center_b: HexGridPosition,
    radius_b: i32,
) -> bool {
    center_a.distance(center_b) < radius_a + radius_b
}

/// Cells within `radius_a` of `center_a` and within `radius_b` of `center_b`.
#[must_use]
pub fn hexagons_intersection_positions(
    center_a: HexGridPosition,
    radius_a: i32,
    center_b: HexGridPosition,
    radius_b: i32,
) -> Vec<HexGridPosition> {
    let q_min = (center_a.q - radius_a).max(center_b.q - radius_b);
    let r_min = (center_a.r - radius_a).max(center_b.r - radius_b);
    let s_min = (center_a.s() - radius_a).max(center_b.s() - radius_b);
    let q_max = (center_a.q + radius_a).min(center_b.q + radius_b);
    let r_max = (center_a.r + radius_a).min(center_b.r + radius_b);
    let s_max = (center_a.s() + radius_a).min(center_b.s() + radius_b);

    let mut results = Vec::new();
    for q in q_min..=q_max {
        let r_low = r_min.max(-q - s_max);
        let r_high = r_max.min(-q - s_min);
        for r in r_low..=r_high {
            results.push(HexGridPosition::new(q, r));
        }
    }
    results
}

/// Every cell of a hexagon of `radius` around `center`, on the board or not.
#[must_use]
pub fn hexagon_positions(center: HexGridPosition, radius: i32) -> Vec<HexGridPosition> {
    let mut results = Vec::new();
    let (q_min, q_max) = HexGridPosition::hexagon_q_limits(radius);
    for q in q_min..=q_max {
        let (r_min, r_max) = HexGridPosition::hexagon_r_limits(radius, q);
        for r in r_min..=r_max {
            results.push(center + HexGridPosition::new(q, r));
        }
    }
    results
}

/// Whether a footprint crosses the band between the two team halves.
#[must_use]
pub const fn does_hexagon_overlap_middle_line(
    center: HexGridPosition,
    radius: i32,
    middle_line_width: i32,
) -> bool {
    center.r.abs() - radius <= middle_line_width
}

/// Whether `position` lies on Blue's half of the board.
#[must_use]
pub const fn is_in_blue_space(position: HexGridPosition) -> bool {
    position.r > 0
}

/// Whether a collidable entity other than the ignored ones overlaps the footprint.
#[must_use]
pub fn is_hexagon_position_taken(
    entities: &EntityStorage,
    center: HexGridPosition,
    radius: i32,
    ignored: &BTreeSet<EntityId>,
) -> bool {
    entities.iter_sorted().any(|entity| {
        if ignored.contains(&entity.id) || !entity.is_collidable() {
            return false;
        }
        entity
            .position
            .is_some_and(|p| do_hexagons_intersect(center, radius, p.position, p.radius))
    })
}

/// A* frontier entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AStarNode {
    /// Hex distance to the destination.
    goal: i32,
    /// Squared deviation from the straight source to destination line.
    angle: i32,
    /// Grid index, the final tie-breaker.
    index: usize,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse every key so the smallest pops first.
        other
            .goal
            .cmp(&self.goal)
            .then_with(|| other.angle.cmp(&self.angle))
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Squared perpendicular distance of `position` from the line `source` to
/// `target`, in low precision 2D space.
fn heuristic_angle(source: HexGridPosition, position: HexGridPosition, target: HexGridPosition) -> i32 {
    let sp = (position - source).to_low_precision_2d();
    let st = (target - source).to_low_precision_2d();
    let cross = i64::from(sp.x) * i64::from(st.y) - i64::from(sp.y) * i64::from(st.x);
    let den = st.square_length();
    if den == 0 {
        return 0;
    }
    i32::try_from(cross * cross / den).unwrap_or(i32::MAX)
}

/// The obstacle map of one board, plus every query that reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialGrid {
    config: HexGridConfig,
    middle_line_width: i32,
    obstacles: Vec<ObstacleKind>,
}

impl SpatialGrid {
    /// Empty obstacle map for `config`.
    #[must_use]
    pub fn new(config: HexGridConfig, middle_line_width: i32) -> Self {
        Self {
            obstacles: vec![ObstacleKind::None; config.grid_size()],
            config,
            middle_line_width,
        }
    }

    /// Board configuration.
    #[must_use]
    pub const fn config(&self) -> &HexGridConfig {
        &self.config
    }

    /// Half height of the band between the two team halves.
    #[must_use]
    pub const fn middle_line_width(&self) -> i32 {
        self.middle_line_width
    }

    /// Raw obstacle map, indexed by grid index.
    #[must_use]
    pub fn obstacles(&self) -> &[ObstacleKind] {
        &self.obstacles
    }

    /// Obstacle at `position`, `None` off the board.
    #[must_use]
    pub fn obstacle_at(&self, position: HexGridPosition) -> Option<ObstacleKind> {
        self.config
            .grid_index(position)
            .and_then(|index| self.obstacles.get(index).copied())
    }

    /// Whether `position` is blocked. Cells off the board are blocked.
    #[must_use]
    pub fn has_obstacle_at(&self, position: HexGridPosition) -> bool {
        self.obstacle_at(position).map_or(true, ObstacleKind::is_obstacle)
    }

    fn has_obstacle_at_index(&self, index: usize) -> bool {
        self.obstacles.get(index).map_or(true, |kind| kind.is_obstacle())
    }

    /// Mark every cell free.
    pub fn clear_obstacles(&mut self) {
        self.obstacles.fill(ObstacleKind::None);
    }

    /// Set one cell; cells off the board are ignored.
    pub fn set_obstacle(&mut self, position: HexGridPosition, kind: ObstacleKind) {
        if let Some(index) = self.config.grid_index(position) {
            self.obstacles[index] = kind;
        }
    }

    /// Set every on-board cell of a hexagon. Negative radii mark nothing.
    pub fn mark_hexagon(&mut self, center: HexGridPosition, radius: i32, kind: ObstacleKind) {
        if radius < 0 {
            return;
        }
        for position in hexagon_positions(center, radius) {
            self.set_obstacle(position, kind);
        }
    }

    fn mark_index_range(&mut self, start: usize, end: usize, kind: ObstacleKind) {
        let end = end.min(self.obstacles.len());
        if start < end {
            self.obstacles[start..end].fill(kind);
        }
    }

    /// Rebuild the obstacle map from the current entity positions.
    ///
    /// An entity painted for a footprint of radius `R` blocks every center
    /// closer than `R + entity radius`, so a free cell is exactly a center
    /// where the footprint overlaps nobody. Without a source entity and
    /// without an explicit radius nothing is painted.
    pub fn rebuild_obstacles(&mut self, entities: &EntityStorage, params: &ObstacleBuildParams) {
        self.clear_obstacles();

        let source_radius = params.source.and_then(|id| entities.get(id)).map(Entity::radius);
        let Some(radius) = params.radius_needed.or(source_radius) else {
            tracing::error!(
                source = ?params.source,
                "Cannot build obstacles without a source entity or a radius"
            );
            return;
        };

        if params.mark_borders {
            self.mark_borders(radius, params.q_margin, params.r_margin);
        }
        self.mark_team_side(params.mark_team_side, radius);

        for entity in entities.iter_sorted() {
            if Some(entity.id) == params.source || !entity.is_collidable() {
                continue;
            }
            let Some(position) = entity.position else {
                continue;
            };
            let paint_radius = radius + position.radius - 1;
            if !position.overlapable {
                self.mark_hexagon(position.position, paint_radius, ObstacleKind::Entity);
            }
            if position.has_reserved_position() {
                self.mark_hexagon(position.reserved_position, paint_radius, ObstacleKind::Entity);
            }
        }
    }

    fn mark_borders(&mut self, radius: i32, q_margin: i32, r_margin: i32) {
        let width = self.config.width();
        let height = self.config.height();
        let band_rows = (radius + r_margin).clamp(0, height);
        let band_columns = (radius + q_margin).clamp(0, width);
        for row in 0..height {
            for column in 0..width {
                let in_band = row < band_rows
                    || row >= height - band_rows
                    || column < band_columns
                    || column >= width - band_columns;
                if in_band {
                    self.obstacles[(row * width + column) as usize] = ObstacleKind::Border;
                }
            }
        }
    }

    fn mark_team_side(&mut self, team: Team, radius: i32) {
        let width = self.config.width();
        let height_extent = self.config.height_extent();
        let size = self.obstacles.len();
        let row_start = |row: i32| usize::try_from(row.max(0) * width).unwrap_or(0);
        match team {
            Team::Blue => {
                self.mark_index_range(0, row_start(height_extent + 1 + radius), ObstacleKind::EnemySide);
            }
            Team::Red => {
                self.mark_index_range(row_start(height_extent - radius), size, ObstacleKind::EnemySide);
            }
            Team::None => {}
        }
    }

    /// On-board cells at exactly `radius` steps from `center`.
    ///
    /// The walk starts at `center + offset[4] * radius` and goes around the
    /// six sides. Radius zero yields the center.
    #[must_use]
    pub fn single_ring_positions(&self, center: HexGridPosition, radius: i32) -> Vec<HexGridPosition> {
        if radius <= 0 {
            return if radius == 0 && self.config.contains(center) {
                vec![center]
            } else {
                Vec::new()
            };
        }
        let mut results = Vec::with_capacity(6 * radius as usize);
        let mut hex = center + NEIGHBOUR_OFFSETS[4] * radius;
        for offset in NEIGHBOUR_OFFSETS {
            for _ in 0..radius {
                if self.config.contains(hex) {
                    results.push(hex);
                }
                hex += offset;
            }
        }
        results
    }

    /// On-board cells within `radius` of `center`, ring by ring outwards.
    #[must_use]
    pub fn spiral_rings_positions(&self, center: HexGridPosition, radius: i32) -> Vec<HexGridPosition> {
        (0..=radius.max(0))
            .flat_map(|k| self.single_ring_positions(center, k))
            .collect()
    }

    /// On-board cells covered by a footprint.
    #[must_use]
    pub fn hexagon_taken_positions(&self, center: HexGridPosition, radius: i32) -> Vec<HexGridPosition> {
        hexagon_positions(center, radius)
            .into_iter()
            .filter(|&p| self.config.contains(p))
            .collect()
    }

    /// Whether a footprint could stand at `center`.
    ///
    /// It must fit on the board; when it takes space it must not overlap a
    /// collidable entity and, before the battle starts, must stay off the
    /// middle line.
    #[must_use]
    pub fn is_valid_hexagon_position(
        &self,
        entities: &EntityStorage,
        center: HexGridPosition,
        radius: i32,
        taking_space: bool,
        battle_started: bool,
    ) -> bool {
        if !center.is_valid() || !self.config.is_hexagon_in_grid_limits(center, radius, 0, 0) {
            return false;
        }
        if !taking_space {
            return true;
        }
        if is_hexagon_position_taken(entities, center, radius, &BTreeSet::new()) {
            return false;
        }
        battle_started || !does_hexagon_overlap_middle_line(center, radius, self.middle_line_width)
    }

    fn is_open_candidate(&self, position: HexGridPosition, radius: i32) -> bool {
        self.config.is_hexagon_in_grid_limits(position, radius, 0, 0) && !self.has_obstacle_at(position)
    }

    /// Open candidates among `center` and the ring at `trial_distance`,
    /// best first, at most `max_positions`.
    #[must_use]
    pub fn possible_positions(
        &self,
        center: HexGridPosition,
        radius: i32,
        comparer: &PositionComparer<'_>,
        trial_distance: i32,
        max_positions: usize,
    ) -> Vec<HexGridPosition> {
        let mut candidates = Vec::new();
        if self.is_open_candidate(center, radius) {
            candidates.push(center);
        }
        if trial_distance > 0 {
            candidates.extend(
                self.single_ring_positions(center, trial_distance)
                    .into_iter()
                    .filter(|&p| self.is_open_candidate(p, radius)),
            );
        }
        candidates.sort_by(|&a, &b| comparer.compare(&self.config, a, b));
        candidates.truncate(max_positions);
        candidates
    }

    /// Best open candidate among `center` and the ring at `trial_distance`.
    #[must_use]
    pub fn possible_position(
        &self,
        center: HexGridPosition,
        radius: i32,
        trial_distance: i32,
        comparer: &PositionComparer<'_>,
    ) -> HexGridPosition {
        self.possible_positions(center, radius, comparer, trial_distance, 1)
            .first()
            .copied()
            .unwrap_or(HexGridPosition::INVALID)
    }

    /// Open position around `location`, preferably towards `direction`.
    ///
    /// Rings from `min_radius` outwards are searched; within a ring the
    /// cell closest to the preferred point at that distance wins.
    /// `footprint_radius` is the radius of the hexagon being placed.
    #[must_use]
    pub fn open_position_near_location(
        &self,
        location: HexGridPosition,
        direction: HexGridCardinalDirection,
        min_radius: i32,
        footprint_radius: i32,
    ) -> HexGridPosition {
        let min_position = self.config.min_position();
        let max_position = self.config.max_position();
        let limit = location
            .q
            .max(max_position.q - location.q)
            .max(location.r)
            .max(max_position.r - location.r);
        let step = direction.offset().unwrap_or(HexGridPosition::ZERO);

        let mut trial_distance = min_radius;
        loop {
            let preferred = HexGridPosition::new(
                (location.q + step.q * trial_distance).clamp(min_position.q, max_position.q),
                (location.r + step.r * trial_distance).clamp(min_position.r, max_position.r),
            );
            if self.config.contains(preferred) {
                let found = self.possible_position(
                    location,
                    footprint_radius,
                    trial_distance,
                    &PositionComparer::HexDistance(preferred),
                );
                if found.is_valid() {
                    return found;
                }
            }
            trial_distance += 1;
            if trial_distance >= limit {
                return HexGridPosition::INVALID;
            }
        }
    }

    /// Open position just outside `entity`'s footprint, preferably towards `direction`.
    #[must_use]
    pub fn open_position_near(
        &self,
        entity: &Entity,
        direction: HexGridCardinalDirection,
        footprint_radius: i32,
    ) -> HexGridPosition {
        let Some(position) = entity.position else {
            return HexGridPosition::INVALID;
        };
        self.open_position_near_location(position.position, direction, position.radius + 1, footprint_radius)
    }

    /// Open position around `target`, on the side facing `source`.
    #[must_use]
    pub fn open_position_on_path(
        &self,
        source: HexGridPosition,
        target: HexGridPosition,
        radius: i32,
        max_distance: i32,
    ) -> HexGridPosition {
        let max_position = self.config.max_position();
        let limit = (max_position.q - target.q)
            .max(max_position.r - target.r)
            .min(max_distance);
        let comparer = PositionComparer::HexDistance(source);
        let mut trial_distance = 1;
        loop {
            let found = self.possible_position(target, radius, trial_distance, &comparer);
            if found.is_valid() {
                return found;
            }
            trial_distance += 1;
            if trial_distance >= limit {
                return HexGridPosition::INVALID;
            }
        }
    }

    /// Up to `max_positions` open positions around `target`, scanning rings
    /// inwards from `range` down to `min_trial_distance`, closest to
    /// `source` first within each ring.
    #[must_use]
    pub fn open_positions_in_range(
        &self,
        source: HexGridPosition,
        target: HexGridPosition,
        radius: i32,
        range: i32,
        min_trial_distance: i32,
        max_positions: usize,
    ) -> Vec<HexGridPosition> {
        let comparer = PositionComparer::HexDistance(source);
        let mut found = Vec::new();
        let mut trial_distance = self.config.distance_to_farthest_hex(target).min(range);
        while trial_distance >= min_trial_distance && found.len() < max_positions {
            let remaining = max_positions - found.len();
            found.extend(self.possible_positions(target, radius, &comparer, trial_distance, remaining));
            trial_distance -= 1;
        }
        found
    }

    /// Open cell within `radius` of `center` farthest from `from`.
    #[must_use]
    pub fn farthest_open_position_in_range(
        &self,
        center: HexGridPosition,
        from: HexGridPosition,
        radius: i32,
    ) -> HexGridPosition {
        self.spiral_rings_positions(center, radius)
            .into_iter()
            .filter(|&p| !self.has_obstacle_at(p))
            .min_by(|&a, &b| {
                b.distance(from)
                    .cmp(&a.distance(from))
                    .then_with(|| self.config.grid_index(a).cmp(&self.config.grid_index(b)))
            })
            .unwrap_or(HexGridPosition::INVALID)
    }

    /// Closest open position to `target`.
    #[must_use]
    pub fn open_position_nearby(
        &self,
        target: HexGridPosition,
        radius: i32,
        min_trial_distance: i32,
    ) -> HexGridPosition {
        self.open_position_nearby_with_preferred(target, target, radius, min_trial_distance)
    }

    /// Closest open position to `target` in scaled 2D distance.
    #[must_use]
    pub fn open_position_nearby_2d(&self, target: HexGridPosition, radius: i32) -> HexGridPosition {
        let max_range = self
            .config
            .max_distance_units()
            .min(self.config.distance_to_farthest_hex(target));
        let comparer = PositionComparer::Scaled2D(target);
        (0..=max_range)
            .map(|trial| self.possible_position(target, radius, trial, &comparer))
            .find(|p| p.is_valid())
            .unwrap_or(HexGridPosition::INVALID)
    }

    /// Open position in the first non-empty ring around `target`, closest
    /// to `preferred` within that ring.
    #[must_use]
    pub fn open_position_nearby_with_preferred(
        &self,
        target: HexGridPosition,
        preferred: HexGridPosition,
        radius: i32,
        min_trial_distance: i32,
    ) -> HexGridPosition {
        let max_range = self
            .config
            .max_distance_units()
            .min(self.config.distance_to_farthest_hex(target));
        let comparer = PositionComparer::HexDistance(preferred);
        (min_trial_distance..=max_range.max(min_trial_distance))
            .map(|trial| self.possible_position(target, radius, trial, &comparer))
            .find(|p| p.is_valid())
            .unwrap_or(HexGridPosition::INVALID)
    }

    /// Open position around `target` on the side away from `source`.
    #[must_use]
    pub fn open_position_behind(
        &self,
        source: HexGridPosition,
        target: HexGridPosition,
        radius: i32,
        min_trial_distance: i32,
    ) -> HexGridPosition {
        let reflected = (source - target).reflect() + target;
        self.open_position_nearby_with_preferred(target, reflected, radius, min_trial_distance)
    }

    /// Open position around `target` on the side facing `source`.
    #[must_use]
    pub fn open_position_in_front(
        &self,
        source: HexGridPosition,
        target: HexGridPosition,
        radius: i32,
        min_trial_distance: i32,
    ) -> HexGridPosition {
        self.open_position_nearby_with_preferred(target, source, radius, min_trial_distance)
    }

    /// Open position at the opposite border, in the same column.
    #[must_use]
    pub fn open_position_across(&self, current: HexGridPosition, radius: i32) -> HexGridPosition {
        let mut offset = current.to_offset_odd_r();
        let height_extent = self.config.height_extent();
        offset.y = if is_in_blue_space(current) {
            radius - height_extent
        } else {
            height_extent - radius
        };
        self.open_position_nearby(HexGridPosition::from_offset_odd_r(offset), radius, 0)
    }

    /// Find and store a reserved position for `entity` relative to `targets`.
    ///
    /// Rebuilds the obstacle map for `entity`. The first target that is not
    /// the entity itself and has a position is used as the receiver.
    /// Returns the reserved position, or [`HexGridPosition::INVALID`].
    pub fn try_to_reserve_position(
        &mut self,
        entities: &mut EntityStorage,
        entity: EntityId,
        targets: &[EntityId],
        mode: ReservationMode,
    ) -> HexGridPosition {
        let Some(own) = entities.get(entity).and_then(|e| e.position) else {
            return HexGridPosition::INVALID;
        };
        self.rebuild_obstacles(entities, &ObstacleBuildParams::for_source(entity));

        let receiver_position = targets
            .iter()
            .filter(|&&id| id != entity)
            .find_map(|&id| entities.get(id).and_then(Entity::hex_position));

        let reserved = match (mode, receiver_position) {
            (ReservationMode::NearReceiver, Some(receiver)) => {
                self.open_position_nearby(receiver, own.radius, 0)
            }
            (ReservationMode::BehindReceiver, Some(receiver)) => {
                self.open_position_behind(own.position, receiver, own.radius, 0)
            }
            (ReservationMode::Across, _) => self.open_position_across(own.position, own.radius),
            (_, None) => HexGridPosition::INVALID,
        };

        if reserved.is_valid() {
            if let Some(position) = entities.get_mut(entity).and_then(|e| e.position.as_mut()) {
                position.reserved_position = reserved;
            }
            tracing::debug!(entity, ?mode, position = %reserved, "Reserved position");
        }
        reserved
    }

    /// Bounded best-first search from `source` towards `destination`.
    ///
    /// Nodes are expanded by smallest hex distance to the destination, then
    /// by smallest deviation from the straight line, then by grid index.
    /// Every node is settled once. The search stops at the first node within
    /// `reach` of the destination, or fails when the frontier empties or
    /// `max_iterations` nodes were expanded. Blocked cells and cells where a
    /// footprint of `source_radius` would leave the board are never entered.
    #[must_use]
    pub fn find_path_on_grid(
        &self,
        source: HexGridPosition,
        source_radius: i32,
        destination: HexGridPosition,
        reach: i32,
        max_iterations: u32,
    ) -> PathSearchResult {
        let Some(start) = self.config.grid_index(source) else {
            return PathSearchResult::default();
        };

        let mut parents: Vec<Option<usize>> = vec![None; self.obstacles.len()];
        let mut settled = vec![false; self.obstacles.len()];
        let mut frontier = BinaryHeap::new();
        settled[start] = true;
        frontier.push(AStarNode {
            goal: source.distance(destination),
            angle: 180,
            index: start,
        });

        let mut iterations = 0;
        while iterations < max_iterations {
            let Some(current) = frontier.pop() else {
                break;
            };
            let current_position = self.config.coordinates(current.index);
            if current_position.distance(destination) <= reach {
                return PathSearchResult {
                    path: self.reconstruct_path(&parents, current.index),
                    reached: true,
                    iterations,
                };
            }

            for offset in NEIGHBOUR_OFFSETS {
                let neighbour = current_position + offset;
                if !self.config.is_hexagon_in_grid_limits(neighbour, source_radius, 0, 0) {
                    continue;
                }
                let Some(index) = self.config.grid_index(neighbour) else {
                    continue;
                };
                if settled[index] || self.has_obstacle_at_index(index) {
                    continue;
                }
                settled[index] = true;
                parents[index] = Some(current.index);
                frontier.push(AStarNode {
                    goal: neighbour.distance(destination),
                    angle: heuristic_angle(source, neighbour, destination),
                    index,
                });
            }
            iterations += 1;
        }

        tracing::debug!(%source, %destination, iterations, "No path found");
        PathSearchResult {
            path: Vec::new(),
            reached: false,
            iterations,
        }
    }

    fn reconstruct_path(&self, parents: &[Option<usize>], goal: usize) -> Vec<HexGridPosition> {
        let mut path = vec![self.config.coordinates(goal)];
        let mut current = goal;
        while let Some(parent) = parents[current] {
            path.push(self.config.coordinates(parent));
            current = parent;
        }
        path.reverse();
        path
    }

    /// Next cell a footprint at `source` should step to in order to get to
    /// `target`, or [`HexGridPosition::INVALID`] when no path exists.
    ///
    /// Reads the obstacle map as built; the caller rebuilds it for the
    /// moving entity first.
    #[must_use]
    pub fn find_closest_open_position_towards(
        &self,
        source: HexGridPosition,
        radius: i32,
        target: HexGridPosition,
    ) -> HexGridPosition {
        if source == target {
            return source;
        }
        let result = self.find_path_on_grid(source, radius, target, 1, DEFAULT_MAX_PATH_ITERATIONS);
        match result.path.as_slice() {
            [only] if result.reached => *only,
            [_, next, ..] if result.reached => *next,
            _ => HexGridPosition::INVALID,
        }
    }
}

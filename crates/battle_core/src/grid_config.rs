//! Board dimensions and the hex to index mapping.
//!
//! The board is a rectangle of `width` columns and `height` rows in odd-r
//! offset layout, centered on the axial origin. Every in-bounds cell maps
//! to a unique index in `[0, width * height)`, row-major from the top row.

use serde::{Deserialize, Serialize};

use crate::error::{BattleError, Result};
use crate::hex::{HexGridPosition, NEIGHBOUR_OFFSETS};
use crate::math::IVec2;

/// Team of a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    /// Neutral, allied with nobody.
    #[default]
    None,
    /// Owns the bottom half of the board (`r > 0`).
    Blue,
    /// Owns the top half of the board (`r < 0`).
    Red,
}

impl Team {
    /// The opposing team, `None` stays `None`.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Blue => Self::Red,
            Self::Red => Self::Blue,
        }
    }
}

/// Named board positions, resolved relative to a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredefinedGridPosition {
    /// Center of the team's own back row.
    AllyBorderCenter,
    /// Center of the opposing team's back row.
    EnemyBorderCenter,
}

impl PredefinedGridPosition {
    /// Same position seen from the other team.
    #[must_use]
    pub const fn mirror(self) -> Self {
        match self {
            Self::AllyBorderCenter => Self::EnemyBorderCenter,
            Self::EnemyBorderCenter => Self::AllyBorderCenter,
        }
    }
}

/// Hex grid configuration with cached limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexGridConfig {
    width: i32,
    height: i32,
    width_extent: i32,
    height_extent: i32,
    min_position: HexGridPosition,
    max_position: HexGridPosition,
    max_distance_units: i32,
    corners: [HexGridPosition; 4],
}

impl HexGridConfig {
    /// Create a configuration for a `width` x `height` board.
    ///
    /// Both sizes must be odd and positive so the board is centered on the origin.
    pub fn new(width: i32, height: i32) -> Result<Self> {
        if width < 1 || height < 1 {
            return Err(BattleError::InvalidGridConfig(format!(
                "grid size must be positive, got {width}x{height}"
            )));
        }
        if width % 2 == 0 || height % 2 == 0 {
            return Err(BattleError::InvalidGridConfig(format!(
                "grid size must be odd, got {width}x{height}"
            )));
        }
        Ok(Self::with_size(width, height))
    }

    fn with_size(width: i32, height: i32) -> Self {
        let width_extent = (width - 1) / 2;
        let height_extent = (height - 1) / 2;
        let q_min = |r: i32| -width_extent - (r >> 1);
        let q_max = |r: i32| width_extent - (r >> 1);

        let min_position = HexGridPosition::new(q_min(-height_extent), -height_extent);
        let max_position = HexGridPosition::new(q_max(height_extent), height_extent);
        let corners = [
            min_position,
            HexGridPosition::new(q_max(-height_extent), -height_extent),
            max_position,
            HexGridPosition::new(q_min(height_extent), height_extent),
        ];

        Self {
            width,
            height,
            width_extent,
            height_extent,
            min_position,
            max_position,
            max_distance_units: min_position.distance(max_position),
            corners,
        }
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// How far the board extends left and right of the center column.
    #[must_use]
    pub const fn width_extent(&self) -> i32 {
        self.width_extent
    }

    /// How far the board extends above and below the center row.
    #[must_use]
    pub const fn height_extent(&self) -> i32 {
        self.height_extent
    }

    /// Lowest `q` of row `r`.
    #[must_use]
    pub const fn q_limit_min(&self, r: i32) -> i32 {
        -self.width_extent - (r >> 1)
    }

    /// Highest `q` of row `r`.
    #[must_use]
    pub const fn q_limit_max(&self, r: i32) -> i32 {
        self.width_extent - (r >> 1)
    }

    /// Lowest `r`.
    #[must_use]
    pub const fn r_limit_min(&self) -> i32 {
        -self.height_extent
    }

    /// Highest `r`.
    #[must_use]
    pub const fn r_limit_max(&self) -> i32 {
        self.height_extent
    }

    /// True if `position` is on the board, shrunk by the given margins.
    #[must_use]
    pub const fn is_in_map_rectangle_limits(
        &self,
        position: HexGridPosition,
        q_margin: i32,
        r_margin: i32,
    ) -> bool {
        let HexGridPosition { q, r } = position;
        r >= self.r_limit_min() + r_margin
            && r <= self.r_limit_max() - r_margin
            && q >= self.q_limit_min(r) + q_margin
            && q <= self.q_limit_max(r) - q_margin
    }

    /// True if `position` is on the board.
    #[must_use]
    pub const fn contains(&self, position: HexGridPosition) -> bool {
        self.is_in_map_rectangle_limits(position, 0, 0)
    }

    /// True if the center and the six corners of the hexagon are on the board.
    #[must_use]
    pub fn is_hexagon_in_grid_limits(
        &self,
        center: HexGridPosition,
        radius: i32,
        q_margin: i32,
        r_margin: i32,
    ) -> bool {
        if !self.is_in_map_rectangle_limits(center, q_margin, r_margin) {
            return false;
        }
        if radius == 0 {
            return true;
        }
        NEIGHBOUR_OFFSETS
            .iter()
            .all(|&offset| self.is_in_map_rectangle_limits(center + offset * radius, q_margin, r_margin))
    }

    /// Position with the lowest row, leftmost column.
    #[must_use]
    pub const fn min_position(&self) -> HexGridPosition {
        self.min_position
    }

    /// Position with the highest row, rightmost column.
    #[must_use]
    pub const fn max_position(&self) -> HexGridPosition {
        self.max_position
    }

    /// Hex distance between [`Self::min_position`] and [`Self::max_position`].
    #[must_use]
    pub const fn max_distance_units(&self) -> i32 {
        self.max_distance_units
    }

    /// Number of cells.
    #[must_use]
    pub const fn grid_size(&self) -> usize {
        (self.width * self.height) as usize
    }

    /// Dense index of `position`, `None` when off the board.
    #[must_use]
    pub const fn grid_index(&self, position: HexGridPosition) -> Option<usize> {
        if !self.contains(position) {
            return None;
        }
        Some(self.grid_index_unchecked(position))
    }

    /// Dense index of a position known to be on the board.
    #[must_use]
    pub const fn grid_index_unchecked(&self, position: HexGridPosition) -> usize {
        let offset = position.to_offset_odd_r();
        let column = offset.x + self.width_extent;
        let row = offset.y + self.height_extent;
        (row * self.width + column) as usize
    }

    /// Inverse of [`Self::grid_index`], [`HexGridPosition::INVALID`] when out of range.
    #[must_use]
    pub const fn coordinates(&self, index: usize) -> HexGridPosition {
        if index >= self.grid_size() {
            return HexGridPosition::INVALID;
        }
        let index = index as i32;
        let row = index / self.width;
        let column = index % self.width;
        HexGridPosition::from_offset_odd_r(IVec2::new(
            column - self.width_extent,
            row - self.height_extent,
        ))
    }

    /// Largest hex distance from `position` to any cell of the board.
    #[must_use]
    pub fn distance_to_farthest_hex(&self, position: HexGridPosition) -> i32 {
        self.corners
            .iter()
            .map(|&corner| position.distance(corner))
            .max()
            .unwrap_or(0)
    }

    /// Resolve a named position from the point of view of `ally_team`.
    #[must_use]
    pub const fn resolve_predefined_position(
        &self,
        ally_team: Team,
        predefined: PredefinedGridPosition,
    ) -> HexGridPosition {
        // Red's back row is the top row; Blue sees the board mirrored
        let predefined = match ally_team {
            Team::Blue => predefined.mirror(),
            Team::Red | Team::None => predefined,
        };
        let column = self.width / 2;
        let row = match predefined {
            PredefinedGridPosition::AllyBorderCenter => 0,
            PredefinedGridPosition::EnemyBorderCenter => self.height - 1,
        };
        self.coordinates((row * self.width + column) as usize)
    }
}

impl Default for HexGridConfig {
    fn default() -> Self {
        Self::with_size(51, 51)
    }
}

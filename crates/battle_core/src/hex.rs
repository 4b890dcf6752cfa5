//! Axial hex coordinates.
//!
//! The board uses pointy-topped hexagons addressed by axial `(q, r)`
//! coordinates, with the implicit cube coordinate `s = -q - r`.
//! Distances are hex distances (number of steps between cells).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::math::{IVec2, PRECISION_FACTOR, SQRT3_SCALED};

/// Number of sub units in one hex unit, used for sub-hex precision geometry.
pub const SUB_UNITS_PER_UNIT: i32 = 1000;

/// Neighbour offsets, counter-clockwise starting from the right.
pub const NEIGHBOUR_OFFSETS: [HexGridPosition; 6] = [
    HexGridPosition::new(1, 0),
    HexGridPosition::new(1, -1),
    HexGridPosition::new(0, -1),
    HexGridPosition::new(-1, 0),
    HexGridPosition::new(-1, 1),
    HexGridPosition::new(0, 1),
];

/// Cardinal directions of a pointy-topped hexagon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HexGridCardinalDirection {
    /// No preferred direction.
    #[default]
    None,
    /// +q.
    Right,
    /// +q -r.
    TopRight,
    /// -r.
    TopLeft,
    /// -q.
    Left,
    /// -q +r.
    BottomLeft,
    /// +r.
    BottomRight,
}

impl HexGridCardinalDirection {
    /// Unit offset for this direction, `None` for [`HexGridCardinalDirection::None`].
    #[must_use]
    pub const fn offset(self) -> Option<HexGridPosition> {
        match self {
            Self::None => None,
            Self::Right => Some(NEIGHBOUR_OFFSETS[0]),
            Self::TopRight => Some(NEIGHBOUR_OFFSETS[1]),
            Self::TopLeft => Some(NEIGHBOUR_OFFSETS[2]),
            Self::Left => Some(NEIGHBOUR_OFFSETS[3]),
            Self::BottomLeft => Some(NEIGHBOUR_OFFSETS[4]),
            Self::BottomRight => Some(NEIGHBOUR_OFFSETS[5]),
        }
    }
}

/// Axial hex grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct HexGridPosition {
    /// Column axis.
    pub q: i32,
    /// Row axis.
    pub r: i32,
}

impl HexGridPosition {
    /// Sentinel for "no position".
    pub const INVALID: Self = Self {
        q: i32::MIN,
        r: i32::MIN,
    };

    /// Origin of the board.
    pub const ZERO: Self = Self { q: 0, r: 0 };

    /// Create a new position.
    #[must_use]
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Cube `s` coordinate.
    #[must_use]
    pub const fn s(self) -> i32 {
        -self.q - self.r
    }

    /// Hex distance from the origin.
    #[must_use]
    pub const fn length(self) -> i32 {
        (self.q.abs() + self.r.abs() + self.s().abs()) / 2
    }

    /// Hex distance to `other`.
    #[must_use]
    pub const fn distance(self, other: Self) -> i32 {
        Self::new(self.q - other.q, self.r - other.r).length()
    }

    /// Point reflection through the origin.
    #[must_use]
    pub const fn reflect(self) -> Self {
        Self::new(-self.q, -self.r)
    }

    /// True for the origin.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.q == 0 && self.r == 0
    }

    /// False for [`HexGridPosition::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !(self.q == Self::INVALID.q && self.r == Self::INVALID.r)
    }

    /// Scale units to sub units.
    #[must_use]
    pub const fn to_sub_units(self) -> Self {
        Self::new(self.q * SUB_UNITS_PER_UNIT, self.r * SUB_UNITS_PER_UNIT)
    }

    /// Scale sub units back to whole units (truncating).
    #[must_use]
    pub const fn to_units(self) -> Self {
        Self::new(self.q / SUB_UNITS_PER_UNIT, self.r / SUB_UNITS_PER_UNIT)
    }

    /// Neighbour in the given direction, or `self` for no direction.
    #[must_use]
    pub fn neighbour(self, direction: HexGridCardinalDirection) -> Self {
        direction.offset().map_or(self, |offset| self + offset)
    }

    /// Odd-r offset coordinate `(col, row)`.
    #[must_use]
    pub const fn to_offset_odd_r(self) -> IVec2 {
        IVec2::new(self.q + (self.r - (self.r & 1)) / 2, self.r)
    }

    /// Inverse of [`HexGridPosition::to_offset_odd_r`].
    #[must_use]
    pub const fn from_offset_odd_r(offset: IVec2) -> Self {
        Self::new(offset.x - (offset.y - (offset.y & 1)) / 2, offset.y)
    }

    /// 2D projection scaled by [`PRECISION_FACTOR`].
    #[must_use]
    pub const fn to_scaled_2d(self) -> IVec2 {
        IVec2::new(
            SQRT3_SCALED * self.q + (SQRT3_SCALED * self.r) / 2,
            (3 * PRECISION_FACTOR * self.r) / 2,
        )
    }

    /// Lower precision 2D projection (scale 100), safe for squaring.
    #[must_use]
    pub const fn to_low_precision_2d(self) -> IVec2 {
        let sqrt3 = SQRT3_SCALED / 10;
        let precision = PRECISION_FACTOR / 10;
        IVec2::new(sqrt3 * self.q + (sqrt3 * self.r) / 2, (3 * precision * self.r) / 2)
    }

    /// Round a sub-unit position to the nearest whole hex (cube rounding).
    #[must_use]
    pub fn cube_round(sub_units: Self) -> Self {
        let unit = i64::from(SUB_UNITS_PER_UNIT);
        let round = |value: i64| -> i64 {
            if value >= 0 {
                (value + unit / 2) / unit
            } else {
                (value - unit / 2) / unit
            }
        };

        let q = i64::from(sub_units.q);
        let r = i64::from(sub_units.r);
        let s = -q - r;
        let mut rq = round(q);
        let mut rr = round(r);
        let rs = round(s);

        let q_diff = (rq * unit - q).abs();
        let r_diff = (rr * unit - r).abs();
        let s_diff = (rs * unit - s).abs();
        if q_diff > r_diff && q_diff > s_diff {
            rq = -rr - rs;
        } else if r_diff > s_diff {
            rr = -rq - rs;
        }
        Self::new(rq as i32, rr as i32)
    }

    /// Q limits of a hexagon of `radius` around the origin.
    #[must_use]
    pub const fn hexagon_q_limits(radius: i32) -> (i32, i32) {
        (-radius, radius)
    }

    /// R limits of a hexagon of `radius` around the origin, for column `q`.
    #[must_use]
    pub const fn hexagon_r_limits(radius: i32, q: i32) -> (i32, i32) {
        let min = if -radius > -q - radius { -radius } else { -q - radius };
        let max = if radius < -q + radius { radius } else { -q + radius };
        (min, max)
    }
}

impl Add for HexGridPosition {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.q + rhs.q, self.r + rhs.r)
    }
}

impl AddAssign for HexGridPosition {
    fn add_assign(&mut self, rhs: Self) {
        self.q += rhs.q;
        self.r += rhs.r;
    }
}

impl Sub for HexGridPosition {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.q - rhs.q, self.r - rhs.r)
    }
}

impl SubAssign for HexGridPosition {
    fn sub_assign(&mut self, rhs: Self) {
        self.q -= rhs.q;
        self.r -= rhs.r;
    }
}

impl Mul<i32> for HexGridPosition {
    type Output = Self;

    fn mul(self, rhs: i32) -> Self {
        Self::new(self.q * rhs, self.r * rhs)
    }
}

impl Neg for HexGridPosition {
    type Output = Self;

    fn neg(self) -> Self {
        self.reflect()
    }
}

impl Ord for HexGridPosition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.r.cmp(&other.r).then(self.q.cmp(&other.q))
    }
}

impl PartialOrd for HexGridPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for HexGridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "({}, {})", self.q, self.r)
        } else {
            write!(f, "(invalid)")
        }
    }
}

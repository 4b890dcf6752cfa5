//! Deterministic math utilities.
//!
//! Board geometry runs entirely on integers: angles are whole degrees,
//! trigonometry comes from a sine table scaled by [`PRECISION_FACTOR`], and
//! square roots are integer square roots. Live stat values use fixed-point
//! numbers so that targeting comparisons are identical on every platform.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Fixed-point number type for stat values and expressions.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Scale applied to trigonometric values and 2D hex projections.
pub const PRECISION_FACTOR: i32 = 1000;

/// Square root of 3 scaled by [`PRECISION_FACTOR`].
pub const SQRT3_SCALED: i32 = 1732;

/// Percentages are whole numbers in `[0, MAX_PERCENTAGE]`.
pub const MAX_PERCENTAGE: i32 = 100;

/// Sine of 0..=90 degrees scaled by [`PRECISION_FACTOR`].
const SINE_TABLE: [i32; 91] = [
    0, 17, 34, 52, 69, 87, 104, 121, 139, 156, 173, 190, 207, 224, 241, 258, 275, 292, 309, 325,
    342, 358, 374, 390, 406, 422, 438, 453, 469, 484, 500, 515, 529, 544, 559, 573, 587, 601, 615,
    629, 642, 656, 669, 681, 694, 707, 719, 731, 743, 754, 766, 777, 788, 798, 809, 819, 829, 838,
    848, 857, 866, 874, 882, 891, 898, 906, 913, 920, 927, 933, 939, 945, 951, 956, 961, 965, 970,
    974, 978, 981, 984, 987, 990, 992, 994, 996, 997, 998, 999, 999, 1000,
];

/// `percentage`% of `value`, truncated toward zero.
#[must_use]
pub const fn percentage_of(percentage: i32, value: i32) -> i32 {
    ((percentage as i64 * value as i64) / MAX_PERCENTAGE as i64) as i32
}

/// Wraps an angle in degrees into `[0, 360)`.
#[must_use]
pub const fn angle_limit_to_360(angle: i32) -> i32 {
    angle.rem_euclid(360)
}

/// Signed difference `angle2 - angle1` wrapped into `[-180, 180]`.
#[must_use]
pub const fn angle_difference_180(angle1: i32, angle2: i32) -> i32 {
    let mut difference = (angle2 - angle1) % 360;
    if difference < -180 {
        difference += 360;
    } else if difference > 180 {
        difference -= 360;
    }
    difference
}

/// Sine of `angle` degrees scaled by [`PRECISION_FACTOR`].
#[must_use]
pub const fn sin_scaled(angle: i32) -> i32 {
    let index = angle_limit_to_360(angle);
    if index > 180 {
        -sin_scaled(index - 180)
    } else if index > 90 {
        SINE_TABLE[(180 - index) as usize]
    } else {
        SINE_TABLE[index as usize]
    }
}

/// Cosine of `angle` degrees scaled by [`PRECISION_FACTOR`].
#[must_use]
pub const fn cos_scaled(angle: i32) -> i32 {
    sin_scaled(90 - angle)
}

/// Integer square root (floor).
#[must_use]
pub fn isqrt(value: u64) -> u64 {
    if value < 2 {
        return value;
    }
    let mut x = value;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + value / x) / 2;
    }
    x
}

/// Integer 2D vector used for world-space geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IVec2 {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
}

impl IVec2 {
    /// Zero vector.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Create a new vector.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared length, widened to avoid overflow.
    #[must_use]
    pub const fn square_length(self) -> i64 {
        self.x as i64 * self.x as i64 + self.y as i64 * self.y as i64
    }

    /// Length (floor of the euclidean norm).
    #[must_use]
    pub fn length(self) -> i32 {
        isqrt(self.square_length().unsigned_abs()) as i32
    }

    /// Scale from units to sub units.
    #[must_use]
    pub const fn to_sub_units(self) -> Self {
        Self::new(
            self.x * crate::hex::SUB_UNITS_PER_UNIT,
            self.y * crate::hex::SUB_UNITS_PER_UNIT,
        )
    }

    /// Rotate counter-clockwise around the origin by `angle` degrees.
    #[must_use]
    pub const fn rotate(self, angle: i32) -> Self {
        let sin = sin_scaled(angle) as i64;
        let cos = cos_scaled(angle) as i64;
        let x = self.x as i64;
        let y = self.y as i64;
        Self::new(
            ((cos * x - sin * y) / PRECISION_FACTOR as i64) as i32,
            ((sin * x + cos * y) / PRECISION_FACTOR as i64) as i32,
        )
    }

    /// Angle in degrees `[0, 360)` of the ray from `self` to `other`,
    /// counter-clockwise from the positive x axis.
    #[must_use]
    pub fn angle_to(self, other: Self) -> i32 {
        let dx = i64::from(other.x) - i64::from(self.x);
        let dy = i64::from(other.y) - i64::from(self.y);
        if dx == 0 && dy == 0 {
            return 0;
        }

        // Best matching first-quadrant angle for |dy| / |dx|
        let ax = dx.abs();
        let ay = dy.abs();
        let mut best_angle = 0;
        let mut best_error = i64::MAX;
        for angle in 0..=90 {
            let error = (ax * i64::from(sin_scaled(angle)) - ay * i64::from(cos_scaled(angle))).abs();
            if error < best_error {
                best_error = error;
                best_angle = angle;
            }
        }

        let angle = match (dx >= 0, dy >= 0) {
            (true, true) => best_angle,
            (false, true) => 180 - best_angle,
            (false, false) => 180 + best_angle,
            (true, false) => 360 - best_angle,
        };
        angle_limit_to_360(angle)
    }

    /// Vertices of an equilateral triangle with apex at `self`, whose median
    /// has length `median_length` and points toward `direction_degrees`.
    #[must_use]
    pub const fn triangle_vertices(self, direction_degrees: i32, median_length: i32) -> [Self; 3] {
        let side_half_length = median_length * SQRT3_SCALED / (PRECISION_FACTOR * 3);
        let b = Self::new(median_length, -side_half_length).rotate(direction_degrees);
        let c = Self::new(median_length, side_half_length).rotate(direction_degrees);
        [
            self,
            Self::new(self.x + b.x, self.y + b.y),
            Self::new(self.x + c.x, self.y + c.y),
        ]
    }

    /// Twice the area of the triangle `a b c`, absolute and exact.
    #[must_use]
    pub const fn triangle_area_doubled(a: Self, b: Self, c: Self) -> i64 {
        let (ax, ay) = (a.x as i64, a.y as i64);
        let (bx, by) = (b.x as i64, b.y as i64);
        let (cx, cy) = (c.x as i64, c.y as i64);
        (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by)).abs()
    }
}

impl Add for IVec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for IVec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<i32> for IVec2 {
    type Output = Self;

    fn mul(self, rhs: i32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<i32> for IVec2 {
    type Output = Self;

    fn div(self, rhs: i32) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for IVec2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for maps of fixed-point values keyed by `K`.
pub mod fixed_map_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    /// Serialize every value as its raw bit representation.
    pub fn serialize<K, S>(map: &BTreeMap<K, Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize + Ord,
        S: Serializer,
    {
        let raw: BTreeMap<&K, i64> = map.iter().map(|(k, v)| (k, v.to_bits())).collect();
        raw.serialize(serializer)
    }

    /// Deserialize a map of raw bit representations.
    pub fn deserialize<'de, K, D>(deserializer: D) -> Result<BTreeMap<K, Fixed>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<K, i64>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(k, v)| (k, Fixed::from_bits(v)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_of() {
        assert_eq!(percentage_of(25, 1000), 250);
        assert_eq!(percentage_of(100, 730), 730);
        assert_eq!(percentage_of(33, 100), 33);
        assert_eq!(percentage_of(0, 500), 0);
    }

    #[test]
    fn test_sin_cos_table() {
        assert_eq!(sin_scaled(0), 0);
        assert_eq!(sin_scaled(90), 1000);
        assert_eq!(sin_scaled(180), 0);
        assert_eq!(sin_scaled(270), -1000);
        assert_eq!(sin_scaled(-90), -1000);
        assert_eq!(cos_scaled(0), 1000);
        assert_eq!(cos_scaled(180), -1000);
        assert_eq!(sin_scaled(30), 500);
    }

    #[test]
    fn test_angle_wrapping() {
        assert_eq!(angle_limit_to_360(-30), 330);
        assert_eq!(angle_limit_to_360(725), 5);
        assert_eq!(angle_difference_180(350, 10), 20);
        assert_eq!(angle_difference_180(10, 350), -20);
    }

    #[test]
    fn test_angle_to_quadrants() {
        let origin = IVec2::ZERO;
        assert_eq!(origin.angle_to(IVec2::new(10, 0)), 0);
        assert_eq!(origin.angle_to(IVec2::new(0, 10)), 90);
        assert_eq!(origin.angle_to(IVec2::new(-10, 0)), 180);
        assert_eq!(origin.angle_to(IVec2::new(0, -10)), 270);
        assert_eq!(origin.angle_to(IVec2::new(10, 10)), 45);
        assert_eq!(origin.angle_to(IVec2::new(-10, -10)), 225);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let v = IVec2::new(1000, 0).rotate(90);
        assert_eq!(v, IVec2::new(0, 1000));
        let v = IVec2::new(1000, 0).rotate(180);
        assert_eq!(v, IVec2::new(-1000, 0));
    }

    #[test]
    fn test_isqrt() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(isqrt(1_000_000), 1000);
        assert_eq!(IVec2::new(3, 4).length(), 5);
    }

    #[test]
    fn test_triangle_area() {
        let a = IVec2::new(0, 0);
        let b = IVec2::new(4, 0);
        let c = IVec2::new(0, 4);
        assert_eq!(IVec2::triangle_area_doubled(a, b, c), 16);
        assert_eq!(IVec2::triangle_area_doubled(c, b, a), 16);
    }
}

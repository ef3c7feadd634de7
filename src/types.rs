//! Common types and traits for integer 3D geometry.
//!
//! Container coordinates are discrete: every point addresses one unit cell and
//! boxes are described by two inclusive corner points.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One of the three container axes.
///
/// `X` runs along the container length, `Y` along its width and `Z` upwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// The other horizontal axis. `Z` has no horizontal partner and maps to itself.
    #[inline]
    pub const fn orthogonal(self) -> Self {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
            Axis::Z => Axis::Z,
        }
    }
}

/// Represents a cell position inside a container.
///
/// # Examples
/// ```
/// use load_planner::types::Point;
///
/// let anchor = Point::new(2, 0, 5);
/// assert_eq!(anchor.with_z(0), Point::new(2, 0, 0));
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub struct Point {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Point {
    /// Creates a new point.
    ///
    /// # Parameters
    /// * `x` - Position along the length
    /// * `y` - Position along the width
    /// * `z` - Position along the height
    #[inline]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// The container origin.
    #[inline]
    pub const fn origin() -> Self {
        Self::new(0, 0, 0)
    }

    #[inline]
    pub const fn with_x(self, x: u32) -> Self {
        Self::new(x, self.y, self.z)
    }

    #[inline]
    pub const fn with_y(self, y: u32) -> Self {
        Self::new(self.x, y, self.z)
    }

    #[inline]
    pub const fn with_z(self, z: u32) -> Self {
        Self::new(self.x, self.y, z)
    }

    /// Returns the coordinate along `axis`.
    #[inline]
    pub const fn get(self, axis: Axis) -> u32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Returns a copy with the coordinate along `axis` replaced.
    #[inline]
    pub const fn with(self, axis: Axis, value: u32) -> Self {
        match axis {
            Axis::X => self.with_x(value),
            Axis::Y => self.with_y(value),
            Axis::Z => self.with_z(value),
        }
    }

    /// Sort key that exhausts a height layer before moving up: `(z, x, y)`.
    #[inline]
    pub const fn layer_key(&self) -> (u32, u32, u32) {
        (self.z, self.x, self.y)
    }

    /// Sort key that exhausts an x-column before moving along the length: `(x, y, z)`.
    #[inline]
    pub const fn column_key(&self) -> (u32, u32, u32) {
        (self.x, self.y, self.z)
    }

    /// Converts to tuple format for API compatibility.
    #[inline]
    pub const fn as_tuple(&self) -> (u32, u32, u32) {
        (self.x, self.y, self.z)
    }
}

impl From<(u32, u32, u32)> for Point {
    #[inline]
    fn from(tuple: (u32, u32, u32)) -> Self {
        Self::new(tuple.0, tuple.1, tuple.2)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Trait for objects with 3D dimensions.
///
/// Provides a common interface for everything with a spatial extent.
pub trait Dimensional {
    fn length(&self) -> u32;
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Calculates the volume. Saturates at `u64::MAX`.
    fn volume(&self) -> u64 {
        u64::from(self.length())
            .saturating_mul(u64::from(self.width()))
            .saturating_mul(u64::from(self.height()))
    }
}

/// Trait for objects with weight.
pub trait Weighted {
    /// Returns the weight in kg.
    fn weight(&self) -> u32;
}

/// Axis-aligned box described by two inclusive corner points.
///
/// A cuboid from `(0, 0, 0)` to `(0, 0, 0)` covers exactly one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cuboid {
    /// Minimum corner
    pub min: Point,
    /// Maximum corner (inclusive)
    pub max: Point,
}

impl Cuboid {
    /// Creates a new cuboid.
    #[inline]
    pub const fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Creates a cuboid from its minimum corner and its extents.
    ///
    /// All extents must be at least 1.
    #[inline]
    pub fn from_origin_and_size(min: Point, length: u32, width: u32, height: u32) -> Self {
        debug_assert!(length > 0 && width > 0 && height > 0);
        Self {
            min,
            max: Point::new(min.x + length - 1, min.y + width - 1, min.z + height - 1),
        }
    }

    /// Extent along `axis`. Returns 0 for an inverted cuboid.
    #[inline]
    pub fn extent(&self, axis: Axis) -> u32 {
        (self.max.get(axis) + 1).saturating_sub(self.min.get(axis))
    }

    /// Checks whether an object of the given extents fits inside.
    #[inline]
    pub fn fits(&self, length: u32, width: u32, height: u32) -> bool {
        self.extent(Axis::X) >= length
            && self.extent(Axis::Y) >= width
            && self.extent(Axis::Z) >= height
    }

    /// Checks if two cuboids share at least one cell.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }

    /// Checks if a point is inside the cuboid.
    #[inline]
    pub fn contains_point(&self, point: &Point) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Checks if `other` lies completely inside this cuboid.
    #[inline]
    pub fn contains(&self, other: &Self) -> bool {
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }
}

impl Dimensional for Cuboid {
    fn length(&self) -> u32 {
        self.extent(Axis::X)
    }

    fn width(&self) -> u32 {
        self.extent(Axis::Y)
    }

    fn height(&self) -> u32 {
        self.extent(Axis::Z)
    }
}

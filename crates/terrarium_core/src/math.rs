//! # World Math
//!
//! Continuous world positions and the integer region grid they map onto.
//!
//! ```text
//! WorldPoint --(÷ NODE_SIZE, round)--> node --(÷ REGION_SIZE, floor)--> RegionCoord
//! ```

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Edge length of one voxel node in world units.
pub const NODE_SIZE: f32 = 10.0;

/// Edge length of one region in nodes.
pub const REGION_SIZE: i32 = 16;

/// A continuous position in the world.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct WorldPoint {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl WorldPoint {
    /// Origin.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Length
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Distance to another point
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Returns the node this point falls in.
    ///
    /// Rounds half away from zero, so a node spans `[-NODE_SIZE/2, NODE_SIZE/2)`
    /// around its centre.
    #[must_use]
    pub fn to_node(self) -> [i32; 3] {
        #[allow(clippy::cast_possible_truncation)]
        let round = |v: f32| (v / NODE_SIZE).round() as i32;
        [round(self.x), round(self.y), round(self.z)]
    }

    /// Returns the centre of a node in world units.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_node(node: [i32; 3]) -> Self {
        Self::new(
            node[0] as f32 * NODE_SIZE,
            node[1] as f32 * NODE_SIZE,
            node[2] as f32 * NODE_SIZE,
        )
    }

    /// Returns the region containing this point.
    #[must_use]
    pub fn region(self) -> RegionCoord {
        RegionCoord::containing_node(self.to_node())
    }
}

impl std::ops::Add for WorldPoint {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for WorldPoint {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for WorldPoint {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::fmt::Display for WorldPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1},{:.1},{:.1})", self.x, self.y, self.z)
    }
}

/// Integer coordinate of a region (a `REGION_SIZE`³ cube of nodes).
#[repr(C)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable, Serialize,
    Deserialize,
)]
pub struct RegionCoord {
    /// X coordinate (in regions, not nodes).
    pub x: i16,
    /// Y coordinate (in regions, not nodes).
    pub y: i16,
    /// Z coordinate (in regions, not nodes).
    pub z: i16,
}

impl RegionCoord {
    /// Creates a new region coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    /// Returns the region containing a node position.
    #[must_use]
    pub fn containing_node(node: [i32; 3]) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let axis = |v: i32| {
            v.div_euclid(REGION_SIZE)
                .clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
        };
        Self::new(axis(node[0]), axis(node[1]), axis(node[2]))
    }

    /// Returns the node position of this region's minimum corner.
    #[inline]
    #[must_use]
    pub fn origin_node(self) -> [i32; 3] {
        [
            i32::from(self.x) * REGION_SIZE,
            i32::from(self.y) * REGION_SIZE,
            i32::from(self.z) * REGION_SIZE,
        ]
    }

    /// Returns this coordinate shifted by the given deltas, saturating at the grid edge.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i16, dy: i16, dz: i16) -> Self {
        Self::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.z.saturating_add(dz),
        )
    }

    /// Chebyshev (chessboard) distance to another region.
    #[must_use]
    pub fn chebyshev_distance(self, other: Self) -> u16 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        let dz = self.z.abs_diff(other.z);
        dx.max(dy).max(dz)
    }

    /// Iterates every region within Chebyshev distance `radius` (inclusive).
    ///
    /// Coordinates that would leave the `i16` grid are clamped onto the edge,
    /// so the iterator may yield an edge region more than once.
    pub fn cube(self, radius: i16) -> impl Iterator<Item = RegionCoord> {
        let r = radius.max(0);
        (-r..=r).flat_map(move |dx| {
            (-r..=r).flat_map(move |dy| (-r..=r).map(move |dz| self.offset(dx, dy, dz)))
        })
    }
}

impl std::fmt::Display for RegionCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}

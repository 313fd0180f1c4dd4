//! # Regions
//!
//! A region is a `REGION_SIZE`³ cube of nodes plus the snapshot bags of the
//! objects inside it. Regions are the unit of loading, persistence and
//! activation.

use bytemuck::{Pod, Zeroable};
use terrarium_core::{RegionCoord, REGION_SIZE};

use crate::snapshot::SnapshotList;

/// Edge length of a region as an index bound.
#[allow(clippy::cast_sign_loss)]
pub const REGION_EDGE: usize = REGION_SIZE as usize;

/// Nodes per region.
pub const NODES_PER_REGION: usize = REGION_EDGE * REGION_EDGE * REGION_EDGE;

/// A single voxel node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Node {
    /// Content id.
    pub content: u16,
    /// Content-specific parameter (light, growth stage...).
    pub param: u16,
}

impl Node {
    /// Empty space.
    pub const AIR: Self = Self::new(0);
    /// Bedrock-like filler.
    pub const STONE: Self = Self::new(1);
    /// Grass-topped soil.
    pub const GRASS: Self = Self::new(2);
    /// Bare soil.
    pub const MUD: Self = Self::new(3);
    /// Tree trunk.
    pub const TREE: Self = Self::new(4);

    /// Creates a node with the given content id.
    #[inline]
    #[must_use]
    pub const fn new(content: u16) -> Self {
        Self { content, param: 0 }
    }

    /// Returns true if this is air.
    #[inline]
    #[must_use]
    pub const fn is_air(self) -> bool {
        self.content == Self::AIR.content
    }
}

/// How urgently a region must be written back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModLevel {
    /// Matches what is persisted.
    #[default]
    Clean,
    /// Write whenever the region is unloaded.
    WriteAtUnload,
    /// Write on the next flush.
    WriteNeeded,
}

/// One region of the world.
#[derive(Clone)]
pub struct Region {
    coord: RegionCoord,
    /// Indexed as `[y][z][x]`, flattened.
    nodes: Box<[Node]>,
    /// Dormant and active object snapshots.
    pub snapshots: SnapshotList,
    mod_level: ModLevel,
    /// Game time (seconds) of the last visit, if ever visited.
    timestamp: Option<u32>,
    /// Seconds since the region was last in use.
    usage_timer: f32,
}

impl Region {
    /// Creates an all-air region.
    #[must_use]
    pub fn new(coord: RegionCoord) -> Self {
        Self {
            coord,
            nodes: vec![Node::AIR; NODES_PER_REGION].into_boxed_slice(),
            snapshots: SnapshotList::new(),
            mod_level: ModLevel::Clean,
            timestamp: None,
            usage_timer: 0.0,
        }
    }

    /// Creates a region of flat terrain.
    ///
    /// Ground level is node y = 0: stone below, mud on top, air above, and a
    /// single tree trunk in the middle of every surface region.
    #[must_use]
    pub fn flat(coord: RegionCoord) -> Self {
        let mut region = Self::new(coord);
        let base_y = coord.origin_node()[1];
        for ly in 0..REGION_EDGE {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let world_y = base_y + ly as i32;
            let node = match world_y {
                y if y < 0 => Node::STONE,
                0 => Node::MUD,
                _ => continue,
            };
            for lz in 0..REGION_EDGE {
                for lx in 0..REGION_EDGE {
                    region.nodes[index(lx, ly, lz)] = node;
                }
            }
        }
        if base_y == 0 {
            let mid = REGION_EDGE / 2;
            region.nodes[index(mid, 0, mid)] = Node::GRASS;
            region.nodes[index(mid, 1, mid)] = Node::TREE;
        }
        region
    }

    /// Rebuilds a region from persisted parts. The result is clean.
    #[must_use]
    pub fn from_parts(
        coord: RegionCoord,
        nodes: Box<[Node]>,
        snapshots: SnapshotList,
        timestamp: Option<u32>,
    ) -> Self {
        debug_assert_eq!(nodes.len(), NODES_PER_REGION);
        Self {
            coord,
            nodes,
            snapshots,
            mod_level: ModLevel::Clean,
            timestamp,
            usage_timer: 0.0,
        }
    }

    /// Returns the region coordinate.
    #[inline]
    #[must_use]
    pub const fn coord(&self) -> RegionCoord {
        self.coord
    }

    /// Gets a node at local coordinates. Out of range reads as air.
    #[inline]
    #[must_use]
    pub fn node(&self, x: usize, y: usize, z: usize) -> Node {
        if x < REGION_EDGE && y < REGION_EDGE && z < REGION_EDGE {
            self.nodes[index(x, y, z)]
        } else {
            Node::AIR
        }
    }

    /// Sets a node at local coordinates and raises the region to `WriteNeeded`.
    #[inline]
    pub fn set_node(&mut self, x: usize, y: usize, z: usize, node: Node) {
        if x < REGION_EDGE && y < REGION_EDGE && z < REGION_EDGE {
            self.nodes[index(x, y, z)] = node;
            self.mark_modified(ModLevel::WriteNeeded);
        }
    }

    /// Raw node storage, `[y][z][x]` order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the modification level.
    #[inline]
    #[must_use]
    pub const fn mod_level(&self) -> ModLevel {
        self.mod_level
    }

    /// Raises the modification level. Never lowers it.
    #[inline]
    pub fn mark_modified(&mut self, level: ModLevel) {
        self.mod_level = self.mod_level.max(level);
    }

    /// Resets the modification level after a write.
    #[inline]
    pub fn mark_clean(&mut self) {
        self.mod_level = ModLevel::Clean;
    }

    /// Returns the last-visit timestamp.
    #[inline]
    #[must_use]
    pub const fn timestamp(&self) -> Option<u32> {
        self.timestamp
    }

    /// Sets the timestamp and raises the region to `WriteAtUnload`.
    pub fn set_timestamp(&mut self, game_time: u32) {
        self.timestamp = Some(game_time);
        self.mark_modified(ModLevel::WriteAtUnload);
    }

    /// Sets the timestamp without touching the modification level.
    pub fn set_timestamp_no_flag(&mut self, game_time: u32) {
        self.timestamp = Some(game_time);
    }

    /// Seconds since the region was last in use.
    #[inline]
    #[must_use]
    pub const fn usage_timer(&self) -> f32 {
        self.usage_timer
    }

    /// Marks the region as in use right now.
    #[inline]
    pub fn reset_usage_timer(&mut self) {
        self.usage_timer = 0.0;
    }

    /// Advances the usage timer.
    #[inline]
    pub fn increment_usage_timer(&mut self, dtime: f32) {
        self.usage_timer += dtime;
    }

    /// Whether the region can be dropped from memory without stranding the
    /// mirror of a live object.
    #[must_use]
    pub fn is_unloadable(&self) -> bool {
        self.snapshots.active_len() == 0
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("coord", &self.coord)
            .field("stored", &self.snapshots.stored_len())
            .field("active", &self.snapshots.active_len())
            .field("mod_level", &self.mod_level)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

#[inline]
const fn index(x: usize, y: usize, z: usize) -> usize {
    (y * REGION_EDGE + z) * REGION_EDGE + x
}

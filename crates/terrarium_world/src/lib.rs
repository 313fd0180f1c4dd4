//! # TERRARIUM World
//!
//! The region side of the simulation: voxel regions, the snapshot bags of
//! objects that are not currently simulated, persistence, and the set of
//! regions that are live.
//!
//! ## Core Components
//!
//! - `Region`: nodes, snapshot bags, modification level, timestamp
//! - `SnapshotList`: dormant (`stored`) and mirrored (`active`) snapshots
//! - `RegionStore`: loading, creating and writing back regions
//! - `ActiveRegionSet`: which regions are live, and what changed
//!
//! ## Example
//!
//! ```rust,ignore
//! use terrarium_world::{ActiveRegionSet, MemoryRegionStore, RegionStore};
//!
//! let mut live = ActiveRegionSet::new();
//! let delta = live.recompute(player_positions, 2);
//! for coord in &delta.added {
//!     let region = store.emerge(*coord, true)?;
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod activation;
pub mod error;
pub mod region;
pub mod snapshot;
pub mod store;

pub use activation::{ActiveRegionSet, RegionDelta};
pub use error::{WorldError, WorldResult};
pub use region::{ModLevel, Node, Region, NODES_PER_REGION, REGION_EDGE};
pub use snapshot::{Snapshot, SnapshotList, MAX_STORED_SNAPSHOTS};
pub use store::{
    decode_region, encode_region, FileRegionStore, MemoryRegionStore, RegionGenerator,
    RegionStore,
};

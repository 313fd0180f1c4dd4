//! # Region Stores
//!
//! Where regions live while loaded, and where they go when written back.
//!
//! - [`MemoryRegionStore`]: everything in a hash map, nothing on disk
//! - [`FileRegionStore`]: one LZ4-compressed file per region
//!
//! ## Region File Format
//!
//! ```text
//! [4 bytes: magic "TRRG"]
//! [1 byte: format version]
//! [N bytes: LZ4 block, uncompressed size prepended]
//! [4 bytes: CRC32 of everything above]
//!
//! Uncompressed body:
//! [4 bytes: timestamp, u32::MAX = never visited]
//! [16384 bytes: nodes, [y][z][x]]
//! [4 bytes: snapshot section length]
//! [N bytes: snapshot section]
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use terrarium_core::RegionCoord;

use crate::error::{WorldError, WorldResult};
use crate::region::{ModLevel, Node, Region, NODES_PER_REGION};
use crate::snapshot::SnapshotList;

/// Produces a fresh region the first time a coordinate is emerged.
pub type RegionGenerator = fn(RegionCoord) -> Region;

/// Magic bytes identifying a region file.
const REGION_MAGIC: &[u8; 4] = b"TRRG";

/// Current region file format version.
const REGION_VERSION: u8 = 1;

/// Timestamp value meaning "never visited".
const NO_TIMESTAMP: u32 = u32::MAX;

/// Size in bytes of the node array.
const NODE_BYTES: usize = NODES_PER_REGION * std::mem::size_of::<Node>();

/// Access to loaded regions and their persistence.
pub trait RegionStore: Send {
    /// Returns the region at `coord`, loading or creating it as needed.
    ///
    /// # Errors
    ///
    /// `RegionUnavailable` if the region does not exist and may not be
    /// created (or lies outside the store's bounds). Load failures surface as
    /// `Io` or `Corrupt`.
    fn emerge(&mut self, coord: RegionCoord, create_if_missing: bool) -> WorldResult<&mut Region>;

    /// Returns a loaded region.
    fn get(&self, coord: RegionCoord) -> Option<&Region>;

    /// Returns a loaded region mutably.
    fn get_mut(&mut self, coord: RegionCoord) -> Option<&mut Region>;

    /// Coordinates of every loaded region.
    fn loaded(&self) -> Vec<RegionCoord>;

    /// Coordinates of every region that exists, loaded or persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if persisted regions cannot be listed.
    fn loadable(&self) -> WorldResult<Vec<RegionCoord>>;

    /// Writes back a region if needed and drops it from memory.
    ///
    /// Returns false if the region was kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the region stays loaded.
    fn unload(&mut self, coord: RegionCoord) -> WorldResult<bool>;

    /// Writes every loaded region at or above `level` and marks it clean.
    ///
    /// Returns the number of regions written.
    ///
    /// # Errors
    ///
    /// Returns the first write error. Regions written before it stay clean.
    fn flush(&mut self, level: ModLevel) -> WorldResult<usize>;

    /// Ages every loaded region by `dtime` and unloads those idle for longer
    /// than `max_idle` seconds.
    ///
    /// Regions still mirroring a live object are never unloaded.
    ///
    /// # Errors
    ///
    /// Stops at the first failed unload.
    fn unload_idle(&mut self, dtime: f32, max_idle: f32) -> WorldResult<usize> {
        let mut unloaded = 0;
        for coord in self.loaded() {
            let Some(region) = self.get_mut(coord) else {
                continue;
            };
            region.increment_usage_timer(dtime);
            if region.usage_timer() > max_idle && region.is_unloadable() && self.unload(coord)? {
                unloaded += 1;
            }
        }
        if unloaded > 0 {
            tracing::debug!("unloaded {} idle regions", unloaded);
        }
        Ok(unloaded)
    }
}

/// Whether `coord` lies within `limit` regions of the origin on every axis.
fn within(coord: RegionCoord, limit: Option<i16>) -> bool {
    limit.map_or(true, |l| {
        coord.x.unsigned_abs() <= l.unsigned_abs()
            && coord.y.unsigned_abs() <= l.unsigned_abs()
            && coord.z.unsigned_abs() <= l.unsigned_abs()
    })
}

/// Regions held purely in memory.
///
/// Nothing is ever written, so nothing is ever unloaded.
#[derive(Debug)]
pub struct MemoryRegionStore {
    regions: HashMap<RegionCoord, Region>,
    generator: RegionGenerator,
    limit: Option<i16>,
}

impl MemoryRegionStore {
    /// Creates an empty store generating flat terrain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regions: HashMap::new(),
            generator: Region::flat,
            limit: None,
        }
    }

    /// Replaces the generator used for new regions.
    #[must_use]
    pub fn with_generator(mut self, generator: RegionGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Refuses to emerge regions more than `limit` regions from the origin.
    #[must_use]
    pub const fn with_limit(mut self, limit: i16) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Number of loaded regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether no region is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl Default for MemoryRegionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionStore for MemoryRegionStore {
    fn emerge(&mut self, coord: RegionCoord, create_if_missing: bool) -> WorldResult<&mut Region> {
        if !within(coord, self.limit) {
            return Err(WorldError::RegionUnavailable(coord));
        }
        match self.regions.entry(coord) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(_) if !create_if_missing => Err(WorldError::RegionUnavailable(coord)),
            Entry::Vacant(entry) => Ok(entry.insert((self.generator)(coord))),
        }
    }

    fn get(&self, coord: RegionCoord) -> Option<&Region> {
        self.regions.get(&coord)
    }

    fn get_mut(&mut self, coord: RegionCoord) -> Option<&mut Region> {
        self.regions.get_mut(&coord)
    }

    fn loaded(&self) -> Vec<RegionCoord> {
        let mut coords: Vec<_> = self.regions.keys().copied().collect();
        coords.sort_unstable();
        coords
    }

    fn loadable(&self) -> WorldResult<Vec<RegionCoord>> {
        Ok(self.loaded())
    }

    fn unload(&mut self, _coord: RegionCoord) -> WorldResult<bool> {
        Ok(false)
    }

    fn flush(&mut self, level: ModLevel) -> WorldResult<usize> {
        let mut written = 0;
        for region in self.regions.values_mut() {
            if region.mod_level() != ModLevel::Clean && region.mod_level() >= level {
                region.mark_clean();
                written += 1;
            }
        }
        Ok(written)
    }
}

/// Regions persisted one file per region under a root directory.
#[derive(Debug)]
pub struct FileRegionStore {
    root: PathBuf,
    regions: HashMap<RegionCoord, Region>,
    generator: RegionGenerator,
    limit: Option<i16>,
}

impl FileRegionStore {
    /// Opens (creating if needed) a region directory.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> WorldResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        tracing::info!("region store opened at {}", root.display());
        Ok(Self {
            root,
            regions: HashMap::new(),
            generator: Region::flat,
            limit: None,
        })
    }

    /// Replaces the generator used for new regions.
    #[must_use]
    pub fn with_generator(mut self, generator: RegionGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Refuses to emerge regions more than `limit` regions from the origin.
    #[must_use]
    pub const fn with_limit(mut self, limit: i16) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn region_path(root: &Path, coord: RegionCoord) -> PathBuf {
        root.join(format!("r.{}.{}.{}.trrg", coord.x, coord.y, coord.z))
    }

    fn parse_file_name(name: &str) -> Option<RegionCoord> {
        let body = name.strip_prefix("r.")?.strip_suffix(".trrg")?;
        let mut parts = body.split('.');
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        let z = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(RegionCoord::new(x, y, z))
    }
}

impl RegionStore for FileRegionStore {
    fn emerge(&mut self, coord: RegionCoord, create_if_missing: bool) -> WorldResult<&mut Region> {
        if !within(coord, self.limit) {
            return Err(WorldError::RegionUnavailable(coord));
        }
        match self.regions.entry(coord) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let path = Self::region_path(&self.root, coord);
                let region = if path.exists() {
                    let bytes = std::fs::read(&path)?;
                    decode_region(coord, &bytes)?
                } else if create_if_missing {
                    let mut region = (self.generator)(coord);
                    region.mark_modified(ModLevel::WriteNeeded);
                    region
                } else {
                    return Err(WorldError::RegionUnavailable(coord));
                };
                Ok(entry.insert(region))
            }
        }
    }

    fn get(&self, coord: RegionCoord) -> Option<&Region> {
        self.regions.get(&coord)
    }

    fn get_mut(&mut self, coord: RegionCoord) -> Option<&mut Region> {
        self.regions.get_mut(&coord)
    }

    fn loaded(&self) -> Vec<RegionCoord> {
        let mut coords: Vec<_> = self.regions.keys().copied().collect();
        coords.sort_unstable();
        coords
    }

    fn loadable(&self) -> WorldResult<Vec<RegionCoord>> {
        let mut coords = self.loaded();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(coord) = name.to_str().and_then(Self::parse_file_name) {
                coords.push(coord);
            }
        }
        coords.sort_unstable();
        coords.dedup();
        Ok(coords)
    }

    fn unload(&mut self, coord: RegionCoord) -> WorldResult<bool> {
        let Some(region) = self.regions.get_mut(&coord) else {
            return Ok(false);
        };
        if !region.is_unloadable() {
            return Ok(false);
        }
        if region.mod_level() != ModLevel::Clean {
            write_region(&Self::region_path(&self.root, coord), region)?;
            region.mark_clean();
        }
        self.regions.remove(&coord);
        Ok(true)
    }

    fn flush(&mut self, level: ModLevel) -> WorldResult<usize> {
        let mut written = 0;
        for region in self.regions.values_mut() {
            if region.mod_level() == ModLevel::Clean || region.mod_level() < level {
                continue;
            }
            write_region(&Self::region_path(&self.root, region.coord()), region)?;
            region.mark_clean();
            written += 1;
        }
        if written > 0 {
            tracing::debug!("flushed {} regions to {}", written, self.root.display());
        }
        Ok(written)
    }
}

/// Serializes a region into file bytes.
#[must_use]
pub fn encode_region(region: &Region) -> Vec<u8> {
    let section = region.snapshots.encode();
    let mut body = Vec::with_capacity(4 + NODE_BYTES + 4 + section.len());
    body.extend_from_slice(&region.timestamp().unwrap_or(NO_TIMESTAMP).to_le_bytes());
    body.extend_from_slice(bytemuck::cast_slice::<Node, u8>(region.nodes()));
    #[allow(clippy::cast_possible_truncation)]
    body.extend_from_slice(&(section.len() as u32).to_le_bytes());
    body.extend_from_slice(&section);

    let compressed = compress_prepend_size(&body);
    let mut out = Vec::with_capacity(REGION_MAGIC.len() + 1 + compressed.len() + 4);
    out.extend_from_slice(REGION_MAGIC);
    out.push(REGION_VERSION);
    out.extend_from_slice(&compressed);
    let crc = crc32fast::hash(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

/// Parses file bytes back into a clean region.
///
/// # Errors
///
/// Returns `Corrupt` on a bad magic, version, checksum or layout.
pub fn decode_region(coord: RegionCoord, bytes: &[u8]) -> WorldResult<Region> {
    let corrupt = |what: &str| WorldError::Corrupt(format!("region {coord}: {what}"));

    let header = REGION_MAGIC.len() + 1;
    if bytes.len() < header + 4 {
        return Err(corrupt("file too short"));
    }
    if &bytes[..REGION_MAGIC.len()] != REGION_MAGIC {
        return Err(corrupt("bad magic"));
    }
    if bytes[REGION_MAGIC.len()] != REGION_VERSION {
        return Err(corrupt("unsupported version"));
    }

    let (payload, trailer) = bytes.split_at(bytes.len() - 4);
    let stored_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if crc32fast::hash(payload) != stored_crc {
        return Err(corrupt("checksum mismatch"));
    }

    let body = decompress_size_prepended(&payload[header..])
        .map_err(|e| corrupt(&format!("decompression failed: {e}")))?;
    if body.len() < 4 + NODE_BYTES + 4 {
        return Err(corrupt("body too short"));
    }

    let timestamp = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
    let node_bytes = &body[4..4 + NODE_BYTES];
    let nodes: Box<[Node]> = node_bytes
        .chunks_exact(std::mem::size_of::<Node>())
        .map(bytemuck::pod_read_unaligned::<Node>)
        .collect();

    let rest = &body[4 + NODE_BYTES..];
    let section_len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
    let section = rest
        .get(4..4 + section_len)
        .ok_or_else(|| corrupt("snapshot section truncated"))?;
    let snapshots = SnapshotList::decode(section)?;

    let timestamp = (timestamp != NO_TIMESTAMP).then_some(timestamp);
    Ok(Region::from_parts(coord, nodes, snapshots, timestamp))
}

fn write_region(path: &Path, region: &Region) -> WorldResult<()> {
    let bytes = encode_region(region);
    let tmp = path.with_extension("trrg.tmp");
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

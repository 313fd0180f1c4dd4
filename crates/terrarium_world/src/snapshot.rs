//! # Object Snapshots
//!
//! A snapshot is the persisted, non-simulated form of an object. Every region
//! keeps two bags of them:
//!
//! - **stored**: dormant snapshots, revived when the region becomes live
//! - **active**: mirrors of live objects, keyed by the live object's id
//!
//! ## Section Format
//!
//! ```text
//! [1 byte: version]
//! [2 bytes: record count]
//!
//! Record format:
//! [2 bytes: id, 0 = none]
//! [1 byte: kind]
//! [12 bytes: position, 3 x i32 fixed point (x1000)]
//! [2 bytes: state length]
//! [N bytes: state]
//! ```
//!
//! All integers are little-endian. An empty list encodes to zero bytes.

use std::collections::BTreeMap;

use terrarium_core::{ObjectId, ObjectKind, WorldPoint};

use crate::error::{WorldError, WorldResult};

/// Largest number of snapshots one bag may hold.
///
/// A dormant bag above this is treated as runaway data and discarded on
/// activation. An active bag at this size refuses further inserts.
pub const MAX_STORED_SNAPSHOTS: usize = 49;

/// Current section format version.
const SECTION_VERSION: u8 = 1;

/// Fixed-point scale for persisted positions.
const POSITION_SCALE: f32 = 1000.0;

/// Bytes in a record before its state payload.
const RECORD_HEADER_LEN: usize = 2 + 1 + 12 + 2;

/// Persisted form of one object.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Selects the constructor on revival.
    pub kind: ObjectKind,
    /// Where the object was.
    pub position: WorldPoint,
    /// Object-specific serialized state.
    pub state: Vec<u8>,
}

impl Snapshot {
    /// Creates a snapshot.
    #[must_use]
    pub fn new(kind: ObjectKind, position: WorldPoint, state: Vec<u8>) -> Self {
        Self {
            kind,
            position,
            state,
        }
    }
}

/// The two snapshot bags of a region.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotList {
    stored: Vec<Snapshot>,
    active: BTreeMap<ObjectId, Snapshot>,
}

impl SnapshotList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a snapshot.
    ///
    /// `None` (or the null id) files it in the stored bag; an id files it in
    /// the active bag under that id, replacing any previous mirror.
    ///
    /// # Errors
    ///
    /// Hands the snapshot back if the target bag is already full.
    pub fn insert(&mut self, id: Option<ObjectId>, snapshot: Snapshot) -> Result<(), Snapshot> {
        match id.and_then(ObjectId::non_null) {
            None => {
                if self.stored.len() >= MAX_STORED_SNAPSHOTS {
                    return Err(snapshot);
                }
                self.stored.push(snapshot);
            }
            Some(id) => {
                if !self.active.contains_key(&id) && self.active.len() >= MAX_STORED_SNAPSHOTS {
                    return Err(snapshot);
                }
                if self.active.insert(id, snapshot).is_some() {
                    tracing::debug!("replaced active snapshot for object {}", id);
                }
            }
        }
        Ok(())
    }

    /// Whether an insert under `id` would be refused.
    #[must_use]
    pub fn is_full_for(&self, id: Option<ObjectId>) -> bool {
        match id.and_then(ObjectId::non_null) {
            None => self.stored.len() >= MAX_STORED_SNAPSHOTS,
            Some(id) => {
                !self.active.contains_key(&id) && self.active.len() >= MAX_STORED_SNAPSHOTS
            }
        }
    }

    /// Removes the active mirror of `id`.
    pub fn remove_active(&mut self, id: ObjectId) -> Option<Snapshot> {
        self.active.remove(&id)
    }

    /// Returns the active mirror of `id`.
    #[must_use]
    pub fn active(&self, id: ObjectId) -> Option<&Snapshot> {
        self.active.get(&id)
    }

    /// Iterates the active bag in id order.
    pub fn active_iter(&self) -> impl Iterator<Item = (ObjectId, &Snapshot)> {
        self.active.iter().map(|(id, snapshot)| (*id, snapshot))
    }

    /// Returns the stored bag.
    #[must_use]
    pub fn stored(&self) -> &[Snapshot] {
        &self.stored
    }

    /// Empties the stored bag, returning its contents.
    pub fn take_stored(&mut self) -> Vec<Snapshot> {
        std::mem::take(&mut self.stored)
    }

    /// Number of dormant snapshots.
    #[must_use]
    pub fn stored_len(&self) -> usize {
        self.stored.len()
    }

    /// Number of active mirrors.
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Whether both bags are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stored.is_empty() && self.active.is_empty()
    }

    /// Empties both bags.
    pub fn clear(&mut self) {
        self.stored.clear();
        self.active.clear();
    }

    /// Encodes both bags into a snapshot section.
    ///
    /// Records whose state does not fit a 16-bit length are dropped with an
    /// error log.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        if self.is_empty() {
            return Vec::new();
        }

        let records: Vec<(ObjectId, &Snapshot)> = self
            .stored
            .iter()
            .map(|snapshot| (ObjectId::NULL, snapshot))
            .chain(self.active_iter())
            .filter(|(id, snapshot)| {
                let fits = u16::try_from(snapshot.state.len()).is_ok();
                if !fits {
                    tracing::error!(
                        "snapshot of kind {} (id {}) has {} bytes of state; not persisted",
                        snapshot.kind,
                        id,
                        snapshot.state.len()
                    );
                }
                fits
            })
            .take(usize::from(u16::MAX))
            .collect();

        let payload: usize = records
            .iter()
            .map(|(_, s)| RECORD_HEADER_LEN + s.state.len())
            .sum();
        let mut buf = Vec::with_capacity(3 + payload);
        buf.push(SECTION_VERSION);
        #[allow(clippy::cast_possible_truncation)]
        buf.extend_from_slice(&(records.len() as u16).to_le_bytes());

        for (id, snapshot) in records {
            buf.extend_from_slice(&id.get().to_le_bytes());
            buf.push(snapshot.kind.0);
            for v in [snapshot.position.x, snapshot.position.y, snapshot.position.z] {
                buf.extend_from_slice(&to_fixed(v).to_le_bytes());
            }
            #[allow(clippy::cast_possible_truncation)]
            buf.extend_from_slice(&(snapshot.state.len() as u16).to_le_bytes());
            buf.extend_from_slice(&snapshot.state);
        }
        buf
    }

    /// Decodes a snapshot section.
    ///
    /// Every record lands in the stored bag. Ids recorded for active mirrors
    /// are not restored: whatever live object owned them is gone.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` on an unknown version or truncated data.
    pub fn decode(data: &[u8]) -> WorldResult<Self> {
        let mut list = Self::new();
        if data.is_empty() {
            return Ok(list);
        }

        let mut reader = Reader::new(data);
        let version = reader.u8()?;
        if version != SECTION_VERSION {
            return Err(WorldError::Corrupt(format!(
                "unsupported snapshot section version {version}"
            )));
        }

        let count = reader.u16()?;
        let mut demoted = 0usize;
        for _ in 0..count {
            let id = reader.u16()?;
            let kind = ObjectKind(reader.u8()?);
            let x = from_fixed(reader.i32()?);
            let y = from_fixed(reader.i32()?);
            let z = from_fixed(reader.i32()?);
            let len = usize::from(reader.u16()?);
            let state = reader.bytes(len)?.to_vec();
            if id != 0 {
                demoted += 1;
            }
            list.stored
                .push(Snapshot::new(kind, WorldPoint::new(x, y, z), state));
        }

        if reader.remaining() != 0 {
            tracing::warn!(
                "{} trailing bytes after snapshot section",
                reader.remaining()
            );
        }
        if demoted > 0 {
            tracing::debug!("{} active snapshots loaded as dormant", demoted);
        }
        Ok(list)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_fixed(v: f32) -> i32 {
    (v * POSITION_SCALE).round() as i32
}

#[allow(clippy::cast_precision_loss)]
fn from_fixed(v: i32) -> f32 {
    v as f32 / POSITION_SCALE
}

/// Little-endian cursor over a byte slice.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn bytes(&mut self, len: usize) -> WorldResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(WorldError::Corrupt(format!(
                "snapshot section truncated at byte {} (wanted {} more)",
                self.pos, len
            )));
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> WorldResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> WorldResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> WorldResult<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> WorldResult<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(kind: u8, state: &[u8]) -> Snapshot {
        Snapshot::new(ObjectKind(kind), WorldPoint::new(1.5, -2.25, 300.0), state.to_vec())
    }

    #[test]
    fn test_insert_routes_by_key() {
        let mut list = SnapshotList::new();
        list.insert(None, snap(1, b"a")).unwrap();
        list.insert(Some(ObjectId::NULL), snap(1, b"b")).unwrap();
        list.insert(Some(ObjectId::new(7)), snap(2, b"c")).unwrap();

        assert_eq!(list.stored_len(), 2);
        assert_eq!(list.active_len(), 1);
        assert_eq!(list.active(ObjectId::new(7)).unwrap().state, b"c");
    }

    #[test]
    fn test_active_replace_keeps_one_entry() {
        let mut list = SnapshotList::new();
        let id = Some(ObjectId::new(3));
        list.insert(id, snap(1, b"old")).unwrap();
        list.insert(id, snap(1, b"new")).unwrap();
        assert_eq!(list.active_len(), 1);
        assert_eq!(list.remove_active(ObjectId::new(3)).unwrap().state, b"new");
        assert!(list.is_empty());
    }

    #[test]
    fn test_stored_ceiling() {
        let mut list = SnapshotList::new();
        for _ in 0..MAX_STORED_SNAPSHOTS {
            list.insert(None, snap(1, &[])).unwrap();
        }
        assert!(list.is_full_for(None));
        let refused = list.insert(None, snap(9, b"x")).unwrap_err();
        assert_eq!(refused.kind, ObjectKind(9));
        assert_eq!(list.stored_len(), MAX_STORED_SNAPSHOTS);
    }

    #[test]
    fn test_active_ceiling_allows_replacement() {
        let mut list = SnapshotList::new();
        for raw in 1..=49u16 {
            list.insert(Some(ObjectId::new(raw)), snap(1, &[])).unwrap();
        }
        assert!(list.is_full_for(Some(ObjectId::new(50))));
        assert!(list.insert(Some(ObjectId::new(50)), snap(1, &[])).is_err());
        assert!(!list.is_full_for(Some(ObjectId::new(49))));
        assert!(list.insert(Some(ObjectId::new(49)), snap(1, b"z")).is_ok());
        assert_eq!(list.active_len(), MAX_STORED_SNAPSHOTS);
    }

    #[test]
    fn test_empty_encodes_to_nothing() {
        let list = SnapshotList::new();
        assert!(list.encode().is_empty());
        assert!(SnapshotList::decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_decode_restores_everything_as_dormant() {
        let mut list = SnapshotList::new();
        list.insert(None, snap(4, b"rat")).unwrap();
        list.insert(Some(ObjectId::new(12)), snap(2, b"item")).unwrap();

        let bytes = list.encode();
        assert_eq!(bytes[0], SECTION_VERSION);
        assert_eq!(u16::from_le_bytes([bytes[1], bytes[2]]), 2);

        let decoded = SnapshotList::decode(&bytes).unwrap();
        assert_eq!(decoded.active_len(), 0);
        assert_eq!(decoded.stored(), &[snap(4, b"rat"), snap(2, b"item")]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            SnapshotList::decode(&[9, 0, 0]),
            Err(WorldError::Corrupt(_))
        ));

        let mut list = SnapshotList::new();
        list.insert(None, snap(1, b"abcdef")).unwrap();
        let bytes = list.encode();
        assert!(SnapshotList::decode(&bytes[..bytes.len() - 2]).is_err());
    }
}

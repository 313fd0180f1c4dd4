//! # Object Registry
//!
//! The process-wide table of live objects, indexed by [`ObjectId`].
//!
//! The registry is the sole owner of every live instance. Everything else
//! holds ids and resolves them through [`ObjectRegistry::get`] on each use,
//! so purging an object can never leave a dangling reference behind.

use crate::error::{Rejected, RegistryError};
use crate::id::ObjectId;
use crate::object::{ActiveObject, LiveObject};

/// Dense slot table of live objects.
///
/// Slots grow on demand up to `u16::MAX + 1`. Slot 0 is never used.
///
/// # Example
///
/// ```rust,ignore
/// let mut registry = ObjectRegistry::new();
/// let id = registry.insert(object, None)?;
/// registry.get_mut(id).unwrap().removed = true;
/// ```
pub struct ObjectRegistry {
    /// Object slots, indexed by raw id.
    slots: Vec<Option<LiveObject>>,
    /// Every id below this one is occupied.
    lowest_free: u32,
    /// Number of occupied slots.
    live_count: usize,
}

impl ObjectRegistry {
    /// Number of usable ids.
    pub const CAPACITY: usize = u16::MAX as usize;

    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: vec![None],
            lowest_free: 1,
            live_count: 0,
        }
    }

    /// Returns the number of live objects.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live_count
    }

    /// Returns true if no objects are registered.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Registers an instance.
    ///
    /// With `requested = None` the lowest free id is assigned. With a
    /// requested id, that exact id is used if free.
    ///
    /// # Errors
    ///
    /// Returns the instance untouched inside [`Rejected`] when no id is free,
    /// when the requested id is taken, or when the requested id is null. The
    /// caller owns the disposal in every case.
    pub fn insert(
        &mut self,
        object: Box<dyn ActiveObject>,
        requested: Option<ObjectId>,
    ) -> Result<ObjectId, Rejected> {
        let id = match requested {
            Some(id) if id.is_null() => {
                return Err(Rejected {
                    error: RegistryError::NullId,
                    object,
                })
            }
            Some(id) if self.contains(id) => {
                return Err(Rejected {
                    error: RegistryError::IdCollision(id),
                    object,
                })
            }
            Some(id) => id,
            None => match self.lowest_free_id() {
                Some(id) => id,
                None => {
                    return Err(Rejected {
                        error: RegistryError::ExhaustedIds,
                        object,
                    })
                }
            },
        };

        let idx = usize::from(id.get());
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx] = Some(LiveObject::new(object));
        self.live_count += 1;
        if u32::from(id.get()) == self.lowest_free {
            self.lowest_free += 1;
        }

        tracing::debug!(
            "registered object id={}; {} live objects",
            id,
            self.live_count
        );
        Ok(id)
    }

    /// Removes an object from the table and hands it back.
    ///
    /// The caller decides when the instance is dropped.
    pub fn release(&mut self, id: ObjectId) -> Option<LiveObject> {
        let slot = self.slots.get_mut(usize::from(id.get()))?;
        let live = slot.take()?;
        self.live_count -= 1;
        self.lowest_free = self.lowest_free.min(u32::from(id.get()));
        Some(live)
    }

    /// Checks if an id is currently registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Gets a live object by id.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&LiveObject> {
        if id.is_null() {
            return None;
        }
        self.slots.get(usize::from(id.get()))?.as_ref()
    }

    /// Gets a mutable live object by id.
    #[inline]
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut LiveObject> {
        if id.is_null() {
            return None;
        }
        self.slots.get_mut(usize::from(id.get()))?.as_mut()
    }

    /// Returns every registered id in ascending order.
    ///
    /// Passes that insert or release while walking the table iterate this
    /// copy instead of borrowing the table.
    #[must_use]
    pub fn ids(&self) -> Vec<ObjectId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Iterates live objects in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &LiveObject)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            let live = slot.as_ref()?;
            Some((slot_id(idx), live))
        })
    }

    /// Iterates live objects mutably in ascending id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ObjectId, &mut LiveObject)> {
        self.slots.iter_mut().enumerate().filter_map(|(idx, slot)| {
            let live = slot.as_mut()?;
            Some((slot_id(idx), live))
        })
    }

    /// Releases every object, returning them in id order.
    pub fn drain(&mut self) -> Vec<(ObjectId, LiveObject)> {
        let drained: Vec<_> = self
            .slots
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, slot)| slot.take().map(|live| (slot_id(idx), live)))
            .collect();
        self.live_count = 0;
        self.lowest_free = 1;
        drained
    }

    /// Finds the lowest free id, advancing the search hint past occupied slots.
    fn lowest_free_id(&mut self) -> Option<ObjectId> {
        while self.lowest_free <= u32::from(u16::MAX) {
            let idx = self.lowest_free as usize;
            if self.slots.get(idx).map_or(true, Option::is_none) {
                #[allow(clippy::cast_possible_truncation)]
                return Some(ObjectId::new(self.lowest_free as u16));
            }
            self.lowest_free += 1;
        }
        None
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("live_count", &self.live_count)
            .field("lowest_free", &self.lowest_free)
            .finish_non_exhaustive()
    }
}

/// Slot index to id. Slots never exceed `u16::MAX + 1` entries.
#[inline]
fn slot_id(idx: usize) -> ObjectId {
    #[allow(clippy::cast_possible_truncation)]
    ObjectId::new(idx as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::tests::marker;

    #[test]
    fn test_registry_creation() {
        let registry = ObjectRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get(ObjectId::NULL).is_none());
    }

    #[test]
    fn test_lowest_free_id() {
        let mut registry = ObjectRegistry::new();

        let id1 = registry.insert(marker(), None).unwrap();
        let id2 = registry.insert(marker(), None).unwrap();
        let id3 = registry.insert(marker(), None).unwrap();
        assert_eq!((id1.get(), id2.get(), id3.get()), (1, 2, 3));

        assert!(registry.release(id2).is_some());
        assert!(!registry.contains(id2));

        // Spawn again - should reuse the released slot
        let id4 = registry.insert(marker(), None).unwrap();
        assert_eq!(id4, id2);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_requested_id() {
        let mut registry = ObjectRegistry::new();
        let id = registry.insert(marker(), Some(ObjectId::new(500))).unwrap();
        assert_eq!(id.get(), 500);

        // The gap below stays available.
        assert_eq!(registry.insert(marker(), None).unwrap().get(), 1);
    }

    #[test]
    fn test_collision_hands_object_back() {
        let mut registry = ObjectRegistry::new();
        let id = registry.insert(marker(), None).unwrap();

        let rejected = registry.insert(marker(), Some(id)).unwrap_err();
        assert_eq!(rejected.error, RegistryError::IdCollision(id));
        assert_eq!(rejected.object.kind().0, 99);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_null_id_rejected() {
        let mut registry = ObjectRegistry::new();
        let rejected = registry.insert(marker(), Some(ObjectId::NULL)).unwrap_err();
        assert_eq!(rejected.error, RegistryError::NullId);
    }

    #[test]
    fn test_exhaustion() {
        let mut registry = ObjectRegistry::new();
        for _ in 0..ObjectRegistry::CAPACITY {
            registry.insert(marker(), None).unwrap();
        }
        assert_eq!(registry.len(), ObjectRegistry::CAPACITY);

        let rejected = registry.insert(marker(), None).unwrap_err();
        assert_eq!(rejected.error, RegistryError::ExhaustedIds);

        // Releasing any id makes room again.
        registry.release(ObjectId::new(40_000));
        assert_eq!(registry.insert(marker(), None).unwrap().get(), 40_000);
    }

    #[test]
    fn test_release_unknown() {
        let mut registry = ObjectRegistry::new();
        assert!(registry.release(ObjectId::new(3)).is_none());
        assert!(registry.release(ObjectId::NULL).is_none());
    }

    #[test]
    fn test_iteration_order_and_drain() {
        let mut registry = ObjectRegistry::new();
        registry.insert(marker(), Some(ObjectId::new(9))).unwrap();
        registry.insert(marker(), None).unwrap();
        registry.insert(marker(), Some(ObjectId::new(4))).unwrap();

        let ids: Vec<u16> = registry.ids().iter().map(|id| id.get()).collect();
        assert_eq!(ids, vec![1, 4, 9]);

        let drained = registry.drain();
        assert_eq!(drained.len(), 3);
        assert!(registry.is_empty());
        assert_eq!(registry.insert(marker(), None).unwrap().get(), 1);
    }
}

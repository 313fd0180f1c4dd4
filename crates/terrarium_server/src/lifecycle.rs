//! # Object Lifecycle
//!
//! Moves objects between their two representations:
//!
//! ```text
//!            activate                      deactivate (known_by == 0)
//! Dormant ─────────────► Live ────────────────────────────────────► Dormant
//! (stored bag)            │  (active bag mirror keyed by id)
//!                         │ removed, or deactivated while observed
//!                         ▼
//!                    Retiring ──purge once known_by == 0──► Destroyed
//! ```
//!
//! The manager owns the registry and the constructor table. Regions are
//! borrowed per call, so the same manager works against any [`RegionStore`].
//!
//! Nothing here aborts a pass: a failure on one object is logged and the
//! pass moves on to the next.

use std::collections::HashSet;

use terrarium_core::{
    ActiveObject, ObjectFactory, ObjectId, ObjectRegistry, RegionCoord, WorldPoint, NODE_SIZE,
};
use terrarium_world::{ActiveRegionSet, ModLevel, RegionStore, Snapshot, MAX_STORED_SNAPSHOTS};

use crate::error::{LifecycleError, LifecycleResult};

/// Movement below which a re-persisted object does not dirty its region.
const SIGNIFICANT_MOVE: f32 = 2.0 * NODE_SIZE;

/// Tally of a clear-all run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Live objects destroyed outright.
    pub objects_removed: usize,
    /// Live objects left retiring because observers still know them.
    pub objects_deferred: usize,
    /// Regions that had snapshots and were emptied.
    pub regions_cleared: usize,
    /// Snapshots discarded from those regions.
    pub snapshots_cleared: usize,
}

/// Tally of a purge run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Retiring objects destroyed.
    pub destroyed: usize,
    /// Objects revived because their snapshot was refiled into a live region.
    pub revived: usize,
}

/// Owner of every live object.
#[derive(Debug)]
pub struct LifecycleManager {
    registry: ObjectRegistry,
    factory: ObjectFactory,
}

impl LifecycleManager {
    /// Creates a manager reviving snapshots through `factory`.
    #[must_use]
    pub fn new(factory: ObjectFactory) -> Self {
        Self {
            registry: ObjectRegistry::new(),
            factory,
        }
    }

    /// Live objects.
    #[inline]
    #[must_use]
    pub const fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Live objects, mutably.
    #[inline]
    pub fn registry_mut(&mut self) -> &mut ObjectRegistry {
        &mut self.registry
    }

    /// Constructor table used on activation.
    #[inline]
    #[must_use]
    pub const fn factory(&self) -> &ObjectFactory {
        &self.factory
    }

    /// Registers a new object under the lowest free id and mirrors it into
    /// its region, marking the region `WriteNeeded`.
    ///
    /// # Errors
    ///
    /// `Rejected` if no id is free; the instance is inside the error.
    /// `World` if the region cannot be produced and `RegionFull` if it
    /// already mirrors [`MAX_STORED_SNAPSHOTS`] objects; in both cases the
    /// instance is deleted.
    pub fn add_object(
        &mut self,
        store: &mut dyn RegionStore,
        object: Box<dyn ActiveObject>,
    ) -> LifecycleResult<ObjectId> {
        self.add_raw(store, object, None, true)
    }

    /// Like [`add_object`](Self::add_object) with a caller-chosen id.
    ///
    /// # Errors
    ///
    /// `Rejected` if the id is null or already live.
    pub fn add_object_with_id(
        &mut self,
        store: &mut dyn RegionStore,
        object: Box<dyn ActiveObject>,
        id: ObjectId,
    ) -> LifecycleResult<ObjectId> {
        self.add_raw(store, object, Some(id), true)
    }

    /// Stores an object straight into its region's dormant bag without ever
    /// registering it. The instance is dropped.
    ///
    /// # Errors
    ///
    /// Fails if the region cannot be produced or its dormant bag is full.
    pub fn add_object_as_static(
        &mut self,
        store: &mut dyn RegionStore,
        object: Box<dyn ActiveObject>,
    ) -> LifecycleResult<RegionCoord> {
        let position = object.position();
        let coord = position.region();
        let snapshot = Snapshot::new(object.kind(), position, object.serialize_state());

        let region = store.emerge(coord, true)?;
        region
            .snapshots
            .insert(None, snapshot)
            .map_err(|_| LifecycleError::RegionFull(coord))?;
        region.mark_modified(ModLevel::WriteAtUnload);

        tracing::debug!("stored object of kind {} statically in {}", object.kind(), coord);
        Ok(coord)
    }

    fn add_raw(
        &mut self,
        store: &mut dyn RegionStore,
        object: Box<dyn ActiveObject>,
        requested: Option<ObjectId>,
        set_changed: bool,
    ) -> LifecycleResult<ObjectId> {
        let position = object.position();
        let kind = object.kind();
        let coord = position.region();

        let region = match store.emerge(coord, true) {
            Ok(region) => region,
            Err(e) => {
                tracing::error!(
                    "cannot mirror object of kind {} into {}: {}; deleted",
                    kind,
                    coord,
                    e
                );
                return Err(e.into());
            }
        };
        if region.snapshots.active_len() >= MAX_STORED_SNAPSHOTS {
            tracing::error!(
                "region {} already mirrors {} objects; deleting new object of kind {}",
                coord,
                MAX_STORED_SNAPSHOTS,
                kind
            );
            return Err(LifecycleError::RegionFull(coord));
        }

        let snapshot = Snapshot::new(kind, position, object.serialize_state());
        let id = self.registry.insert(object, requested)?;
        if region.snapshots.insert(Some(id), snapshot).is_err() {
            self.registry.release(id);
            return Err(LifecycleError::RegionFull(coord));
        }
        if set_changed {
            region.mark_modified(ModLevel::WriteNeeded);
        }
        if let Some(live) = self.registry.get_mut(id) {
            live.static_region = Some(coord);
        }

        tracing::debug!("added object id={} kind={} at {}", id, kind, position);
        Ok(id)
    }

    /// Revives the dormant snapshots of a freshly live region.
    ///
    /// A bag above [`MAX_STORED_SNAPSHOTS`] is discarded whole. Snapshots
    /// that fail to revive, or that cannot be registered, go back into the
    /// bag unchanged. The region is not marked modified.
    ///
    /// Returns the number of objects brought to life.
    ///
    /// # Errors
    ///
    /// Fails only if the region itself cannot be produced.
    pub fn activate_objects(
        &mut self,
        store: &mut dyn RegionStore,
        coord: RegionCoord,
    ) -> LifecycleResult<usize> {
        let region = store.emerge(coord, false)?;
        let stored_len = region.snapshots.stored_len();
        if stored_len == 0 {
            return Ok(0);
        }
        if stored_len > MAX_STORED_SNAPSHOTS {
            tracing::error!(
                "suspiciously many objects in {}: {}; discarding all of them",
                coord,
                stored_len
            );
            region.snapshots.take_stored();
            region.mark_modified(ModLevel::WriteNeeded);
            return Ok(0);
        }

        tracing::debug!("activating {} objects in {}", stored_len, coord);
        let pending = region.snapshots.take_stored();
        let mut requeue = Vec::new();
        let mut activated = 0;

        for snapshot in pending {
            let object = match self
                .factory
                .deserialize(snapshot.kind, snapshot.position, &snapshot.state)
            {
                Ok(object) => object,
                Err(e) => {
                    tracing::error!(
                        "cannot revive object of kind {} in {}: {}",
                        snapshot.kind,
                        coord,
                        e
                    );
                    tracing::trace!("state:\n{}", hexdump(&snapshot.state));
                    requeue.push(snapshot);
                    continue;
                }
            };
            match self.add_raw(store, object, None, false) {
                Ok(_) => activated += 1,
                Err(e) => {
                    tracing::error!("cannot register revived object from {}: {}", coord, e);
                    requeue.push(snapshot);
                }
            }
        }

        if !requeue.is_empty() {
            let region = store.emerge(coord, false)?;
            for snapshot in requeue {
                if let Err(lost) = region.snapshots.insert(None, snapshot) {
                    tracing::error!("dormant bag of {} overflowed; dropped kind {}", coord, lost.kind);
                }
            }
        }
        Ok(activated)
    }

    /// Persists every live object standing outside the live set.
    ///
    /// Objects known to observers are mirrored under their id and left
    /// retiring; the rest are filed as dormant and destroyed. With `force`
    /// everything outside the live set goes, observed or not, including
    /// objects already retiring.
    ///
    /// Returns the number of objects persisted.
    pub fn deactivate_far_objects(
        &mut self,
        store: &mut dyn RegionStore,
        live: &ActiveRegionSet,
        force: bool,
    ) -> usize {
        let mut persisted = 0;

        for id in self.registry.ids() {
            let Some(obj) = self.registry.get_mut(id) else {
                continue;
            };
            if obj.pending_deactivation && !force {
                continue;
            }
            if obj.removed {
                // Removed objects leave no trace; purge handles them.
                if force {
                    if let Some(old) = obj.static_region.take() {
                        if let Some(region) = store.get_mut(old) {
                            region.snapshots.remove_active(id);
                            region.mark_modified(ModLevel::WriteNeeded);
                        }
                    }
                    self.registry.release(id);
                }
                continue;
            }

            let position = obj.object().position();
            let target = position.region();
            if live.contains(target) {
                continue;
            }

            let pending = obj.known_by_count > 0 && !force;
            let snapshot = Snapshot::new(
                obj.object().kind(),
                position,
                obj.object().serialize_state(),
            );

            if let Err(e) = store.emerge(target, true).map(|_| ()) {
                if !force {
                    tracing::error!("cannot store object {} in {}: {}; kept live", id, target, e);
                    continue;
                }
                tracing::error!("cannot store object {} in {}: {}; deleted", id, target, e);
                if let Some(old) = obj.static_region.take() {
                    if let Some(region) = store.get_mut(old) {
                        region.snapshots.remove_active(id);
                        region.mark_modified(ModLevel::WriteNeeded);
                    }
                }
                self.registry.release(id);
                continue;
            }

            let mut changed = true;
            if let Some(old) = obj.static_region.take() {
                let stays = old == target;
                match store.get_mut(old) {
                    Some(region) => {
                        match region.snapshots.remove_active(id) {
                            Some(prev) => {
                                changed = prev.state != snapshot.state
                                    || (prev.position - position).length() >= SIGNIFICANT_MOVE;
                            }
                            None => tracing::error!(
                                "object {} claims a mirror in {} but none exists",
                                id,
                                old
                            ),
                        }
                        if !stays || changed {
                            region.mark_modified(ModLevel::WriteNeeded);
                        }
                    }
                    None => tracing::error!("region {} holding object {} is not loaded", old, id),
                }
                changed = !stays || changed;
            }

            let Some(region) = store.get_mut(target) else {
                continue;
            };
            let key = pending.then_some(id);
            let overflow = region.snapshots.is_full_for(key);
            if overflow {
                tracing::error!(
                    "region {} already holds {} objects; force-deleting object {}",
                    target,
                    MAX_STORED_SNAPSHOTS,
                    id
                );
            } else if region.snapshots.insert(key, snapshot).is_ok() {
                if changed {
                    region.mark_modified(ModLevel::WriteNeeded);
                }
                persisted += 1;
                if pending {
                    obj.static_region = Some(target);
                }
            }

            if pending && !overflow {
                tracing::debug!("object {} is known by observers; deactivation deferred", id);
                obj.pending_deactivation = true;
                continue;
            }

            tracing::debug!("deactivated object {} into {}", id, target);
            self.registry.release(id);
        }

        persisted
    }

    /// Destroys retiring objects no observer knows any more.
    ///
    /// Removed objects lose their mirror immediately, even while observed.
    /// Objects retiring after deactivation keep theirs, refiled as dormant;
    /// if that region is in `live` by now, it is revived on the spot.
    pub fn remove_removed_objects(
        &mut self,
        store: &mut dyn RegionStore,
        live: &ActiveRegionSet,
    ) -> PurgeReport {
        let mut report = PurgeReport::default();
        let mut refiled = Vec::new();

        for id in self.registry.ids() {
            let Some(obj) = self.registry.get_mut(id) else {
                continue;
            };
            if !obj.is_retiring() {
                continue;
            }

            if obj.removed {
                if let Some(coord) = obj.static_region {
                    if let Some(region) = store.get_mut(coord) {
                        region.snapshots.remove_active(id);
                        region.mark_modified(ModLevel::WriteNeeded);
                        obj.static_region = None;
                    }
                }
            }

            if !obj.is_purgeable() {
                continue;
            }

            if let Some(coord) = obj.static_region.take() {
                match store.get_mut(coord) {
                    Some(region) => {
                        if let Some(snapshot) = region.snapshots.remove_active(id) {
                            if let Err(lost) = region.snapshots.insert(None, snapshot) {
                                tracing::error!(
                                    "dormant bag of {} is full; object {} of kind {} lost",
                                    coord,
                                    id,
                                    lost.kind
                                );
                            }
                            region.mark_modified(ModLevel::WriteAtUnload);
                            if live.contains(coord) {
                                refiled.push(coord);
                            }
                        }
                    }
                    None => tracing::error!("region {} holding object {} is not loaded", coord, id),
                }
            }

            self.registry.release(id);
            report.destroyed += 1;
        }

        refiled.sort_unstable();
        refiled.dedup();
        for coord in refiled {
            match self.activate_objects(store, coord) {
                Ok(count) => report.revived += count,
                Err(e) => tracing::error!("reviving refiled objects in {} failed: {}", coord, e),
            }
        }

        if report.destroyed > 0 {
            tracing::debug!(
                "purged {} objects, revived {}; {} live",
                report.destroyed,
                report.revived,
                self.registry.len()
            );
        }
        report
    }

    /// Deletes every object in the world, live or dormant.
    ///
    /// Observed objects are marked removed and left for the purge pass.
    ///
    /// # Errors
    ///
    /// Fails if persisted regions cannot be listed. Individual regions that
    /// fail to load are skipped with a warning.
    pub fn clear_all_objects(&mut self, store: &mut dyn RegionStore) -> LifecycleResult<ClearReport> {
        tracing::info!("removing all objects");
        let mut report = ClearReport::default();

        for id in self.registry.ids() {
            let Some(obj) = self.registry.get_mut(id) else {
                continue;
            };
            if let Some(coord) = obj.static_region.take() {
                if let Some(region) = store.get_mut(coord) {
                    region.snapshots.remove_active(id);
                    region.mark_modified(ModLevel::WriteNeeded);
                }
            }
            if obj.known_by_count > 0 {
                obj.removed = true;
                obj.pending_deactivation = true;
                report.objects_deferred += 1;
                continue;
            }
            self.registry.release(id);
            report.objects_removed += 1;
        }

        let coords = store.loadable()?;
        let total = coords.len();
        for (done, coord) in coords.into_iter().enumerate() {
            let region = match store.emerge(coord, false) {
                Ok(region) => region,
                Err(e) => {
                    tracing::warn!("skipping region {} while clearing: {}", coord, e);
                    continue;
                }
            };
            let count = region.snapshots.stored_len() + region.snapshots.active_len();
            if count > 0 {
                region.snapshots.clear();
                region.mark_modified(ModLevel::WriteNeeded);
                report.regions_cleared += 1;
                report.snapshots_cleared += count;
            }
            if (done + 1) % 1000 == 0 {
                tracing::info!("cleared objects in {}/{} regions", done + 1, total);
            }
        }

        tracing::info!(
            "removed {} live objects ({} deferred) and {} stored objects in {} regions",
            report.objects_removed,
            report.objects_deferred,
            report.snapshots_cleared,
            report.regions_cleared
        );
        Ok(report)
    }

    /// Applies an observer count change.
    ///
    /// # Errors
    ///
    /// `UnknownObject` if nothing is live under `id`.
    pub fn apply_known_by_delta(&mut self, id: ObjectId, delta: i32) -> LifecycleResult<u16> {
        let obj = self
            .registry
            .get_mut(id)
            .ok_or(LifecycleError::UnknownObject(id))?;
        Ok(obj.apply_known_by_delta(delta))
    }

    /// Live, non-removed objects within `radius` of `pos` that are not in
    /// `current`, in ascending id order.
    #[must_use]
    pub fn added_objects_near(
        &self,
        pos: WorldPoint,
        radius: f32,
        current: &HashSet<ObjectId>,
    ) -> Vec<ObjectId> {
        self.registry
            .iter()
            .filter(|(id, obj)| {
                !obj.removed
                    && obj.object().position().distance(pos) <= radius
                    && !current.contains(id)
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Ids in `current` an observer at `pos` should forget: gone, removed,
    /// or no longer within `radius`.
    #[must_use]
    pub fn removed_objects_near(
        &self,
        pos: WorldPoint,
        radius: f32,
        current: &HashSet<ObjectId>,
    ) -> Vec<ObjectId> {
        let mut gone: Vec<ObjectId> = current
            .iter()
            .copied()
            .filter(|id| match self.registry.get(*id) {
                None => {
                    tracing::info!("observer holds id {} with no live object", id);
                    true
                }
                Some(obj) => obj.removed || obj.object().position().distance(pos) >= radius,
            })
            .collect();
        gone.sort_unstable();
        gone
    }
}

/// 16 bytes per line, hex then printable ASCII.
fn hexdump(data: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    for line in data.chunks(16) {
        for i in 0..16 {
            match line.get(i) {
                Some(b) => {
                    let _ = write!(out, "{b:02x} ");
                }
                None => out.push_str("   "),
            }
        }
        out.push(' ');
        out.extend(line.iter().map(|&b| if b.is_ascii_graphic() || b == b' ' { char::from(b) } else { '.' }));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrarium_core::{ObjectKind, ObjectResult, StepOutcome};
    use terrarium_world::MemoryRegionStore;

    struct Pebble {
        position: WorldPoint,
        weight: u8,
    }

    impl ActiveObject for Pebble {
        fn kind(&self) -> ObjectKind {
            ObjectKind(7)
        }

        fn position(&self) -> WorldPoint {
            self.position
        }

        fn serialize_state(&self) -> Vec<u8> {
            vec![self.weight]
        }

        fn step(&mut self, _dtime: f32, _send_recommended: bool) -> ObjectResult<StepOutcome> {
            Ok(StepOutcome::Continue)
        }
    }

    fn build_pebble(position: WorldPoint, state: &[u8]) -> ObjectResult<Box<dyn ActiveObject>> {
        match state {
            [weight] => Ok(Box::new(Pebble {
                position,
                weight: *weight,
            })),
            _ => Err(terrarium_core::ObjectError::Malformed {
                kind: ObjectKind(7),
                reason: "expected one byte".to_string(),
            }),
        }
    }

    fn manager() -> LifecycleManager {
        let mut factory = ObjectFactory::new();
        factory.register(ObjectKind(7), build_pebble);
        LifecycleManager::new(factory)
    }

    fn pebble(x: f32, weight: u8) -> Box<dyn ActiveObject> {
        Box::new(Pebble {
            position: WorldPoint::new(x, 5.0, 5.0),
            weight,
        })
    }

    fn origin() -> RegionCoord {
        RegionCoord::new(0, 0, 0)
    }

    #[test]
    fn test_add_object_mirrors_into_region() {
        let mut store = MemoryRegionStore::new();
        let mut lifecycle = manager();

        let id = lifecycle.add_object(&mut store, pebble(5.0, 3)).unwrap();
        let region = store.get(origin()).unwrap();
        assert_eq!(region.snapshots.active(id).unwrap().state, vec![3]);
        assert_eq!(region.mod_level(), ModLevel::WriteNeeded);
        assert_eq!(
            lifecycle.registry().get(id).unwrap().static_region,
            Some(origin())
        );
    }

    #[test]
    fn test_add_object_with_taken_id_hands_back_instance() {
        let mut store = MemoryRegionStore::new();
        let mut lifecycle = manager();
        let id = lifecycle.add_object(&mut store, pebble(5.0, 1)).unwrap();

        match lifecycle.add_object_with_id(&mut store, pebble(5.0, 2), id) {
            Err(LifecycleError::Rejected(rejected)) => {
                assert_eq!(rejected.object.serialize_state(), vec![2]);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(lifecycle.registry().len(), 1);
    }

    #[test]
    fn test_add_object_as_static() {
        let mut store = MemoryRegionStore::new();
        let mut lifecycle = manager();

        let coord = lifecycle.add_object_as_static(&mut store, pebble(5.0, 4)).unwrap();
        assert_eq!(coord, origin());
        assert!(lifecycle.registry().is_empty());

        let region = store.get(origin()).unwrap();
        assert_eq!(region.snapshots.stored_len(), 1);
        assert_eq!(region.mod_level(), ModLevel::WriteAtUnload);
    }

    #[test]
    fn test_activation_does_not_dirty_region() {
        let mut store = MemoryRegionStore::new();
        let mut lifecycle = manager();
        lifecycle.add_object_as_static(&mut store, pebble(5.0, 4)).unwrap();
        store.get_mut(origin()).unwrap().mark_clean();

        assert_eq!(lifecycle.activate_objects(&mut store, origin()).unwrap(), 1);
        let region = store.get(origin()).unwrap();
        assert_eq!(region.snapshots.stored_len(), 0);
        assert_eq!(region.snapshots.active_len(), 1);
        assert_eq!(region.mod_level(), ModLevel::Clean);
    }

    #[test]
    fn test_activation_discards_runaway_bag() {
        let mut store = MemoryRegionStore::new();
        let mut lifecycle = manager();
        let region = store.emerge(origin(), true).unwrap();
        for _ in 0..MAX_STORED_SNAPSHOTS {
            region
                .snapshots
                .insert(None, Snapshot::new(ObjectKind(7), WorldPoint::ZERO, vec![1]))
                .unwrap();
        }
        // Decoded data is not bounded by insert; force one past the ceiling.
        let mut bytes = region.snapshots.encode();
        bytes[1] = 50;
        bytes.extend_from_slice(&[0, 0, 7, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 1]);
        region.snapshots = terrarium_world::SnapshotList::decode(&bytes).unwrap();
        assert_eq!(region.snapshots.stored_len(), 50);

        assert_eq!(lifecycle.activate_objects(&mut store, origin()).unwrap(), 0);
        let region = store.get(origin()).unwrap();
        assert_eq!(region.snapshots.stored_len(), 0);
        assert_eq!(region.mod_level(), ModLevel::WriteNeeded);
        assert!(lifecycle.registry().is_empty());
    }

    #[test]
    fn test_small_move_does_not_dirty_region() {
        let mut store = MemoryRegionStore::new();
        let mut lifecycle = manager();
        lifecycle.add_object_as_static(&mut store, pebble(5.0, 4)).unwrap();
        lifecycle.activate_objects(&mut store, origin()).unwrap();
        store.get_mut(origin()).unwrap().mark_clean();

        let live = ActiveRegionSet::new();
        assert_eq!(lifecycle.deactivate_far_objects(&mut store, &live, false), 1);
        let region = store.get(origin()).unwrap();
        assert_eq!(region.snapshots.stored_len(), 1);
        assert_eq!(region.mod_level(), ModLevel::Clean);
    }

    #[test]
    fn test_objects_in_live_regions_stay() {
        let mut store = MemoryRegionStore::new();
        let mut lifecycle = manager();
        lifecycle.add_object(&mut store, pebble(5.0, 1)).unwrap();

        let mut live = ActiveRegionSet::new();
        live.recompute([WorldPoint::new(5.0, 5.0, 5.0)], 0);
        assert_eq!(lifecycle.deactivate_far_objects(&mut store, &live, false), 0);
        assert_eq!(lifecycle.registry().len(), 1);
    }

    #[test]
    fn test_removed_object_leaves_no_trace() {
        let mut store = MemoryRegionStore::new();
        let mut lifecycle = manager();
        let id = lifecycle.add_object(&mut store, pebble(5.0, 1)).unwrap();
        lifecycle.registry_mut().get_mut(id).unwrap().removed = true;

        // Far away, but removed: not persisted.
        let live = ActiveRegionSet::new();
        assert_eq!(lifecycle.deactivate_far_objects(&mut store, &live, false), 0);

        assert_eq!(lifecycle.remove_removed_objects(&mut store, &live).destroyed, 1);
        assert!(store.get(origin()).unwrap().snapshots.is_empty());
        assert!(lifecycle.registry().is_empty());
    }

    #[test]
    fn test_purge_skips_observed_objects() {
        let mut store = MemoryRegionStore::new();
        let mut lifecycle = manager();
        let live = ActiveRegionSet::new();
        let id = lifecycle.add_object(&mut store, pebble(5.0, 1)).unwrap();
        let obj = lifecycle.registry_mut().get_mut(id).unwrap();
        obj.removed = true;
        obj.known_by_count = 1;

        assert_eq!(lifecycle.remove_removed_objects(&mut store, &live), PurgeReport::default());
        assert!(store.get(origin()).unwrap().snapshots.is_empty());
        assert!(lifecycle.registry().get(id).is_some());

        lifecycle.apply_known_by_delta(id, -1).unwrap();
        assert_eq!(lifecycle.remove_removed_objects(&mut store, &live).destroyed, 1);
        assert!(lifecycle.registry().is_empty());
    }

    #[test]
    fn test_observer_queries() {
        let mut store = MemoryRegionStore::new();
        let mut lifecycle = manager();
        let near = lifecycle.add_object(&mut store, pebble(5.0, 1)).unwrap();
        let far = lifecycle.add_object(&mut store, pebble(150.0, 1)).unwrap();
        let eye = WorldPoint::new(0.0, 5.0, 5.0);

        let mut current = HashSet::new();
        assert_eq!(lifecycle.added_objects_near(eye, 50.0, &current), vec![near]);

        current.insert(near);
        current.insert(far);
        current.insert(ObjectId::new(999));
        assert!(lifecycle.added_objects_near(eye, 50.0, &current).is_empty());
        assert_eq!(
            lifecycle.removed_objects_near(eye, 50.0, &current),
            vec![far, ObjectId::new(999)]
        );

        lifecycle.registry_mut().get_mut(near).unwrap().removed = true;
        assert_eq!(
            lifecycle.removed_objects_near(eye, 500.0, &current),
            vec![near, ObjectId::new(999)]
        );
    }

    #[test]
    fn test_known_by_delta_on_unknown_id() {
        let mut lifecycle = manager();
        assert!(matches!(
            lifecycle.apply_known_by_delta(ObjectId::new(3), 1),
            Err(LifecycleError::UnknownObject(_))
        ));
    }

    #[test]
    fn test_hexdump_layout() {
        let dump = hexdump(b"ab\x01");
        assert!(dump.starts_with("61 62 01 "));
        assert!(dump.trim_end().ends_with("ab."));
    }
}

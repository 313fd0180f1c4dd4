//! # Active Region Set
//!
//! Which regions are simulated right now. Rebuilt wholesale from anchor
//! positions on every recompute, then diffed against the previous set.
//!
//! ```text
//! anchors --(region, cube of radius)--> union --(diff vs previous)--> RegionDelta
//! ```

use std::collections::HashSet;

use terrarium_core::{RegionCoord, WorldPoint};

/// Regions that entered and left the live set in one recompute.
///
/// Iteration order of either set is unspecified.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionDelta {
    /// Live now, not live before.
    pub added: HashSet<RegionCoord>,
    /// Live before, not live now.
    pub removed: HashSet<RegionCoord>,
}

impl RegionDelta {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// The set of live regions.
#[derive(Clone, Debug, Default)]
pub struct ActiveRegionSet {
    live: HashSet<RegionCoord>,
}

impl ActiveRegionSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the live set with every region within Chebyshev distance
    /// `radius` of some anchor's region, and reports the difference.
    ///
    /// A radius of 0 (or less) still covers each anchor's own region.
    pub fn recompute<I>(&mut self, anchors: I, radius: i16) -> RegionDelta
    where
        I: IntoIterator<Item = WorldPoint>,
    {
        let centres: HashSet<RegionCoord> = anchors.into_iter().map(WorldPoint::region).collect();
        let next: HashSet<RegionCoord> = centres
            .iter()
            .flat_map(|centre| centre.cube(radius))
            .collect();

        let added = next.difference(&self.live).copied().collect();
        let removed = self.live.difference(&next).copied().collect();
        self.live = next;

        RegionDelta { added, removed }
    }

    /// Whether `coord` is live.
    #[inline]
    #[must_use]
    pub fn contains(&self, coord: RegionCoord) -> bool {
        self.live.contains(&coord)
    }

    /// Number of live regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no region is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Iterates live regions in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = RegionCoord> + '_ {
        self.live.iter().copied()
    }

    /// Drops a single region so the next recompute reports it as added again.
    pub fn forget(&mut self, coord: RegionCoord) -> bool {
        self.live.remove(&coord)
    }

    /// Empties the set, returning what was live.
    pub fn clear(&mut self) -> HashSet<RegionCoord> {
        std::mem::take(&mut self.live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrarium_core::{NODE_SIZE, REGION_SIZE};

    /// World point at the centre-ish of region (rx, ry, rz).
    #[allow(clippy::cast_precision_loss)]
    fn in_region(rx: i32, ry: i32, rz: i32) -> WorldPoint {
        let scale = REGION_SIZE as f32 * NODE_SIZE;
        WorldPoint::new(
            rx as f32 * scale + 5.0 * NODE_SIZE,
            ry as f32 * scale + 5.0 * NODE_SIZE,
            rz as f32 * scale + 5.0 * NODE_SIZE,
        )
    }

    #[test]
    fn test_radius_zero_is_own_region() {
        let mut set = ActiveRegionSet::new();
        let delta = set.recompute([in_region(4, -1, 2)], 0);
        assert_eq!(delta.added.len(), 1);
        assert!(set.contains(RegionCoord::new(4, -1, 2)));
    }

    #[test]
    fn test_duplicate_anchors_share_regions() {
        let mut set = ActiveRegionSet::new();
        set.recompute([in_region(0, 0, 0), in_region(0, 0, 0)], 1);
        assert_eq!(set.len(), 27);
    }

    #[test]
    fn test_second_anchor_adds_only_new_regions() {
        let mut set = ActiveRegionSet::new();
        let first = set.recompute([in_region(0, 0, 0)], 1);
        assert_eq!(first.added.len(), 27);
        assert!(first.removed.is_empty());

        let far = RegionCoord::new(10, 10, 10);
        let delta = set.recompute([in_region(0, 0, 0), in_region(10, 10, 10)], 1);
        let expected: HashSet<_> = far.cube(1).collect();
        assert_eq!(delta.added, expected);
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn test_overlapping_anchor_adds_difference() {
        let mut set = ActiveRegionSet::new();
        set.recompute([in_region(0, 0, 0)], 1);
        let delta = set.recompute([in_region(0, 0, 0), in_region(1, 0, 0)], 1);
        // Only the x = 2 slab is new.
        assert_eq!(delta.added.len(), 9);
        assert!(delta.added.iter().all(|c| c.x == 2));
    }

    #[test]
    fn test_moving_anchor_reports_removed() {
        let mut set = ActiveRegionSet::new();
        set.recompute([in_region(0, 0, 0)], 0);
        let delta = set.recompute([in_region(5, 0, 0)], 0);
        assert_eq!(
            delta.removed.into_iter().collect::<Vec<_>>(),
            vec![RegionCoord::new(0, 0, 0)]
        );
        assert!(!set.contains(RegionCoord::new(0, 0, 0)));
    }

    #[test]
    fn test_forgotten_region_is_added_again() {
        let mut set = ActiveRegionSet::new();
        set.recompute([in_region(0, 0, 0)], 0);
        assert!(set.forget(RegionCoord::new(0, 0, 0)));
        assert!(!set.forget(RegionCoord::new(0, 0, 0)));

        let delta = set.recompute([in_region(0, 0, 0)], 0);
        assert_eq!(delta.added.len(), 1);
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn test_no_anchors_clears_everything() {
        let mut set = ActiveRegionSet::new();
        set.recompute([in_region(0, 0, 0)], 1);
        let delta = set.recompute(std::iter::empty(), 1);
        assert_eq!(delta.removed.len(), 27);
        assert!(set.is_empty());

        set.recompute([in_region(0, 0, 0)], 0);
        assert_eq!(set.clear().len(), 1);
        assert!(set.is_empty());
    }
}

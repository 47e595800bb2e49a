//! Live ranges currently holding a register.
//!
//! The active set of a storage class never holds more live ranges than the class has registers,
//! so it is a short vector kept sorted by ascending end position. Expiry then only has to look at
//! a prefix, and the range occupying its register the longest is always at the back.

use crate::entity::PrimaryMap;
use crate::regalloc::liverange::{LiveRange, LiveRangeId, OrderNr};
use smallvec::SmallVec;

/// Live ranges holding a register, sorted by last reference.
#[derive(Default)]
pub struct ActiveSet {
    ranges: SmallVec<[LiveRangeId; 16]>,
}

impl ActiveSet {
    /// Create an empty active set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all live ranges.
    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Is the set empty?
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The active live ranges by ascending end position.
    pub fn iter(&self) -> impl Iterator<Item = LiveRangeId> + '_ {
        self.ranges.iter().copied()
    }

    /// Add `id`, keeping the set sorted by end position.
    ///
    /// A new range goes after existing ranges ending at the same position.
    pub fn insert(&mut self, id: LiveRangeId, ranges: &PrimaryMap<LiveRangeId, LiveRange>) {
        let end = ranges[id].last_ref();
        let pos = self
            .ranges
            .iter()
            .rposition(|&other| ranges[other].last_ref() <= end)
            .map_or(0, |i| i + 1);
        self.ranges.insert(pos, id);
    }

    /// Remove and return every live range whose last reference is at or before `pos`.
    pub fn expire(
        &mut self,
        pos: OrderNr,
        ranges: &PrimaryMap<LiveRangeId, LiveRange>,
    ) -> SmallVec<[LiveRangeId; 16]> {
        let n = self
            .ranges
            .iter()
            .take_while(|&&id| ranges[id].last_ref() <= pos)
            .count();
        self.ranges.drain(..n).collect()
    }

    /// Remove `id` from the set.
    ///
    /// Panics if `id` isn't active.
    pub fn remove(&mut self, id: LiveRangeId) {
        match self.ranges.iter().position(|&other| other == id) {
            Some(i) => {
                self.ranges.remove(i);
            }
            None => panic!("{id} is not in the active set"),
        }
    }

    /// The best candidate for spilling: the active range ending last.
    ///
    /// Synthetic ranges are never candidates. They are the result of a spill already and can't
    /// be split any further.
    pub fn victim(&self, ranges: &PrimaryMap<LiveRangeId, LiveRange>) -> Option<LiveRangeId> {
        self.ranges
            .iter()
            .rev()
            .copied()
            .find(|&id| !ranges[id].is_synthetic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;
    use crate::ir::{Edit, Node};
    use crate::isa::StorageClass;
    use crate::regalloc::liverange::{SyntheticEnd, ValueRef};

    fn ranges(extents: &[(usize, usize)]) -> PrimaryMap<LiveRangeId, LiveRange> {
        let mut map = PrimaryMap::new();
        for (i, &(def, last)) in extents.iter().enumerate() {
            let mut lr = LiveRange::new(Node::new(i), StorageClass::Gpr);
            lr.push_ref(ValueRef::new(def, 0));
            if last > def {
                lr.push_ref(ValueRef::new(last, 1));
            }
            map.push(lr);
        }
        map
    }

    fn ids(set: &ActiveSet) -> Vec<usize> {
        set.iter().map(|id| id.index()).collect()
    }

    #[test]
    fn sorted_insert() {
        let map = ranges(&[(0, 5), (1, 3), (2, 9), (3, 3), (4, 5)]);
        let mut set = ActiveSet::new();
        for id in map.keys() {
            set.insert(id, &map);
        }
        assert_eq!(ids(&set), [1, 3, 0, 4, 2]);
    }

    #[test]
    fn expire_prefix() {
        let map = ranges(&[(0, 5), (1, 3), (2, 9)]);
        let mut set = ActiveSet::new();
        for id in map.keys() {
            set.insert(id, &map);
        }
        assert!(set.expire(4, &map).is_empty());
        let gone: Vec<_> = set.expire(10, &map).iter().map(|id| id.index()).collect();
        assert_eq!(gone, [1, 0]);
        assert_eq!(ids(&set), [2]);
        assert_eq!(set.expire(OrderNr::MAX, &map).len(), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn victim_skips_synthetic() {
        let mut map = ranges(&[(0, 5), (1, 8), (2, 3)]);
        let mut set = ActiveSet::new();
        for id in map.keys() {
            set.insert(id, &map);
        }
        assert_eq!(set.victim(&map), Some(LiveRangeId::new(1)));

        map[LiveRangeId::new(1)].set_synthetic(SyntheticEnd::Load, Edit::new(0), 1);
        assert_eq!(set.victim(&map), Some(LiveRangeId::new(0)));

        set.remove(LiveRangeId::new(0));
        set.remove(LiveRangeId::new(2));
        assert_eq!(set.victim(&map), None);
        assert_eq!(set.iter().count(), 1);
    }

    #[test]
    #[should_panic(expected = "not in the active set")]
    fn remove_missing() {
        let mut set = ActiveSet::new();
        set.remove(LiveRangeId::new(3));
    }
}

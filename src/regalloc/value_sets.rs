//! Disjoint sets of aliasing values.
//!
//! Copies, sequences and conditional selects don't compute anything new; the node they define is
//! just another name for an existing value. `ValueSets` tracks which nodes name the same value and
//! maps every set to the live range holding its references.
//!
//! Every node has an entry in an arena indexed by `Node`. An entry points at its parent in the
//! set; the root of a set points at itself and owns the live range. The root is always the member
//! whose live range starts first, which keeps the scheduling order of the surviving range intact.

use crate::entity::packed_option::PackedOption;
use crate::entity::{PrimaryMap, SecondaryMap};
use crate::ir::Node;
use crate::regalloc::liverange::{LiveRange, LiveRangeId};

#[derive(Clone, Copy, Default)]
struct ValueSet {
    /// Parent in the set, or `None` for nodes that haven't been seen yet.
    parent: PackedOption<Node>,
    /// The live range of the set. Only meaningful for roots.
    range: PackedOption<LiveRangeId>,
}

/// Disjoint sets of aliasing nodes.
pub struct ValueSets {
    sets: SecondaryMap<Node, ValueSet>,
}

impl ValueSets {
    /// Create an empty collection of sets.
    pub fn new() -> Self {
        Self {
            sets: SecondaryMap::new(),
        }
    }

    /// Forget all sets.
    pub fn clear(&mut self) {
        self.sets.clear();
    }

    /// Make `node` the root of a new set owning the live range `range`.
    pub fn define(&mut self, node: Node, range: LiveRangeId) {
        self.sets[node] = ValueSet {
            parent: node.into(),
            range: range.into(),
        };
    }

    /// Make `node` an alias of `target`.
    pub fn alias(&mut self, node: Node, target: Node) {
        debug_assert_ne!(node, target);
        self.sets[node].parent = target.into();
    }

    /// Find the root of the set containing `node`.
    ///
    /// Returns `None` if `node` was never defined or aliased to a defined node.
    pub fn find(&self, mut node: Node) -> Option<Node> {
        loop {
            let parent = self.sets[node].parent.expand()?;
            if parent == node {
                return Some(node);
            }
            node = parent;
        }
    }

    /// Find the live range holding the references of `node`.
    pub fn range(&self, node: Node) -> Option<LiveRangeId> {
        self.find(node).and_then(|root| self.sets[root].range.expand())
    }

    /// Merge the sets containing `a` and `b`, and their live ranges.
    ///
    /// The set whose live range starts first becomes the root, and the other range is left empty.
    /// Returns the root of the merged set.
    pub fn union(
        &mut self,
        ranges: &mut PrimaryMap<LiveRangeId, LiveRange>,
        a: Node,
        b: Node,
    ) -> Option<Node> {
        let mut a = self.find(a)?;
        let mut b = self.find(b)?;
        if a == b {
            // Secretly the same set already. This happens with nested copies and selects.
            return Some(a);
        }
        let (mut ra, mut rb) = (self.root_range(a), self.root_range(b));
        if ranges[rb].first_ref() < ranges[ra].first_ref() {
            core::mem::swap(&mut a, &mut b);
            core::mem::swap(&mut ra, &mut rb);
        }
        self.sets[b].parent = a.into();

        let class = ranges[rb].class;
        let mut other = core::mem::replace(&mut ranges[rb], LiveRange::new(b, class));
        ranges[ra].merge(&mut other);
        ranges[rb] = other;
        Some(a)
    }

    fn root_range(&self, root: Node) -> LiveRangeId {
        self.sets[root]
            .range
            .expand()
            .expect("root of a value set without a live range")
    }
}

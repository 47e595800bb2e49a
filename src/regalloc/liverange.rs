//! Live ranges of values in a tile list.
//!
//! A live range is the ordered list of references to one value: the tile that defines it and
//! every tile that uses it. Values that alias each other through copies and selects share a
//! single live range.
//!
//! # Program positions
//!
//! References are compared on a number line where tile `t` sits at position `2t`. The odd
//! positions in between are used by the endpoints of synthetic live ranges created by spilling: a
//! reload inserted before tile `t` starts at `2t - 1`, and a store inserted after tile `t` ends at
//! `2t + 1`. This keeps the reload ordered strictly before any value defined by tile `t`, and the
//! store strictly after anything tile `t` reads, so the two never expire before their tile runs.
//!
//! A live range ending at position `p` doesn't interfere with one starting at `p`: a tile may
//! reuse the register of an operand it reads for the value it writes.

use crate::entity::entity_impl;
use crate::ir::{Allocation, Edit, Node, SpillSlot};
use crate::isa::{RegUnit, StorageClass};
use core::fmt;
use smallvec::SmallVec;

/// A position on the doubled program order number line.
pub type OrderNr = i64;

/// The position of tile `tile`.
pub fn order_nr(tile: usize) -> OrderNr {
    tile as OrderNr * 2
}

/// An opaque reference to a live range.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LiveRangeId(u32);
entity_impl!(LiveRangeId, "lr");

/// A reference to a value from one operand slot of one tile.
///
/// References order by tile position, then slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ValueRef {
    /// Position of the tile in the original list.
    pub tile: usize,
    /// Operand slot. Slot 0 is the definition.
    pub slot: usize,
}

impl ValueRef {
    /// Create a reference to `slot` of the tile at `tile`.
    pub fn new(tile: usize, slot: usize) -> Self {
        Self { tile, slot }
    }

    /// Is this the definition of the value?
    pub fn is_definition(self) -> bool {
        self.slot == 0
    }

    /// Position of the reference on the doubled number line.
    pub fn order(self) -> OrderNr {
        order_nr(self.tile)
    }
}

impl fmt::Display for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.tile, self.slot)
    }
}

/// Which end of a live range a synthetic tile is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyntheticEnd {
    /// A reload inserted before the first reference.
    Load = 0,
    /// A store inserted after the last reference.
    Store = 1,
}

/// A synthetic tile attached to a live range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Synthetic {
    /// The pending insertion holding the tile.
    pub edit: Edit,
    /// Position of the original tile it is attached to.
    pub tile: usize,
}

/// The references to one value, and where the allocator put it.
#[derive(Clone, Debug)]
pub struct LiveRange {
    /// The node defining this value.
    pub node: Node,

    /// Storage class of the value.
    pub class: StorageClass,

    /// A register the definition is pinned to.
    pub requirement: Option<RegUnit>,

    /// The assigned register, or the spill slot once the range has been spilled.
    pub alloc: Option<Allocation>,

    /// References in program order.
    refs: SmallVec<[ValueRef; 4]>,

    /// Synthetic tiles, indexed by `SyntheticEnd`.
    synthetic: [Option<Synthetic>; 2],
}

impl LiveRange {
    /// Create an empty live range for `node`.
    pub fn new(node: Node, class: StorageClass) -> Self {
        Self {
            node,
            class,
            requirement: None,
            alloc: None,
            refs: SmallVec::new(),
            synthetic: [None, None],
        }
    }

    /// The references in program order.
    pub fn refs(&self) -> &[ValueRef] {
        &self.refs
    }

    /// The synthetic tile attached at `end`.
    pub fn synthetic(&self, end: SyntheticEnd) -> Option<Synthetic> {
        self.synthetic[end as usize]
    }

    /// Attach the synthetic tile in `edit`, which belongs to the tile at `tile`.
    pub fn set_synthetic(&mut self, end: SyntheticEnd, edit: Edit, tile: usize) {
        debug_assert!(self.synthetic[end as usize].is_none());
        self.synthetic[end as usize] = Some(Synthetic { edit, tile });
    }

    /// Does this range exist only to reload or store a spilled value?
    pub fn is_synthetic(&self) -> bool {
        self.synthetic.iter().any(Option::is_some)
    }

    /// Is this range without references? Ranges folded into another one by aliasing are empty.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty() && !self.is_synthetic()
    }

    /// Has this range been spilled?
    pub fn is_spilled(&self) -> bool {
        self.spill_slot().is_some()
    }

    /// The spill slot, if this range has been spilled.
    pub fn spill_slot(&self) -> Option<SpillSlot> {
        match self.alloc {
            Some(Allocation::Stack(slot)) => Some(slot),
            _ => None,
        }
    }

    /// The assigned register.
    pub fn reg(&self) -> Option<(StorageClass, RegUnit)> {
        self.alloc.and_then(Allocation::reg)
    }

    /// The position where this range starts, or `OrderNr::MAX` when it is empty.
    pub fn first_ref(&self) -> OrderNr {
        let a = self.refs.first().map_or(OrderNr::MAX, |r| r.order());
        let b = self.synthetic[0].map_or(OrderNr::MAX, |s| order_nr(s.tile) - 1);
        a.min(b)
    }

    /// The position where this range ends, or `-1` when it is empty.
    pub fn last_ref(&self) -> OrderNr {
        let a = self.refs.last().map_or(-1, |r| r.order());
        let b = self.synthetic[1].map_or(-1, |s| order_nr(s.tile) + 1);
        a.max(b)
    }

    /// Append a reference. References must be added in program order.
    pub fn push_ref(&mut self, r: ValueRef) {
        debug_assert!(
            self.refs.last().map_or(true, |&last| last < r),
            "{r} added out of order"
        );
        self.refs.push(r);
    }

    /// Remove all references, leaving the synthetic tiles.
    pub fn take_refs(&mut self) -> SmallVec<[ValueRef; 4]> {
        core::mem::take(&mut self.refs)
    }

    /// Move all references of `other` into `self`, keeping program order.
    ///
    /// `other` is left empty.
    pub fn merge(&mut self, other: &mut LiveRange) {
        log::trace!(
            "Merging live ranges ({}-{}) and ({}-{})",
            self.first_ref(),
            self.last_ref(),
            other.first_ref(),
            other.last_ref()
        );
        let a = core::mem::take(&mut self.refs);
        let b = core::mem::take(&mut other.refs);
        self.refs = merge_sorted(&a, &b);

        for (mine, theirs) in self.synthetic.iter_mut().zip(other.synthetic.iter_mut()) {
            if let Some(s) = theirs.take() {
                if mine.is_some() {
                    panic!("Can't merge the same synthetic twice");
                }
                *mine = Some(s);
            }
        }
        if self.requirement.is_none() {
            self.requirement = other.requirement.take();
        }
    }

    /// Display the extent of this range.
    pub fn display(&self) -> DisplayLiveRange<'_> {
        DisplayLiveRange(self)
    }
}

/// Merge two sorted reference lists.
fn merge_sorted(a: &[ValueRef], b: &[ValueRef]) -> SmallVec<[ValueRef; 4]> {
    let mut out = SmallVec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] <= b[j] {
            out.push(a[i]);
            i += 1;
        } else {
            out.push(b[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Displays the node, extent and allocation of a live range.
pub struct DisplayLiveRange<'a>(&'a LiveRange);

impl fmt::Display for DisplayLiveRange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let lr = self.0;
        if lr.is_empty() {
            return write!(f, "{} (empty)", lr.node);
        }
        write!(f, "{} [{}, {}]", lr.node, lr.first_ref(), lr.last_ref())?;
        match lr.alloc {
            Some(alloc) => write!(f, " {alloc}"),
            None => Ok(()),
        }
    }
}

//! Live range extraction.
//!
//! Tiles are scanned once in program order. Every tile that yields a genuinely new value gets a
//! live range, and every use operand adds a reference to the live range of the value it reads.
//! Tiles that only rename values don't get live ranges of their own:
//!
//! - `copy` makes its node an alias of the copied value.
//! - `do` makes its node an alias of its last child.
//! - `if` merges the live ranges of its two branches and makes its node an alias of the result.
//!   The branches must share a storage class and can't be pinned to different registers.
//!
//! Operands of alias tiles don't reference anything, so the emitter can drop those tiles
//! entirely. Argument list operands are referenced like ordinary uses, but they never get a
//! register baked in. They are bound when the allocator passes the argument list.

use crate::entity::PrimaryMap;
use crate::ir::{Node, RegSpec, Tile, TileList, TileOp};
use crate::regalloc::heap::Worklist;
use crate::regalloc::liverange::{LiveRange, LiveRangeId, ValueRef};
use crate::regalloc::value_sets::ValueSets;
use crate::result::{AllocError, AllocResult};

/// Live ranges of a tile list, and the value sets mapping nodes to them.
pub struct Liveness {
    ranges: PrimaryMap<LiveRangeId, LiveRange>,
    sets: ValueSets,
}

impl Liveness {
    /// Create a new empty liveness analysis.
    pub fn new() -> Self {
        Self {
            ranges: PrimaryMap::new(),
            sets: ValueSets::new(),
        }
    }

    /// Clear all data structures in this liveness analysis.
    pub fn clear(&mut self) {
        self.ranges.clear();
        self.sets.clear();
    }

    /// All live ranges, including empty ones left behind by merging.
    pub fn ranges(&self) -> &PrimaryMap<LiveRangeId, LiveRange> {
        &self.ranges
    }

    /// The value sets of the analysed list.
    pub fn sets(&self) -> &ValueSets {
        &self.sets
    }

    /// The live range holding the references of `node`.
    pub fn range_of(&self, node: Node) -> Option<&LiveRange> {
        self.sets.range(node).map(|id| &self.ranges[id])
    }

    /// Mutable live ranges together with the value sets.
    pub(super) fn split_mut(&mut self) -> (&mut PrimaryMap<LiveRangeId, LiveRange>, &ValueSets) {
        (&mut self.ranges, &self.sets)
    }

    /// Build the live ranges of `list`, queueing every new range on `worklist`.
    ///
    /// The worklist is left unordered. Call `Worklist::heapify` before popping from it.
    pub fn compute(&mut self, list: &TileList, worklist: &mut Worklist) -> AllocResult<()> {
        self.clear();
        // Every tile defines at most one range, and spilling adds at most one range per
        // reference outside argument lists.
        let bound = list.len() + list.num_refs() - list.num_arglist_refs();
        self.ranges.reserve(bound);
        worklist.reserve(bound);
        log::debug!(
            "Computing live ranges for {} tiles with {} references ({} in argument lists)",
            list.len(),
            list.num_refs(),
            list.num_arglist_refs()
        );

        for (pos, tile) in list.iter().enumerate() {
            match tile.op {
                TileOp::Copy => {
                    let source = self.source(pos, tile, 1)?;
                    self.sets.alias(tile.node, source);
                }
                TileOp::Do => {
                    if tile.yields_value() {
                        let last = tile.operands.len().saturating_sub(1).max(1);
                        let source = self.source(pos, tile, last)?;
                        self.sets.alias(tile.node, source);
                    }
                }
                TileOp::If => {
                    let left = self.source(pos, tile, 1)?;
                    let right = self.source(pos, tile, 2)?;
                    self.check_branches(pos, left, right)?;
                    let root = self
                        .sets
                        .union(&mut self.ranges, left, right)
                        .ok_or(AllocError::UndefinedValue {
                            tile: pos,
                            node: right,
                        })?;
                    if root != tile.node {
                        self.sets.alias(tile.node, root);
                    }
                }
                TileOp::ArgList => {
                    for (slot, op) in tile.uses() {
                        self.add_use(pos, slot, op.source)?;
                    }
                }
                _ => {
                    if tile.yields_value() {
                        let mut lr = LiveRange::new(tile.node, tile.class);
                        lr.push_ref(ValueRef::new(pos, 0));
                        lr.requirement = tile.operands[0].spec.requirement();
                        let id = self.ranges.push(lr);
                        self.sets.define(tile.node, id);
                        worklist.push_unordered(id);
                    }
                    for (slot, op) in tile.uses() {
                        if matches!(op.spec, RegSpec::Read | RegSpec::Fixed(_)) {
                            self.add_use(pos, slot, op.source)?;
                        }
                    }
                }
            }
        }

        log::debug!("Found {} live ranges", self.ranges.len());
        Ok(())
    }

    /// Resolve the node read by operand `slot` of the alias tile at `pos`.
    fn source(&self, pos: usize, tile: &Tile, slot: usize) -> AllocResult<Node> {
        let node = tile
            .operands
            .get(slot)
            .and_then(|op| op.source)
            .ok_or(AllocError::MissingOperand { tile: pos, slot })?;
        match self.sets.find(node) {
            Some(_) => Ok(node),
            None => Err(AllocError::UndefinedValue { tile: pos, node }),
        }
    }

    /// Check that the branches of the select at `pos` can share one live range.
    fn check_branches(&self, pos: usize, left: Node, right: Node) -> AllocResult<()> {
        let (Some(a), Some(b)) = (self.sets.range(left), self.sets.range(right)) else {
            return Ok(());
        };
        if a == b {
            return Ok(());
        }
        let (a, b) = (&self.ranges[a], &self.ranges[b]);
        if a.class != b.class {
            return Err(AllocError::StorageClassMismatch {
                tile: pos,
                left: a.class,
                right: b.class,
            });
        }
        match (a.requirement, b.requirement) {
            (Some(ra), Some(rb)) if ra != rb => Err(AllocError::FixedRegisterConflict {
                node: right,
                reg: rb,
            }),
            _ => Ok(()),
        }
    }

    fn add_use(&mut self, pos: usize, slot: usize, node: Option<Node>) -> AllocResult<()> {
        let node = node.ok_or(AllocError::MissingOperand { tile: pos, slot })?;
        let id = self
            .sets
            .range(node)
            .ok_or(AllocError::UndefinedValue { tile: pos, node })?;
        self.ranges[id].push_ref(ValueRef::new(pos, slot));
        Ok(())
    }
}

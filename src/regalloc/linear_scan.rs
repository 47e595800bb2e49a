//! The linear scan.
//!
//! Live ranges are popped from the worklist in order of their first reference and handed a
//! register from the pool of their storage class. Live ranges that end before the popped one
//! starts are expired first, returning their registers. When the pool is empty, the spiller
//! evicts an active live range to memory; see `spilling.rs`.
//!
//! A cursor follows the allocation through the tile list. When it passes a tile that needs
//! special treatment, the allocator deals with it before going on:
//!
//! - An argument list binds every argument to the current location of its value.
//! - A call spills every value held in a volatile register across it.
//! - A fixed register use checks that the value really is in that register.

use crate::entity::PrimaryMap;
use crate::ir::{Allocation, SpillArea, TileList, TileOp};
use crate::isa::{RegUnit, StorageClass, TargetDescriptor};
use crate::regalloc::active_set::ActiveSet;
use crate::regalloc::heap::Worklist;
use crate::regalloc::liverange::{LiveRange, LiveRangeId, OrderNr, SyntheticEnd};
use crate::regalloc::register_pool::RegisterPool;
use crate::regalloc::value_sets::ValueSets;
use crate::result::{AllocError, AllocResult};
use crate::settings::Flags;
use core::fmt;

/// Number of non-volatile registers that can be tracked.
const MAX_NVR: usize = 64;

/// Statistics collected during one allocator run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Non-empty live ranges, including synthetic ones.
    pub live_ranges: usize,
    /// Live ranges spilled to memory.
    pub spills: usize,
    /// Reloads inserted before uses of spilled values.
    pub loads: usize,
    /// Stores inserted after definitions of spilled values.
    pub stores: usize,
    /// Spill area high-water mark after the run.
    pub spill_top: u32,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} live ranges, {} spills, {} loads, {} stores, spill top {}",
            self.live_ranges, self.spills, self.loads, self.stores, self.spill_top
        )
    }
}

/// Persistent data structures for the linear scan.
pub struct LinearScan {
    active: [ActiveSet; 2],
    pools: [RegisterPool; 2],
    nvr_busy: [OrderNr; MAX_NVR],
    spilled: Vec<LiveRangeId>,
}

/// Per-run state of the linear scan.
pub(super) struct Scan<'a> {
    pub(super) target: &'a TargetDescriptor,
    pub(super) flags: &'a Flags,
    pub(super) list: &'a mut TileList,
    pub(super) spill_area: &'a mut SpillArea,
    pub(super) ranges: &'a mut PrimaryMap<LiveRangeId, LiveRange>,
    pub(super) sets: &'a ValueSets,
    pub(super) worklist: &'a mut Worklist,
    pub(super) active: &'a mut [ActiveSet; 2],
    pub(super) pools: &'a mut [RegisterPool; 2],
    pub(super) spilled: &'a mut Vec<LiveRangeId>,
    pub(super) stats: &'a mut Stats,
    nvr_busy: &'a mut [OrderNr; MAX_NVR],
    cursor: usize,
}

impl LinearScan {
    /// Create a new linear scan data structure.
    pub fn new() -> Self {
        Self {
            active: [ActiveSet::new(), ActiveSet::new()],
            pools: [RegisterPool::new(&[]), RegisterPool::new(&[])],
            nvr_busy: [-1; MAX_NVR],
            spilled: Vec::new(),
        }
    }

    /// Clear all data structures.
    pub fn clear(&mut self) {
        for active in &mut self.active {
            active.clear();
        }
        self.nvr_busy = [-1; MAX_NVR];
        self.spilled.clear();
    }

    /// Live ranges spilled by the last run, in the order they were spilled.
    pub fn spilled(&self) -> &[LiveRangeId] {
        &self.spilled
    }

    /// Assign registers to the live ranges queued on `worklist`.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &mut self,
        target: &TargetDescriptor,
        flags: &Flags,
        list: &mut TileList,
        spill_area: &mut SpillArea,
        ranges: &mut PrimaryMap<LiveRangeId, LiveRange>,
        sets: &ValueSets,
        worklist: &mut Worklist,
        stats: &mut Stats,
    ) -> AllocResult<()> {
        self.clear();
        for (idx, class) in StorageClass::ALLOCATABLE.into_iter().enumerate() {
            self.pools[idx].reset(target.allocatable(class));
        }
        let mut scan = Scan {
            target,
            flags,
            list,
            spill_area,
            ranges,
            sets,
            worklist,
            active: &mut self.active,
            pools: &mut self.pools,
            spilled: &mut self.spilled,
            stats,
            nvr_busy: &mut self.nvr_busy,
            cursor: 0,
        };
        scan.run()
    }
}

impl<'a> Scan<'a> {
    fn run(&mut self) -> AllocResult<()> {
        log::trace!("Starting linear scan over {} tiles", self.list.len());
        loop {
            while let Some(id) = self.worklist.pop(self.ranges) {
                if self.ranges[id].is_empty() {
                    continue;
                }
                let pos = self.ranges[id].first_ref();
                if !self.advance(pos)? {
                    // A call queued reloads that may start before this range.
                    self.worklist.push(self.ranges, id);
                    continue;
                }
                log::trace!("Processing {id}: {}", self.ranges[id].display());
                self.expire(pos);
                self.allocate(id, pos)?;
            }

            // Tiles after the last definition may still hold argument lists and calls.
            if self.advance(OrderNr::MAX)? {
                break;
            }
        }
        self.expire(OrderNr::MAX);

        debug_assert!(self.active.iter().all(ActiveSet::is_empty));
        for (class, pool) in StorageClass::ALLOCATABLE.iter().zip(self.pools.iter()) {
            debug_assert!(pool.is_full(), "{class} registers leaked: {pool:?}");
        }
        log::trace!("Finished linear scan: {}", self.stats);
        Ok(())
    }

    /// Move the cursor past every tile at or before `pos`.
    ///
    /// Returns `false` if the cursor stopped early after a call that queued new live ranges.
    /// Those have to be allocated before the scan can go on.
    fn advance(&mut self, pos: OrderNr) -> AllocResult<bool> {
        let last = pos.div_euclid(2);
        while self.cursor < self.list.len() && self.cursor as OrderNr <= last {
            let tile = self.cursor;
            self.cursor += 1;
            match self.list[tile].op {
                TileOp::ArgList => self.bind_arglist(tile),
                TileOp::Call => {
                    if self.spill_over_call(tile) {
                        return Ok(false);
                    }
                }
                _ => self.check_fixed_uses(tile)?,
            }
        }
        Ok(true)
    }

    /// Bind every argument of the argument list at `tile` to where its value is right now.
    fn bind_arglist(&mut self, tile: usize) {
        for slot in 1..self.list[tile].operands.len() {
            let node = self.list[tile].operands[slot]
                .source
                .expect("argument without a value");
            let id = self
                .sets
                .range(node)
                .expect("argument values are defined before the argument list");
            let alloc = self.ranges[id]
                .alloc
                .unwrap_or_else(|| panic!("argument {node} has no location at tile {tile}"));
            log::trace!("Binding argument {slot} of tile {tile} to {alloc}");
            self.list[tile].operands[slot].alloc = Some(alloc);
        }
    }

    /// Check that every fixed register use of `tile` reads a value that lives in that register.
    fn check_fixed_uses(&self, tile: usize) -> AllocResult<()> {
        for (slot, op) in self.list[tile].uses() {
            let Some(reg) = op.spec.requirement() else {
                continue;
            };
            let in_place = op
                .source
                .and_then(|node| self.sets.range(node))
                .and_then(|id| self.ranges[id].alloc)
                .is_some_and(|alloc| alloc.satisfies_fixed(reg));
            if !in_place {
                return Err(AllocError::FixedUseRequirement { tile, slot, reg });
            }
        }
        Ok(())
    }

    /// Release the registers of every active live range ending at or before `pos`.
    pub(super) fn expire(&mut self, pos: OrderNr) {
        for (idx, class) in StorageClass::ALLOCATABLE.into_iter().enumerate() {
            for id in self.active[idx].expire(pos, self.ranges) {
                let (_, reg) = self.ranges[id]
                    .reg()
                    .expect("active live range without a register");
                log::trace!(
                    "{id} is out of scope at {pos}, releasing {}",
                    Allocation::Reg(class, reg)
                );
                self.pools[idx].free(reg);
            }
        }
    }

    fn allocate(&mut self, id: LiveRangeId, pos: OrderNr) -> AllocResult<()> {
        if let Some(reg) = self.ranges[id].requirement {
            return self.assign_fixed(id, reg);
        }

        // Non-volatile registers are only handed out through a requirement.
        let class = self.ranges[id].class;
        let idx = match class.index() {
            Some(idx) if self.pools[idx].capacity() > 0 => idx,
            _ => return Err(AllocError::NoRegisters(class)),
        };
        let reg = loop {
            match self.pools[idx].take() {
                Some(reg) => break reg,
                None => self.spill_any(class, idx, pos)?,
            }
        };
        self.assign(id, Allocation::Reg(class, reg));
        self.active[idx].insert(id, self.ranges);
        Ok(())
    }

    /// Pin a live range to the non-volatile register `reg`.
    fn assign_fixed(&mut self, id: LiveRangeId, reg: RegUnit) -> AllocResult<()> {
        let node = self.ranges[id].node;
        if !self.target.is_nonvolatile(reg) {
            // An allocatable register would have to be taken from whoever holds it.
            return Err(AllocError::FixedRegisterConflict { node, reg });
        }
        let busy = &mut self.nvr_busy[usize::from(reg)];
        if *busy > self.ranges[id].first_ref() {
            return Err(AllocError::FixedRegisterConflict { node, reg });
        }
        *busy = self.ranges[id].last_ref();
        self.ranges[id].class = StorageClass::Nvr;
        self.assign(id, Allocation::Reg(StorageClass::Nvr, reg));
        Ok(())
    }

    /// Record `alloc` for `id` and bake it into every tile referencing it.
    ///
    /// Argument list operands are skipped. They are bound when the cursor passes them.
    pub(super) fn assign(&mut self, id: LiveRangeId, alloc: Allocation) {
        log::trace!("Assigning {alloc} to {id}");
        self.ranges[id].alloc = Some(alloc);
        let lr = &self.ranges[id];
        for r in lr.refs() {
            let tile = &mut self.list[r.tile];
            if tile.op == TileOp::ArgList {
                continue;
            }
            tile.operands[r.slot].alloc = Some(alloc);
        }
        if let Some(s) = lr.synthetic(SyntheticEnd::Load) {
            self.list.pending_tile_mut(s.edit).operands[0].alloc = Some(alloc);
        }
        if let Some(s) = lr.synthetic(SyntheticEnd::Store) {
            self.list.pending_tile_mut(s.edit).operands[1].alloc = Some(alloc);
        }
    }
}

impl Default for LinearScan {
    fn default() -> Self {
        Self::new()
    }
}

//! Register allocator context.
//!
//! The `Context` struct contains data structures that should be preserved across invocations of
//! the register allocator algorithm. This doesn't preserve any data between tile lists, but it
//! avoids allocating data structures independently for each compilation unit.

use crate::ir::{SpillArea, TileList};
use crate::isa::TargetDescriptor;
use crate::regalloc::heap::Worklist;
use crate::regalloc::linear_scan::{LinearScan, Stats};
use crate::regalloc::liverange::LiveRange;
use crate::regalloc::liveness::Liveness;
use crate::result::AllocResult;
use crate::settings::Flags;
use crate::verifier::{verify_allocation, VerifierErrors};

/// Persistent memory allocations for register allocation.
pub struct Context {
    liveness: Liveness,
    worklist: Worklist,
    scan: LinearScan,
    stats: Stats,
}

impl Context {
    /// Create a new context for register allocation.
    ///
    /// This context should be reused for multiple tile lists in order to avoid repeated memory
    /// allocations.
    pub fn new() -> Self {
        Self {
            liveness: Liveness::new(),
            worklist: Worklist::new(),
            scan: LinearScan::new(),
            stats: Stats::default(),
        }
    }

    /// Clear all data structures in this context.
    pub fn clear(&mut self) {
        self.liveness.clear();
        self.worklist.clear();
        self.scan.clear();
        self.stats = Stats::default();
    }

    /// Live ranges and value sets of the last allocated list.
    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// The live ranges of the last allocated list, skipping ranges emptied by merging.
    pub fn live_ranges(&self) -> impl Iterator<Item = &LiveRange> + '_ {
        self.liveness
            .ranges()
            .values()
            .filter(|lr| !lr.is_empty() || lr.is_spilled())
    }

    /// The live ranges spilled in the last run, in the order they were spilled.
    pub fn spilled(&self) -> impl Iterator<Item = &LiveRange> + '_ {
        let ranges = self.liveness.ranges();
        self.scan.spilled().iter().map(move |&id| &ranges[id])
    }

    /// Statistics of the last run.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Allocate registers in `list`.
    ///
    /// After register allocation, every used operand slot in `list` holds the location of its
    /// value, and the loads and stores inserted by spilling have been spliced in. Spill slots are
    /// taken from `spill_area`, which keeps its new high-water mark.
    ///
    /// On error, the inserted tiles are dropped and `list` must not be compiled. Register numbers
    /// already written into operand slots are left behind.
    pub fn run(
        &mut self,
        target: &TargetDescriptor,
        flags: &Flags,
        list: &mut TileList,
        spill_area: &mut SpillArea,
    ) -> AllocResult<()> {
        self.stats = Stats::default();
        let result = self.allocate(target, flags, list, spill_area);
        self.stats.spill_top = spill_area.top();
        match result {
            Ok(()) => {
                list.commit_edits();
                log::debug!("Allocated {} tiles for {target}: {}", list.len(), self.stats);
            }
            Err(ref e) => {
                log::debug!("Register allocation failed: {e}");
                list.discard_edits();
            }
        }
        result
    }

    fn allocate(
        &mut self,
        target: &TargetDescriptor,
        flags: &Flags,
        list: &mut TileList,
        spill_area: &mut SpillArea,
    ) -> AllocResult<()> {
        self.worklist.clear();

        // Pass: Live range extraction.
        self.liveness.compute(list, &mut self.worklist)?;
        self.stats.live_ranges = self.live_ranges().count();
        self.worklist.heapify(self.liveness.ranges());

        // Pass: Linear scan, spilling as needed.
        let (ranges, sets) = self.liveness.split_mut();
        self.scan.run(
            target,
            flags,
            list,
            spill_area,
            ranges,
            sets,
            &mut self.worklist,
            &mut self.stats,
        )?;

        if flags.enable_verifier() {
            let mut errors = VerifierErrors::default();
            let ok = verify_allocation(target, list, self.liveness.ranges(), &mut errors).is_ok();
            if !ok {
                return Err(errors.into());
            }
        }
        Ok(())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

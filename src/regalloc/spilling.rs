//! Spilling.
//!
//! When a storage class runs out of registers, the active live range ending last is evicted to a
//! fresh spill slot. Every reference of the victim is rewritten to go through memory instead:
//!
//! - The definition gets a store inserted right after it.
//! - Every use gets a load inserted right before it.
//!
//! Each inserted tile forms a new synthetic live range covering only itself and the reference it
//! serves. Synthetic ranges for references up to the current position of the scan simply keep
//! the register the victim had, since the victim held it over that whole stretch. A reload for a
//! use at the current position ends where the range being allocated starts, so the two can share
//! the register. Synthetic ranges in the future are queued on the worklist like any other live
//! range.
//!
//! References in argument lists are never rewritten. Argument lists in the past have already been
//! bound to the victim's register, and argument lists in the future will be bound to the spill
//! slot when the scan reaches them.

use crate::ir::{Allocation, Tile, TileOp};
use crate::isa::StorageClass;
use crate::regalloc::linear_scan::Scan;
use crate::regalloc::liverange::{order_nr, LiveRange, LiveRangeId, OrderNr, SyntheticEnd};
use crate::result::{AllocError, AllocResult};
use smallvec::SmallVec;

impl Scan<'_> {
    /// Free a register of `class`, with pool index `idx`, by spilling an active live range. The
    /// scan is at `pos`.
    pub(super) fn spill_any(
        &mut self,
        class: StorageClass,
        idx: usize,
        pos: OrderNr,
    ) -> AllocResult<()> {
        let Some(victim) = self.active[idx].victim(self.ranges) else {
            return Err(AllocError::OutOfRegisters {
                class,
                // Reloads sit at odd positions, right before the tile they serve.
                tile: (pos + 1).div_euclid(2).max(0) as usize,
            });
        };
        self.active[idx].remove(victim);
        self.spill(victim, idx, pos);
        Ok(())
    }

    /// Spill every value that is live across the call at `tile`.
    ///
    /// Values in non-volatile registers are never in an active set, so they survive the call.
    /// Returns `true` if anything was spilled.
    pub(super) fn spill_over_call(&mut self, tile: usize) -> bool {
        let pos = order_nr(tile);
        self.expire(pos);
        let mut spilled = false;
        for idx in 0..StorageClass::ALLOCATABLE.len() {
            let live: SmallVec<[LiveRangeId; 16]> = self.active[idx]
                .iter()
                .filter(|&id| self.ranges[id].last_ref() > pos)
                .collect();
            for id in live {
                debug_assert!(
                    !self.ranges[id].is_synthetic(),
                    "synthetic {id} is live across the call at tile {tile}"
                );
                log::trace!("{id} is live across the call at tile {tile}");
                self.active[idx].remove(id);
                self.spill(id, idx, pos);
                spilled = true;
            }
        }
        spilled
    }

    /// Spill `id` to a new slot and rewrite its references. The scan is at `pos`.
    ///
    /// The register of `id` is released into pool `idx`. `id` must not be in an active set.
    fn spill(&mut self, id: LiveRangeId, idx: usize, pos: OrderNr) {
        let (class, reg) = self.ranges[id]
            .reg()
            .expect("spilling a live range without a register");
        let slot = self.spill_area.allocate(self.flags.spill_slot_size());
        let node = self.ranges[id].node;
        log::trace!(
            "Spilling {id} ({}) from {} to {slot} at {pos}",
            self.ranges[id].display(),
            Allocation::Reg(class, reg)
        );

        for r in self.ranges[id].take_refs() {
            if self.list[r.tile].op == TileOp::ArgList {
                continue;
            }
            let mut lr = LiveRange::new(node, class);
            lr.push_ref(r);
            if r.is_definition() {
                let edit = self.list.insert_after(r.tile, Tile::store(node, class, slot));
                lr.set_synthetic(SyntheticEnd::Store, edit, r.tile);
                self.stats.stores += 1;
            } else {
                let edit = self.list.insert_before(r.tile, Tile::load(node, class, slot));
                lr.set_synthetic(SyntheticEnd::Load, edit, r.tile);
                self.stats.loads += 1;
            }
            let n = self.ranges.push(lr);
            self.stats.live_ranges += 1;

            if r.order() <= pos {
                self.assign(n, Allocation::Reg(class, reg));
            } else {
                log::trace!("Queueing {n}: {}", self.ranges[n].display());
                self.worklist.push(self.ranges, n);
            }
        }

        self.ranges[id].alloc = Some(Allocation::Stack(slot));
        self.pools[idx].free(reg);
        self.spilled.push(id);
        self.stats.spills += 1;
    }
}

//! Pool of free registers in one storage class.
//!
//! The pool is a fixed-capacity ring holding one slot per allocatable register. Registers are
//! taken at the `take` cursor and returned at the `give` cursor, so a released register goes to
//! the back of the line and is handed out again as late as possible. A taken slot is emptied, and
//! the two cursors chase each other around the ring:
//!
//! - When every register is free, `take == give` and every slot is full.
//! - When every register is taken, `take == give` and every slot is empty.
//!
//! Returning a register into a full slot means more registers were released than the ring holds,
//! which is a bug in the allocator.

use crate::isa::{ClassRegs, RegUnit};
use core::fmt;
use smallvec::SmallVec;

/// Ring of free registers.
#[derive(Clone)]
pub struct RegisterPool {
    ring: SmallVec<[Option<RegUnit>; 32]>,
    take: usize,
    give: usize,
}

impl RegisterPool {
    /// Create a pool where all of `regs` are free, handed out in order.
    pub fn new(regs: &[RegUnit]) -> Self {
        Self {
            ring: regs.iter().map(|&r| Some(r)).collect(),
            take: 0,
            give: 0,
        }
    }

    /// Reset the pool so all of `regs` are free again.
    pub fn reset(&mut self, regs: &[RegUnit]) {
        self.ring.clear();
        self.ring.extend(regs.iter().map(|&r| Some(r)));
        self.take = 0;
        self.give = 0;
    }

    /// Number of registers managed by the pool.
    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    /// Number of registers currently free.
    pub fn num_free(&self) -> usize {
        self.ring.iter().filter(|r| r.is_some()).count()
    }

    /// Are all registers free?
    pub fn is_full(&self) -> bool {
        self.ring.iter().all(Option::is_some)
    }

    /// Take a free register, or return `None` if every register is in use.
    pub fn take(&mut self) -> Option<RegUnit> {
        let slot = self.ring.get_mut(self.take)?;
        let reg = slot.take()?;
        self.take = next_in_ring(self.take, self.ring.len());
        Some(reg)
    }

    /// Return `reg` to the pool.
    ///
    /// Panics if the pool has no room for it.
    pub fn free(&mut self, reg: RegUnit) {
        match self.ring.get_mut(self.give) {
            Some(slot) if slot.is_none() => *slot = Some(reg),
            _ => panic!("No space to release register {reg} into the ring"),
        }
        self.give = next_in_ring(self.give, self.ring.len());
    }

    /// The free registers, in the order they will be handed out.
    pub fn free_regs(&self) -> ClassRegs {
        let n = self.ring.len();
        (0..n)
            .filter_map(|i| self.ring[(self.take + i) % n])
            .collect()
    }
}

fn next_in_ring(pos: usize, len: usize) -> usize {
    if pos + 1 == len {
        0
    } else {
        pos + 1
    }
}

impl fmt::Debug for RegisterPool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for reg in self.free_regs() {
            write!(f, " {reg}")?;
        }
        write!(f, " ]")
    }
}

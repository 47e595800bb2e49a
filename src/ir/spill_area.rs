//! Spill area of a compilation unit.
//!
//! Spilled values live in a per-unit area of the frame. Slots are handed out by bumping the
//! high-water mark and are never reused within the unit.

use core::fmt;

/// Byte offset of a spill slot within the spill area.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpillSlot(u32);

impl SpillSlot {
    /// Create a slot reference for the byte `offset`.
    pub fn new(offset: u32) -> Self {
        Self(offset)
    }

    /// Byte offset of the slot.
    pub fn offset(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SpillSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[spill+{}]", self.0)
    }
}

/// The running spill high-water mark of a compilation unit.
///
/// The area outlives a single allocator run: other passes may reserve spill space before or after
/// the register allocator, and the final `top()` is the size of the area the frame must provide.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpillArea {
    top: u32,
}

impl SpillArea {
    /// Create an empty spill area.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a spill area where `top` bytes are already in use.
    pub fn with_top(top: u32) -> Self {
        Self { top }
    }

    /// Number of bytes handed out so far.
    pub fn top(&self) -> u32 {
        self.top
    }

    /// Reserve `size` bytes and return the slot at the start of them.
    pub fn allocate(&mut self, size: u32) -> SpillSlot {
        let slot = SpillSlot(self.top);
        self.top = self
            .top
            .checked_add(size)
            .expect("spill area exceeds 4 GiB");
        slot
    }
}

//! Shared settings for the register allocator.
//!
//! Settings are built with a `Builder` and then frozen into a `Flags` value that is passed to
//! every allocator run:
//!
//! ```
//! use tile_regalloc::settings;
//!
//! let mut b = settings::builder();
//! b.enable_verifier(true);
//! b.spill_slot_size(16);
//! let flags = settings::Flags::new(b);
//! assert!(flags.enable_verifier());
//! ```

use core::fmt;

/// Size in bytes of a spill slot, large enough to hold any single register.
pub const DEFAULT_SPILL_SLOT_SIZE: u32 = 8;

/// Collect settings before freezing them into `Flags`.
#[derive(Clone, Debug)]
pub struct Builder {
    enable_verifier: bool,
    spill_slot_size: u32,
}

/// Create a new settings builder with default values.
pub fn builder() -> Builder {
    Builder {
        enable_verifier: cfg!(debug_assertions),
        spill_slot_size: DEFAULT_SPILL_SLOT_SIZE,
    }
}

impl Builder {
    /// Run the allocation verifier after every allocation.
    pub fn enable_verifier(&mut self, enable: bool) -> &mut Self {
        self.enable_verifier = enable;
        self
    }

    /// Number of bytes reserved in the spill area for each spilled value.
    pub fn spill_slot_size(&mut self, size: u32) -> &mut Self {
        assert!(size > 0, "spill slots can't be empty");
        self.spill_slot_size = size;
        self
    }
}

/// Frozen allocator settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flags {
    enable_verifier: bool,
    spill_slot_size: u32,
}

impl Flags {
    /// Freeze the settings collected in `builder`.
    pub fn new(builder: Builder) -> Self {
        Self {
            enable_verifier: builder.enable_verifier,
            spill_slot_size: builder.spill_slot_size,
        }
    }

    /// Is the allocation verifier enabled?
    pub fn enable_verifier(&self) -> bool {
        self.enable_verifier
    }

    /// Size of each spill slot in bytes.
    pub fn spill_slot_size(&self) -> u32 {
        self.spill_slot_size
    }
}

impl Default for Flags {
    fn default() -> Self {
        Self::new(builder())
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "[regalloc]")?;
        writeln!(f, "enable_verifier = {}", self.enable_verifier)?;
        writeln!(f, "spill_slot_size = {}", self.spill_slot_size)
    }
}

//! Target descriptions.
//!
//! The allocator doesn't know anything about instruction encodings. All it needs from the target
//! is the list of registers it may hand out in each storage class, and the set of non-volatile
//! registers that values can be pinned to.

pub mod registers;

pub use self::registers::{RegUnit, StorageClass};

use core::fmt;
use smallvec::SmallVec;

/// Maximum number of allocatable registers in a single storage class.
pub const MAX_CLASS_REGS: usize = 32;

/// Register lists for one allocatable storage class.
pub type ClassRegs = SmallVec<[RegUnit; MAX_CLASS_REGS]>;

/// Description of the registers of a target machine.
#[derive(Clone, Debug)]
pub struct TargetDescriptor {
    name: &'static str,
    gpr: ClassRegs,
    num: ClassRegs,
    nonvolatile: u64,
}

impl TargetDescriptor {
    /// Create a target from explicit register lists.
    ///
    /// `gpr` and `num` are the registers handed out by the allocator, in the order they should be
    /// handed out. `nonvolatile` lists the registers that values may be pinned to with a fixed
    /// register requirement. They survive calls and are never handed out by the allocator.
    pub fn new(
        name: &'static str,
        gpr: &[RegUnit],
        num: &[RegUnit],
        nonvolatile: &[RegUnit],
    ) -> Self {
        assert!(gpr.len() <= MAX_CLASS_REGS && num.len() <= MAX_CLASS_REGS);
        let mut mask = 0u64;
        for &reg in nonvolatile {
            assert!(reg < 64, "register {reg} out of range");
            debug_assert!(!gpr.contains(&reg), "non-volatile {reg} is also allocatable");
            mask |= 1 << reg;
        }
        Self {
            name,
            gpr: gpr.iter().copied().collect(),
            num: num.iter().copied().collect(),
            nonvolatile: mask,
        }
    }

    /// A target with `gprs` integer registers numbered from zero, and no others.
    ///
    /// This is mostly useful for tests.
    pub fn with_gprs(gprs: u8) -> Self {
        let regs: ClassRegs = (0..gprs).collect();
        Self::new("generic", &regs, &[], &[])
    }

    /// The x86-64 System V target used by the JIT.
    ///
    /// The allocatable general purpose registers are the caller-saved ones that aren't otherwise
    /// reserved by the JIT frame: rax, rcx, rdx, rsi, rdi and r8-r11. The callee-saved rbx and
    /// r12-r15 can only be reached through fixed register requirements.
    pub fn x64() -> Self {
        use self::registers::x64::*;
        Self::new(
            "x86_64",
            &[RAX, RCX, RDX, RSI, RDI, R8, R9, R10, R11],
            &(0..16).collect::<ClassRegs>(),
            &[RBX, R12, R13, R14, R15],
        )
    }

    /// Name of the target.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The registers handed out for `class`, in hand-out order.
    ///
    /// Non-volatile registers are never handed out, so `Nvr` always gets the empty list.
    pub fn allocatable(&self, class: StorageClass) -> &[RegUnit] {
        match class {
            StorageClass::Gpr => &self.gpr,
            StorageClass::Num => &self.num,
            StorageClass::Nvr => &[],
        }
    }

    /// Is `reg` a non-volatile register that values can be pinned to?
    pub fn is_nonvolatile(&self, reg: RegUnit) -> bool {
        reg < 64 && self.nonvolatile & (1 << reg) != 0
    }

    /// Does `class` contain `reg` on this target?
    pub fn contains(&self, class: StorageClass, reg: RegUnit) -> bool {
        match class {
            StorageClass::Nvr => self.is_nonvolatile(reg),
            _ => self.allocatable(class).contains(&reg),
        }
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: {} gpr, {} num, {} nvr",
            self.name,
            self.gpr.len(),
            self.num.len(),
            self.nonvolatile.count_ones()
        )
    }
}

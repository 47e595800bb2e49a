//! Data structures describing the registers of a target.

use core::fmt;

/// A physical register number within its storage class.
pub type RegUnit = u8;

/// A category of physical registers sharing allocation rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageClass {
    /// General purpose integer registers.
    Gpr,
    /// Floating point registers.
    Num,
    /// Non-volatile registers, reachable only through a fixed register requirement.
    Nvr,
}

impl StorageClass {
    /// The storage classes that the allocator hands registers out for.
    pub const ALLOCATABLE: [StorageClass; 2] = [StorageClass::Gpr, StorageClass::Num];

    /// Index of an allocatable class in per-class tables, or `None` for `Nvr`.
    ///
    /// `ALLOCATABLE` lists the classes in index order.
    pub fn index(self) -> Option<usize> {
        match self {
            StorageClass::Gpr => Some(0),
            StorageClass::Num => Some(1),
            StorageClass::Nvr => None,
        }
    }

    /// Short prefix used when displaying registers of this class.
    pub fn prefix(self) -> &'static str {
        match self {
            StorageClass::Gpr => "r",
            StorageClass::Num => "x",
            StorageClass::Nvr => "nv",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            StorageClass::Gpr => "gpr",
            StorageClass::Num => "num",
            StorageClass::Nvr => "nvr",
        })
    }
}

/// Hardware numbering of the x86-64 general purpose registers.
#[allow(missing_docs)]
pub mod x64 {
    use super::RegUnit;

    pub const RAX: RegUnit = 0;
    pub const RCX: RegUnit = 1;
    pub const RDX: RegUnit = 2;
    pub const RBX: RegUnit = 3;
    pub const RSP: RegUnit = 4;
    pub const RBP: RegUnit = 5;
    pub const RSI: RegUnit = 6;
    pub const RDI: RegUnit = 7;
    pub const R8: RegUnit = 8;
    pub const R9: RegUnit = 9;
    pub const R10: RegUnit = 10;
    pub const R11: RegUnit = 11;
    pub const R12: RegUnit = 12;
    pub const R13: RegUnit = 13;
    pub const R14: RegUnit = 14;
    pub const R15: RegUnit = 15;
}

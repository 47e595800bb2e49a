//! Result and error types representing the outcome of allocating registers for a tile list.

use crate::ir::Node;
use crate::isa::{RegUnit, StorageClass};
use crate::verifier::VerifierErrors;
use thiserror::Error;

/// A register allocation error.
///
/// Every variant except `Verifier` describes an *unsupported configuration*: the tile list asks
/// for something this allocator does not know how to provide. The error is fatal to the current
/// compilation unit only, and the caller is expected to fall back to not compiling it.
///
/// Bugs in the allocator itself are not reported through this type. They panic.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// A value requires a specific register that can't be handed out directly.
    ///
    /// Only non-volatile registers can be pinned. A requirement on an allocatable register would
    /// need a swap or a forced spill, and two overlapping values can't share a pinned register.
    #[error("Fixed register {reg} required by {node} conflicts with the register assignment")]
    FixedRegisterConflict {
        /// The value with the requirement.
        node: Node,
        /// The register it asked for.
        reg: RegUnit,
    },

    /// An operand of tile `tile` must be read from `reg`, but its value lives somewhere else.
    #[error("Tile {tile} requires operand {slot} in register {reg}")]
    FixedUseRequirement {
        /// Position of the tile in the original list.
        tile: usize,
        /// The operand slot with the requirement.
        slot: usize,
        /// The required register.
        reg: RegUnit,
    },

    /// Spilling can't free a register because every active value is already a reload or store.
    ///
    /// This happens when a single tile needs more registers of one class than the target has.
    #[error("Ran out of {class} registers at tile {tile}")]
    OutOfRegisters {
        /// The storage class that was exhausted.
        class: StorageClass,
        /// Position of the tile being allocated.
        tile: usize,
    },

    /// The target has no allocatable registers for a storage class that the tile list uses.
    #[error("Target has no allocatable {0} registers")]
    NoRegisters(StorageClass),

    /// The two branches of a conditional select live in different storage classes.
    #[error("Tile {tile} selects between a {left} value and a {right} value")]
    StorageClassMismatch {
        /// Position of the select.
        tile: usize,
        /// Storage class of the first branch.
        left: StorageClass,
        /// Storage class of the second branch.
        right: StorageClass,
    },

    /// A tile lacks an operand its operation reads, or a use slot names no value.
    #[error("Tile {tile} has no value in operand {slot}")]
    MissingOperand {
        /// Position of the tile.
        tile: usize,
        /// The operand slot.
        slot: usize,
    },

    /// A tile uses a value that no earlier tile defines.
    #[error("Tile {tile} uses {node} before it is defined")]
    UndefinedValue {
        /// Position of the using tile.
        tile: usize,
        /// The undefined value.
        node: Node,
    },

    /// A list of verifier errors.
    ///
    /// This always represents a bug in the allocator, but it is only detected when the verifier
    /// is enabled in the settings.
    #[error("Verifier errors")]
    Verifier(#[from] VerifierErrors),
}

/// A convenient alias for a `Result` that uses `AllocError` as the error type.
pub type AllocResult<T> = Result<T, AllocError>;

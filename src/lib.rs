//! Linear-scan register allocation for JIT tile lists.
//!
//! Instruction selection produces a `TileList`: an ordered sequence of tiles, each naming the
//! value it defines and the values its operand slots read. The register allocator assigns every
//! value a register of its storage class, spilling values to memory when a class runs out, and
//! writes the result back into the tile list so it is ready for code emission.
//!
//! ```ignore
//! let mut ctx = regalloc::Context::new();
//! ctx.run(&TargetDescriptor::x64(), &flags, &mut list, &mut spill_area)?;
//! ```
#![deny(missing_docs)]

pub use crate::regalloc::Context;
pub use crate::result::{AllocError, AllocResult};
pub use crate::verifier::verify_allocation;
pub use crate::write::write_tile_list;

pub use cranelift_entity as entity;

pub mod ir;
pub mod isa;
pub mod regalloc;
pub mod settings;
pub mod verifier;
pub mod write;

mod result;

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

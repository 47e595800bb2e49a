//! Representation of the tile lists consumed and produced by the register allocator.

mod entities;
mod list;
mod spill_area;
mod tile;

pub use self::entities::Node;
pub use self::list::{Edit, TileList};
pub use self::spill_area::{SpillArea, SpillSlot};
pub use self::tile::{Allocation, Operand, Operands, RegSpec, Tile, TileOp};

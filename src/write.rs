//! Converting tile lists to text.
//!
//! The `write` module provides the `write_tile_list` function which renders a `TileList` one tile
//! per line. Operands print as the node they refer to, followed by their location once the
//! register allocator has assigned one:
//!
//! ```text
//!     n0:%r0 = const
//!     store[spill+0] n0:%r0
//!     n2:%r0 = add n0:%r0, n1:%r1
//! ```

use crate::ir::{Node, Operand, Tile, TileList};
use core::fmt::{self, Write};

/// Write `list` to `w` as text.
pub fn write_tile_list(w: &mut dyn Write, list: &TileList) -> fmt::Result {
    for tile in list.iter() {
        write!(w, "    ")?;
        write_tile(w, tile)?;
        writeln!(w)?;
    }
    Ok(())
}

/// Write a single tile to `w`, without indentation or line break.
pub fn write_tile(w: &mut dyn Write, tile: &Tile) -> fmt::Result {
    if tile.yields_value() {
        write_operand(w, tile.node, &tile.operands[0])?;
        write!(w, " = ")?;
    }
    write!(w, "{}", tile.op)?;
    for (i, (_, op)) in tile.uses().enumerate() {
        let sep = if i == 0 { " " } else { ", " };
        write!(w, "{sep}")?;
        match op.source {
            Some(node) => write_operand(w, node, op)?,
            None => write!(w, "_")?,
        }
    }
    Ok(())
}

fn write_operand(w: &mut dyn Write, node: Node, op: &Operand) -> fmt::Result {
    write!(w, "{node}")?;
    match op.alloc {
        Some(alloc) => write!(w, ":{alloc}"),
        None => Ok(()),
    }
}

impl fmt::Display for TileList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_tile_list(f, self)
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_tile(f, self)
    }
}

//! The tile list and its deferred editor.
//!
//! The register allocator refers to tiles by their position in the list, and it keeps doing so
//! while it decides to insert new tiles. Splicing those tiles in right away would shift every
//! position after them, so insertions are recorded as pending edits instead. Each edit names the
//! *gap* it goes into (the position of the original tile it lands in front of) and an *order*
//! that sorts edits sharing a gap. `commit_edits` applies all of them in a single pass.

use crate::entity::{entity_impl, PrimaryMap};
use crate::ir::{Tile, TileOp};
use core::ops::{Index, IndexMut};

/// An opaque reference to a pending tile insertion.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edit(u32);
entity_impl!(Edit, "edit");

struct PendingInsert {
    gap: usize,
    order: i8,
    tile: Tile,
}

/// An ordered list of tiles, as produced by instruction selection.
#[derive(Default)]
pub struct TileList {
    tiles: Vec<Tile>,
    edits: PrimaryMap<Edit, PendingInsert>,
}

impl TileList {
    /// Create an empty tile list.
    pub fn new() -> Self {
        Self {
            tiles: Vec::new(),
            edits: PrimaryMap::new(),
        }
    }

    /// Append `tile` and return its position.
    pub fn push(&mut self, tile: Tile) -> usize {
        debug_assert!(self.edits.is_empty(), "appending with pending edits");
        self.tiles.push(tile);
        self.tiles.len() - 1
    }

    /// Number of tiles, not counting pending insertions.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Is the list empty?
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// The tiles in program order.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Iterate over the tiles in program order.
    pub fn iter(&self) -> core::slice::Iter<'_, Tile> {
        self.tiles.iter()
    }

    /// Total number of argument list operands, which aren't bounded by the per-tile maximum.
    pub fn num_arglist_refs(&self) -> usize {
        self.tiles
            .iter()
            .filter(|t| t.op == TileOp::ArgList)
            .map(|t| t.operands.len() - 1)
            .sum()
    }

    /// Number of operand slots that reference a value in a register or spill slot.
    ///
    /// Alias tiles reference nothing. Argument list operands always count.
    pub fn num_refs(&self) -> usize {
        self.tiles
            .iter()
            .filter(|t| !t.op.is_alias())
            .map(|t| {
                t.uses()
                    .filter(|(_, op)| t.op == TileOp::ArgList || op.spec.is_used())
                    .count()
            })
            .sum()
    }

    /// Insert `tile` right before the tile at `pos` when edits are committed.
    pub fn insert_before(&mut self, pos: usize, tile: Tile) -> Edit {
        self.insert(pos, 1, tile)
    }

    /// Insert `tile` right after the tile at `pos` when edits are committed.
    ///
    /// Tiles inserted after `pos` come before tiles inserted before `pos + 1`.
    pub fn insert_after(&mut self, pos: usize, tile: Tile) -> Edit {
        self.insert(pos + 1, -1, tile)
    }

    fn insert(&mut self, gap: usize, order: i8, tile: Tile) -> Edit {
        debug_assert!(gap <= self.tiles.len(), "gap {gap} out of range");
        self.edits.push(PendingInsert { gap, order, tile })
    }

    /// Number of insertions waiting for `commit_edits`.
    pub fn pending_edits(&self) -> usize {
        self.edits.len()
    }

    /// The tile that `edit` will insert.
    pub fn pending_tile(&self, edit: Edit) -> &Tile {
        &self.edits[edit].tile
    }

    /// The tile that `edit` will insert, mutably.
    pub fn pending_tile_mut(&mut self, edit: Edit) -> &mut Tile {
        &mut self.edits[edit].tile
    }

    /// The pending insertions in the order they were made, with the position of the original
    /// tile they will be inserted before.
    pub fn pending_tiles(&self) -> impl Iterator<Item = (Edit, usize, &Tile)> + '_ {
        self.edits.iter().map(|(edit, e)| (edit, e.gap, &e.tile))
    }

    /// Drop all pending insertions.
    pub fn discard_edits(&mut self) {
        self.edits.clear();
    }

    /// Splice all pending insertions into the list.
    ///
    /// Edits sharing a gap are ordered by their order key, then by the order they were made in.
    pub fn commit_edits(&mut self) {
        if self.edits.is_empty() {
            return;
        }
        let mut pending: Vec<PendingInsert> = core::mem::take(&mut self.edits)
            .into_iter()
            .map(|(_, e)| e)
            .collect();
        // `sort_by_key` is stable, which keeps the creation order of equal keys.
        pending.sort_by_key(|e| (e.gap, e.order));
        log::trace!("Committing {} tile insertions", pending.len());

        let old = core::mem::take(&mut self.tiles);
        self.tiles.reserve(old.len() + pending.len());
        let mut pending = pending.into_iter().peekable();
        for (pos, tile) in old.into_iter().enumerate() {
            while let Some(edit) = pending.next_if(|e| e.gap == pos) {
                self.tiles.push(edit.tile);
            }
            self.tiles.push(tile);
        }
        self.tiles.extend(pending.map(|e| e.tile));
    }
}

impl Index<usize> for TileList {
    type Output = Tile;

    fn index(&self, pos: usize) -> &Tile {
        &self.tiles[pos]
    }
}

impl IndexMut<usize> for TileList {
    fn index_mut(&mut self, pos: usize) -> &mut Tile {
        &mut self.tiles[pos]
    }
}

impl FromIterator<Tile> for TileList {
    fn from_iter<I: IntoIterator<Item = Tile>>(iter: I) -> Self {
        Self {
            tiles: iter.into_iter().collect(),
            edits: PrimaryMap::new(),
        }
    }
}

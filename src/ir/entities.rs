//! Entity references used by tiles.
//!
//! Tiles don't refer to each other with Rust references. A value is identified by the expression
//! node that defines it, and that identifier is a compact `u32` index. Compact tables use the
//! `PackedOption<Node>` representation, while function arguments and return values prefer the
//! more Rust-like `Option<Node>`.

use crate::entity::entity_impl;

/// An opaque reference to the expression node that defines a value.
///
/// Several nodes can stand for the same value when they alias each other through copies,
/// sequences or conditional selects. The register allocator folds them onto a single live range.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Node(u32);
entity_impl!(Node, "n");

impl Node {
    /// Create a new node reference from its number.
    ///
    /// Returns `None` for the reserved number.
    pub fn with_number(n: u32) -> Option<Self> {
        if n < u32::MAX {
            Some(Self(n))
        } else {
            None
        }
    }
}

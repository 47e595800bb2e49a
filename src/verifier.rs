//! A verifier for register allocation results.
//!
//! The verifier runs after the linear scan and before the inserted tiles are committed, while
//! tile positions and live range references still agree. It checks:
//!
//! - Live ranges whose extents overlap don't share a register. Extents are open intervals, so a
//!   range ending where another starts may hand its register over.
//! - Every register is a member of the storage class it was assigned from.
//! - Every used operand slot of every tile has a location. Fixed register slots hold that
//!   general purpose or non-volatile register. Definitions live in a register of the tile's own
//!   storage class, unless they are pinned.
//!
//! Tiles that only rename values (`copy`, `do` and `if`) are skipped. They don't reference any
//! live range and the emitter drops them.

use crate::entity::PrimaryMap;
use crate::ir::{Allocation, Edit, RegSpec, Tile, TileList, TileOp};
use crate::isa::{RegUnit, StorageClass, TargetDescriptor};
use crate::regalloc::liverange::{LiveRange, LiveRangeId, OrderNr};
use core::fmt;

/// The place a verifier error was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    /// A tile in the original list.
    Tile(usize),
    /// A tile inserted by the allocator.
    Edit(Edit),
    /// A live range.
    LiveRange(LiveRangeId),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Location::Tile(pos) => write!(f, "tile {pos}"),
            Location::Edit(edit) => write!(f, "{edit}"),
            Location::LiveRange(id) => write!(f, "{id}"),
        }
    }
}

/// A verifier error.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct VerifierError {
    /// The place where the error was found.
    pub location: Location,
    /// The error message.
    pub message: String,
}

impl fmt::Display for VerifierError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Result of a step in the verification process.
///
/// Functions that return `VerifierStepResult<()>` should also take a mutable reference to
/// `VerifierErrors` as argument in order to report errors.
///
/// Here, `Ok` represents a step that **did not lead to a fatal error**, meaning that the
/// verification process may continue. However, other (non-fatal) errors might have been
/// reported through the previously mentioned `VerifierErrors` argument.
pub type VerifierStepResult<T> = Result<T, ()>;

/// Result of a verification operation.
///
/// Unlike `VerifierStepResult<()>` which may be `Ok` while still having reported non-fatal
/// errors, this type always returns `Err` if an error (fatal or not) was reported.
pub type VerifierResult<T> = Result<T, VerifierErrors>;

/// List of verifier errors.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct VerifierErrors(pub Vec<VerifierError>);

impl std::error::Error for VerifierErrors {}

impl VerifierErrors {
    /// Return a new `VerifierErrors` struct.
    #[inline]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Return whether no errors were reported.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return whether one or more errors were reported.
    #[inline]
    pub fn has_error(&self) -> bool {
        !self.0.is_empty()
    }

    /// Return a `VerifierStepResult` that is fatal if at least one error was reported,
    /// and non-fatal otherwise.
    #[inline]
    pub fn as_result(&self) -> VerifierStepResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(())
        }
    }

    /// Report an error, adding it to the list of errors.
    pub fn report(&mut self, location: Location, message: impl Into<String>) {
        self.0.push(VerifierError {
            location,
            message: message.into(),
        });
    }
}

impl From<Vec<VerifierError>> for VerifierErrors {
    fn from(v: Vec<VerifierError>) -> Self {
        VerifierErrors(v)
    }
}

impl From<VerifierErrors> for Vec<VerifierError> {
    fn from(errors: VerifierErrors) -> Vec<VerifierError> {
        errors.0
    }
}

impl From<VerifierErrors> for VerifierResult<()> {
    fn from(errors: VerifierErrors) -> VerifierResult<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl fmt::Display for VerifierErrors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for err in &self.0 {
            writeln!(f, "- {err}")?;
        }
        Ok(())
    }
}

/// Verify the register assignment of `list` against the live ranges that produced it.
///
/// `list` must still hold its pending insertions.
pub fn verify_allocation(
    target: &TargetDescriptor,
    list: &TileList,
    ranges: &PrimaryMap<LiveRangeId, LiveRange>,
    errors: &mut VerifierErrors,
) -> VerifierStepResult<()> {
    let verifier = AllocationVerifier {
        target,
        list,
        ranges,
    };
    verifier.check_interference(errors);
    verifier.check_tiles(errors);
    errors.as_result()
}

struct AllocationVerifier<'a> {
    target: &'a TargetDescriptor,
    list: &'a TileList,
    ranges: &'a PrimaryMap<LiveRangeId, LiveRange>,
}

impl AllocationVerifier<'_> {
    /// Check class membership, and that no two overlapping ranges share a register.
    fn check_interference(&self, errors: &mut VerifierErrors) {
        let mut assigned: Vec<(StorageClass, RegUnit, OrderNr, OrderNr, LiveRangeId)> = self
            .ranges
            .iter()
            .filter(|(_, lr)| !lr.is_empty())
            .filter_map(|(id, lr)| {
                let (class, reg) = lr.reg()?;
                Some((class, reg, lr.first_ref(), lr.last_ref(), id))
            })
            .collect();

        for &(class, reg, _, _, id) in &assigned {
            if !self.target.contains(class, reg) {
                errors.report(
                    Location::LiveRange(id),
                    format!(
                        "{} is not a {class} register on {}",
                        Allocation::Reg(class, reg),
                        self.target.name()
                    ),
                );
            }
        }

        // Sweep each register's ranges in order of their start.
        assigned.sort_unstable();
        let mut prev: Option<(StorageClass, RegUnit, OrderNr, LiveRangeId)> = None;
        for &(class, reg, first, last, id) in &assigned {
            match prev {
                Some((c, r, end, other)) if c == class && r == reg => {
                    if first < end {
                        errors.report(
                            Location::LiveRange(id),
                            format!(
                                "{} overlaps {other} in {}",
                                self.ranges[id].display(),
                                Allocation::Reg(class, reg)
                            ),
                        );
                    }
                    if last > end {
                        prev = Some((class, reg, last, id));
                    }
                }
                _ => prev = Some((class, reg, last, id)),
            }
        }
    }

    /// Check that every used operand slot was resolved.
    fn check_tiles(&self, errors: &mut VerifierErrors) {
        for (pos, tile) in self.list.iter().enumerate() {
            if !tile.op.is_alias() {
                check_operands(Location::Tile(pos), tile, errors);
            }
        }
        for (edit, _, tile) in self.list.pending_tiles() {
            check_operands(Location::Edit(edit), tile, errors);
        }
    }
}

fn check_operands(location: Location, tile: &Tile, errors: &mut VerifierErrors) {
    // Slots holding the tile's own value: the definition, and the register a store writes out.
    let own_value = |slot: usize| slot == 0 || (slot == 1 && matches!(tile.op, TileOp::Store(_)));
    for (slot, op) in tile.operands.iter().enumerate() {
        match (op.spec, op.alloc) {
            (RegSpec::Unused, _) => {}
            (_, None) => errors.report(
                location,
                format!("operand {slot} of {} has no location", tile.op),
            ),
            (RegSpec::Fixed(reg), Some(alloc)) if !alloc.satisfies_fixed(reg) => errors.report(
                location,
                format!("operand {slot} of {} requires register {reg}, got {alloc}", tile.op),
            ),
            (_, Some(alloc @ Allocation::Reg(class, _)))
                if own_value(slot) && class != tile.class && class != StorageClass::Nvr =>
            {
                errors.report(
                    location,
                    format!(
                        "operand {slot} of {} holds a {} value in {alloc}",
                        tile.op, tile.class
                    ),
                )
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;
    use crate::ir::Node;
    use crate::regalloc::liverange::ValueRef;

    fn range(node: usize, def: usize, last: usize, reg: RegUnit) -> LiveRange {
        let mut lr = LiveRange::new(Node::new(node), StorageClass::Gpr);
        lr.push_ref(ValueRef::new(def, 0));
        lr.push_ref(ValueRef::new(last, 1));
        lr.alloc = Some(Allocation::Reg(StorageClass::Gpr, reg));
        lr
    }

    #[test]
    fn overlap() {
        let target = TargetDescriptor::with_gprs(4);
        let list = TileList::new();
        let mut ranges = PrimaryMap::new();
        ranges.push(range(0, 0, 6, 1));
        ranges.push(range(1, 1, 2, 2));
        // Touching ranges may share a register.
        ranges.push(range(2, 6, 8, 1));
        let mut errors = VerifierErrors::default();
        assert_eq!(verify_allocation(&target, &list, &ranges, &mut errors), Ok(()));

        // Nested inside the first range.
        ranges.push(range(3, 3, 4, 1));
        assert!(verify_allocation(&target, &list, &ranges, &mut errors).is_err());
        assert_eq!(errors.0.len(), 1);
        assert_eq!(errors.0[0].location, Location::LiveRange(LiveRangeId::new(3)));
    }

    #[test]
    fn class_membership() {
        let target = TargetDescriptor::with_gprs(2);
        let mut ranges = PrimaryMap::new();
        ranges.push(range(0, 0, 1, 5));
        let mut errors = VerifierErrors::default();
        assert!(verify_allocation(&target, &TileList::new(), &ranges, &mut errors).is_err());
        assert_eq!(
            errors.to_string(),
            "- lr0: %r5 is not a gpr register on generic\n"
        );
    }

    #[test]
    fn unresolved_operands() {
        let n = Node::new;
        let mut list: TileList = [
            Tile::value("a", n(0), &[]).with_spec(0, RegSpec::Fixed(3)),
            Tile::copy(n(1), n(0)),
            Tile::effect("use", n(2), &[n(0)]),
        ]
        .into_iter()
        .collect();
        list[0].operands[0].alloc = Some(Allocation::Reg(StorageClass::Nvr, 4));
        let mut errors = VerifierErrors::default();
        let _ = verify_allocation(
            &TargetDescriptor::with_gprs(2),
            &list,
            &PrimaryMap::new(),
            &mut errors,
        );
        let messages: Vec<_> = errors.0.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            messages,
            [
                "tile 0: operand 0 of a requires register 3, got %nv4",
                "tile 2: operand 1 of use has no location"
            ]
        );
    }

    #[test]
    fn operand_classes() {
        let n = Node::new;
        let mut list: TileList = [
            Tile::value("f", n(0), &[]).with_class(StorageClass::Num),
            Tile::effect("use", n(1), &[n(0)]).with_spec(1, RegSpec::Fixed(0)),
            Tile::value("a", n(2), &[]).with_spec(0, RegSpec::Fixed(12)),
        ]
        .into_iter()
        .collect();
        list[0].operands[0].alloc = Some(Allocation::Reg(StorageClass::Gpr, 0));
        list[1].operands[1].alloc = Some(Allocation::Reg(StorageClass::Num, 0));
        list[2].operands[0].alloc = Some(Allocation::Reg(StorageClass::Nvr, 12));
        let mut errors = VerifierErrors::default();
        let _ = verify_allocation(
            &TargetDescriptor::x64(),
            &list,
            &PrimaryMap::new(),
            &mut errors,
        );
        let messages: Vec<_> = errors.0.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            messages,
            [
                "tile 0: operand 0 of f holds a num value in %r0",
                "tile 1: operand 1 of use requires register 0, got %x0"
            ]
        );
    }
}

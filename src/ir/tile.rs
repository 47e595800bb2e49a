//! Tiles: selected target operations before register assignment.

use crate::ir::{Node, SpillSlot};
use crate::isa::{RegUnit, StorageClass};
use core::fmt;
use smallvec::SmallVec;

/// The operation a tile performs, as far as the register allocator cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileOp {
    /// Copy the value in operand 1. The result aliases its source.
    Copy,
    /// A sequence of expressions whose result is the last operand. The result aliases it.
    Do,
    /// A conditional select between operand 1 and operand 2. Both branches and the result share
    /// a single live range.
    If,
    /// The argument list of a call. Every operand is an argument value.
    ArgList,
    /// A call. Registers that aren't non-volatile are clobbered across it.
    Call,
    /// Reload a spilled value into the register in operand 0. Inserted by the allocator.
    Load(SpillSlot),
    /// Store the register in operand 1 to a spill slot. Inserted by the allocator.
    Store(SpillSlot),
    /// Any other operation, named by its instruction selection template.
    Emit(&'static str),
}

impl TileOp {
    /// Does this operation only rename another value instead of defining a new one?
    pub fn is_alias(self) -> bool {
        matches!(self, TileOp::Copy | TileOp::Do | TileOp::If)
    }

    /// Was this tile inserted by the register allocator?
    pub fn is_synthetic(self) -> bool {
        matches!(self, TileOp::Load(_) | TileOp::Store(_))
    }
}

impl fmt::Display for TileOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TileOp::Copy => f.write_str("copy"),
            TileOp::Do => f.write_str("do"),
            TileOp::If => f.write_str("if"),
            TileOp::ArgList => f.write_str("arglist"),
            TileOp::Call => f.write_str("call"),
            TileOp::Load(slot) => write!(f, "load{slot}"),
            TileOp::Store(slot) => write!(f, "store{slot}"),
            TileOp::Emit(name) => f.write_str(name),
        }
    }
}

/// Register requirements of a single operand slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegSpec {
    /// The slot doesn't take a register, e.g. an immediate.
    Unused,
    /// The slot reads a value from any register of its class.
    Read,
    /// The slot writes the tile's result to any register of its class.
    Write,
    /// The slot must use this specific general purpose register.
    ///
    /// On a definition the register must be non-volatile.
    Fixed(RegUnit),
}

impl RegSpec {
    /// Does this slot touch a register at all?
    pub fn is_used(self) -> bool {
        self != RegSpec::Unused
    }

    /// The register required by this slot, if any.
    pub fn requirement(self) -> Option<RegUnit> {
        match self {
            RegSpec::Fixed(reg) => Some(reg),
            _ => None,
        }
    }
}

/// Where the allocator put a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Allocation {
    /// A physical register.
    Reg(StorageClass, RegUnit),
    /// A spill slot. Only argument list operands are ever bound to memory.
    Stack(SpillSlot),
}

impl Allocation {
    /// The register, if this is a register allocation.
    pub fn reg(self) -> Option<(StorageClass, RegUnit)> {
        match self {
            Allocation::Reg(class, reg) => Some((class, reg)),
            Allocation::Stack(_) => None,
        }
    }

    /// Does this allocation satisfy a `RegSpec::Fixed(reg)` slot?
    ///
    /// Fixed slots name a general purpose register, which a pinned value holds as `Nvr`.
    pub fn satisfies_fixed(self, reg: RegUnit) -> bool {
        matches!(self.reg(), Some((StorageClass::Gpr | StorageClass::Nvr, r)) if r == reg)
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Allocation::Reg(class, reg) => write!(f, "%{}{reg}", class.prefix()),
            Allocation::Stack(slot) => write!(f, "{slot}"),
        }
    }
}

/// One operand slot of a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operand {
    /// Register requirements of the slot.
    pub spec: RegSpec,
    /// The value read by the slot. Always `None` for slot 0, which is the definition.
    pub source: Option<Node>,
    /// The location assigned by the register allocator.
    pub alloc: Option<Allocation>,
}

impl Operand {
    /// The definition slot with register requirements `spec`.
    pub fn def(spec: RegSpec) -> Self {
        Self {
            spec,
            source: None,
            alloc: None,
        }
    }

    /// A slot reading `source` with register requirements `spec`.
    pub fn read(spec: RegSpec, source: Node) -> Self {
        Self {
            spec,
            source: Some(source),
            alloc: None,
        }
    }
}

/// Operand list of a tile. Slot 0 is always the definition.
pub type Operands = SmallVec<[Operand; 4]>;

/// A single selected operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    /// What the tile does.
    pub op: TileOp,
    /// The expression node this tile computes.
    pub node: Node,
    /// Storage class of the value defined in slot 0.
    pub class: StorageClass,
    /// Operand slots. Slot 0 is the definition, uses follow.
    pub operands: Operands,
}

impl Tile {
    /// Create a tile from its parts.
    pub fn new(op: TileOp, node: Node, class: StorageClass, operands: Operands) -> Self {
        debug_assert!(!operands.is_empty(), "tiles always have a definition slot");
        debug_assert!(operands[0].source.is_none());
        Self {
            op,
            node,
            class,
            operands,
        }
    }

    /// A tile that computes a general purpose value for `node` from `uses`.
    pub fn value(name: &'static str, node: Node, uses: &[Node]) -> Self {
        Self::with_def(TileOp::Emit(name), node, RegSpec::Write, uses)
    }

    /// A tile that reads `uses` but doesn't produce a value, like a store or a branch.
    pub fn effect(name: &'static str, node: Node, uses: &[Node]) -> Self {
        Self::with_def(TileOp::Emit(name), node, RegSpec::Unused, uses)
    }

    /// `node := source`.
    pub fn copy(node: Node, source: Node) -> Self {
        Self::with_def(TileOp::Copy, node, RegSpec::Write, &[source])
    }

    /// A sequence yielding the value of the last of `children`.
    pub fn sequence(node: Node, children: &[Node]) -> Self {
        debug_assert!(!children.is_empty());
        Self::with_def(TileOp::Do, node, RegSpec::Write, children)
    }

    /// `node := cond ? left : right`. The condition is evaluated by other tiles.
    pub fn select(node: Node, left: Node, right: Node) -> Self {
        Self::with_def(TileOp::If, node, RegSpec::Write, &[left, right])
    }

    /// The argument list of a call, passing `args`.
    pub fn arglist(node: Node, args: &[Node]) -> Self {
        Self::with_def(TileOp::ArgList, node, RegSpec::Unused, args)
    }

    /// A call taking the argument list `args`.
    ///
    /// If `yields` is set the call defines a general purpose value for `node`.
    pub fn call(node: Node, args: Node, yields: bool) -> Self {
        let spec = if yields {
            RegSpec::Write
        } else {
            RegSpec::Unused
        };
        let mut operands = Operands::new();
        operands.push(Operand::def(spec));
        // The argument list is not a value; it only links the call to its arguments.
        operands.push(Operand::read(RegSpec::Unused, args));
        Self::new(TileOp::Call, node, StorageClass::Gpr, operands)
    }

    /// A reload of `node` from `slot`, inserted by the allocator.
    pub fn load(node: Node, class: StorageClass, slot: SpillSlot) -> Self {
        let mut operands = Operands::new();
        operands.push(Operand::def(RegSpec::Write));
        Self::new(TileOp::Load(slot), node, class, operands)
    }

    /// A store of `node` to `slot`, inserted by the allocator.
    pub fn store(node: Node, class: StorageClass, slot: SpillSlot) -> Self {
        let mut operands = Operands::new();
        operands.push(Operand::def(RegSpec::Unused));
        operands.push(Operand::read(RegSpec::Read, node));
        Self::new(TileOp::Store(slot), node, class, operands)
    }

    fn with_def(op: TileOp, node: Node, def: RegSpec, uses: &[Node]) -> Self {
        let mut operands = Operands::with_capacity(uses.len() + 1);
        operands.push(Operand::def(def));
        operands.extend(uses.iter().map(|&u| Operand::read(RegSpec::Read, u)));
        Self::new(op, node, StorageClass::Gpr, operands)
    }

    /// Change the storage class of the defined value.
    pub fn with_class(mut self, class: StorageClass) -> Self {
        self.class = class;
        self
    }

    /// Change the register requirements of operand `slot`.
    pub fn with_spec(mut self, slot: usize, spec: RegSpec) -> Self {
        self.operands[slot].spec = spec;
        self
    }

    /// Does this tile define a new value in slot 0?
    pub fn yields_value(&self) -> bool {
        self.operands[0].spec.is_used()
    }

    /// The use operands, with their slot numbers.
    pub fn uses(&self) -> impl Iterator<Item = (usize, &Operand)> + '_ {
        self.operands.iter().enumerate().skip(1)
    }

    /// The allocation of operand `slot`.
    pub fn alloc(&self, slot: usize) -> Option<Allocation> {
        self.operands.get(slot).and_then(|op| op.alloc)
    }
}

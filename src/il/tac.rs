//! Three-Address Code
//!
//! The instruction form produced by the DAG lowering engine: an opcode, an
//! ordered list of source operands and an optional list of destination
//! operands. Operands reference operand-graph nodes (or, for control
//! transfers, basic blocks); the register selector resolves them to
//! physical registers later.

use std::fmt::{self, Display, Formatter};

use itertools::Itertools;

use crate::il::dag::{BlockId, NodeId};
use crate::listing::Listing;

pub type TacListing = Listing<TacInstr>;

/// A single TAC opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TacOpcode {
    /// Copy a value into the destination node.
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Neg,
    BitNot,
    /// Width/sign conversion.
    Cast,
    Inc,
    Dec,
    /// Address of a plain variable.
    AddressOf,
    /// Address of a member reached through a pointer base.
    AddressOfPointer,
    /// Address of an array element: base, index, element scale.
    AddressOfIndex,
    /// Read through a pointer.
    Load,
    /// Read an array element.
    LoadIndex,
    /// Read a struct member.
    LoadMember,
    /// Write through a pointer.
    Store,
    /// Write an array element.
    StoreIndex,
    /// Write a struct member.
    StoreMember,
    /// Unconditional jump to a control target.
    Goto,
}

impl Display for TacOpcode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            TacOpcode::Assign => "assign",
            TacOpcode::Add => "add",
            TacOpcode::Sub => "sub",
            TacOpcode::Mul => "mul",
            TacOpcode::Div => "div",
            TacOpcode::Mod => "mod",
            TacOpcode::BitAnd => "and",
            TacOpcode::BitOr => "or",
            TacOpcode::BitXor => "xor",
            TacOpcode::Shl => "shl",
            TacOpcode::Shr => "shr",
            TacOpcode::Neg => "neg",
            TacOpcode::BitNot => "not",
            TacOpcode::Cast => "cast",
            TacOpcode::Inc => "inc",
            TacOpcode::Dec => "dec",
            TacOpcode::AddressOf => "addr",
            TacOpcode::AddressOfPointer => "addr_ptr",
            TacOpcode::AddressOfIndex => "addr_idx",
            TacOpcode::Load => "load",
            TacOpcode::LoadIndex => "load_idx",
            TacOpcode::LoadMember => "load_mbr",
            TacOpcode::Store => "store",
            TacOpcode::StoreIndex => "store_idx",
            TacOpcode::StoreMember => "store_mbr",
            TacOpcode::Goto => "goto",
        };
        f.write_str(name)
    }
}

/// A source or destination operand: a reference to an operand-graph node,
/// or a control target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TacOperand {
    Node(NodeId),
    Block(BlockId),
}

impl TacOperand {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            TacOperand::Node(id) => Some(*id),
            TacOperand::Block(_) => None,
        }
    }
}

impl Display for TacOperand {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            TacOperand::Node(id) => write!(f, "%{}", id.0),
            TacOperand::Block(id) => write!(f, "L{}", id.0),
        }
    }
}

/// A single TAC instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct TacInstr {
    pub op: TacOpcode,
    pub srcs: Vec<TacOperand>,
    pub dsts: Vec<TacOperand>,
}

impl TacInstr {
    pub fn new(op: TacOpcode, srcs: Vec<TacOperand>, dsts: Vec<TacOperand>) -> Self {
        Self { op, srcs, dsts }
    }

    /// An instruction computing a single destination node from node sources.
    pub fn compute(op: TacOpcode, srcs: Vec<NodeId>, dst: NodeId) -> Self {
        Self::new(
            op,
            srcs.into_iter().map(TacOperand::Node).collect(),
            vec![TacOperand::Node(dst)],
        )
    }

    /// An instruction with side effects only (stores, jumps).
    pub fn effect(op: TacOpcode, srcs: Vec<TacOperand>) -> Self {
        Self::new(op, srcs, vec![])
    }

    /// The single destination node, if this instruction has one.
    pub fn dst_node(&self) -> Option<NodeId> {
        self.dsts.first().and_then(TacOperand::as_node)
    }

    pub fn src_node(&self, index: usize) -> Option<NodeId> {
        self.srcs.get(index).and_then(TacOperand::as_node)
    }
}

impl Display for TacInstr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let srcs = self.srcs.iter().join(", ");
        if self.dsts.is_empty() {
            write!(f, "{} {}", self.op, srcs)
        } else {
            let dsts = self.dsts.iter().join(", ");
            write!(f, "{} = {} {}", dsts, self.op, srcs)
        }
    }
}

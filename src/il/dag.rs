//! The operand graph.
//!
//! Expressions arrive here as a DAG: one node per computed or referenced
//! value, shared by every consumer of that value. Nodes live in an arena and
//! are addressed by index, so the lowering and selection passes can mutate
//! their flags freely without aliasing concerns.

use std::ops::{Index, IndexMut};

use crate::codegen::registers::Color;
use crate::vars::VarId;

/// The logical operator computed by an interior node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Assign,
    // Assignment through an address has its own operator kinds, so the
    // generic lowering recursion needs no special casing for stores.
    AssignDeref,
    AssignIndex,
    AssignMember,
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
    AddressOf,
    Deref,
    Member,
    Index,
    Cast,
    Inc,
    Dec,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
}

/// Index of a node in its [`DagArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Index of a basic block, for control-target operands. Blocks themselves
/// are owned by the (external) control-flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

/// One value-producing node of the operand graph.
#[derive(Debug)]
pub struct DagNode {
    /// `None` for leaves, which are resolved through their bound variable.
    pub op: Option<OperatorKind>,
    /// The bound variable or constant, mandatory for leaves.
    pub var: Option<VarId>,
    pub children: Vec<NodeId>,
    /// Set once this node's instructions have been emitted. A node shared
    /// by multiple consumers is lowered exactly once.
    pub lowered: bool,
    /// Assignment coalescing link: the node whose storage now holds this
    /// node's value.
    pub direct_alias: Option<NodeId>,
    /// The physical register assigned to this value, if any.
    pub color: Option<Color>,
    /// True while the value actually resides in its assigned register.
    pub loaded: bool,
}

impl DagNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena of operand-graph nodes for one expression or function.
#[derive(Debug, Default)]
pub struct DagArena {
    nodes: Vec<DagNode>,
}

impl DagArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a leaf node bound to a variable or constant.
    pub fn leaf(&mut self, var: VarId) -> NodeId {
        self.push(DagNode {
            op: None,
            var: Some(var),
            children: vec![],
            lowered: false,
            direct_alias: None,
            color: None,
            loaded: false,
        })
    }

    /// Add an interior node computing `op` over `children`.
    pub fn node(&mut self, op: OperatorKind, children: Vec<NodeId>) -> NodeId {
        self.push(DagNode {
            op: Some(op),
            var: None,
            children,
            lowered: false,
            direct_alias: None,
            color: None,
            loaded: false,
        })
    }

    /// An interior node that also names its result, e.g. a computed value
    /// the front end has bound to a temporary variable.
    pub fn node_with_var(&mut self, op: OperatorKind, var: VarId, children: Vec<NodeId>) -> NodeId {
        let id = self.node(op, children);
        self[id].var = Some(var);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: DagNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }
}

impl Index<NodeId> for DagArena {
    type Output = DagNode;

    fn index(&self, id: NodeId) -> &DagNode {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for DagArena {
    fn index_mut(&mut self, id: NodeId) -> &mut DagNode {
        &mut self.nodes[id.0]
    }
}

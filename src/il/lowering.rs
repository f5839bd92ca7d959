//! The DAG lowering engine.
//!
//! Walks an operand DAG bottom-up, in the order dictated by each operator's
//! associativity, and emits three-address instructions through the dispatch
//! table. Shared subexpressions are lowered exactly once; plain assignments
//! coalesce their destination into the instruction that produced the value.

use log::trace;

use crate::error::{CodegenError, Result};
use crate::il::dag::{DagArena, NodeId, OperatorKind};
use crate::il::operators::{Assoc, HandlerShape, OperatorTable};
use crate::il::tac::{TacInstr, TacListing, TacOpcode, TacOperand};

pub struct LoweringEngine<'a> {
    arena: &'a mut DagArena,
    table: &'a OperatorTable,
}

impl<'a> LoweringEngine<'a> {
    pub fn new(arena: &'a mut DagArena, table: &'a OperatorTable) -> Self {
        Self { arena, table }
    }

    /// Lower `node` and everything below it, appending the emitted
    /// instructions to `listing`. Leaves emit nothing; they are resolved
    /// later, during register selection, through their bound variable.
    pub fn lower(&mut self, listing: &mut TacListing, node: NodeId) -> Result<()> {
        if self.arena[node].is_leaf() {
            return Ok(());
        }
        if self.arena[node].lowered {
            return Ok(());
        }
        // Mark before recursing, so a malformed cycle cannot recurse forever
        // and reentrant consumers see the node as in progress.
        self.arena[node].lowered = true;

        let op = match self.arena[node].op {
            Some(op) => op,
            None => return Ok(()),
        };
        let desc = *self
            .table
            .find(op)
            .ok_or(CodegenError::UnknownOperator(op))?;

        let children = self.arena[node].children.clone();
        if !desc.arity.accepts(children.len()) {
            return Err(CodegenError::BadArity {
                op,
                expected: desc.arity.to_string(),
                found: children.len(),
            });
        }

        match desc.assoc {
            Assoc::Left => {
                for &child in &children {
                    self.lower(listing, child)?;
                }
            }
            Assoc::Right => {
                for &child in children.iter().rev() {
                    self.lower(listing, child)?;
                }
            }
        }

        trace!("lowering %{} as {:?}", node.0, op);
        self.dispatch(listing, node, op, desc.shape, &children)
    }

    fn dispatch(
        &mut self,
        listing: &mut TacListing,
        node: NodeId,
        op: OperatorKind,
        shape: HandlerShape,
        children: &[NodeId],
    ) -> Result<()> {
        match shape {
            HandlerShape::Binary(op) => {
                debug_assert_eq!(2, children.len());
                listing.push(TacInstr::compute(op, children.to_vec(), node));
            }
            HandlerShape::Unary(op) => {
                debug_assert_eq!(1, children.len());
                listing.push(TacInstr::compute(op, children.to_vec(), node));
            }
            HandlerShape::Assign => {
                self.lower_assign(listing, node, children[0], children[1]);
            }
            HandlerShape::CompoundAssign(op) => {
                // Read-modify-write: the first child is both an input and
                // the destination, and becomes the value of the expression.
                listing.push(TacInstr::compute(op, children.to_vec(), children[0]));
                self.arena[node].direct_alias = Some(children[0]);
            }
            HandlerShape::IncDec(op) => {
                listing.push(TacInstr::compute(op, children.to_vec(), children[0]));
                self.arena[node].direct_alias = Some(children[0]);
            }
            HandlerShape::Store(op) => {
                let srcs = children.iter().copied().map(TacOperand::Node).collect();
                listing.push(TacInstr::effect(op, srcs));
            }
            HandlerShape::AddressOf => {
                let opcode = match children.len() {
                    1 => TacOpcode::AddressOf,
                    2 => TacOpcode::AddressOfPointer,
                    3 => TacOpcode::AddressOfIndex,
                    // Unreachable: the descriptor's arity range was checked.
                    n => {
                        return Err(CodegenError::BadArity {
                            op,
                            expected: "1..=3".to_string(),
                            found: n,
                        })
                    }
                };
                listing.push(TacInstr::compute(opcode, children.to_vec(), node));
            }
        }
        Ok(())
    }

    /// Lower a plain assignment, coalescing the destination when possible.
    ///
    /// When the right-hand child is a freshly computed value (the most
    /// recently appended instruction produced it) and neither side carries a
    /// prior direct alias, the producing instruction is retargeted at the
    /// left-hand node and no move is emitted. When the right-hand child was
    /// itself the target of a prior coalescing, the assignment reads from
    /// that alias instead.
    fn lower_assign(&mut self, listing: &mut TacListing, node: NodeId, lhs: NodeId, rhs: NodeId) {
        let rhs_alias = self.arena[rhs].direct_alias;
        let lhs_alias = self.arena[lhs].direct_alias;

        match rhs_alias {
            Some(alias) => {
                listing.push(TacInstr::compute(TacOpcode::Assign, vec![alias], lhs));
            }
            None => {
                let coalesced = lhs_alias.is_none()
                    && matches!(listing.last_mut(), Some(last) if last.dst_node() == Some(rhs));
                if coalesced {
                    trace!("coalescing %{} into %{}", rhs.0, lhs.0);
                    // The value is produced straight into the destination;
                    // the move disappears.
                    if let Some(last) = listing.last_mut() {
                        last.dsts[0] = TacOperand::Node(lhs);
                    }
                    self.arena[rhs].direct_alias = Some(lhs);
                } else {
                    listing.push(TacInstr::compute(TacOpcode::Assign, vec![rhs], lhs));
                }
            }
        }
        // The assignment expression's own value lives in its target.
        self.arena[node].direct_alias = Some(lhs);
    }
}

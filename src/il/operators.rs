//! The operator dispatch table.
//!
//! Maps a logical operator kind to its associativity, accepted arity and
//! lowering handler shape. Rather than one handler function per operator,
//! a handful of generic shapes are parameterized by the TAC opcode they
//! emit; the lowering engine interprets the shape.

use std::fmt::{self, Display, Formatter};

use crate::il::dag::OperatorKind;
use crate::il::tac::TacOpcode;

/// Operand evaluation order for an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    /// Children are lowered in declared (left-to-right) order.
    Left,
    /// Children are lowered in reverse order. Governs unary prefix
    /// operators, address-of, dereference, casts, increment/decrement and
    /// all assignment forms.
    Right,
}

/// The child counts an operator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    /// Inclusive range, for multi-shape operators such as address-of.
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(&self, found: usize) -> bool {
        match *self {
            Arity::Fixed(n) => found == n,
            Arity::Range(lo, hi) => (lo..=hi).contains(&found),
        }
    }
}

impl Display for Arity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{}", n),
            Arity::Range(lo, hi) => write!(f, "{}..={}", lo, hi),
        }
    }
}

/// The generic handler a descriptor dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerShape {
    /// Two sources, one fresh destination.
    Binary(TacOpcode),
    /// One source, one fresh destination.
    Unary(TacOpcode),
    /// Plain assignment, subject to destination coalescing.
    Assign,
    /// Read-modify-write on the first child.
    CompoundAssign(TacOpcode),
    /// In-place increment/decrement; the child is both source and
    /// destination.
    IncDec(TacOpcode),
    /// Store through an address; all children become sources.
    Store(TacOpcode),
    /// Multi-shape address-of; the emitted opcode depends on arity.
    AddressOf,
}

/// One registered operator.
#[derive(Debug, Clone, Copy)]
pub struct OperatorDescriptor {
    pub kind: OperatorKind,
    pub assoc: Assoc,
    pub arity: Arity,
    pub shape: HandlerShape,
}

/// The one-time static registration of every supported operator. Lookups
/// are a linear scan; the table is small enough that this does not matter.
pub struct OperatorTable {
    entries: Vec<OperatorDescriptor>,
}

impl OperatorTable {
    pub fn new() -> Self {
        use Assoc::*;
        use HandlerShape::*;
        use OperatorKind as K;
        use TacOpcode as T;

        let mut table = Self { entries: vec![] };

        table.register(K::Assign, Right, Arity::Fixed(2), Assign);
        table.register(K::AssignDeref, Right, Arity::Fixed(2), Store(T::Store));
        table.register(K::AssignIndex, Right, Arity::Fixed(3), Store(T::StoreIndex));
        table.register(K::AssignMember, Right, Arity::Fixed(3), Store(T::StoreMember));

        table.register(K::Add, Left, Arity::Fixed(2), Binary(T::Add));
        table.register(K::Sub, Left, Arity::Fixed(2), Binary(T::Sub));
        table.register(K::Mul, Left, Arity::Fixed(2), Binary(T::Mul));
        table.register(K::Div, Left, Arity::Fixed(2), Binary(T::Div));
        table.register(K::Mod, Left, Arity::Fixed(2), Binary(T::Mod));
        table.register(K::BitAnd, Left, Arity::Fixed(2), Binary(T::BitAnd));
        table.register(K::BitOr, Left, Arity::Fixed(2), Binary(T::BitOr));
        table.register(K::BitXor, Left, Arity::Fixed(2), Binary(T::BitXor));
        table.register(K::Shl, Left, Arity::Fixed(2), Binary(T::Shl));
        table.register(K::Shr, Left, Arity::Fixed(2), Binary(T::Shr));

        table.register(K::Neg, Right, Arity::Fixed(1), Unary(T::Neg));
        table.register(K::BitNot, Right, Arity::Fixed(1), Unary(T::BitNot));
        table.register(K::Cast, Right, Arity::Fixed(1), Unary(T::Cast));
        table.register(K::Inc, Right, Arity::Fixed(1), IncDec(T::Inc));
        table.register(K::Dec, Right, Arity::Fixed(1), IncDec(T::Dec));
        table.register(K::Deref, Right, Arity::Fixed(1), Unary(T::Load));

        table.register(K::AddressOf, Right, Arity::Range(1, 3), AddressOf);

        table.register(K::Member, Left, Arity::Fixed(2), Binary(T::LoadMember));
        table.register(K::Index, Left, Arity::Fixed(2), Binary(T::LoadIndex));

        table.register(K::AddAssign, Right, Arity::Fixed(2), CompoundAssign(T::Add));
        table.register(K::SubAssign, Right, Arity::Fixed(2), CompoundAssign(T::Sub));
        table.register(K::MulAssign, Right, Arity::Fixed(2), CompoundAssign(T::Mul));
        table.register(K::DivAssign, Right, Arity::Fixed(2), CompoundAssign(T::Div));
        table.register(K::ModAssign, Right, Arity::Fixed(2), CompoundAssign(T::Mod));
        table.register(K::AndAssign, Right, Arity::Fixed(2), CompoundAssign(T::BitAnd));
        table.register(K::OrAssign, Right, Arity::Fixed(2), CompoundAssign(T::BitOr));
        table.register(K::XorAssign, Right, Arity::Fixed(2), CompoundAssign(T::BitXor));
        table.register(K::ShlAssign, Right, Arity::Fixed(2), CompoundAssign(T::Shl));
        table.register(K::ShrAssign, Right, Arity::Fixed(2), CompoundAssign(T::Shr));

        table
    }

    pub fn find(&self, kind: OperatorKind) -> Option<&OperatorDescriptor> {
        self.entries.iter().find(|d| d.kind == kind)
    }

    fn register(&mut self, kind: OperatorKind, assoc: Assoc, arity: Arity, shape: HandlerShape) {
        debug_assert!(
            self.find(kind).is_none(),
            "Operator {:?} registered twice",
            kind
        );
        self.entries.push(OperatorDescriptor {
            kind,
            assoc,
            arity,
            shape,
        });
    }
}

impl Default for OperatorTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_assignment_form_is_right_associative() {
        let table = OperatorTable::new();
        let forms = [
            OperatorKind::Assign,
            OperatorKind::AssignDeref,
            OperatorKind::AssignIndex,
            OperatorKind::AssignMember,
            OperatorKind::AddAssign,
            OperatorKind::ShrAssign,
        ];

        for kind in forms {
            let desc = table.find(kind).unwrap();
            assert_eq!(Assoc::Right, desc.assoc, "{:?}", kind);
        }
    }

    #[test]
    fn address_of_accepts_one_to_three_children() {
        let table = OperatorTable::new();
        let desc = table.find(OperatorKind::AddressOf).unwrap();

        assert!(desc.arity.accepts(1));
        assert!(desc.arity.accepts(2));
        assert!(desc.arity.accepts(3));
        assert!(!desc.arity.accepts(4));
    }

    #[test]
    fn binary_operators_are_left_associative() {
        let table = OperatorTable::new();
        let desc = table.find(OperatorKind::Add).unwrap();

        assert_eq!(Assoc::Left, desc.assoc);
        assert_eq!(Arity::Fixed(2), desc.arity);
    }
}

//! Intermediate representation: the operand graph and its lowering to
//! three-address code.

pub mod dag;
mod lowering;
pub mod operators;
pub mod tac;

pub use lowering::LoweringEngine;
pub use tac::*;

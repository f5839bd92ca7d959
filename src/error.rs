//! Error taxonomy for the code generation core.
//!
//! Nothing here is expected to fire for well-typed input produced by the
//! front end; these are compiler-internal errors. Every pass stops on the
//! first failure and propagates it upward.

use thiserror::Error;

use crate::codegen::registers::RegClass;
use crate::il::dag::OperatorKind;

pub type Result<T> = std::result::Result<T, CodegenError>;

#[derive(Debug, Error, PartialEq)]
pub enum CodegenError {
    /// The operator dispatch table has no entry for this operator.
    #[error("no lowering rule registered for operator {0:?}")]
    UnknownOperator(OperatorKind),

    /// A fixed-arity operator was handed the wrong number of children.
    #[error("operator {op:?} expects {expected} operand(s), found {found}")]
    BadArity {
        op: OperatorKind,
        expected: String,
        found: usize,
    },

    /// A temporary with no frame slot and no global home cannot be reloaded.
    #[error("cannot load unplaced temporary '{0}'")]
    UnplacedTemporary(String),

    /// Every register of the class is held by a value of the instruction
    /// currently being compiled, so none can be evicted.
    #[error("all {0:?} registers are pinned by the current instruction")]
    RegisterPressure(RegClass),

    /// An addressing shape the selector cannot express, even via the
    /// scratch-register fallback.
    #[error("unsupported addressing combination: {0}")]
    UnsupportedAddressing(String),

    /// A TAC instruction whose operands do not match its opcode. Only a
    /// defect in the lowering engine can produce this.
    #[error("malformed instruction: {0}")]
    MalformedInstr(String),
}

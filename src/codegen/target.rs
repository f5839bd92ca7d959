//! The per-target seam.
//!
//! The selector and compiler never emit instructions directly; they go
//! through the builders below, which each instruction-set backend supplies
//! together with its register set, frame pointer, scratch registers,
//! immediate ranges and supported addressing scales.

use crate::codegen::machine::{Emit, MachineListing, MachineOp, MachineOperand, MemRef};
use crate::codegen::registers::{RegClass, RegisterDesc};

/// Register-register arithmetic shapes the compiler requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl ArithOp {
    fn machine_op(self, class: RegClass) -> MachineOp {
        match (self, class) {
            (ArithOp::Add, RegClass::Int) => MachineOp::Add,
            (ArithOp::Sub, RegClass::Int) => MachineOp::Sub,
            (ArithOp::Mul, RegClass::Int) => MachineOp::Mul,
            (ArithOp::Div, RegClass::Int) => MachineOp::Div,
            (ArithOp::Rem, RegClass::Int) => MachineOp::Rem,
            (ArithOp::And, _) => MachineOp::And,
            (ArithOp::Or, _) => MachineOp::Or,
            (ArithOp::Xor, _) => MachineOp::Xor,
            (ArithOp::Shl, _) => MachineOp::Shl,
            (ArithOp::Shr, _) => MachineOp::Shr,
            (ArithOp::Add, RegClass::Float) => MachineOp::Fadd,
            (ArithOp::Sub, RegClass::Float) => MachineOp::Fsub,
            (ArithOp::Mul, RegClass::Float) => MachineOp::Fmul,
            (ArithOp::Div, RegClass::Float) => MachineOp::Fdiv,
            (ArithOp::Rem, RegClass::Float) => MachineOp::Fdiv,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// One instruction-set backend.
///
/// The default builder bodies emit the target-neutral vocabulary of
/// [`MachineOp`]; a backend overrides them where its encoding imposes a
/// different shape. What every backend must decide for itself are the
/// register file and the constraint queries.
pub trait Target {
    fn name(&self) -> &'static str;

    /// The allocatable register set. Excludes the frame pointer, the stack
    /// pointer and the scratch registers.
    fn registers(&self) -> Vec<RegisterDesc>;

    fn frame_pointer(&self) -> &'static str;

    /// Two reserved scratch registers for addressing synthesis: one for
    /// scale multiplies, one for displacement folds.
    fn scratches(&self, class: RegClass) -> [&'static str; 2];

    /// Widest register view, in bytes.
    fn max_width(&self) -> u8 {
        8
    }

    /// Whether `value` fits the short-immediate field of add/sub forms.
    fn short_imm_fits(&self, value: i64) -> bool;

    /// Whether the addressing mode supports `scale` as an index multiplier.
    fn scale_supported(&self, scale: u64) -> bool;

    fn load_immediate(&self, out: &mut MachineListing, dst: &'static str, value: i64, width: u8) {
        let _ = width;
        out.emit(MachineOp::Li, vec![MachineOperand::Reg(dst), MachineOperand::Imm(value)]);
    }

    /// Materialize the address described by an addressing expression.
    fn load_address(&self, out: &mut MachineListing, dst: &'static str, addr: MemRef) {
        out.emit(MachineOp::La, vec![MachineOperand::Reg(dst), MachineOperand::Mem(addr)]);
    }

    /// Materialize the address of a symbol.
    fn load_symbol(&self, out: &mut MachineListing, dst: &'static str, symbol: &str) {
        out.emit(
            MachineOp::La,
            vec![MachineOperand::Reg(dst), MachineOperand::Sym(symbol.to_string())],
        );
    }

    /// Materialize the address of a string literal by label.
    fn load_string(&self, out: &mut MachineListing, dst: &'static str, label: &str) {
        out.emit(
            MachineOp::Ls,
            vec![MachineOperand::Reg(dst), MachineOperand::Sym(label.to_string())],
        );
    }

    fn load(&self, out: &mut MachineListing, class: RegClass, dst: &'static str, addr: MemRef) {
        let op = match class {
            RegClass::Int => MachineOp::Ld,
            RegClass::Float => MachineOp::Fld,
        };
        out.emit(op, vec![MachineOperand::Reg(dst), MachineOperand::Mem(addr)]);
    }

    fn store(&self, out: &mut MachineListing, class: RegClass, src: &'static str, addr: MemRef) {
        let op = match class {
            RegClass::Int => MachineOp::St,
            RegClass::Float => MachineOp::Fst,
        };
        out.emit(op, vec![MachineOperand::Reg(src), MachineOperand::Mem(addr)]);
    }

    fn move_reg(&self, out: &mut MachineListing, class: RegClass, dst: &'static str, src: &'static str) {
        let op = match class {
            RegClass::Int => MachineOp::Mov,
            RegClass::Float => MachineOp::Fmov,
        };
        out.emit(op, vec![MachineOperand::Reg(dst), MachineOperand::Reg(src)]);
    }

    /// Sign-extend `src`'s low `from_width` bytes into the full width of
    /// `dst`.
    fn sign_extend(&self, out: &mut MachineListing, dst: &'static str, src: &'static str, from_width: u8) {
        out.emit(
            MachineOp::Sxt,
            vec![
                MachineOperand::Reg(dst),
                MachineOperand::Reg(src),
                MachineOperand::Imm(from_width as i64 * 8),
            ],
        );
    }

    /// `dst = src + value`. Callers check [`Target::short_imm_fits`] first.
    fn add_immediate(&self, out: &mut MachineListing, dst: &'static str, src: &'static str, value: i64) {
        out.emit(
            MachineOp::Add,
            vec![
                MachineOperand::Reg(dst),
                MachineOperand::Reg(src),
                MachineOperand::Imm(value),
            ],
        );
    }

    /// Three-operand register-register arithmetic.
    fn binary(
        &self,
        out: &mut MachineListing,
        class: RegClass,
        op: ArithOp,
        dst: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    ) {
        out.emit(
            op.machine_op(class),
            vec![
                MachineOperand::Reg(dst),
                MachineOperand::Reg(lhs),
                MachineOperand::Reg(rhs),
            ],
        );
    }

    /// Arithmetic with an immediate right operand. Returns `false` when the
    /// backend has no immediate form for `op`; the caller then materializes
    /// the constant in a register.
    fn binary_immediate(
        &self,
        out: &mut MachineListing,
        op: ArithOp,
        dst: &'static str,
        lhs: &'static str,
        value: i64,
    ) -> bool {
        let machine_op = match op {
            ArithOp::Add => MachineOp::Add,
            ArithOp::Sub => MachineOp::Sub,
            ArithOp::And => MachineOp::And,
            ArithOp::Or => MachineOp::Or,
            ArithOp::Xor => MachineOp::Xor,
            ArithOp::Shl => MachineOp::Shl,
            ArithOp::Shr => MachineOp::Shr,
            _ => return false,
        };
        out.emit(
            machine_op,
            vec![
                MachineOperand::Reg(dst),
                MachineOperand::Reg(lhs),
                MachineOperand::Imm(value),
            ],
        );
        true
    }

    fn unary(
        &self,
        out: &mut MachineListing,
        class: RegClass,
        op: UnaryOp,
        dst: &'static str,
        src: &'static str,
    ) {
        let machine_op = match (op, class) {
            (UnaryOp::Neg, RegClass::Int) => MachineOp::Neg,
            (UnaryOp::Neg, RegClass::Float) => MachineOp::Fneg,
            (UnaryOp::Not, _) => MachineOp::Not,
        };
        out.emit(machine_op, vec![MachineOperand::Reg(dst), MachineOperand::Reg(src)]);
    }

    fn jump(&self, out: &mut MachineListing, label: &str) {
        out.emit(MachineOp::Jmp, vec![MachineOperand::Label(label.to_string())]);
    }
}

//! Target-neutral machine instruction listing.
//!
//! The selector and compiler emit a RISC-style instruction vocabulary;
//! binary encoding per instruction set is the (external) emitter's job.
//! Lines carry an optional comment describing the TAC they came from, which
//! makes the generated listings legible in tests and demo output.

use std::fmt::{self, Display, Formatter};

use itertools::Itertools;

use crate::listing::Listing;

pub type MachineListing = Listing<Line>;

/// A machine operation. General and floating forms are distinct where the
/// register files are disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum MachineOp {
    /// Load an immediate value.
    Li,
    /// Load the address of a symbol or addressing expression.
    La,
    /// Load the address of a string literal.
    Ls,
    /// Memory-to-register load.
    Ld,
    /// Register-to-memory store.
    St,
    Fld,
    Fst,
    Mov,
    Fmov,
    /// Sign-extend a narrower value into a wider register.
    Sxt,
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
    Neg,
    Not,
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
    Fneg,
    Jmp,
}

impl Display for MachineOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            MachineOp::Li => "li",
            MachineOp::La => "la",
            MachineOp::Ls => "ls",
            MachineOp::Ld => "ld",
            MachineOp::St => "st",
            MachineOp::Fld => "fld",
            MachineOp::Fst => "fst",
            MachineOp::Mov => "mov",
            MachineOp::Fmov => "fmov",
            MachineOp::Sxt => "sxt",
            MachineOp::Add => "add",
            MachineOp::Sub => "sub",
            MachineOp::Mul => "mul",
            MachineOp::Div => "div",
            MachineOp::Rem => "rem",
            MachineOp::And => "and",
            MachineOp::Or => "or",
            MachineOp::Xor => "xor",
            MachineOp::Shl => "shl",
            MachineOp::Shr => "shr",
            MachineOp::Neg => "neg",
            MachineOp::Not => "not",
            MachineOp::Fadd => "fadd",
            MachineOp::Fsub => "fsub",
            MachineOp::Fmul => "fmul",
            MachineOp::Fdiv => "fdiv",
            MachineOp::Fneg => "fneg",
            MachineOp::Jmp => "jmp",
        };
        f.write_str(name)
    }
}

/// The base of an addressing expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemBase {
    Reg(&'static str),
    /// A global, addressed by symbol.
    Sym(String),
}

/// A base + index*scale + displacement addressing expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemRef {
    pub base: MemBase,
    pub index: Option<&'static str>,
    pub scale: u8,
    pub disp: i64,
    /// Access size in bytes.
    pub size: u8,
}

impl MemRef {
    pub fn base_reg(base: &'static str, disp: i64, size: u8) -> Self {
        Self {
            base: MemBase::Reg(base),
            index: None,
            scale: 1,
            disp,
            size,
        }
    }

    pub fn symbol(name: &str, disp: i64, size: u8) -> Self {
        Self {
            base: MemBase::Sym(name.to_string()),
            index: None,
            scale: 1,
            disp,
            size,
        }
    }
}

impl Display for MemRef {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "[")?;
        match &self.base {
            MemBase::Reg(reg) => write!(f, "{}", reg)?,
            MemBase::Sym(sym) => write!(f, "{}", sym)?,
        }
        if let Some(index) = self.index {
            write!(f, "+{}*{}", index, self.scale)?;
        }
        match self.disp {
            0 => (),
            d if d < 0 => write!(f, "{}", d)?,
            d => write!(f, "+{}", d)?,
        }
        write!(f, "]")
    }
}

/// An operand of a machine instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineOperand {
    Reg(&'static str),
    Imm(i64),
    Mem(MemRef),
    Sym(String),
    Label(String),
}

impl Display for MachineOperand {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            MachineOperand::Reg(reg) => f.write_str(reg),
            MachineOperand::Imm(value) => write!(f, "{}", value),
            MachineOperand::Mem(mem) => mem.fmt(f),
            MachineOperand::Sym(sym) => f.write_str(sym),
            MachineOperand::Label(label) => f.write_str(label),
        }
    }
}

/// A single instruction: an operation and zero or more operands.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineInstr {
    pub op: MachineOp,
    pub operands: Vec<MachineOperand>,
}

impl MachineInstr {
    pub fn new(op: MachineOp, operands: Vec<MachineOperand>) -> Self {
        Self { op, operands }
    }
}

impl Display for MachineInstr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "    {:7} ", self.op.to_string())?;
        f.write_str(&self.operands.iter().join(", "))
    }
}

/// A line of machine code: an instruction with an optional comment.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub instr: MachineInstr,
    pub comment: Option<String>,
}

impl Display for Line {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match &self.comment {
            None => self.instr.fmt(f),
            Some(comment) => write!(f, "{:40}; {}", self.instr.to_string(), comment),
        }
    }
}

/// Push helpers shared by the selector and the compiler.
pub trait Emit {
    fn emit(&mut self, op: MachineOp, operands: Vec<MachineOperand>);
    fn emit_cmt<S: Into<String>>(&mut self, op: MachineOp, operands: Vec<MachineOperand>, cmt: S);
}

impl Emit for MachineListing {
    fn emit(&mut self, op: MachineOp, operands: Vec<MachineOperand>) {
        self.push(Line {
            instr: MachineInstr::new(op, operands),
            comment: None,
        });
    }

    fn emit_cmt<S: Into<String>>(&mut self, op: MachineOp, operands: Vec<MachineOperand>, cmt: S) {
        self.push(Line {
            instr: MachineInstr::new(op, operands),
            comment: Some(cmt.into()),
        });
    }
}

//! Compiles a three-address listing into machine instructions.
//!
//! The compiler walks the TAC in order, pins the operands of the current
//! instruction so register selection cannot evict them mid-instruction, and
//! dispatches per opcode. Register selection and spilling live in the
//! selector; addressing synthesis in the addressing module.

use log::trace;

use crate::codegen::machine::{MachineListing, MemRef};
use crate::codegen::registers::{RegClass, RegisterDesc, RegisterFile};
use crate::codegen::target::{ArithOp, Target, UnaryOp};
use crate::error::{CodegenError, Result};
use crate::il::dag::{DagArena, NodeId};
use crate::il::tac::{TacInstr, TacListing, TacOpcode, TacOperand};
use crate::vars::{Frame, Storage, VarTable};

pub struct TacCompiler<'a, T: Target> {
    pub(crate) target: &'a T,
    pub(crate) arena: &'a mut DagArena,
    pub(crate) vars: &'a mut VarTable,
    pub(crate) frame: &'a mut Frame,
    pub(crate) regs: RegisterFile,
    pub(crate) out: MachineListing,
    /// Nodes belonging to the instruction being compiled. Selection never
    /// evicts a pinned node; running out of unpinned registers is fatal.
    pub(crate) pinned: Vec<NodeId>,
}

impl<'a, T: Target> TacCompiler<'a, T> {
    pub fn new(
        target: &'a T,
        arena: &'a mut DagArena,
        vars: &'a mut VarTable,
        frame: &'a mut Frame,
    ) -> Self {
        let regs = RegisterFile::new(target.registers());
        Self::with_register_file(target, arena, vars, frame, regs)
    }

    /// Compile against a restricted register set. Shrinking the file forces
    /// spills early, which the selector tests rely on.
    pub fn with_registers<I: IntoIterator<Item = RegisterDesc>>(
        target: &'a T,
        arena: &'a mut DagArena,
        vars: &'a mut VarTable,
        frame: &'a mut Frame,
        descs: I,
    ) -> Self {
        Self::with_register_file(target, arena, vars, frame, RegisterFile::new(descs))
    }

    fn with_register_file(
        target: &'a T,
        arena: &'a mut DagArena,
        vars: &'a mut VarTable,
        frame: &'a mut Frame,
        regs: RegisterFile,
    ) -> Self {
        Self {
            target,
            arena,
            vars,
            frame,
            regs,
            out: MachineListing::new(),
            pinned: vec![],
        }
    }

    pub fn compile(mut self, tac: &TacListing) -> Result<MachineListing> {
        for (position, instr) in tac.iter_lines() {
            trace!("compiling {} at {}", instr, position);
            self.pin_operands(instr);
            self.compile_instr(instr)?;
        }
        Ok(self.out)
    }

    fn pin_operands(&mut self, instr: &TacInstr) {
        let nodes: Vec<NodeId> = instr
            .srcs
            .iter()
            .chain(instr.dsts.iter())
            .filter_map(TacOperand::as_node)
            .collect();
        self.pinned = nodes.into_iter().map(|n| self.resolve(n)).collect();
    }

    fn compile_instr(&mut self, instr: &TacInstr) -> Result<()> {
        let mark = self.out.len();
        match instr.op {
            TacOpcode::Assign => self.compile_assign(instr)?,
            TacOpcode::Add
            | TacOpcode::Sub
            | TacOpcode::Mul
            | TacOpcode::Div
            | TacOpcode::Mod
            | TacOpcode::BitAnd
            | TacOpcode::BitOr
            | TacOpcode::BitXor
            | TacOpcode::Shl
            | TacOpcode::Shr => self.compile_binary(instr)?,
            TacOpcode::Neg | TacOpcode::BitNot => self.compile_unary(instr)?,
            TacOpcode::Cast => self.compile_cast(instr)?,
            TacOpcode::Inc | TacOpcode::Dec => self.compile_step(instr)?,
            TacOpcode::AddressOf => self.compile_address_of(instr)?,
            TacOpcode::AddressOfPointer => {
                let addr = self.member_operand_address(instr)?;
                let d = self.select(self.dst(instr)?, false)?;
                let dst_name = self.regs.get(d).name();
                self.target.load_address(&mut self.out, dst_name, addr);
            }
            TacOpcode::AddressOfIndex => {
                let addr = self.index_operand_address(instr)?;
                let d = self.select(self.dst(instr)?, false)?;
                let dst_name = self.regs.get(d).name();
                self.target.load_address(&mut self.out, dst_name, addr);
            }
            TacOpcode::Load => {
                let addr = self.deref_address(self.src(instr, 0)?)?;
                self.load_into_dst(instr, addr)?;
            }
            TacOpcode::LoadIndex => {
                let addr = self.index_operand_address(instr)?;
                self.load_into_dst(instr, addr)?;
            }
            TacOpcode::LoadMember => {
                let addr = self.member_operand_address(instr)?;
                self.load_into_dst(instr, addr)?;
            }
            TacOpcode::Store => {
                let addr = self.deref_address(self.src(instr, 0)?)?;
                self.store_value(self.src(instr, 1)?, addr)?;
            }
            TacOpcode::StoreIndex => {
                let addr = self.index_operand_address(instr)?;
                self.store_value(self.src(instr, 2)?, addr)?;
            }
            TacOpcode::StoreMember => {
                let addr = self.member_operand_address(instr)?;
                self.store_value(self.src(instr, 2)?, addr)?;
            }
            TacOpcode::Goto => {
                let block = match instr.srcs.first() {
                    Some(TacOperand::Block(block)) => *block,
                    _ => return Err(CodegenError::MalformedInstr(instr.to_string())),
                };
                self.target.jump(&mut self.out, &format!("L{}", block.0));
            }
        }
        if self.out.len() > mark {
            self.comment_last(instr.to_string());
        }
        Ok(())
    }

    fn compile_assign(&mut self, instr: &TacInstr) -> Result<()> {
        let src = self.resolve(self.src(instr, 0)?);
        let dst = self.dst(instr)?;
        let d = self.select(dst, false)?;
        let dst_name = self.regs.get(d).name();
        if let Some(value) = self.const_int(src) {
            let width = self.width_of(dst);
            self.target.load_immediate(&mut self.out, dst_name, value, width);
        } else {
            let s = self.select(src, true)?;
            let src_name = self.regs.get(s).name();
            let class = self.class_of(src);
            self.target.move_reg(&mut self.out, class, dst_name, src_name);
        }
        Ok(())
    }

    fn compile_binary(&mut self, instr: &TacInstr) -> Result<()> {
        let op = arith_op(instr.op).ok_or_else(|| CodegenError::MalformedInstr(instr.to_string()))?;
        let lhs = self.resolve(self.src(instr, 0)?);
        let rhs = self.resolve(self.src(instr, 1)?);
        let dst = self.dst(instr)?;
        let class = self.class_of(lhs);
        if class == RegClass::Float && instr.op == TacOpcode::Mod {
            return Err(CodegenError::MalformedInstr(format!(
                "floating-point modulo: {}",
                instr
            )));
        }

        // Constant right operands that fit the short-immediate field skip
        // materialization, when the backend has an immediate form.
        if class == RegClass::Int {
            if let Some(value) = self.const_int(rhs) {
                if self.target.short_imm_fits(value) {
                    let l = self.select(lhs, true)?;
                    let lhs_name = self.regs.get(l).name();
                    let d = self.select(dst, false)?;
                    let dst_name = self.regs.get(d).name();
                    if self
                        .target
                        .binary_immediate(&mut self.out, op, dst_name, lhs_name, value)
                    {
                        return Ok(());
                    }
                }
            }
        }

        let l = self.select(lhs, true)?;
        let lhs_name = self.regs.get(l).name();
        let r = self.select(rhs, true)?;
        let rhs_name = self.regs.get(r).name();
        let d = self.select(dst, false)?;
        let dst_name = self.regs.get(d).name();
        self.target
            .binary(&mut self.out, class, op, dst_name, lhs_name, rhs_name);
        Ok(())
    }

    fn compile_unary(&mut self, instr: &TacInstr) -> Result<()> {
        let op = match instr.op {
            TacOpcode::Neg => UnaryOp::Neg,
            _ => UnaryOp::Not,
        };
        let src = self.resolve(self.src(instr, 0)?);
        let dst = self.dst(instr)?;
        let class = self.class_of(src);
        let s = self.select(src, true)?;
        let src_name = self.regs.get(s).name();
        let d = self.select(dst, false)?;
        let dst_name = self.regs.get(d).name();
        self.target.unary(&mut self.out, class, op, dst_name, src_name);
        Ok(())
    }

    fn compile_cast(&mut self, instr: &TacInstr) -> Result<()> {
        let src = self.resolve(self.src(instr, 0)?);
        let dst = self.dst(instr)?;
        // The result variable names the width and signedness being cast to;
        // without it the conversion is undefined.
        let dst_var = self.arena[dst].var.ok_or_else(|| {
            CodegenError::MalformedInstr(format!("cast without a result variable: {}", instr))
        })?;
        let to = self.vars[dst_var].width();
        let from = self.width_of(src);
        let signed = match self.arena[src].var {
            Some(v) => self.vars[v].signed,
            None => true,
        };
        let s = self.select(src, true)?;
        let src_name = self.regs.get(s).name();
        let d = self.select(dst, false)?;
        let dst_name = self.regs.get(d).name();
        if to > from && signed {
            self.target.sign_extend(&mut self.out, dst_name, src_name, from);
        } else {
            // Truncation and unsigned widening need no instruction beyond a
            // move; the destination color's width view does the rest.
            let class = self.class_of(dst);
            self.target.move_reg(&mut self.out, class, dst_name, src_name);
        }
        Ok(())
    }

    /// Increment/decrement in place. Pointers step by their element size.
    fn compile_step(&mut self, instr: &TacInstr) -> Result<()> {
        let node = self.resolve(self.src(instr, 0)?);
        let r = self.select(node, true)?;
        let name = self.regs.get(r).name();
        let step = match self.arena[node].var {
            Some(v) if self.vars[v].pointer > 0 => self.vars[v].elem_size as i64,
            _ => 1,
        };
        let step = match instr.op {
            TacOpcode::Inc => step,
            _ => -step,
        };
        self.target.add_immediate(&mut self.out, name, name, step);
        Ok(())
    }

    fn compile_address_of(&mut self, instr: &TacInstr) -> Result<()> {
        let place = self.src(instr, 0)?;
        let dst = self.dst(instr)?;
        let var_id = self.arena[place].var.ok_or_else(|| {
            CodegenError::MalformedInstr(format!("address of an unbound node: {}", instr))
        })?;
        let var = self.vars[var_id].clone();
        let d = self.select(dst, false)?;
        let dst_name = self.regs.get(d).name();
        match var.storage {
            Storage::Global => self.target.load_symbol(&mut self.out, dst_name, &var.name),
            Storage::Const => {
                return Err(CodegenError::UnsupportedAddressing(format!(
                    "address of constant '{}'",
                    var.name
                )))
            }
            _ => {
                let offset = var
                    .frame_offset
                    .ok_or(CodegenError::UnplacedTemporary(var.name))?;
                let home = MemRef::base_reg(self.target.frame_pointer(), offset, 8);
                self.target.load_address(&mut self.out, dst_name, home);
            }
        }
        Ok(())
    }

    /// Addressing for member instructions: sources are [base, member, ..].
    fn member_operand_address(&mut self, instr: &TacInstr) -> Result<MemRef> {
        let base = self.src(instr, 0)?;
        let member = self.src(instr, 1)?;
        let member_var = self.arena[member].var.ok_or_else(|| {
            CodegenError::MalformedInstr(format!("member operand without a variable: {}", instr))
        })?;
        self.member_address(base, member_var)
    }

    /// Addressing for index instructions: sources are [base, index, ..]. The
    /// scale comes from an explicit constant third source when present and a
    /// node, otherwise from the base's element size.
    fn index_operand_address(&mut self, instr: &TacInstr) -> Result<MemRef> {
        let base = self.src(instr, 0)?;
        let index = self.src(instr, 1)?;
        let scale = match instr.op {
            TacOpcode::AddressOfIndex => self
                .src(instr, 2)
                .ok()
                .and_then(|n| self.const_int(n))
                .map(|s| s as u64)
                .unwrap_or_else(|| self.elem_size_of(base)),
            _ => self.elem_size_of(base),
        };
        self.index_address(base, index, scale)
    }

    fn load_into_dst(&mut self, instr: &TacInstr, addr: MemRef) -> Result<()> {
        let dst = self.dst(instr)?;
        let class = self.class_of(dst);
        let d = self.select(dst, false)?;
        let dst_name = self.regs.get(d).name();
        self.target.load(&mut self.out, class, dst_name, addr);
        Ok(())
    }

    fn store_value(&mut self, value: NodeId, addr: MemRef) -> Result<()> {
        let value = self.resolve(value);
        let class = self.class_of(value);
        let s = self.select(value, true)?;
        let src_name = self.regs.get(s).name();
        self.target.store(&mut self.out, class, src_name, addr);
        Ok(())
    }

    fn elem_size_of(&self, base: NodeId) -> u64 {
        match self.arena[base].var {
            Some(v) => self.vars[v].elem_size,
            None => 8,
        }
    }

    fn src(&self, instr: &TacInstr, index: usize) -> Result<NodeId> {
        instr
            .src_node(index)
            .ok_or_else(|| CodegenError::MalformedInstr(instr.to_string()))
    }

    fn dst(&self, instr: &TacInstr) -> Result<NodeId> {
        instr
            .dst_node()
            .ok_or_else(|| CodegenError::MalformedInstr(instr.to_string()))
    }

    pub(crate) fn comment_last(&mut self, cmt: impl Into<String>) {
        if let Some(line) = self.out.last_mut() {
            if line.comment.is_none() {
                line.comment = Some(cmt.into());
            }
        }
    }
}

fn arith_op(op: TacOpcode) -> Option<ArithOp> {
    Some(match op {
        TacOpcode::Add => ArithOp::Add,
        TacOpcode::Sub => ArithOp::Sub,
        TacOpcode::Mul => ArithOp::Mul,
        TacOpcode::Div => ArithOp::Div,
        TacOpcode::Mod => ArithOp::Rem,
        TacOpcode::BitAnd => ArithOp::And,
        TacOpcode::BitOr => ArithOp::Or,
        TacOpcode::BitXor => ArithOp::Xor,
        TacOpcode::Shl => ArithOp::Shl,
        TacOpcode::Shr => ArithOp::Shr,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::machine::{MachineOp, MachineOperand, MemBase};
    use crate::codegen::x64::X64;
    use crate::il::dag::OperatorKind;
    use crate::il::operators::OperatorTable;
    use crate::il::LoweringEngine;
    use crate::vars::Variable;

    struct Fixture {
        arena: DagArena,
        vars: VarTable,
        frame: Frame,
        listing: TacListing,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                arena: DagArena::new(),
                vars: VarTable::new(),
                frame: Frame::new(),
                listing: TacListing::new(),
            }
        }

        fn leaf(&mut self, var: Variable) -> NodeId {
            let id = self.vars.add(var);
            self.arena.leaf(id)
        }

        fn lower(&mut self, node: NodeId) {
            let table = OperatorTable::new();
            let mut engine = LoweringEngine::new(&mut self.arena, &table);
            engine.lower(&mut self.listing, node).unwrap();
        }

        fn compile(&mut self) -> MachineListing {
            let target = X64;
            let compiler =
                TacCompiler::new(&target, &mut self.arena, &mut self.vars, &mut self.frame);
            compiler.compile(&self.listing).unwrap()
        }

        fn ops(listing: &MachineListing) -> Vec<MachineOp> {
            listing.iter_instructions().map(|l| l.instr.op).collect()
        }
    }

    #[test]
    fn indexed_read_with_constant_offset_folds_into_displacement() {
        let mut fx = Fixture::new();
        let arr = fx.leaf(Variable::local("arr", 40, -40).with_array(1, 4));
        let two = fx.leaf(Variable::int_const(2));
        let elem = fx.arena.node(OperatorKind::Index, vec![arr, two]);
        fx.lower(elem);

        let out = fx.compile();

        // A single load; the element address is rbp-relative with the
        // constant index folded in: -40 + 2*4 = -32. No index register.
        assert_eq!(vec![MachineOp::Ld], Fixture::ops(&out));
        let line = out.iter_instructions().next().unwrap();
        match &line.instr.operands[1] {
            MachineOperand::Mem(mem) => {
                assert_eq!(MemBase::Reg("rbp"), mem.base);
                assert_eq!(None, mem.index);
                assert_eq!(-32, mem.disp);
                assert_eq!(4, mem.size);
            }
            other => panic!("expected a memory operand, got {:?}", other),
        }
    }

    #[test]
    fn narrow_signed_index_is_sign_extended_before_scaling() {
        let mut fx = Fixture::new();
        let arr = fx.leaf(Variable::local("arr", 40, -40).with_array(1, 4));
        let i = fx.leaf(Variable::local("i", 4, -48));
        let elem = fx.arena.node(OperatorKind::Index, vec![arr, i]);
        fx.lower(elem);

        let out = fx.compile();

        // Load the index, widen it, then the scaled element load.
        assert_eq!(
            vec![MachineOp::Ld, MachineOp::Sxt, MachineOp::Ld],
            Fixture::ops(&out)
        );
        let elem_load = out.iter_instructions().last().unwrap();
        match &elem_load.instr.operands[1] {
            MachineOperand::Mem(mem) => {
                assert_eq!(MemBase::Reg("rbp"), mem.base);
                assert!(mem.index.is_some());
                assert_eq!(4, mem.scale);
                assert_eq!(-40, mem.disp);
            }
            other => panic!("expected a memory operand, got {:?}", other),
        }
    }

    #[test]
    fn unsupported_scale_multiplies_through_the_scratch_register() {
        let mut fx = Fixture::new();
        // 12-byte elements: no addressing mode scales by 12.
        let arr = fx.leaf(Variable::local("arr", 120, -120).with_array(1, 12));
        let i = fx.leaf(Variable::local("i", 8, -128));
        let elem = fx.arena.node(OperatorKind::Index, vec![arr, i]);
        fx.lower(elem);

        let out = fx.compile();

        let ops = Fixture::ops(&out);
        assert_eq!(1, ops.iter().filter(|&&op| op == MachineOp::Mul).count());
        let elem_load = out.iter_instructions().last().unwrap();
        match &elem_load.instr.operands[1] {
            MachineOperand::Mem(mem) => {
                assert_eq!(Some("r10"), mem.index);
                assert_eq!(1, mem.scale);
            }
            other => panic!("expected a memory operand, got {:?}", other),
        }
    }

    #[test]
    fn small_constant_operand_uses_the_immediate_form() {
        let mut fx = Fixture::new();
        let x = fx.leaf(Variable::local("x", 8, -8));
        let a = fx.leaf(Variable::local("a", 8, -16));
        let three = fx.leaf(Variable::int_const(3));
        let sum = fx.arena.node(OperatorKind::Add, vec![a, three]);
        let assign = fx.arena.node(OperatorKind::Assign, vec![x, sum]);
        fx.lower(assign);

        let out = fx.compile();

        // One load for a, then add-immediate straight into x's register.
        assert_eq!(vec![MachineOp::Ld, MachineOp::Add], Fixture::ops(&out));
        let add = out.iter_instructions().last().unwrap();
        assert_eq!(MachineOperand::Imm(3), add.instr.operands[2]);
    }

    #[test]
    fn array_read_plus_constant_compiles_end_to_end() {
        let mut fx = Fixture::new();
        let x = fx.leaf(Variable::local("x", 8, -8));
        let arr = fx.leaf(Variable::local("a", 40, -48).with_array(1, 4));
        let i = fx.leaf(Variable::local("i", 4, -56));
        let three = fx.leaf(Variable::int_const(3));
        let elem = fx.arena.node(OperatorKind::Index, vec![arr, i]);
        let sum = fx.arena.node(OperatorKind::Add, vec![elem, three]);
        let assign = fx.arena.node(OperatorKind::Assign, vec![x, sum]);
        fx.lower(assign);

        let out = fx.compile();

        // Index load, widen, element load, add-immediate. The assignment
        // itself was coalesced away during lowering.
        assert_eq!(
            vec![MachineOp::Ld, MachineOp::Sxt, MachineOp::Ld, MachineOp::Add],
            Fixture::ops(&out)
        );
    }

    #[test]
    fn store_through_pointer_emits_a_store() {
        let mut fx = Fixture::new();
        let p = fx.leaf(Variable::local("p", 8, -8).with_pointer(1).with_elem_size(8));
        let v = fx.leaf(Variable::local("v", 8, -16));
        let store = fx.arena.node(OperatorKind::AssignDeref, vec![p, v]);
        fx.lower(store);

        let out = fx.compile();

        assert_eq!(
            vec![MachineOp::Ld, MachineOp::Ld, MachineOp::St],
            Fixture::ops(&out)
        );
    }

    #[test]
    fn pointer_increment_steps_by_element_size() {
        let mut fx = Fixture::new();
        let p = fx.leaf(Variable::local("p", 8, -8).with_pointer(1).with_elem_size(4));
        let inc = fx.arena.node(OperatorKind::Inc, vec![p]);
        fx.lower(inc);

        let out = fx.compile();

        let add = out.iter_instructions().last().unwrap();
        assert_eq!(MachineOp::Add, add.instr.op);
        assert_eq!(MachineOperand::Imm(4), add.instr.operands[2]);
    }

    #[test]
    fn member_read_through_pointer_uses_the_member_offset() {
        let mut fx = Fixture::new();
        let p = fx.leaf(Variable::local("p", 8, -8).with_pointer(1).with_struct());
        let field = fx.leaf(Variable::global("y", 8).with_member_offset(16));
        let read = fx.arena.node(OperatorKind::Member, vec![p, field]);
        fx.lower(read);

        let out = fx.compile();

        let load = out.iter_instructions().last().unwrap();
        match &load.instr.operands[1] {
            MachineOperand::Mem(mem) => {
                assert_eq!(16, mem.disp);
                assert!(matches!(mem.base, MemBase::Reg(_)));
            }
            other => panic!("expected a memory operand, got {:?}", other),
        }
    }

    #[test]
    fn float_subexpressions_stay_in_the_float_file() {
        let mut fx = Fixture::new();
        let a = fx.leaf(Variable::local("a", 8, -8).with_float());
        let b = fx.leaf(Variable::local("b", 8, -16).with_float());
        let c = fx.leaf(Variable::local("c", 8, -24).with_float());
        let product = fx.arena.node(OperatorKind::Mul, vec![a, b]);
        let sum = fx.arena.node(OperatorKind::Add, vec![product, c]);
        fx.lower(sum);

        let out = fx.compile();

        // The var-less product must be allocated in the float file, and the
        // outer add compiled with the floating opcode.
        assert_eq!(
            vec![
                MachineOp::Fld,
                MachineOp::Fld,
                MachineOp::Fmul,
                MachineOp::Fld,
                MachineOp::Fadd,
            ],
            Fixture::ops(&out)
        );
        let fmul = out
            .iter_instructions()
            .find(|l| l.instr.op == MachineOp::Fmul)
            .unwrap();
        match &fmul.instr.operands[0] {
            MachineOperand::Reg(name) => assert!(name.starts_with("xmm"), "got {}", name),
            other => panic!("expected a register operand, got {:?}", other),
        }
    }

    #[test]
    fn widening_a_signed_value_sign_extends() {
        let mut fx = Fixture::new();
        let i = fx.leaf(Variable::local("i", 4, -8));
        let wide = fx.vars.add(Variable::temp("w", 8));
        let cast = fx.arena.node_with_var(OperatorKind::Cast, wide, vec![i]);
        fx.lower(cast);

        let out = fx.compile();

        assert_eq!(vec![MachineOp::Ld, MachineOp::Sxt], Fixture::ops(&out));
        let sxt = out.iter_instructions().last().unwrap();
        assert_eq!(MachineOperand::Imm(32), sxt.instr.operands[2]);
    }

    #[test]
    fn narrowing_cast_is_a_plain_move() {
        let mut fx = Fixture::new();
        let x = fx.leaf(Variable::local("x", 8, -8));
        let narrow = fx.vars.add(Variable::temp("n", 4));
        let cast = fx.arena.node_with_var(OperatorKind::Cast, narrow, vec![x]);
        fx.lower(cast);

        let out = fx.compile();

        assert_eq!(vec![MachineOp::Ld, MachineOp::Mov], Fixture::ops(&out));
    }

    #[test]
    fn widening_an_unsigned_value_is_a_plain_move() {
        let mut fx = Fixture::new();
        let u = fx.leaf(Variable::local("u", 4, -8).with_unsigned());
        let wide = fx.vars.add(Variable::temp("w", 8));
        let cast = fx.arena.node_with_var(OperatorKind::Cast, wide, vec![u]);
        fx.lower(cast);

        let out = fx.compile();

        assert_eq!(vec![MachineOp::Ld, MachineOp::Mov], Fixture::ops(&out));
    }

    #[test]
    fn cast_without_a_result_variable_is_malformed() {
        let mut fx = Fixture::new();
        let i = fx.leaf(Variable::local("i", 4, -8));
        let cast = fx.arena.node(OperatorKind::Cast, vec![i]);
        fx.lower(cast);

        let target = X64;
        let compiler =
            TacCompiler::new(&target, &mut fx.arena, &mut fx.vars, &mut fx.frame);
        let err = compiler.compile(&fx.listing).unwrap_err();

        assert!(matches!(err, CodegenError::MalformedInstr(_)));
    }

    #[test]
    fn indexed_store_writes_through_the_scaled_address() {
        let mut fx = Fixture::new();
        let arr = fx.leaf(Variable::local("arr", 40, -40).with_array(1, 4));
        let one = fx.leaf(Variable::int_const(1));
        let v = fx.leaf(Variable::local("v", 4, -48));
        let store = fx.arena.node(OperatorKind::AssignIndex, vec![arr, one, v]);
        fx.lower(store);

        let out = fx.compile();

        // Constant index folds: the store lands at -40 + 1*4.
        assert_eq!(vec![MachineOp::Ld, MachineOp::St], Fixture::ops(&out));
        let st = out.iter_instructions().last().unwrap();
        match &st.instr.operands[1] {
            MachineOperand::Mem(mem) => {
                assert_eq!(MemBase::Reg("rbp"), mem.base);
                assert_eq!(-36, mem.disp);
                assert_eq!(4, mem.size);
            }
            other => panic!("expected a memory operand, got {:?}", other),
        }
    }

    #[test]
    fn member_store_writes_at_the_member_offset() {
        let mut fx = Fixture::new();
        let s = fx.leaf(Variable::local("s", 24, -24).with_struct());
        let field = fx.leaf(Variable::global("y", 4).with_member_offset(8));
        let v = fx.leaf(Variable::local("v", 4, -32));
        let store = fx.arena.node(OperatorKind::AssignMember, vec![s, field, v]);
        fx.lower(store);

        let out = fx.compile();

        assert_eq!(vec![MachineOp::Ld, MachineOp::St], Fixture::ops(&out));
        let st = out.iter_instructions().last().unwrap();
        match &st.instr.operands[1] {
            MachineOperand::Mem(mem) => {
                assert_eq!(MemBase::Reg("rbp"), mem.base);
                assert_eq!(-16, mem.disp);
                assert_eq!(4, mem.size);
            }
            other => panic!("expected a memory operand, got {:?}", other),
        }
    }

    #[test]
    fn address_of_member_through_pointer_materializes_the_address() {
        let mut fx = Fixture::new();
        let p = fx.leaf(Variable::local("p", 8, -8).with_pointer(1).with_struct());
        let field = fx.leaf(Variable::global("y", 8).with_member_offset(16));
        let addr = fx.arena.node(OperatorKind::AddressOf, vec![p, field]);
        fx.lower(addr);

        let out = fx.compile();

        assert_eq!(vec![MachineOp::Ld, MachineOp::La], Fixture::ops(&out));
        let la = out.iter_instructions().last().unwrap();
        match &la.instr.operands[1] {
            MachineOperand::Mem(mem) => {
                assert!(matches!(mem.base, MemBase::Reg(_)));
                assert_eq!(16, mem.disp);
            }
            other => panic!("expected a memory operand, got {:?}", other),
        }
    }

    #[test]
    fn address_of_array_element_materializes_the_scaled_address() {
        let mut fx = Fixture::new();
        let arr = fx.leaf(Variable::local("arr", 40, -40).with_array(1, 4));
        let i = fx.leaf(Variable::local("i", 8, -48));
        let four = fx.leaf(Variable::int_const(4));
        let addr = fx.arena.node(OperatorKind::AddressOf, vec![arr, i, four]);
        fx.lower(addr);

        let out = fx.compile();

        assert_eq!(vec![MachineOp::Ld, MachineOp::La], Fixture::ops(&out));
        let la = out.iter_instructions().last().unwrap();
        match &la.instr.operands[1] {
            MachineOperand::Mem(mem) => {
                assert_eq!(MemBase::Reg("rbp"), mem.base);
                assert!(mem.index.is_some());
                assert_eq!(4, mem.scale);
                assert_eq!(-40, mem.disp);
            }
            other => panic!("expected a memory operand, got {:?}", other),
        }
    }

    #[test]
    fn goto_jumps_to_the_block_label() {
        let mut fx = Fixture::new();
        fx.listing.push(TacInstr::effect(
            TacOpcode::Goto,
            vec![TacOperand::Block(crate::il::dag::BlockId(4))],
        ));

        let out = fx.compile();

        assert_eq!(vec![MachineOp::Jmp], Fixture::ops(&out));
        let jmp = out.iter_instructions().next().unwrap();
        assert_eq!(
            MachineOperand::Label("L4".to_string()),
            jmp.instr.operands[0]
        );
    }

    #[test]
    fn every_emitted_group_carries_its_tac_as_a_comment() {
        let mut fx = Fixture::new();
        let x = fx.leaf(Variable::local("x", 8, -8));
        let a = fx.leaf(Variable::local("a", 8, -16));
        let assign = fx.arena.node(OperatorKind::Assign, vec![x, a]);
        fx.lower(assign);

        let out = fx.compile();

        let last = out.iter_instructions().last().unwrap();
        assert!(last.comment.as_deref().unwrap().contains("assign"));
    }

    #[test]
    fn pinned_operands_exhausting_the_file_is_fatal() {
        let mut fx = Fixture::new();
        let a = fx.leaf(Variable::local("a", 8, -8));
        let b = fx.leaf(Variable::local("b", 8, -16));
        let sum = fx.arena.node(OperatorKind::Add, vec![a, b]);
        fx.lower(sum);

        let target = X64;
        let compiler = TacCompiler::with_registers(
            &target,
            &mut fx.arena,
            &mut fx.vars,
            &mut fx.frame,
            [RegisterDesc {
                class: RegClass::Int,
                id: 0,
                name: "rax",
            }],
        );
        let err = compiler.compile(&fx.listing).unwrap_err();

        assert_eq!(CodegenError::RegisterPressure(RegClass::Int), err);
    }
}

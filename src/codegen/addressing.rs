//! Addressing-expression synthesis.
//!
//! Builds base + index*scale + displacement operands for memory
//! instructions. Compile-time-constant indexes fold into the displacement;
//! narrow signed indexes are widened before scaling; scales the hardware
//! cannot express fall back to an explicit multiply through a scratch
//! register. The instruction compiler calls in here for every deref, member
//! and index operation.

use crate::codegen::compiler::TacCompiler;
use crate::codegen::machine::{MemBase, MemRef};
use crate::codegen::registers::RegClass;
use crate::codegen::target::{ArithOp, Target};
use crate::error::{CodegenError, Result};
use crate::il::dag::NodeId;
use crate::vars::{Storage, VarId};

impl<'a, T: Target> TacCompiler<'a, T> {
    /// `[reg]` for a pointer value, sized to the pointee.
    pub(crate) fn deref_address(&mut self, ptr: NodeId) -> Result<MemRef> {
        let ptr = self.resolve(ptr);
        let size = self.pointee_size(ptr);
        let index = self.select(ptr, true)?;
        Ok(MemRef::base_reg(self.regs.get(index).name(), 0, size))
    }

    /// The address of `member` relative to `base`, which is either a
    /// pointer value or a frame/global struct.
    pub(crate) fn member_address(&mut self, base: NodeId, member: VarId) -> Result<MemRef> {
        let offset = self.vars[member].member_offset as i64;
        let size = self.vars[member].width();
        let mut addr = self.base_address(base)?;
        addr.disp += offset;
        addr.size = size;
        Ok(addr)
    }

    /// The address of element `index` of `base`, scaled by `scale` bytes.
    pub(crate) fn index_address(
        &mut self,
        base: NodeId,
        index: NodeId,
        scale: u64,
    ) -> Result<MemRef> {
        let addr = self.base_address(base)?;
        self.indexed(addr, index, scale)
    }

    /// Combine an already-resolved base address with a runtime index. Also
    /// the second step of member-array addressing, where `addr` carries the
    /// member's displacement.
    pub(crate) fn indexed(&mut self, mut addr: MemRef, index: NodeId, scale: u64) -> Result<MemRef> {
        addr.size = scale.min(8) as u8;

        let index = self.resolve(index);
        if let Some(value) = self.const_int(index) {
            addr.disp += value * scale as i64;
            return Ok(addr);
        }

        let reg_index = self.select(index, true)?;
        let mut index_name = self.regs.get(reg_index).name();

        // A narrow signed index must be widened before it scales an
        // address; garbage in the high bits would corrupt the offset.
        let narrow_signed = match self.arena[index].var {
            Some(v) => self.vars[v].signed && self.vars[v].width() < self.target.max_width(),
            None => false,
        };
        if narrow_signed {
            let from = self.width_of(index);
            self.target
                .sign_extend(&mut self.out, index_name, index_name, from);
            let max = self.target.max_width();
            if let Some(color) = self.arena[index].color.as_mut() {
                color.width = max;
            }
        }

        let mut scale = scale;
        if !self.target.scale_supported(scale) {
            let [mul_scratch, _] = self.target.scratches(RegClass::Int);
            self.target
                .load_immediate(&mut self.out, mul_scratch, scale as i64, 8);
            self.target.binary(
                &mut self.out,
                RegClass::Int,
                ArithOp::Mul,
                mul_scratch,
                mul_scratch,
                index_name,
            );
            index_name = mul_scratch;
            scale = 1;
        }

        // A displacement left over on a pointer base (member offsets,
        // mostly) has to move into a register; only frame-pointer bases
        // keep their displacement in the operand.
        if addr.disp != 0 {
            if let MemBase::Reg(base_name) = addr.base {
                if base_name != self.target.frame_pointer() {
                    let [_, fold_scratch] = self.target.scratches(RegClass::Int);
                    if self.target.short_imm_fits(addr.disp) {
                        self.target
                            .add_immediate(&mut self.out, fold_scratch, base_name, addr.disp);
                    } else {
                        self.target
                            .load_immediate(&mut self.out, fold_scratch, addr.disp, 8);
                        self.target.binary(
                            &mut self.out,
                            RegClass::Int,
                            ArithOp::Add,
                            fold_scratch,
                            fold_scratch,
                            base_name,
                        );
                    }
                    addr.base = MemBase::Reg(fold_scratch);
                    addr.disp = 0;
                }
            }
        }

        addr.index = Some(index_name);
        addr.scale = scale as u8;
        Ok(addr)
    }

    /// Resolve a base value to a register or frame-relative operand.
    ///
    /// Frame-resident leaves address straight off the frame pointer; global
    /// aggregates and anything pointer-valued or computed go through a
    /// register.
    fn base_address(&mut self, base: NodeId) -> Result<MemRef> {
        let base = self.resolve(base);
        if self.arena[base].is_leaf() {
            if let Some(var_id) = self.arena[base].var {
                let var = &self.vars[var_id];
                if var.storage == Storage::Const {
                    return Err(CodegenError::UnsupportedAddressing(format!(
                        "constant '{}' used as an address base",
                        var.name
                    )));
                }
                if var.pointer == 0 && var.storage != Storage::Global {
                    let name = var.name.clone();
                    let offset = self.vars[var_id]
                        .frame_offset
                        .ok_or(CodegenError::UnplacedTemporary(name))?;
                    return Ok(MemRef::base_reg(self.target.frame_pointer(), offset, 8));
                }
            }
        }
        // Pointer values and global aggregates: the selector materializes
        // the address (or pointer) in a register.
        let index = self.select(base, true)?;
        Ok(MemRef::base_reg(self.regs.get(index).name(), 0, 8))
    }

    /// The byte size read through one level of dereference. Multiply
    /// indirect and aggregate pointees are accessed at full pointer width.
    fn pointee_size(&self, ptr: NodeId) -> u8 {
        match self.arena[ptr].var {
            Some(v) => {
                let var = &self.vars[v];
                if var.pointer > 1 || var.is_struct || var.dims > 0 {
                    8
                } else {
                    var.elem_size.min(8) as u8
                }
            }
            None => 8,
        }
    }
}

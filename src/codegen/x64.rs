//! x86-64 target description.
//!
//! `rbp` anchors the frame; `rsp` is never allocated. `r10`/`r11` (and the
//! top two vector registers) are reserved as addressing scratch. The SIB
//! byte gives hardware scales of 1, 2, 4 and 8, and arithmetic immediates
//! are sign-extended 32-bit.

use crate::codegen::registers::{RegClass, RegisterDesc};
use crate::codegen::target::Target;

pub struct X64;

const INT_REGS: &[&str] = &[
    "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "r8", "r9", "r12", "r13", "r14", "r15",
];

const FLOAT_REGS: &[&str] = &[
    "xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7", "xmm8", "xmm9", "xmm10",
    "xmm11", "xmm12", "xmm13",
];

impl Target for X64 {
    fn name(&self) -> &'static str {
        "x86-64"
    }

    fn registers(&self) -> Vec<RegisterDesc> {
        let ints = INT_REGS.iter().copied().enumerate().map(|(id, name)| RegisterDesc {
            class: RegClass::Int,
            id: id as u8,
            name,
        });
        let floats = FLOAT_REGS
            .iter()
            .copied()
            .enumerate()
            .map(|(id, name)| RegisterDesc {
                class: RegClass::Float,
                id: id as u8,
                name,
            });
        ints.chain(floats).collect()
    }

    fn frame_pointer(&self) -> &'static str {
        "rbp"
    }

    fn scratches(&self, class: RegClass) -> [&'static str; 2] {
        match class {
            RegClass::Int => ["r10", "r11"],
            RegClass::Float => ["xmm14", "xmm15"],
        }
    }

    fn short_imm_fits(&self, value: i64) -> bool {
        i32::try_from(value).is_ok()
    }

    fn scale_supported(&self, scale: u64) -> bool {
        matches!(scale, 1 | 2 | 4 | 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_registers_are_not_allocatable() {
        let target = X64;
        let names: Vec<&str> = target.registers().iter().map(|r| r.name).collect();

        for reserved in ["rbp", "rsp", "r10", "r11", "xmm14", "xmm15"] {
            assert!(!names.contains(&reserved), "{} must stay reserved", reserved);
        }
    }

    #[test]
    fn immediates_are_signed_32_bit() {
        let target = X64;

        assert!(target.short_imm_fits(i32::MAX as i64));
        assert!(target.short_imm_fits(i32::MIN as i64));
        assert!(!target.short_imm_fits(i32::MAX as i64 + 1));
    }

    #[test]
    fn only_sib_scales_are_supported() {
        let target = X64;

        assert!(target.scale_supported(4));
        assert!(!target.scale_supported(12));
    }
}

//! AArch64 target description.
//!
//! `x29` is the frame pointer; `x16`/`x17` (the intra-procedure-call
//! registers) serve as addressing scratch. Add/sub immediates carry 12
//! bits, so displacement folds cut over to a materialized constant much
//! earlier than on x86-64.

use crate::codegen::registers::{RegClass, RegisterDesc};
use crate::codegen::target::Target;

pub struct Arm64;

const INT_REGS: &[&str] = &[
    "x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7", "x8", "x9", "x10", "x11", "x12", "x13", "x14",
    "x15",
];

const FLOAT_REGS: &[&str] = &[
    "d0", "d1", "d2", "d3", "d4", "d5", "d6", "d7", "d8", "d9", "d10", "d11", "d12", "d13", "d14",
    "d15",
];

impl Target for Arm64 {
    fn name(&self) -> &'static str {
        "aarch64"
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
        "x29"
    }

    fn scratches(&self, class: RegClass) -> [&'static str; 2] {
        match class {
            RegClass::Int => ["x16", "x17"],
            RegClass::Float => ["d16", "d17"],
        }
    }

    fn short_imm_fits(&self, value: i64) -> bool {
        // imm12, with sub covering the negative half.
        (-4095..=4095).contains(&value)
    }

    fn scale_supported(&self, scale: u64) -> bool {
        matches!(scale, 1 | 2 | 4 | 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_range_is_twelve_bits() {
        let target = Arm64;

        assert!(target.short_imm_fits(4095));
        assert!(target.short_imm_fits(-4095));
        assert!(!target.short_imm_fits(4096));
    }

    #[test]
    fn scratch_registers_stay_out_of_the_allocatable_set() {
        let target = Arm64;
        let names: Vec<&str> = target.registers().iter().map(|r| r.name).collect();

        for reserved in ["x16", "x17", "x29", "x30"] {
            assert!(!names.contains(&reserved), "{} must stay reserved", reserved);
        }
    }
}

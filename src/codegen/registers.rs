//! The register/color model.
//!
//! A color names a physical register as seen at some width: register class,
//! identifier and byte width. The model is pure data; allocation policy
//! lives in the selector. Each physical register additionally tracks the
//! operand-graph nodes currently resident in it, since a narrower view of a
//! wider register aliases the same storage.

use std::fmt::{self, Display, Formatter};

use crate::il::dag::NodeId;

/// Register class. Integer and floating registers are disjoint files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegClass {
    Int,
    Float,
}

/// A physical register viewed at a particular width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub class: RegClass,
    pub id: u8,
    /// View width in bytes (1, 2, 4 or 8).
    pub width: u8,
}

impl Color {
    pub fn new(class: RegClass, id: u8, width: u8) -> Self {
        Self { class, id, width }
    }

    /// Two colors conflict iff they name the same physical register; every
    /// width view of a register shares its low bytes.
    pub fn conflicts(&self, other: &Color) -> bool {
        self.class == other.class && self.id == other.id
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let class = match self.class {
            RegClass::Int => "r",
            RegClass::Float => "f",
        };
        write!(f, "{}{}:{}", class, self.id, self.width)
    }
}

/// Static description of one physical register.
#[derive(Debug, Clone, Copy)]
pub struct RegisterDesc {
    pub class: RegClass,
    pub id: u8,
    pub name: &'static str,
}

/// A physical register plus the nodes currently resident in it.
#[derive(Debug)]
pub struct PhysReg {
    pub desc: RegisterDesc,
    residents: Vec<NodeId>,
}

impl PhysReg {
    fn new(desc: RegisterDesc) -> Self {
        Self {
            desc,
            residents: vec![],
        }
    }

    pub fn name(&self) -> &'static str {
        self.desc.name
    }

    pub fn color(&self, width: u8) -> Color {
        Color::new(self.desc.class, self.desc.id, width)
    }

    /// Register a node as resident. Idempotent.
    pub fn add_resident(&mut self, node: NodeId) {
        if !self.residents.contains(&node) {
            self.residents.push(node);
        }
    }

    pub fn remove_resident(&mut self, node: NodeId) {
        self.residents.retain(|&n| n != node);
    }

    pub fn residents(&self) -> &[NodeId] {
        &self.residents
    }
}

/// The set of allocatable physical registers for one compilation.
#[derive(Debug)]
pub struct RegisterFile {
    regs: Vec<PhysReg>,
}

impl RegisterFile {
    pub fn new<I: IntoIterator<Item = RegisterDesc>>(descs: I) -> Self {
        Self {
            regs: descs.into_iter().map(PhysReg::new).collect(),
        }
    }

    pub fn get(&self, index: usize) -> &PhysReg {
        &self.regs[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut PhysReg {
        &mut self.regs[index]
    }

    /// Find the register a color names, at any width view.
    pub fn find(&self, color: Color) -> Option<usize> {
        self.regs
            .iter()
            .position(|r| r.color(color.width).conflicts(&color))
    }

    /// Pick a register of `class` for a new value: an unoccupied one when
    /// available, otherwise the least-burdened. Registers holding a node
    /// from `avoid` are never picked; returns `None` when that excludes
    /// every register of the class.
    pub fn pick(&self, class: RegClass, avoid: &[NodeId]) -> Option<usize> {
        self.regs
            .iter()
            .enumerate()
            .filter(|(_, r)| r.desc.class == class)
            .filter(|(_, r)| !r.residents.iter().any(|n| avoid.contains(n)))
            .min_by_key(|(_, r)| r.residents.len())
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> RegisterFile {
        RegisterFile::new([
            RegisterDesc {
                class: RegClass::Int,
                id: 0,
                name: "r0",
            },
            RegisterDesc {
                class: RegClass::Int,
                id: 1,
                name: "r1",
            },
            RegisterDesc {
                class: RegClass::Float,
                id: 0,
                name: "f0",
            },
        ])
    }

    #[test]
    fn widths_of_one_register_conflict() {
        let wide = Color::new(RegClass::Int, 3, 8);
        let narrow = Color::new(RegClass::Int, 3, 1);

        assert!(wide.conflicts(&narrow));
        assert!(narrow.conflicts(&wide));
    }

    #[test]
    fn classes_never_conflict() {
        let int = Color::new(RegClass::Int, 0, 8);
        let float = Color::new(RegClass::Float, 0, 8);

        assert!(!int.conflicts(&float));
    }

    #[test]
    fn resident_registration_is_idempotent() {
        let mut file = file();
        let reg = file.get_mut(0);

        reg.add_resident(NodeId(7));
        reg.add_resident(NodeId(7));

        assert_eq!(&[NodeId(7)], reg.residents());
    }

    #[test]
    fn pick_prefers_an_unoccupied_register() {
        let mut file = file();
        file.get_mut(0).add_resident(NodeId(1));

        assert_eq!(Some(1), file.pick(RegClass::Int, &[]));
    }

    #[test]
    fn pick_falls_back_to_the_least_burdened() {
        let mut file = file();
        file.get_mut(0).add_resident(NodeId(1));
        file.get_mut(0).add_resident(NodeId(2));
        file.get_mut(1).add_resident(NodeId(3));

        assert_eq!(Some(1), file.pick(RegClass::Int, &[]));
    }

    #[test]
    fn pick_refuses_registers_holding_avoided_nodes() {
        let mut file = file();
        file.get_mut(0).add_resident(NodeId(1));
        file.get_mut(1).add_resident(NodeId(2));

        assert_eq!(None, file.pick(RegClass::Int, &[NodeId(1), NodeId(2)]));
    }

    #[test]
    fn find_resolves_a_color_to_its_register() {
        let file = file();
        let color = Color::new(RegClass::Float, 0, 8);

        assert_eq!(Some(2), file.find(color));
        assert_eq!("f0", file.get(2).name());
    }
}

//! Register selection and spilling.
//!
//! Selection is demand-driven: the compiler asks for a register for a node
//! right before using it. A node keeps its register between instructions;
//! when a register must be reclaimed, its residents are saved to their
//! storage homes first. Constants are never saved, they are rematerialized
//! on the next load. Temporaries receive a frame slot lazily, on first
//! spill.

use log::debug;

use crate::codegen::compiler::TacCompiler;
use crate::codegen::machine::MemRef;
use crate::codegen::registers::RegClass;
use crate::codegen::target::Target;
use crate::error::{CodegenError, Result};
use crate::il::dag::NodeId;
use crate::vars::{ConstValue, Storage, Variable};

impl<'a, T: Target> TacCompiler<'a, T> {
    /// Follow assignment-coalescing links to the node whose storage actually
    /// holds the value.
    pub(crate) fn resolve(&self, mut node: NodeId) -> NodeId {
        // The alias graph is acyclic by construction; the bound is a
        // safeguard against a corrupted arena.
        for _ in 0..self.arena.len() {
            match self.arena[node].direct_alias {
                Some(alias) => node = alias,
                None => break,
            }
        }
        node
    }

    pub(crate) fn class_of(&self, node: NodeId) -> RegClass {
        if self.is_float(node) {
            RegClass::Float
        } else {
            RegClass::Int
        }
    }

    /// Whether a node's value belongs in the floating file. An interior
    /// node with no bound result variable takes its class from the values
    /// it combines; the two files must never mix within one operation.
    fn is_float(&self, node: NodeId) -> bool {
        match self.arena[node].var {
            Some(v) => self.vars[v].is_float,
            None => self.arena[node]
                .children
                .iter()
                .any(|&child| self.is_float(child)),
        }
    }

    pub(crate) fn width_of(&self, node: NodeId) -> u8 {
        match self.arena[node].var {
            Some(v) => self.vars[v].width(),
            None => self.target.max_width(),
        }
    }

    /// The compile-time integer value of a node, when it is bound to an
    /// integer constant.
    pub(crate) fn const_int(&self, node: NodeId) -> Option<i64> {
        let var = self.arena[node].var?;
        self.vars[var].value.as_ref()?.as_int()
    }

    /// Place `node` in a register and return the register's index.
    ///
    /// A node that already holds a color stays in that register; any other
    /// resident is saved out first, since a narrower view written earlier
    /// would otherwise be clobbered. An uncolored node gets a fresh pick,
    /// preferring free registers, never touching registers that hold a
    /// pinned node. With `need_loaded` the value is actually materialized;
    /// without it the register is only reserved (the caller is about to
    /// overwrite it) and the node is marked loaded as-is.
    pub(crate) fn select(&mut self, node: NodeId, need_loaded: bool) -> Result<usize> {
        let index = match self.arena[node].color {
            Some(color) => {
                let index = self.regs.find(color).ok_or_else(|| {
                    CodegenError::MalformedInstr(format!(
                        "node %{} colored {} outside the register file",
                        node.0, color
                    ))
                })?;
                let others: Vec<NodeId> = self
                    .regs
                    .get(index)
                    .residents()
                    .iter()
                    .copied()
                    .filter(|&n| n != node)
                    .collect();
                for other in others {
                    self.save(other)?;
                }
                index
            }
            None => {
                let class = self.class_of(node);
                let index = self
                    .regs
                    .pick(class, &self.pinned)
                    .ok_or(CodegenError::RegisterPressure(class))?;
                let evicted: Vec<NodeId> = self.regs.get(index).residents().to_vec();
                for other in evicted {
                    self.save(other)?;
                }
                let width = self.width_of(node);
                self.arena[node].color = Some(self.regs.get(index).color(width));
                index
            }
        };
        self.regs.get_mut(index).add_resident(node);
        if need_loaded {
            self.load(node, index)?;
        } else {
            self.arena[node].loaded = true;
        }
        Ok(index)
    }

    /// Write a resident node back to its storage home and release its
    /// register. Constants are simply forgotten. Spilled arguments are
    /// demoted to locals, so later loads read the frame slot instead of the
    /// stale argument home.
    fn save(&mut self, node: NodeId) -> Result<()> {
        let color = match self.arena[node].color {
            Some(color) => color,
            None => return Ok(()),
        };
        let index = self.regs.find(color).ok_or_else(|| {
            CodegenError::MalformedInstr(format!(
                "node %{} colored {} outside the register file",
                node.0, color
            ))
        })?;

        // Anonymous interior nodes get a spill temporary on first save. The
        // temporary inherits the register class, so a reload stays in the
        // same file.
        let var_id = match self.arena[node].var {
            Some(v) => v,
            None => {
                let width = color.width.max(1) as u64;
                let mut temp = Variable::temp(&format!(".s{}", node.0), width);
                if color.class == RegClass::Float {
                    temp = temp.with_float();
                }
                let v = self.vars.add(temp);
                self.arena[node].var = Some(v);
                v
            }
        };

        if !self.vars[var_id].is_const() {
            if self.vars[var_id].storage == Storage::Arg {
                self.vars[var_id].storage = Storage::Local;
            }
            let addr = match self.vars[var_id].storage {
                Storage::Global => {
                    let var = &self.vars[var_id];
                    MemRef::symbol(&var.name, 0, var.width())
                }
                _ => {
                    let offset = match self.vars[var_id].frame_offset {
                        Some(offset) => offset,
                        None => {
                            let size = self.vars[var_id].size.max(1);
                            let offset = self.frame.allocate(size);
                            self.vars[var_id].frame_offset = Some(offset);
                            offset
                        }
                    };
                    let width = self.vars[var_id].width();
                    MemRef::base_reg(self.target.frame_pointer(), offset, width)
                }
            };
            let name = self.regs.get(index).name();
            debug!("spilling {} from {}", self.vars[var_id].name, name);
            self.target.store(&mut self.out, color.class, name, addr);
            self.comment_last(format!("spill {}", self.vars[var_id].name));
        }

        self.arena[node].color = None;
        self.arena[node].loaded = false;
        self.regs.get_mut(index).remove_resident(node);
        Ok(())
    }

    /// Materialize a node's value in its selected register, unless it is
    /// already there.
    fn load(&mut self, node: NodeId, index: usize) -> Result<()> {
        if self.arena[node].loaded {
            return Ok(());
        }
        let name = self.regs.get(index).name();
        let var_id = self.arena[node].var.ok_or_else(|| {
            CodegenError::UnplacedTemporary(format!("%{}", node.0))
        })?;
        let var = self.vars[var_id].clone();
        let class = self.class_of(node);

        if var.is_const() {
            match &var.value {
                Some(ConstValue::Func(symbol)) => {
                    self.target.load_symbol(&mut self.out, name, symbol)
                }
                Some(ConstValue::Str(_)) => self.target.load_string(&mut self.out, name, &var.name),
                Some(ConstValue::Int(value)) => {
                    self.target
                        .load_immediate(&mut self.out, name, *value, var.width())
                }
                Some(ConstValue::Float(value)) => {
                    // Bit pattern of the constant; the emitter routes it into
                    // the floating file.
                    self.target
                        .load_immediate(&mut self.out, name, value.to_bits() as i64, var.width())
                }
                None => {
                    return Err(CodegenError::MalformedInstr(format!(
                        "constant '{}' has no value",
                        var.name
                    )))
                }
            }
        } else {
            match var.storage {
                Storage::Global => {
                    if var.is_aggregate() && var.pointer == 0 {
                        self.target.load_symbol(&mut self.out, name, &var.name);
                    } else {
                        let addr = MemRef::symbol(&var.name, 0, var.width());
                        self.target.load(&mut self.out, class, name, addr);
                    }
                }
                _ => {
                    let offset = var
                        .frame_offset
                        .ok_or_else(|| CodegenError::UnplacedTemporary(var.name.clone()))?;
                    let fp = self.target.frame_pointer();
                    if var.is_aggregate() && var.pointer == 0 {
                        self.target
                            .load_address(&mut self.out, name, MemRef::base_reg(fp, offset, 8));
                    } else {
                        let addr = MemRef::base_reg(fp, offset, var.width());
                        self.target.load(&mut self.out, class, name, addr);
                    }
                }
            }
            self.comment_last(format!("load {}", var.name));
        }

        self.arena[node].loaded = true;
        Ok(())
    }
}

//! The variable description consumed by the code generation core.
//!
//! Variables are produced by the (external) type and storage layer. This
//! core only reads them and, for temporaries, lazily assigns the
//! frame-pointer-relative offset on first spill.

use std::fmt::{self, Display, Formatter};
use std::ops::{Index, IndexMut};

/// Storage classification of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Addressed by symbol, lives outside any frame.
    Global,
    /// A named local with a fixed frame slot.
    Local,
    /// A compiler-generated value; receives a frame slot only when spilled.
    Temp,
    /// An incoming argument. Once spilled, it is demoted to an ordinary
    /// local for the remainder of the function.
    Arg,
    /// A compile-time constant; never written back to memory.
    Const,
}

/// A compile-time constant value bound to a `Storage::Const` variable.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Str(String),
    /// The address of a function; materialized by address, not by value.
    Func(String),
}

impl ConstValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConstValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// A variable or constant referenced by operand-graph leaves.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub storage: Storage,
    /// Byte size of the value (for arrays, of the whole array).
    pub size: u64,
    /// Levels of pointer indirection.
    pub pointer: u8,
    /// Number of array dimensions; 0 for scalars.
    pub dims: u8,
    /// Element byte size when `dims > 0`; also the step for pointer
    /// increment/decrement.
    pub elem_size: u64,
    pub is_float: bool,
    pub signed: bool,
    pub is_struct: bool,
    /// Byte offset within the enclosing struct, for member descriptions.
    pub member_offset: u64,
    /// Frame-pointer-relative slot. Pre-assigned for locals and arguments,
    /// set exactly once (on first spill) for temporaries.
    pub frame_offset: Option<i64>,
    pub value: Option<ConstValue>,
}

impl Variable {
    pub fn global(name: &str, size: u64) -> Self {
        Self::plain(name, Storage::Global, size)
    }

    pub fn local(name: &str, size: u64, frame_offset: i64) -> Self {
        Self {
            frame_offset: Some(frame_offset),
            ..Self::plain(name, Storage::Local, size)
        }
    }

    pub fn arg(name: &str, size: u64, frame_offset: i64) -> Self {
        Self {
            frame_offset: Some(frame_offset),
            ..Self::plain(name, Storage::Arg, size)
        }
    }

    pub fn temp(name: &str, size: u64) -> Self {
        Self::plain(name, Storage::Temp, size)
    }

    pub fn int_const(value: i64) -> Self {
        Self {
            value: Some(ConstValue::Int(value)),
            ..Self::plain(&value.to_string(), Storage::Const, 8)
        }
    }

    pub fn str_const(label: &str, content: &str) -> Self {
        Self {
            pointer: 1,
            value: Some(ConstValue::Str(content.to_string())),
            ..Self::plain(label, Storage::Const, 8)
        }
    }

    pub fn func_const(name: &str) -> Self {
        Self {
            pointer: 1,
            value: Some(ConstValue::Func(name.to_string())),
            ..Self::plain(name, Storage::Const, 8)
        }
    }

    fn plain(name: &str, storage: Storage, size: u64) -> Self {
        Self {
            name: name.to_string(),
            storage,
            size,
            pointer: 0,
            dims: 0,
            elem_size: size,
            is_float: false,
            signed: true,
            is_struct: false,
            member_offset: 0,
            frame_offset: None,
            value: None,
        }
    }

    pub fn with_array(mut self, dims: u8, elem_size: u64) -> Self {
        self.dims = dims;
        self.elem_size = elem_size;
        self
    }

    pub fn with_pointer(mut self, levels: u8) -> Self {
        self.pointer = levels;
        self
    }

    /// For pointers: the byte size of the pointee.
    pub fn with_elem_size(mut self, elem_size: u64) -> Self {
        self.elem_size = elem_size;
        self
    }

    pub fn with_float(mut self) -> Self {
        self.is_float = true;
        self
    }

    pub fn with_unsigned(mut self) -> Self {
        self.signed = false;
        self
    }

    pub fn with_struct(mut self) -> Self {
        self.is_struct = true;
        self
    }

    pub fn with_member_offset(mut self, offset: u64) -> Self {
        self.member_offset = offset;
        self
    }

    pub fn is_const(&self) -> bool {
        self.storage == Storage::Const
    }

    /// Arrays and structs are handled by address, not by value.
    pub fn is_aggregate(&self) -> bool {
        self.is_struct || self.dims > 0
    }

    /// The natural register width of this value, capped at 8 bytes.
    pub fn width(&self) -> u8 {
        if self.pointer > 0 || self.is_aggregate() {
            8
        } else {
            self.size.min(8) as u8
        }
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Index of a variable in its [`VarTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub usize);

/// Arena of all variables referenced by one function's operand graph.
#[derive(Debug, Default)]
pub struct VarTable {
    vars: Vec<Variable>,
}

impl VarTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, var: Variable) -> VarId {
        self.vars.push(var);
        VarId(self.vars.len() - 1)
    }
}

impl Index<VarId> for VarTable {
    type Output = Variable;

    fn index(&self, id: VarId) -> &Variable {
        &self.vars[id.0]
    }
}

impl IndexMut<VarId> for VarTable {
    fn index_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id.0]
    }
}

/// Tracks the local-frame size of the function being compiled. Spill slots
/// grow the frame monotonically; offsets are never reused across functions.
#[derive(Debug, Default)]
pub struct Frame {
    size: u64,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot of `byte_size` bytes, rounded up to 8-byte alignment.
    /// Returns the new slot's offset, negative relative to the frame base.
    pub fn allocate(&mut self, byte_size: u64) -> i64 {
        let rounded = (byte_size + 7) & !7;
        self.size += rounded;
        -(self.size as i64)
    }

    /// Total frame size consumed so far, for prologue emission.
    pub fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_offsets_are_aligned_and_monotonic() {
        let mut frame = Frame::new();

        let first = frame.allocate(4);
        let second = frame.allocate(8);
        let third = frame.allocate(1);

        assert_eq!(first, -8);
        assert_eq!(second, -16);
        assert_eq!(third, -24);
        assert_eq!(frame.size(), 24);
    }

    #[test]
    fn pointer_width_is_full_even_for_small_elements() {
        let arr = Variable::local("a", 16, -16).with_array(1, 4);

        assert!(arr.is_aggregate());
        assert_eq!(arr.width(), 8);
    }

    #[test]
    fn scalar_width_follows_byte_size() {
        let i = Variable::local("i", 4, -4);

        assert_eq!(i.width(), 4);
    }
}

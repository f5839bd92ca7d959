//! Machine code generation: register selection, addressing synthesis and
//! per-target instruction emission over a three-address listing.

mod addressing;
mod compiler;
pub mod machine;
pub mod registers;
mod selector;
pub mod target;

pub mod arm64;
pub mod x64;

pub use compiler::TacCompiler;
pub use target::Target;

//! Generic logic for positioned code listings (TAC, machine code).

mod generic_listing;
mod position;

pub use generic_listing::Listing;
pub use position::Position;

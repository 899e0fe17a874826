pub mod board;
pub mod netlist;
pub mod schema;
pub mod sexp;

// Re-export for convenience
pub use board::{BoardParseError, BoardParser};
pub use netlist::{ComponentFilter, NetlistParseError, NetlistParser};
pub use schema::*;
pub use sexp::{ParseError, SExp, SExpParser};

//! Unibom - unified BOM + XYRS generation for KiCad projects
//!
//! Joins the schematic netlist (reference, value, MPN, datasheet, custom
//! fields) with placement data from the board (position, rotation, side,
//! footprint size) and writes one row per component, either as a generic
//! comma-separated BOM or as a MacroFab tab-separated XYRS file.
//!
//! # Quick Start
//!
//! ```no_run
//! use unibom::{ConvertOptions, OutputFormat, UnibomCore};
//! use std::path::PathBuf;
//!
//! let options = ConvertOptions {
//!     netlist: PathBuf::from("demo.net"),
//!     format: OutputFormat::Macrofab,
//!     ..Default::default()
//! };
//! let summary = UnibomCore::convert(&options).unwrap();
//!
//! for warning in &summary.outcome.warnings {
//!     eprintln!("[Warn] {}", warning);
//! }
//! ```

pub mod core;
pub mod merge;
pub mod parser;
pub mod prune;
pub mod record;
pub mod writer;

// Re-export main types
pub use crate::core::{
    default_board_path, default_output_path, ConvertOptions, ConvertSummary, OutputTarget,
    UnibomCore, UnibomError,
};
pub use merge::{merge, MergeOptions, MergeOutcome, MergeWarning};
pub use parser::board::BoardParser;
pub use parser::netlist::{ComponentFilter, NetlistParser};
pub use parser::schema::{Board, ComponentRecord, ModuleRecord, MountType, Netlist, Side};
pub use prune::{PruneFilter, PruneRules};
pub use record::{FieldValue, MergedRecord};
pub use writer::{write_records, OutputFormat};

/// Parse a netlist file (convenience wrapper).
pub fn parse_netlist(path: &std::path::Path) -> Result<Netlist, UnibomError> {
    Ok(NetlistParser::parse_netlist(path)?)
}

/// Parse a board file (convenience wrapper).
pub fn parse_board(path: &std::path::Path) -> Result<Board, UnibomError> {
    Ok(BoardParser::parse_board(path)?)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        ConvertOptions, ConvertSummary, MergeOptions, MergeWarning, OutputFormat, PruneRules,
        UnibomCore, UnibomError,
    };
}

//! Simple merge example: join a netlist with its board and print the table.

use std::path::Path;

use unibom::core::OutputTarget;
use unibom::prelude::*;

fn main() -> Result<(), UnibomError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/demo.net".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example simple_merge [path/to/project.net] [macrofab]");
        std::process::exit(1);
    }

    let format = OutputFormat::from_selector(std::env::args().nth(2).as_deref());
    let options = ConvertOptions {
        netlist: path.to_path_buf(),
        output: Some(OutputTarget::Stdout),
        format,
        ..Default::default()
    };

    let summary = UnibomCore::convert(&options)?;

    eprintln!();
    eprintln!("Rows written: {}", summary.rows_written);
    for (reference, reason) in &summary.outcome.excluded {
        eprintln!("  excluded {} ({:?})", reference, reason);
    }
    for warning in &summary.outcome.warnings {
        eprintln!("  warning: {}", warning);
    }
    Ok(())
}

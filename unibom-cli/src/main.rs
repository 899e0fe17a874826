//! Unibom CLI - unified BOM + XYRS generation for KiCad projects.

mod diagnostics;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use unibom::{ConvertOptions, ConvertSummary, OutputFormat, OutputTarget, PruneRules, UnibomCore};

#[derive(Parser)]
#[command(name = "unibom")]
#[command(about = "Merge a KiCad netlist and board into a unified BOM + XYRS table", long_about = None)]
#[command(version)]
struct Cli {
    /// Netlist exported from the KiCad schematic (.net)
    #[arg(value_name = "NETLIST")]
    netlist: PathBuf,

    /// Output file, `-` for stdout [default: <board plot dir>/<project>-bom-xyrs.csv]
    #[arg(short, long, value_name = "FILE")]
    output_file: Option<PathBuf>,

    /// Board file [default: netlist path with .kicad_pcb extension]
    #[arg(short, long, value_name = "FILE")]
    pcb_file: Option<PathBuf>,

    /// Output layout: `macrofab` for MacroFab XYRS, anything else for the generic BOM
    #[arg(short = 'f', long, value_name = "NAME")]
    output_format: Option<String>,

    /// Board is authored in metric units (MacroFab scaling)
    #[arg(long)]
    metric: bool,

    /// JSON file overriding the prune rules
    #[arg(long, value_name = "FILE")]
    prune_config: Option<PathBuf>,

    /// Only report warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn convert_options(&self) -> Result<ConvertOptions> {
        let prune = match &self.prune_config {
            Some(path) => PruneRules::from_json_file(path)
                .with_context(|| format!("Failed to load prune config {}", path.display()))?,
            None => PruneRules::default(),
        };

        Ok(ConvertOptions {
            netlist: self.netlist.clone(),
            board: self.pcb_file.clone(),
            output: self.output_file.as_deref().map(OutputTarget::from_arg),
            format: OutputFormat::from_selector(self.output_format.as_deref()),
            metric: self.metric,
            prune,
        })
    }
}

fn run(cli: &Cli) -> Result<ConvertSummary> {
    let options = cli.convert_options()?;
    let summary = UnibomCore::convert(&options)?;
    tracing::debug!(
        "{} rows written, {} excluded, {} warnings",
        summary.rows_written,
        summary.outcome.excluded.len(),
        summary.outcome.warnings.len()
    );
    Ok(summary)
}

fn main() {
    let cli = Cli::parse();
    diagnostics::setup_logging(cli.quiet);

    let exit_code = match run(&cli) {
        Ok(_) => 0,
        Err(e) => {
            tracing::error!("{:#}", e);
            1
        }
    };

    process::exit(exit_code);
}

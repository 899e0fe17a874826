//! Pipeline driver shared by the CLI and library users.
//! Loads both inputs, merges, and writes the table to a file or stdout.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::merge::{merge, MergeOptions, MergeOutcome};
use crate::parser::board::{BoardParseError, BoardParser};
use crate::parser::netlist::{NetlistParseError, NetlistParser};
use crate::parser::schema::{Board, Netlist};
use crate::prune::{PruneConfigError, PruneRules};
use crate::writer::{write_records, OutputFormat};

/// Board file extension substituted for the netlist's.
pub const BOARD_EXTENSION: &str = "kicad_pcb";
/// Suffix appended to the project name for the default output file.
pub const OUTPUT_SUFFIX: &str = "-bom-xyrs.csv";

#[derive(Debug, thiserror::Error)]
pub enum UnibomError {
    #[error("Netlist error: {0}")]
    Netlist(#[from] NetlistParseError),
    #[error("Board error: {0}")]
    Board(#[from] BoardParseError),
    #[error("Config error: {0}")]
    Config(#[from] PruneConfigError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Output error: {0}")]
    Csv(#[from] csv::Error),
}

/// Where the table goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    /// `-` means standard output.
    pub fn from_arg(arg: &Path) -> Self {
        if arg == Path::new("-") {
            OutputTarget::Stdout
        } else {
            OutputTarget::File(arg.to_path_buf())
        }
    }
}

/// Options for one conversion run.
#[derive(Clone, Debug, Default)]
pub struct ConvertOptions {
    pub netlist: PathBuf,
    /// Defaults to the netlist path with the board extension.
    pub board: Option<PathBuf>,
    /// Defaults to `<netlist dir>/<board output dir>/<project>-bom-xyrs.csv`.
    pub output: Option<OutputTarget>,
    pub format: OutputFormat,
    pub metric: bool,
    pub prune: PruneRules,
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct ConvertSummary {
    pub output: OutputTarget,
    pub rows_written: usize,
    pub outcome: MergeOutcome,
}

/// Project directory and name derived from the netlist path.
fn project_parts(netlist: &Path) -> (PathBuf, String) {
    let absolute = std::path::absolute(netlist).unwrap_or_else(|_| netlist.to_path_buf());
    let dir = absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let name = netlist
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    (dir, name)
}

/// Board next to the netlist, same stem, board extension.
pub fn default_board_path(netlist: &Path) -> PathBuf {
    let (dir, name) = project_parts(netlist);
    dir.join(format!("{}.{}", name, BOARD_EXTENSION))
}

/// `<netlist dir>/<output dir>/<project>-bom-xyrs.csv`; an absolute output dir replaces the netlist dir.
pub fn default_output_path(netlist: &Path, output_directory: &str) -> PathBuf {
    let (dir, name) = project_parts(netlist);
    dir.join(output_directory).join(format!("{}{}", name, OUTPUT_SUFFIX))
}

pub struct UnibomCore;

impl UnibomCore {
    pub fn load_netlist(path: &Path) -> Result<Netlist, UnibomError> {
        let netlist = NetlistParser::parse_netlist(path)?;
        tracing::info!("compfields: {:?}", netlist.component_field_union());
        tracing::info!("partfields: {:?}", netlist.libpart_field_union());
        Ok(netlist)
    }

    pub fn load_board(path: &Path) -> Result<Board, UnibomError> {
        Ok(BoardParser::parse_board(path)?)
    }

    /// Load, merge and write. Fails only if an input cannot be loaded or the output cannot be written.
    pub fn convert(options: &ConvertOptions) -> Result<ConvertSummary, UnibomError> {
        let filter = options.prune.compile()?;
        let netlist = Self::load_netlist(&options.netlist)?;

        let board_path = options
            .board
            .clone()
            .unwrap_or_else(|| default_board_path(&options.netlist));
        let board = Self::load_board(&board_path)?;

        let output = options.output.clone().unwrap_or_else(|| {
            OutputTarget::File(default_output_path(&options.netlist, &board.output_directory))
        });

        let merge_options = MergeOptions {
            format: options.format,
            metric: options.metric,
        };
        let outcome = merge(&netlist, &board.modules, &merge_options, &filter);

        let rows_written = match &output {
            OutputTarget::Stdout => {
                let stdout = io::stdout();
                let mut lock = stdout.lock();
                let rows = write_records(&mut lock, &outcome.records, options.format)?;
                lock.flush()?;
                rows
            }
            OutputTarget::File(path) => {
                tracing::info!("Writing output to {}", path.display());
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let mut file = BufWriter::new(File::create(path)?);
                let rows = write_records(&mut file, &outcome.records, options.format)?;
                file.flush()?;
                rows
            }
        };

        Ok(ConvertSummary {
            output,
            rows_written,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_board_path() {
        let path = default_board_path(Path::new("/work/demo/demo.net"));
        assert_eq!(path, PathBuf::from("/work/demo/demo.kicad_pcb"));
    }

    #[test]
    fn test_default_output_path() {
        let netlist = Path::new("/work/demo/demo.net");
        assert_eq!(
            default_output_path(netlist, "gerbers/"),
            PathBuf::from("/work/demo/gerbers/demo-bom-xyrs.csv")
        );
        assert_eq!(
            default_output_path(netlist, ""),
            PathBuf::from("/work/demo/demo-bom-xyrs.csv")
        );
        assert_eq!(
            default_output_path(netlist, "/tmp/out"),
            PathBuf::from("/tmp/out/demo-bom-xyrs.csv")
        );
    }

    #[test]
    fn test_relative_netlist_resolves_against_cwd() {
        let path = default_board_path(Path::new("demo.net"));
        assert!(path.is_absolute());
        assert!(path.ends_with("demo.kicad_pcb"));
    }

    #[test]
    fn test_output_target_from_arg() {
        assert_eq!(OutputTarget::from_arg(Path::new("-")), OutputTarget::Stdout);
        assert_eq!(
            OutputTarget::from_arg(Path::new("out.csv")),
            OutputTarget::File(PathBuf::from("out.csv"))
        );
    }
}

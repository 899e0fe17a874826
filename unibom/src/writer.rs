//! Delimited output for the two supported layouts.

use std::collections::BTreeMap;
use std::io;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;

use crate::record::MergedRecord;

/// Generic BOM + XYRS layout, comma separated.
pub const GENERIC_COLUMNS: [&str; 12] = [
    "Reference",
    "Value",
    "Description",
    "Footprint",
    "PosX",
    "PosY",
    "Rotation",
    "Side",
    "MFR",
    "MPN",
    "OctopartID",
    "Datasheet",
];

/// MacroFab XYRS intake layout, tab separated.
pub const MACROFAB_COLUMNS: [&str; 12] = [
    "Reference",
    "PosX",
    "PosY",
    "Rotation",
    "Side",
    "Type",
    "XSize",
    "YSize",
    "Value",
    "Footprint",
    "Populate",
    "DISTPN2",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum OutputFormat {
    #[default]
    Generic,
    Macrofab,
}

impl OutputFormat {
    /// `macrofab` (or `macrofab-style`) selects the MacroFab layout; anything else is generic.
    pub fn from_selector(selector: Option<&str>) -> Self {
        match selector.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("macrofab") || s.eq_ignore_ascii_case("macrofab-style") => {
                OutputFormat::Macrofab
            }
            _ => OutputFormat::Generic,
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            OutputFormat::Generic => &GENERIC_COLUMNS,
            OutputFormat::Macrofab => &MACROFAB_COLUMNS,
        }
    }

    pub fn delimiter(self) -> u8 {
        match self {
            OutputFormat::Generic => b',',
            OutputFormat::Macrofab => b'\t',
        }
    }
}

/// Cells of one record in layout order; absent columns become empty strings.
pub fn project(record: &MergedRecord, format: OutputFormat) -> Vec<String> {
    format.columns().iter().map(|column| record.text(column)).collect()
}

/// Write the header and one row per record, in reference order. Returns the row count.
pub fn write_records<W: io::Write>(
    sink: W,
    records: &BTreeMap<String, MergedRecord>,
    format: OutputFormat,
) -> Result<usize, csv::Error> {
    let mut writer = WriterBuilder::new()
        .delimiter(format.delimiter())
        .terminator(Terminator::CRLF)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(sink);

    writer.write_record(format.columns())?;
    for record in records.values() {
        writer.write_record(project(record, format))?;
    }
    writer.flush()?;
    Ok(records.len())
}

/// Render the whole table to a string.
pub fn render(records: &BTreeMap<String, MergedRecord>, format: OutputFormat) -> Result<String, csv::Error> {
    let mut buffer = Vec::new();
    write_records(&mut buffer, records, format)?;
    String::from_utf8(buffer).map_err(|e| csv::Error::from(io::Error::new(io::ErrorKind::InvalidData, e)))
}

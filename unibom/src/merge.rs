//! Join of netlist components and board placements.
//!
//! Records are seeded from the netlist, then every placeable module
//! overwrites its placement columns. Board data wins on conflict; each
//! conflict is reported. Footprint is the exception: it always comes from
//! the schematic component.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::parser::schema::{ModuleRecord, MountType, Netlist};
use crate::prune::{PruneFilter, PruneReason};
use crate::record::{FieldValue, MergedRecord};
use crate::writer::OutputFormat;

/// Native length units per output unit.
pub const SCALING_FACTOR: f64 = 1_000_000.0;
/// Millimetres per mil, applied for MacroFab output from metric boards.
pub const METRIC_TO_IMPERIAL: f64 = 0.0254;
/// MacroFab origin offset.
pub const MACROFAB_ORIGIN_OFFSET: (f64, f64) = (3937.1, -3937.1);
/// Sign applied to board X and Y; board Y grows downwards.
pub const COORD_POLARITY: (f64, f64) = (1.0, -1.0);

const SECONDARY_DISTRIBUTOR_PN: &str = "DISTPN2";
const PRIMARY_DISTRIBUTOR_PN: &str = "DISTPN";
const MANUFACTURER_PN: &str = "MPN";

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    pub format: OutputFormat,
    /// Board authored in metric units; only affects MacroFab scaling.
    pub metric: bool,
}

/// Non-fatal anomaly found while joining.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MergeWarning {
    /// Placeable module with no matching netlist component; the module is dropped.
    MissingFromNetlist { reference: String },
    /// Netlist and board disagree on a field.
    FieldConflict {
        reference: String,
        field: String,
        netlist_value: String,
        board_value: String,
    },
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeWarning::MissingFromNetlist { reference } => {
                write!(f, "PCB Skipping \"{}\"", reference)
            }
            MergeWarning::FieldConflict {
                reference,
                field,
                netlist_value,
                board_value,
            } => write!(
                f,
                "PCB overriding {} {}, \"{}\" != \"{}\"",
                reference, field, netlist_value, board_value
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub records: BTreeMap<String, MergedRecord>,
    pub warnings: Vec<MergeWarning>,
    /// References removed by the prune rules.
    pub excluded: Vec<(String, PruneReason)>,
}

/// Scaling, polarity and origin used to turn native placement into output units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementTransform {
    pub scale: f64,
    pub polarity: (f64, f64),
    pub offset: (f64, f64),
    pub integer_rotation: bool,
}

impl PlacementTransform {
    pub fn for_options(options: &MergeOptions) -> Self {
        match options.format {
            OutputFormat::Generic => Self {
                scale: SCALING_FACTOR,
                polarity: COORD_POLARITY,
                offset: (0.0, 0.0),
                integer_rotation: false,
            },
            OutputFormat::Macrofab => Self {
                scale: if options.metric {
                    SCALING_FACTOR * METRIC_TO_IMPERIAL
                } else {
                    SCALING_FACTOR
                },
                polarity: COORD_POLARITY,
                offset: MACROFAB_ORIGIN_OFFSET,
                integer_rotation: true,
            },
        }
    }

    pub fn position(&self, (x, y): (i64, i64)) -> (f64, f64) {
        // Adding 0.0 folds -0.0 into 0.0.
        (
            self.polarity.0 * x as f64 / self.scale - self.offset.0 + 0.0,
            self.polarity.1 * y as f64 / self.scale - self.offset.1 + 0.0,
        )
    }

    pub fn length(&self, native: i64) -> f64 {
        native as f64 / self.scale
    }

    /// Native orientation (tenths of a degree) to degrees, truncated for MacroFab.
    pub fn rotation(&self, orientation: f64) -> FieldValue {
        let degrees = orientation / 10.0;
        if self.integer_rotation {
            FieldValue::Int(degrees.trunc() as i64)
        } else {
            FieldValue::Real(degrees)
        }
    }
}

/// Seed one record per component with its reference, value, datasheet,
/// description, config flags, every extra column, and the component footprint.
pub fn seed_records(netlist: &Netlist) -> BTreeMap<String, MergedRecord> {
    let extra_columns = netlist.extra_columns();
    let mut records = BTreeMap::new();

    for component in &netlist.components {
        let libpart = netlist.libpart_for(component);
        let mut record = MergedRecord::new(component.reference.as_str());

        for column in &extra_columns {
            record.set(column.as_str(), component.field(column, libpart));
        }
        record.set("Value", component.value.as_str());
        record.set("Datasheet", component.resolved_datasheet(libpart));
        record.set("Description", component.resolved_description(libpart));
        record.set("Config", component.field("Config", libpart));
        // Library part footprints are often stale or blank; the instance footprint is authoritative.
        record.set("Footprint", component.footprint.as_str());

        records.insert(component.reference.clone(), record);
    }

    records
}

/// Placement columns derived from one module, in a stable order.
pub fn placement_fields(module: &ModuleRecord, options: &MergeOptions) -> Vec<(&'static str, FieldValue)> {
    let transform = PlacementTransform::for_options(options);
    let (pos_x, pos_y) = transform.position(module.position);

    // Heuristic: MacroFab wants the pad-footprint size; the smaller side is reported as Y.
    let (width, height) = module.bounding_size;
    let (x_size, y_size) = if height < width { (width, height) } else { (height, width) };

    let side = match options.format {
        OutputFormat::Macrofab => FieldValue::Int(if module.side.is_flipped() { 2 } else { 1 }),
        OutputFormat::Generic => FieldValue::from(if module.side.is_flipped() { "bottom" } else { "top" }),
    };

    vec![
        ("Reference", FieldValue::from(module.reference.as_str())),
        ("PosX", FieldValue::Real(pos_x)),
        ("PosY", FieldValue::Real(pos_y)),
        ("Rotation", transform.rotation(module.orientation)),
        ("Side", side),
        // SMT; through-hole cannot be told apart from the board data.
        ("Type", FieldValue::Int(1)),
        ("XSize", FieldValue::Real(transform.length(x_size))),
        ("YSize", FieldValue::Real(transform.length(y_size))),
        // Only insertable modules get this far.
        ("Populate", FieldValue::Int(1)),
        ("Footprint", FieldValue::from(module.footprint.to_string())),
    ]
}

/// Apply board data to the seeded records. Non-insertable modules are ignored.
pub fn apply_modules(
    records: &mut BTreeMap<String, MergedRecord>,
    modules: &[ModuleRecord],
    options: &MergeOptions,
) -> Vec<MergeWarning> {
    let mut warnings = Vec::new();

    for module in modules {
        if module.mount_type != MountType::Insert {
            continue;
        }

        let Some(record) = records.get_mut(&module.reference) else {
            let warning = MergeWarning::MissingFromNetlist {
                reference: module.reference.clone(),
            };
            tracing::warn!("{}", warning);
            warnings.push(warning);
            continue;
        };

        for (field, value) in placement_fields(module, options) {
            if let Some(existing) = record.get(field) {
                let (netlist_value, board_value) = (existing.to_string(), value.to_string());
                if netlist_value != board_value {
                    let warning = MergeWarning::FieldConflict {
                        reference: module.reference.clone(),
                        field: field.to_string(),
                        netlist_value,
                        board_value,
                    };
                    tracing::warn!("{}", warning);
                    warnings.push(warning);
                }
            }
            if field != "Footprint" {
                record.set(field, value);
            }
        }
    }

    warnings
}

/// Remove excluded records, returning what was dropped and why.
pub fn prune(records: &mut BTreeMap<String, MergedRecord>, filter: &PruneFilter) -> Vec<(String, PruneReason)> {
    let mut excluded = Vec::new();
    records.retain(|reference, record| match filter.exclusion(record) {
        Some(reason) => {
            tracing::debug!("Excluding {} ({:?})", reference, reason);
            excluded.push((reference.clone(), reason));
            false
        }
        None => true,
    });
    excluded
}

/// Fill an empty DISTPN2 from DISTPN, or from MPN when DISTPN is empty too.
pub fn resolve_distributor_pn(record: &mut MergedRecord) {
    if record.has_value(SECONDARY_DISTRIBUTOR_PN) {
        return;
    }
    let fallback = if record.has_value(PRIMARY_DISTRIBUTOR_PN) {
        record.text(PRIMARY_DISTRIBUTOR_PN)
    } else {
        record.text(MANUFACTURER_PN)
    };
    record.set(SECONDARY_DISTRIBUTOR_PN, fallback);
}

/// Full merge: seed, apply placements, prune, resolve DISTPN2.
pub fn merge(
    netlist: &Netlist,
    modules: &[ModuleRecord],
    options: &MergeOptions,
    filter: &PruneFilter,
) -> MergeOutcome {
    let mut records = seed_records(netlist);
    let warnings = apply_modules(&mut records, modules, options);
    let excluded = prune(&mut records, filter);
    for record in records.values_mut() {
        resolve_distributor_pn(record);
    }

    MergeOutcome {
        records,
        warnings,
        excluded,
    }
}

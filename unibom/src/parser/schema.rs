//! Records handed back by the netlist and board loaders.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;

/// Fields every component carries outside of its free-form field map.
pub const PRIMARY_FIELDS: [&str; 3] = ["Reference", "Value", "Description"];

/// Library part definition (`libpart`) from the netlist.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LibPart {
    pub lib: String,
    pub part: String,
    pub description: String,
    pub docs: String,
    pub fields: BTreeMap<String, String>,
}

/// Schematic component (`comp`) from the netlist.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComponentRecord {
    pub reference: String,
    pub value: String,
    pub footprint: String,
    pub datasheet: String,
    /// `(description ...)` element, only written by newer netlist exporters.
    pub description: String,
    pub lib: String,
    pub part: String,
    /// User fields from the component's own `(fields ...)` block.
    pub fields: BTreeMap<String, String>,
}

impl ComponentRecord {
    /// Field by name, falling back to the library part's field of the same name.
    pub fn field<'a>(&'a self, name: &str, libpart: Option<&'a LibPart>) -> &'a str {
        self.fields
            .get(name)
            .or_else(|| libpart.and_then(|p| p.fields.get(name)))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn resolved_datasheet<'a>(&'a self, libpart: Option<&'a LibPart>) -> &'a str {
        if !self.datasheet.is_empty() {
            return &self.datasheet;
        }
        libpart.map(|p| p.docs.as_str()).unwrap_or("")
    }

    /// `Description` field, then the component's own description, then the library part's.
    pub fn resolved_description<'a>(&'a self, libpart: Option<&'a LibPart>) -> &'a str {
        let field = self.field("Description", libpart);
        if !field.is_empty() {
            return field;
        }
        if !self.description.is_empty() {
            return &self.description;
        }
        libpart.map(|p| p.description.as_str()).unwrap_or("")
    }
}

/// Everything the netlist loader yields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Netlist {
    pub source: PathBuf,
    pub version: Option<String>,
    /// Components that survived the interesting-component filter, in file order.
    pub components: Vec<ComponentRecord>,
    pub libparts: Vec<LibPart>,
}

impl Netlist {
    pub fn libpart_for(&self, component: &ComponentRecord) -> Option<&LibPart> {
        self.libparts
            .iter()
            .find(|p| p.lib == component.lib && p.part == component.part)
    }

    /// Union of user field names across the loaded components.
    pub fn component_field_union(&self) -> BTreeSet<String> {
        self.components
            .iter()
            .flat_map(|c| c.fields.keys().cloned())
            .collect()
    }

    /// Union of field names across every library part definition.
    pub fn libpart_field_union(&self) -> BTreeSet<String> {
        self.libparts
            .iter()
            .flat_map(|p| p.fields.keys().cloned())
            .collect()
    }

    /// Extra columns: both unions minus the primary fields, alphabetically sorted.
    pub fn extra_columns(&self) -> Vec<String> {
        let mut union = self.component_field_union();
        union.extend(self.libpart_field_union());
        union
            .into_iter()
            .filter(|name| !PRIMARY_FIELDS.contains(&name.as_str()))
            .collect()
    }

    /// Primary fields followed by the extra columns.
    pub fn columns(&self) -> Vec<String> {
        PRIMARY_FIELDS
            .iter()
            .map(|s| s.to_string())
            .chain(self.extra_columns())
            .collect()
    }
}

/// Placement classification from the footprint `attr` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MountType {
    /// No SMD attribute: through-hole or unspecified.
    Default,
    /// Normal part, to be inserted by pick-and-place.
    Insert,
    /// Not physically placed.
    Virtual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Top,
    Bottom,
}

impl Side {
    pub fn is_flipped(self) -> bool {
        matches!(self, Side::Bottom)
    }
}

/// Footprint identifier split into library nickname and footprint name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FootprintId {
    pub lib_nickname: String,
    pub name: String,
}

impl FootprintId {
    pub fn parse(id: &str) -> Self {
        match id.split_once(':') {
            Some((lib, name)) => Self {
                lib_nickname: lib.to_string(),
                name: name.to_string(),
            },
            None => Self {
                lib_nickname: String::new(),
                name: id.to_string(),
            },
        }
    }
}

impl std::fmt::Display for FootprintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.lib_nickname, self.name)
    }
}

/// Placed footprint from the board. Lengths in nanometres, angles in tenths of a degree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleRecord {
    pub reference: String,
    pub position: (i64, i64),
    pub orientation: f64,
    pub side: Side,
    pub footprint: FootprintId,
    /// Width and height of the rotated footprint's bounding rectangle.
    pub bounding_size: (i64, i64),
    pub mount_type: MountType,
}

/// Everything the board loader yields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Board {
    pub source: PathBuf,
    pub version: Option<String>,
    pub modules: Vec<ModuleRecord>,
    /// Plot output directory declared in the board setup, possibly empty.
    pub output_directory: String,
}

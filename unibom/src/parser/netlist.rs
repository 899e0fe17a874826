//! KiCad netlist reader
//!
//! Reads the s-expression netlist export (`.net`, versions "D" and "E") and
//! keeps only what the BOM needs: components with their fields, and the
//! library part definitions used for field fallback. Nets are ignored.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use thiserror::Error;

use crate::parser::schema::{ComponentRecord, LibPart, Netlist};
use crate::parser::sexp::{parse_document, ParseError, SExp};

#[derive(Debug, Error)]
pub enum NetlistParseError {
    #[error("Cannot read netlist {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("S-expression parse error: {0}")]
    SExpParse(#[from] ParseError),
    #[error("Invalid netlist format: {0}")]
    InvalidFormat(String),
    #[error("Invalid component filter pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Patterns for components that never belong on a BOM.
///
/// Each pattern must match at the start of the reference or value.
#[derive(Debug, Clone)]
pub struct ComponentFilter {
    pub excluded_references: Vec<String>,
    pub excluded_values: Vec<String>,
}

impl Default for ComponentFilter {
    fn default() -> Self {
        Self {
            excluded_references: vec!["TP[0-9]+".to_string()],
            excluded_values: vec![
                "MOUNTHOLE".to_string(),
                "SCOPETEST".to_string(),
                "MOUNT_HOLE".to_string(),
                "SOLDER_BRIDGE.*".to_string(),
            ],
        }
    }
}

impl ComponentFilter {
    /// Keeps every component.
    pub fn none() -> Self {
        Self {
            excluded_references: Vec::new(),
            excluded_values: Vec::new(),
        }
    }

    fn compile(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
        patterns
            .iter()
            .map(|p| Regex::new(&format!("^(?:{})", p)))
            .collect()
    }
}

pub struct NetlistParser;

impl NetlistParser {
    /// Load a netlist file with the default component filter.
    pub fn parse_netlist(path: &Path) -> Result<Netlist, NetlistParseError> {
        Self::parse_netlist_with(path, &ComponentFilter::default())
    }

    pub fn parse_netlist_with(
        path: &Path,
        filter: &ComponentFilter,
    ) -> Result<Netlist, NetlistParseError> {
        let content = std::fs::read_to_string(path).map_err(|source| NetlistParseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut netlist = Self::parse_netlist_str(&content, filter)?;
        netlist.source = path.to_path_buf();
        Ok(netlist)
    }

    pub fn parse_netlist_str(
        content: &str,
        filter: &ComponentFilter,
    ) -> Result<Netlist, NetlistParseError> {
        let root = parse_document(content)?;

        match root.tag() {
            Some("export") => {}
            Some(other) => {
                return Err(NetlistParseError::InvalidFormat(format!(
                    "Expected export, found {}",
                    other
                )))
            }
            None => {
                return Err(NetlistParseError::InvalidFormat(
                    "Expected export root".to_string(),
                ))
            }
        }

        let excluded_refs = ComponentFilter::compile(&filter.excluded_references)?;
        let excluded_values = ComponentFilter::compile(&filter.excluded_values)?;

        let mut netlist = Netlist {
            version: root.value_of("version").map(str::to_string),
            ..Default::default()
        };

        if let Some(components) = root.child("components") {
            for comp in components.children("comp") {
                let component = Self::parse_component(comp);
                if excluded_refs.iter().any(|re| re.is_match(&component.reference))
                    || excluded_values.iter().any(|re| re.is_match(&component.value))
                {
                    tracing::debug!("Ignoring uninteresting component {}", component.reference);
                    continue;
                }
                netlist.components.push(component);
            }
        }

        if let Some(libparts) = root.child("libparts") {
            netlist.libparts = libparts.children("libpart").map(Self::parse_libpart).collect();
        }

        Ok(netlist)
    }

    fn parse_component(comp: &SExp) -> ComponentRecord {
        let text = |key: &str| comp.value_of(key).unwrap_or("").to_string();
        let (lib, part) = comp
            .child("libsource")
            .map(|src| {
                (
                    src.value_of("lib").unwrap_or("").to_string(),
                    src.value_of("part").unwrap_or("").to_string(),
                )
            })
            .unwrap_or_default();

        ComponentRecord {
            reference: text("ref"),
            value: text("value"),
            footprint: text("footprint"),
            datasheet: text("datasheet"),
            description: text("description"),
            lib,
            part,
            fields: Self::parse_fields(comp),
        }
    }

    fn parse_libpart(libpart: &SExp) -> LibPart {
        let text = |key: &str| libpart.value_of(key).unwrap_or("").to_string();
        LibPart {
            lib: text("lib"),
            part: text("part"),
            description: text("description"),
            docs: text("docs"),
            fields: Self::parse_fields(libpart),
        }
    }

    /// `(fields (field (name MPN) ABC123) (field (name Empty)))`
    fn parse_fields(owner: &SExp) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        let Some(block) = owner.child("fields") else {
            return fields;
        };
        for field in block.children("field") {
            let Some(name) = field.value_of("name") else {
                continue;
            };
            let value = field
                .as_list()
                .unwrap_or(&[])
                .iter()
                .skip(1)
                .find_map(|item| item.as_atom())
                .unwrap_or("");
            fields.insert(name.to_string(), value.to_string());
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NETLIST_D: &str = r#"(export (version D)
  (design (source /tmp/demo.sch) (tool "Eeschema 5.1.9"))
  (components
    (comp (ref R1)
      (value 10k)
      (footprint Resistor_SMD:R_0603_1608Metric)
      (fields
        (field (name MFR) Yageo)
        (field (name MPN) RC0603FR-0710KL))
      (libsource (lib Device) (part R) (description Resistor))
      (sheetpath (names /) (tstamps /))
      (tstamp 5F2B1C3A))
    (comp (ref TP1)
      (value TestPoint)
      (libsource (lib Connector) (part TestPoint)))
    (comp (ref H1)
      (value MOUNTHOLE)
      (libsource (lib Mechanical) (part MountingHole))))
  (libparts
    (libpart (lib Device) (part R)
      (description Resistor)
      (docs ~)
      (fields
        (field (name Reference) R)
        (field (name Value) R)
        (field (name Footprint))
        (field (name Datasheet) ~))))
  (nets
    (net (code 1) (name GND)
      (node (ref R1) (pin 2)))))"#;

    #[test]
    fn test_parse_components_and_libparts() {
        let netlist = NetlistParser::parse_netlist_str(NETLIST_D, &ComponentFilter::default()).unwrap();
        assert_eq!(netlist.version.as_deref(), Some("D"));
        assert_eq!(netlist.components.len(), 1);

        let r1 = &netlist.components[0];
        assert_eq!(r1.reference, "R1");
        assert_eq!(r1.value, "10k");
        assert_eq!(r1.footprint, "Resistor_SMD:R_0603_1608Metric");
        assert_eq!(r1.fields.get("MPN").map(String::as_str), Some("RC0603FR-0710KL"));
        assert_eq!((r1.lib.as_str(), r1.part.as_str()), ("Device", "R"));

        let part = netlist.libpart_for(r1).unwrap();
        assert_eq!(part.docs, "~");
        assert_eq!(part.fields.get("Footprint").map(String::as_str), Some(""));
    }

    #[test]
    fn test_default_filter_drops_test_points_and_holes() {
        let netlist = NetlistParser::parse_netlist_str(NETLIST_D, &ComponentFilter::default()).unwrap();
        assert!(netlist.components.iter().all(|c| c.reference != "TP1" && c.reference != "H1"));

        let everything = NetlistParser::parse_netlist_str(NETLIST_D, &ComponentFilter::none()).unwrap();
        assert_eq!(everything.components.len(), 3);
    }

    #[test]
    fn test_column_union() {
        let netlist = NetlistParser::parse_netlist_str(NETLIST_D, &ComponentFilter::default()).unwrap();
        assert_eq!(
            netlist.columns(),
            vec!["Reference", "Value", "Description", "Datasheet", "Footprint", "MFR", "MPN"]
        );
    }

    #[test]
    fn test_rejects_non_netlist_root() {
        let err = NetlistParser::parse_netlist_str("(kicad_pcb (version 4))", &ComponentFilter::default())
            .unwrap_err();
        assert!(matches!(err, NetlistParseError::InvalidFormat(_)));
    }

    #[test]
    fn test_bad_filter_pattern() {
        let filter = ComponentFilter {
            excluded_references: vec!["TP[".to_string()],
            excluded_values: Vec::new(),
        };
        assert!(matches!(
            NetlistParser::parse_netlist_str(NETLIST_D, &filter),
            Err(NetlistParseError::Pattern(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = NetlistParser::parse_netlist(Path::new("does_not_exist.net")).unwrap_err();
        assert!(matches!(err, NetlistParseError::Io { .. }));
    }
}

//! Exclusion rules applied after the merge.
//!
//! Rules are plain data so they can be loaded from a JSON file:
//!
//! ```json
//! { "footprint": [".*NetTie.*"], "reference": ["TP.*", "MECH.*"] }
//! ```
//!
//! Omitted keys keep their defaults.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::MergedRecord;

#[derive(Debug, Error)]
pub enum PruneConfigError {
    #[error("Cannot read prune config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid prune config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid {list} pattern: {source}")]
    Pattern {
        list: &'static str,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruneRules {
    /// Footprint patterns, e.g. net ties.
    pub footprint: Vec<String>,
    /// Reference patterns, e.g. test points and mechanical parts.
    pub reference: Vec<String>,
    /// Field holding assembly configuration flags.
    pub config_field: String,
    /// Substring of the config field that marks a part as not fitted.
    pub dnf_marker: String,
}

impl Default for PruneRules {
    fn default() -> Self {
        Self {
            footprint: vec![".*NetTie.*".to_string()],
            reference: vec!["TP.*".to_string(), "MECH.*".to_string()],
            config_field: "Config".to_string(),
            dnf_marker: "DNF".to_string(),
        }
    }
}

impl PruneRules {
    pub fn from_json_str(json: &str) -> Result<Self, PruneConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, PruneConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| PruneConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn compile(&self) -> Result<PruneFilter, PruneConfigError> {
        Ok(PruneFilter {
            footprint: combine(&self.footprint)
                .map_err(|source| PruneConfigError::Pattern { list: "footprint", source })?,
            reference: combine(&self.reference)
                .map_err(|source| PruneConfigError::Pattern { list: "reference", source })?,
            config_field: self.config_field.clone(),
            dnf_marker: self.dnf_marker.clone(),
        })
    }
}

/// One start-anchored alternation per list; an empty list matches nothing.
fn combine(patterns: &[String]) -> Result<Option<Regex>, regex::Error> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let alternation = patterns
        .iter()
        .map(|p| format!("(?:{})", p))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("^(?:{})", alternation)).map(Some)
}

/// Why a record was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneReason {
    DoNotFit,
    Reference,
    Footprint,
}

#[derive(Debug, Clone)]
pub struct PruneFilter {
    footprint: Option<Regex>,
    reference: Option<Regex>,
    config_field: String,
    dnf_marker: String,
}

impl PruneFilter {
    pub fn matches_reference(&self, reference: &str) -> bool {
        self.reference.as_ref().is_some_and(|re| re.is_match(reference))
    }

    pub fn matches_footprint(&self, footprint: &str) -> bool {
        self.footprint.as_ref().is_some_and(|re| re.is_match(footprint))
    }

    pub fn is_dnf(&self, config: &str) -> bool {
        !self.dnf_marker.is_empty() && config.contains(&self.dnf_marker)
    }

    /// First rule that excludes the record, checked in DNF, reference, footprint order.
    pub fn exclusion(&self, record: &MergedRecord) -> Option<PruneReason> {
        if record.get(&self.config_field).is_some() && self.is_dnf(&record.text(&self.config_field)) {
            Some(PruneReason::DoNotFit)
        } else if self.matches_reference(&record.reference) {
            Some(PruneReason::Reference)
        } else if record.get("Footprint").is_some() && self.matches_footprint(&record.text("Footprint")) {
            Some(PruneReason::Footprint)
        } else {
            None
        }
    }
}

//! Merged per-reference rows.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A cell of the merged table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Real(f64),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(i) => write!(f, "{}", i),
            // Integral reals keep their decimal point: -10.0, not -10.
            FieldValue::Real(r) if r.is_finite() && r.fract() == 0.0 => write!(f, "{:.1}", r),
            FieldValue::Real(r) => write!(f, "{}", r),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(r: f64) -> Self {
        FieldValue::Real(r)
    }
}

/// One component after the join, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedRecord {
    pub reference: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl MergedRecord {
    pub fn new(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        let mut fields = BTreeMap::new();
        fields.insert("Reference".to_string(), FieldValue::Text(reference.clone()));
        Self { reference, fields }
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }

    /// Rendered cell, empty when the column is absent.
    pub fn text(&self, column: &str) -> String {
        self.fields.get(column).map(ToString::to_string).unwrap_or_default()
    }

    /// Insert or replace, returning the previous value.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.fields.insert(column.into(), value.into())
    }

    pub fn has_value(&self, column: &str) -> bool {
        self.fields.get(column).is_some_and(|v| !v.is_empty())
    }
}

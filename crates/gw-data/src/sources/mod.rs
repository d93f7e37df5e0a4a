//! Readers turning incoming table data into column-oriented values

pub mod arrow_source;
pub mod csv_source;
pub mod json_source;

use std::collections::HashMap;

use serde_json::Value;

use crate::cell::ColumnType;

pub use arrow_source::read_arrow;
pub use csv_source::read_csv;
pub use json_source::{read_columns, read_records};

/// Column-oriented values read from a source, before they are typed.
///
/// `present[c][r]` is false where the source did not mention column `c`
/// for row `r`; indexed updates keep the existing value there.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawColumns {
    pub names: Vec<String>,
    pub values: Vec<Vec<Value>>,
    pub present: Vec<Vec<bool>>,
    pub len: usize,

    /// Types fixed by the source; other columns are inferred
    pub types: HashMap<String, ColumnType>,
}

impl RawColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column whose values are all present
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) {
        self.len = self.len.max(values.len());
        self.present.push(vec![true; values.len()]);
        self.names.push(name.into());
        self.values.push(values);
    }

    /// Pad short columns with absent nulls so every column has `len` rows
    pub fn pad(&mut self) {
        for (values, present) in self.values.iter_mut().zip(self.present.iter_mut()) {
            values.resize(self.len, Value::Null);
            present.resize(self.len, false);
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

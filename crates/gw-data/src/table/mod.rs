//! Arrow-backed tables and their update semantics

pub mod columnar;
mod handle;

use std::str::FromStr;

use arrow::array::ArrayRef;
use arrow::compute::kernels::interleave::interleave;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::cell::{Cell, ColumnType};
use crate::config::{CsvOptions, TableOptions};
use crate::index::RowIndex;
use crate::schema::{to_arrow_schema, ColumnSchema, SchemaDetector};
use crate::sources::{read_arrow, read_columns, read_csv, read_records, RawColumns};
use crate::DataError;

pub use columnar::{build_array, read_cell};
pub use handle::{TableRef, UpdateCallback};

/// Data a table is created or updated from
#[derive(Debug, Clone, PartialEq)]
pub enum TableData {
    /// Row objects
    Records(Vec<Map<String, Value>>),
    /// Column name to column values
    Columns(IndexMap<String, Vec<Value>>),
    /// Column name to type; creates an empty table
    Schema(ColumnSchema),
    /// CSV text with a header row
    Csv { text: String, options: CsvOptions },
    /// Arrow IPC stream
    Arrow(Vec<u8>),
}

impl TableData {
    pub fn csv(text: impl Into<String>) -> Self {
        TableData::Csv {
            text: text.into(),
            options: CsvOptions::default(),
        }
    }

    /// Pick the variant matching the shape of a JSON value.
    ///
    /// Arrays are row records, objects of arrays are columns, objects of
    /// strings are schemas and a bare string is CSV text.
    pub fn from_json(value: &Value) -> Result<Self, DataError> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_object().cloned().ok_or_else(|| {
                        DataError::UnsupportedFormat(format!("row records must be objects, got {item}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(TableData::Records),
            Value::Object(map) if map.values().all(Value::is_array) => Ok(TableData::Columns(
                map.iter()
                    .map(|(name, values)| (name.clone(), values.as_array().cloned().unwrap_or_default()))
                    .collect(),
            )),
            Value::Object(map) if map.values().all(Value::is_string) => map
                .iter()
                .map(|(name, type_name)| {
                    let type_name = type_name.as_str().unwrap_or_default();
                    Ok((name.clone(), ColumnType::from_str(type_name)?))
                })
                .collect::<Result<ColumnSchema, DataError>>()
                .map(TableData::Schema),
            Value::String(text) => Ok(TableData::csv(text.clone())),
            other => Err(DataError::UnsupportedFormat(format!(
                "cannot build a table from {other}"
            ))),
        }
    }

    /// Read the rows this data carries
    fn read(self) -> Result<RawColumns, DataError> {
        match self {
            TableData::Records(records) => Ok(read_records(&records)),
            TableData::Columns(columns) => Ok(read_columns(&columns)),
            TableData::Csv { text, options } => read_csv(&text, &options),
            TableData::Arrow(bytes) => read_arrow(&bytes),
            TableData::Schema(_) => Err(DataError::UnsupportedFormat(
                "a schema carries no rows to write".to_string(),
            )),
        }
    }
}

/// Where each row of the next batch comes from
#[derive(Debug, Clone)]
struct Slot {
    /// Existing row the slot starts from
    base: Option<usize>,
    /// Incoming rows written to the slot, in order
    updates: Vec<usize>,
}

impl Slot {
    fn existing(row: usize) -> Self {
        Self {
            base: Some(row),
            updates: Vec::new(),
        }
    }

    fn incoming(row: usize) -> Self {
        Self {
            base: None,
            updates: vec![row],
        }
    }

    /// `(0, row)` selects the existing batch, `(1, row)` the incoming one
    fn pick(&self, present: Option<&[bool]>) -> (usize, usize) {
        let written = present.and_then(|present| self.updates.iter().rev().find(|&&row| present[row]));
        match (written, self.base) {
            (Some(&row), _) => (1, row),
            (None, Some(row)) => (0, row),
            (None, None) => (1, self.updates.last().copied().unwrap_or_default()),
        }
    }
}

/// An in-memory table
#[derive(Debug, Clone)]
pub struct Table {
    schema: ColumnSchema,
    arrow_schema: SchemaRef,
    batch: RecordBatch,
    options: TableOptions,
    index: RowIndex,
    /// Rows written since creation or the last clear; drives the limit ring
    written: usize,
}

impl Table {
    /// Create a table, inferring its schema unless one is given
    pub fn new(data: TableData, options: TableOptions) -> Result<Self, DataError> {
        let (schema, raw) = match data {
            TableData::Schema(schema) => (schema, None),
            data => {
                let raw = data.read()?;
                (infer_schema(&raw), Some(raw))
            }
        };

        let columns: Vec<String> = schema.keys().cloned().collect();
        options.validate(&columns)?;

        let mut table = Self::empty(schema, options);
        if let Some(raw) = raw {
            table.write(raw)?;
        }
        tracing::debug!("Created table with {} columns and {} rows", table.schema.len(), table.size());
        Ok(table)
    }

    fn empty(schema: ColumnSchema, options: TableOptions) -> Self {
        let arrow_schema = to_arrow_schema(&schema);
        Self {
            batch: RecordBatch::new_empty(arrow_schema.clone()),
            arrow_schema,
            schema,
            options,
            index: RowIndex::new(),
            written: 0,
        }
    }

    /// Column names in schema order
    pub fn columns(&self) -> Vec<String> {
        self.schema.keys().cloned().collect()
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.schema.get(column).copied()
    }

    /// Number of rows
    pub fn size(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn index(&self) -> Option<&str> {
        self.options.index.as_deref()
    }

    pub fn limit(&self) -> Option<usize> {
        self.options.limit
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// All rows as cells, in schema column order
    pub fn rows(&self) -> Vec<Vec<Cell>> {
        let types: Vec<ColumnType> = self.schema.values().copied().collect();
        (0..self.size())
            .map(|row| {
                self.batch
                    .columns()
                    .iter()
                    .zip(&types)
                    .map(|(array, &column_type)| read_cell(array, column_type, row))
                    .collect()
            })
            .collect()
    }

    /// Values of one column, if it exists
    pub fn column_cells(&self, column: &str) -> Option<Vec<Cell>> {
        let idx = self.schema.get_index_of(column)?;
        let column_type = self.schema[idx];
        let array = self.batch.column(idx);
        Some((0..self.size()).map(|row| read_cell(array, column_type, row)).collect())
    }

    /// Apply an update following the table's index or limit
    pub fn update(&mut self, data: TableData) -> Result<(), DataError> {
        let raw = data.read()?;
        self.write(raw)
    }

    /// Drop every row, keeping the schema
    pub fn clear(&mut self) {
        self.batch = RecordBatch::new_empty(self.arrow_schema.clone());
        self.index.clear();
        self.written = 0;
    }

    /// Clear then update; on failure the table is left untouched
    pub fn replace(&mut self, data: TableData) -> Result<(), DataError> {
        let mut next = self.clone();
        next.clear();
        next.update(data)?;
        *self = next;
        Ok(())
    }

    /// Render the first rows as a text table
    pub fn pretty(&self, max_rows: usize) -> Result<String, DataError> {
        let shown = self.batch.slice(0, max_rows.min(self.size()));
        Ok(arrow::util::pretty::pretty_format_batches(&[shown])?.to_string())
    }

    fn write(&mut self, raw: RawColumns) -> Result<(), DataError> {
        if let Some(unknown) = raw.names.iter().find(|name| !self.schema.contains_key(*name)) {
            return Err(DataError::UnknownColumn(unknown.clone()));
        }
        if raw.is_empty() {
            return Ok(());
        }

        let sources: Vec<Option<usize>> = self.schema.keys().map(|name| raw.position(name)).collect();
        let mut incoming = Vec::with_capacity(self.schema.len());
        for ((name, &column_type), source) in self.schema.iter().zip(&sources) {
            let cells = match source {
                Some(idx) => raw.values[*idx]
                    .iter()
                    .map(|value| {
                        Cell::coerce(value, column_type).ok_or_else(|| DataError::TypeMismatch {
                            column: name.clone(),
                            value: value.to_string(),
                            expected: column_type,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                None => vec![Cell::Null; raw.len],
            };
            incoming.push(cells);
        }

        let plan = self.plan(raw.len, &incoming);

        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.schema.len());
        for (idx, (&column_type, source)) in self.schema.values().zip(&sources).enumerate() {
            let existing = self.batch.column(idx);
            let written = build_array(column_type, &incoming[idx]);
            let present = source.map(|s| raw.present[s].as_slice());
            let picks: Vec<(usize, usize)> = plan.iter().map(|slot| slot.pick(present)).collect();
            arrays.push(interleave(&[existing.as_ref(), written.as_ref()], &picks)?);
        }

        let options = RecordBatchOptions::new().with_row_count(Some(plan.len()));
        self.batch = RecordBatch::try_new_with_options(self.arrow_schema.clone(), arrays, &options)?;
        Ok(())
    }

    /// Lay out the next batch: existing rows first, then incoming rows
    /// placed by index key, limit ring or plain append
    fn plan(&mut self, incoming_rows: usize, incoming: &[Vec<Cell>]) -> Vec<Slot> {
        let mut plan: Vec<Slot> = (0..self.size()).map(Slot::existing).collect();

        let key_column = self.options.index.as_ref().and_then(|index| self.schema.get_index_of(index));
        if let Some(key_column) = key_column {
            for (row, key) in incoming[key_column].iter().enumerate() {
                match self.index.get(key) {
                    Some(slot) => plan[slot].updates.push(row),
                    None => {
                        self.index.insert(key, plan.len());
                        plan.push(Slot::incoming(row));
                    }
                }
            }
        } else if let Some(limit) = self.options.limit {
            for row in 0..incoming_rows {
                let slot = self.written % limit;
                self.written += 1;
                if slot < plan.len() {
                    plan[slot] = Slot::incoming(row);
                } else {
                    plan.push(Slot::incoming(row));
                }
            }
        } else {
            plan.extend((0..incoming_rows).map(Slot::incoming));
        }
        plan
    }
}

/// Infer a schema, honouring types fixed by the source
fn infer_schema(raw: &RawColumns) -> ColumnSchema {
    let mut schema = SchemaDetector::new().detect(&raw.names, &raw.values);
    for (name, column_type) in schema.iter_mut() {
        if let Some(fixed) = raw.types.get(name) {
            *column_type = *fixed;
        }
    }
    schema
}

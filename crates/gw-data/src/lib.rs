//! In-memory table engine backing the grid widget
//!
//! Tables are stored as Arrow record batches. The manager hosts tables and
//! views under string identifiers and answers the JSON commands the
//! front-end viewer sends through the widget.

pub mod cell;
pub mod config;
pub mod index;
pub mod manager;
pub mod schema;
pub mod sources;
pub mod table;
pub mod view;

use arrow::error::ArrowError;
use thiserror::Error;

// Re-exports
pub use cell::{Cell, ColumnType};
pub use config::{CsvOptions, NullConfig, TableOptions};
pub use manager::{Command, EngineResponse, ReplyFn, ResponseData, TableManager};
pub use schema::{ColumnSchema, SchemaDetector};
pub use table::{Table, TableData, TableRef, UpdateCallback};
pub use view::{View, ViewColumns, ViewConfig, ViewRow};

/// Errors that can occur in table engine operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("CSV parsing error: {0}")]
    Csv(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported data format: {0}")]
    UnsupportedFormat(String),

    #[error("Unknown column type: {0}")]
    InvalidType(String),

    #[error("Column `{column}` cannot hold value {value} (expected {expected})")]
    TypeMismatch {
        column: String,
        value: String,
        expected: ColumnType,
    },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Invalid table options: {0}")]
    InvalidOptions(String),

    #[error("No table named `{0}`")]
    UnknownTable(String),

    #[error("No view named `{0}`")]
    UnknownView(String),

    #[error("Unsupported method `{0}`")]
    UnsupportedMethod(String),

    #[error("Invalid view configuration: {0}")]
    InvalidView(String),
}

impl From<csv::Error> for DataError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => DataError::Io(std::io::Error::new(io_err.kind(), error.to_string())),
            _ => DataError::Csv(error.to_string()),
        }
    }
}

impl From<gw_core::ValidationError> for DataError {
    fn from(error: gw_core::ValidationError) -> Self {
        DataError::InvalidView(error.to_string())
    }
}

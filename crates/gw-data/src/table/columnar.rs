//! Conversion between cells and Arrow arrays

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanBuilder, Date32Builder, Float64Builder, Int64Builder,
    StringBuilder, TimestampMillisecondBuilder,
};
use arrow::datatypes::{Date32Type, Float64Type, Int64Type, TimestampMillisecondType};
use chrono::DateTime;

use crate::cell::{date_to_days, days_to_date, Cell, ColumnType};

/// Build an Arrow array of the column type's storage type.
///
/// Cells are expected to be coerced already; anything else is stored as null.
pub fn build_array(column_type: ColumnType, cells: &[Cell]) -> ArrayRef {
    match column_type {
        ColumnType::Integer => {
            let mut builder = Int64Builder::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    Cell::Integer(i) => builder.append_value(*i),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnType::Float => {
            let mut builder = Float64Builder::with_capacity(cells.len());
            for cell in cells {
                builder.append_option(cell.as_f64());
            }
            Arc::new(builder.finish())
        }
        ColumnType::String => {
            let mut builder = StringBuilder::with_capacity(cells.len(), cells.len() * 8);
            for cell in cells {
                match cell {
                    Cell::String(s) => builder.append_value(s),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    Cell::Boolean(b) => builder.append_value(*b),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnType::Date => {
            let mut builder = Date32Builder::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    Cell::Date(d) => builder.append_value(date_to_days(*d)),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnType::Datetime => {
            let mut builder = TimestampMillisecondBuilder::with_capacity(cells.len());
            for cell in cells {
                builder.append_option(cell.epoch_millis());
            }
            Arc::new(builder.finish())
        }
    }
}

/// Read one value from an array stored with the column type's storage type
pub fn read_cell(array: &ArrayRef, column_type: ColumnType, row: usize) -> Cell {
    if array.is_null(row) {
        return Cell::Null;
    }
    match column_type {
        ColumnType::Integer => Cell::Integer(array.as_primitive::<Int64Type>().value(row)),
        ColumnType::Float => Cell::Float(array.as_primitive::<Float64Type>().value(row)),
        ColumnType::String => Cell::String(array.as_string::<i32>().value(row).to_string()),
        ColumnType::Boolean => Cell::Boolean(array.as_boolean().value(row)),
        ColumnType::Date => days_to_date(array.as_primitive::<Date32Type>().value(row))
            .map(Cell::Date)
            .unwrap_or(Cell::Null),
        ColumnType::Datetime => {
            DateTime::from_timestamp_millis(array.as_primitive::<TimestampMillisecondType>().value(row))
                .map(Cell::Datetime)
                .unwrap_or(Cell::Null)
        }
    }
}

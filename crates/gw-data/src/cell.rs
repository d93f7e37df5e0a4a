//! Scalar cell values and their wire encoding
//!
//! `Cell` is what the engine hands back to the front end. Its `Serialize`
//! implementation is the single place where date/time values are encoded:
//! datetimes become integer millisecond Unix timestamps and dates become the
//! millisecond timestamp of their midnight (UTC), which is the resolution the
//! front-end viewer expects.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use arrow::datatypes::{DataType, TimeUnit};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::DataError;

/// Days between 0001-01-01 (CE day 1) and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%Y/%m/%d %I:%M%p",
    "%m/%d/%Y %H:%M:%S",
];

/// Logical column types supported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Boolean,
    Date,
    Datetime,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::String => "string",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Datetime => "datetime",
        }
    }

    /// Arrow storage type for this column type
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnType::Integer => DataType::Int64,
            ColumnType::Float => DataType::Float64,
            ColumnType::String => DataType::Utf8,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Date => DataType::Date32,
            ColumnType::Datetime => DataType::Timestamp(TimeUnit::Millisecond, None),
        }
    }

    /// Map an arbitrary Arrow type onto the closest column type
    pub fn from_data_type(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => Some(ColumnType::Integer),
            DataType::Float16 | DataType::Float32 | DataType::Float64 => Some(ColumnType::Float),
            DataType::Utf8 | DataType::LargeUtf8 => Some(ColumnType::String),
            DataType::Boolean => Some(ColumnType::Boolean),
            DataType::Date32 | DataType::Date64 => Some(ColumnType::Date),
            DataType::Timestamp(_, _) => Some(ColumnType::Datetime),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

impl FromStr for ColumnType {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integer" => Ok(ColumnType::Integer),
            "float" => Ok(ColumnType::Float),
            "string" => Ok(ColumnType::String),
            "boolean" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            "datetime" => Ok(ColumnType::Datetime),
            other => Err(DataError::InvalidType(other.to_string())),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single scalar value of a table or view
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    Datetime(DateTime<Utc>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Convert a JSON value into a cell of the given type.
    ///
    /// Returns `None` when the value cannot represent that type.
    pub fn coerce(value: &Value, column_type: ColumnType) -> Option<Cell> {
        if value.is_null() {
            return Some(Cell::Null);
        }
        match column_type {
            ColumnType::Integer => match value {
                Value::Number(n) => n.as_i64().map(Cell::Integer).or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| Cell::Integer(f as i64))
                }),
                Value::String(s) => s.trim().parse::<i64>().ok().map(Cell::Integer),
                _ => None,
            },
            ColumnType::Float => match value {
                Value::Number(n) => n.as_f64().map(Cell::Float),
                Value::String(s) => s.trim().parse::<f64>().ok().map(Cell::Float),
                _ => None,
            },
            ColumnType::String => match value {
                Value::String(s) => Some(Cell::String(s.clone())),
                Value::Number(n) => Some(Cell::String(n.to_string())),
                Value::Bool(b) => Some(Cell::String(b.to_string())),
                _ => None,
            },
            ColumnType::Boolean => match value {
                Value::Bool(b) => Some(Cell::Boolean(*b)),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Some(Cell::Boolean(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Some(Cell::Boolean(false)),
                _ => None,
            },
            ColumnType::Date => match value {
                Value::String(s) => parse_date(s)
                    .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
                    .map(Cell::Date),
                Value::Number(n) => n
                    .as_i64()
                    .and_then(DateTime::from_timestamp_millis)
                    .map(|dt| Cell::Date(dt.date_naive())),
                _ => None,
            },
            ColumnType::Datetime => match value {
                Value::String(s) => parse_datetime(s)
                    .or_else(|| parse_date(s).map(date_to_datetime))
                    .map(Cell::Datetime),
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f.round() as i64))
                    .and_then(DateTime::from_timestamp_millis)
                    .map(Cell::Datetime),
                _ => None,
            },
        }
    }

    /// Numeric view of the cell, used by aggregates and comparisons
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Millisecond Unix timestamp of a date or datetime
    pub fn epoch_millis(&self) -> Option<i64> {
        match self {
            Cell::Date(d) => Some(date_to_datetime(*d).timestamp_millis()),
            Cell::Datetime(dt) => Some(dt.timestamp_millis()),
            _ => None,
        }
    }

    /// Hashable identity of the cell, distinct across types
    pub fn key(&self) -> String {
        match self {
            Cell::Null => "n:".to_string(),
            Cell::Boolean(b) => format!("b:{b}"),
            Cell::Integer(i) => format!("i:{i}"),
            Cell::Float(f) => format!("f:{}", f.to_bits()),
            Cell::String(s) => format!("s:{s}"),
            Cell::Date(d) => format!("d:{d}"),
            Cell::Datetime(dt) => format!("t:{}", dt.timestamp_millis()),
        }
    }

    /// Total order: nulls first, numbers compared numerically
    pub fn compare(&self, other: &Cell) -> Ordering {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.total_cmp(&b);
        }
        if let (Some(a), Some(b)) = (self.epoch_millis(), other.epoch_millis()) {
            return a.cmp(&b);
        }
        match (self, other) {
            (Cell::Boolean(a), Cell::Boolean(b)) => a.cmp(b),
            (Cell::String(a), Cell::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Cell::Null => 0,
            Cell::Boolean(_) => 1,
            Cell::Integer(_) | Cell::Float(_) => 2,
            Cell::String(_) => 3,
            Cell::Date(_) | Cell::Datetime(_) => 4,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("null"),
            Cell::Boolean(b) => write!(f, "{b}"),
            Cell::Integer(i) => write!(f, "{i}"),
            Cell::Float(x) => write!(f, "{x}"),
            Cell::String(s) => f.write_str(s),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::Datetime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.3f")),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_unit(),
            Cell::Boolean(b) => serializer.serialize_bool(*b),
            Cell::Integer(i) => serializer.serialize_i64(*i),
            Cell::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Cell::Float(_) => serializer.serialize_unit(),
            Cell::String(s) => serializer.serialize_str(s),
            Cell::Date(_) | Cell::Datetime(_) => {
                serializer.serialize_i64(self.epoch_millis().unwrap_or_default())
            }
        }
    }
}

/// Parse a calendar date in one of the accepted layouts
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Parse a date and time; zone-less values are taken as UTC
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn date_to_datetime(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Days since the Unix epoch, as stored in Arrow `Date32`
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// `None` when the day count falls outside the representable calendar
pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

//! Viewer configuration vocabulary and validation
//!
//! Every configuration field is checked against a fixed vocabulary before it
//! is accepted. Parsing never coerces: an unknown plugin, sort direction,
//! filter operator or aggregate is a [`ValidationError`] naming the field and
//! the rejected value.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Names of the synchronized configuration fields, in declaration order.
pub const FIELDS: &[&str] = &[
    "plugin",
    "columns",
    "row_pivots",
    "column_pivots",
    "aggregates",
    "sort",
    "filters",
    "plugin_config",
    "dark",
];

/// A configuration value outside its accepted vocabulary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid value for `{field}`: {value} ({reason})")]
pub struct ValidationError {
    pub field: &'static str,
    pub value: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every accepted value, in vocabulary order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            fn expected() -> String {
                let names: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                format!("expected one of: {}", names.join(", "))
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ValidationError::new($field, other, Self::expected())),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let name = String::deserialize(deserializer)?;
                name.parse().map_err(de::Error::custom)
            }
        }
    };
}

vocabulary!(
    /// Visualization plugins the front-end viewer can render
    Plugin, "plugin", {
        Hypergrid => "hypergrid",
        Datagrid => "datagrid",
        YBar => "y_bar",
        XBar => "x_bar",
        YLine => "y_line",
        YArea => "y_area",
        YScatter => "y_scatter",
        XyLine => "xy_line",
        XyScatter => "xy_scatter",
        Treemap => "treemap",
        Sunburst => "sunburst",
        Heatmap => "heatmap",
        Candlestick => "candlestick",
        Ohlc => "ohlc",
    }
);

impl Default for Plugin {
    fn default() -> Self {
        Plugin::Hypergrid
    }
}

vocabulary!(
    /// Sort directions; `col *` variants order column pivots
    SortDirection, "sort", {
        None => "none",
        Asc => "asc",
        Desc => "desc",
        ColAsc => "col asc",
        ColDesc => "col desc",
        AscAbs => "asc abs",
        DescAbs => "desc abs",
        ColAscAbs => "col asc abs",
        ColDescAbs => "col desc abs",
    }
);

impl SortDirection {
    pub fn is_column_sort(&self) -> bool {
        matches!(
            self,
            SortDirection::ColAsc
                | SortDirection::ColDesc
                | SortDirection::ColAscAbs
                | SortDirection::ColDescAbs
        )
    }

    pub fn is_descending(&self) -> bool {
        matches!(
            self,
            SortDirection::Desc
                | SortDirection::ColDesc
                | SortDirection::DescAbs
                | SortDirection::ColDescAbs
        )
    }

    pub fn is_absolute(&self) -> bool {
        matches!(
            self,
            SortDirection::AscAbs
                | SortDirection::DescAbs
                | SortDirection::ColAscAbs
                | SortDirection::ColDescAbs
        )
    }
}

vocabulary!(
    /// Filter comparison operators
    FilterOperator, "filters", {
        Eq => "==",
        Ne => "!=",
        Lt => "<",
        Gt => ">",
        Le => "<=",
        Ge => ">=",
        BeginsWith => "begins with",
        EndsWith => "ends with",
        Contains => "contains",
        In => "in",
        NotIn => "not in",
        IsNull => "is null",
        IsNotNull => "is not null",
    }
);

impl FilterOperator {
    /// Whether the operator compares against a filter value.
    pub fn takes_value(&self) -> bool {
        !matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }
}

vocabulary!(
    /// Aggregate functions applied to pivoted columns
    Aggregate, "aggregates", {
        Sum => "sum",
        SumAbs => "sum abs",
        Count => "count",
        DistinctCount => "distinct count",
        Avg => "avg",
        Mean => "mean",
        Median => "median",
        High => "high",
        Low => "low",
        FirstByIndex => "first by index",
        LastByIndex => "last by index",
        Unique => "unique",
        Dominant => "dominant",
    }
);

/// One `[column, direction]` sort entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let reject = |reason: &str| ValidationError::new("sort", value.to_string(), reason);
        let entry = value
            .as_array()
            .ok_or_else(|| reject("sort entries are [column, direction] arrays"))?;
        if entry.len() != 2 {
            return Err(reject("sort entries have exactly two elements"));
        }
        let column = entry[0].as_str().ok_or_else(|| reject("column must be a string"))?;
        let direction = entry[1]
            .as_str()
            .ok_or_else(|| reject("direction must be a string"))?
            .parse()?;
        Ok(Self::new(column, direction))
    }
}

impl Serialize for SortSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.column, self.direction).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SortSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        SortSpec::from_json(&raw).map_err(de::Error::custom)
    }
}

/// One `[column, operator, value]` filter entry
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub column: String,
    pub operator: FilterOperator,
    /// Absent only for the null-check operators
    pub value: Option<Value>,
}

impl FilterSpec {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: Option<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value,
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let reject = |reason: &str| ValidationError::new("filters", value.to_string(), reason);
        let entry = value
            .as_array()
            .ok_or_else(|| reject("filter entries are [column, operator, value] arrays"))?;
        if entry.len() < 2 || entry.len() > 3 {
            return Err(reject("filter entries have two or three elements"));
        }
        let column = entry[0].as_str().ok_or_else(|| reject("column must be a string"))?;
        let operator: FilterOperator = entry[1]
            .as_str()
            .ok_or_else(|| reject("operator must be a string"))?
            .parse()?;
        let operand = entry.get(2).cloned();
        if operator.takes_value() && operand.is_none() {
            return Err(reject("operator requires a filter value"));
        }
        if matches!(operator, FilterOperator::In | FilterOperator::NotIn)
            && !operand.as_ref().map(Value::is_array).unwrap_or(false)
        {
            return Err(reject("`in` filters take an array of values"));
        }
        Ok(Self::new(column, operator, operand))
    }
}

impl Serialize for FilterSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.value.is_some() { 3 } else { 2 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.column)?;
        seq.serialize_element(&self.operator)?;
        if let Some(value) = &self.value {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for FilterSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        FilterSpec::from_json(&raw).map_err(de::Error::custom)
    }
}

/// Display and aggregation parameters of the viewer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub plugin: Plugin,
    pub columns: Vec<String>,
    pub row_pivots: Vec<String>,
    pub column_pivots: Vec<String>,
    pub aggregates: IndexMap<String, Aggregate>,
    pub sort: Vec<SortSpec>,
    pub filters: Vec<FilterSpec>,
    pub plugin_config: Map<String, Value>,
    pub dark: bool,
}

pub fn parse_plugin(value: &Value) -> Result<Plugin, ValidationError> {
    match value {
        Value::Null => Ok(Plugin::default()),
        Value::String(name) => name.parse(),
        other => Err(ValidationError::new("plugin", other.to_string(), "plugin must be a string")),
    }
}

/// Parse a list of column names for `columns`, `row_pivots` or `column_pivots`.
pub fn parse_column_list(field: &'static str, value: &Value) -> Result<Vec<String>, ValidationError> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => return Err(ValidationError::new(field, other.to_string(), "expected a list of column names")),
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| ValidationError::new(field, item.to_string(), "column names are strings"))
        })
        .collect()
}

pub fn parse_aggregates(value: &Value) -> Result<IndexMap<String, Aggregate>, ValidationError> {
    let entries = match value {
        Value::Null => return Ok(IndexMap::new()),
        Value::Object(entries) => entries,
        other => {
            return Err(ValidationError::new(
                "aggregates",
                other.to_string(),
                "expected a mapping of column to aggregate",
            ))
        }
    };
    entries
        .iter()
        .map(|(column, aggregate)| {
            let name = aggregate.as_str().ok_or_else(|| {
                ValidationError::new("aggregates", aggregate.to_string(), "aggregate must be a string")
            })?;
            Ok((column.clone(), name.parse()?))
        })
        .collect()
}

pub fn parse_sort(value: &Value) -> Result<Vec<SortSpec>, ValidationError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(entries) => entries.iter().map(SortSpec::from_json).collect(),
        other => Err(ValidationError::new("sort", other.to_string(), "expected a list of sort entries")),
    }
}

pub fn parse_filters(value: &Value) -> Result<Vec<FilterSpec>, ValidationError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(entries) => entries.iter().map(FilterSpec::from_json).collect(),
        other => Err(ValidationError::new("filters", other.to_string(), "expected a list of filter entries")),
    }
}

pub fn parse_plugin_config(value: &Value) -> Result<Map<String, Value>, ValidationError> {
    match value {
        Value::Null => Ok(Map::new()),
        Value::Object(config) => Ok(config.clone()),
        other => Err(ValidationError::new("plugin_config", other.to_string(), "expected an object")),
    }
}

pub fn parse_dark(value: &Value) -> Result<bool, ValidationError> {
    value
        .as_bool()
        .ok_or_else(|| ValidationError::new("dark", value.to_string(), "expected a boolean"))
}

use std::sync::Arc;

use arrow::datatypes::{Field, Schema};
use indexmap::IndexMap;
use serde_json::Value;

use crate::cell::{parse_date, parse_datetime, ColumnType};

/// Column names mapped to their types, in table order
pub type ColumnSchema = IndexMap<String, ColumnType>;

/// Schema detector for analyzing data and determining column types
pub struct SchemaDetector {
    sample_size: usize,
}

impl SchemaDetector {
    /// Create a new schema detector
    pub fn new() -> Self {
        Self {
            sample_size: 1000,
        }
    }

    /// Detect a schema from column-oriented samples
    pub fn detect(&self, names: &[String], columns: &[Vec<Value>]) -> ColumnSchema {
        names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let values = columns.get(idx).map(Vec::as_slice).unwrap_or_default();
                (name.clone(), self.analyze_column(values))
            })
            .collect()
    }

    /// Analyze a single column
    fn analyze_column(&self, values: &[Value]) -> ColumnType {
        let mut seen = 0;
        let mut is_bool = true;
        let mut is_int = true;
        let mut is_float = true;
        let mut is_date = true;
        let mut is_datetime = true;

        for value in values.iter().filter(|v| !v.is_null()).take(self.sample_size) {
            seen += 1;
            match value {
                Value::Bool(_) => {
                    is_int = false;
                    is_float = false;
                    is_date = false;
                    is_datetime = false;
                }
                Value::Number(n) => {
                    is_bool = false;
                    is_date = false;
                    is_datetime = false;
                    if !(n.is_i64() || n.is_u64()) {
                        is_int = false;
                    }
                }
                Value::String(s) => {
                    is_bool = false;
                    is_int = false;
                    is_float = false;
                    if is_date && parse_date(s).is_none() {
                        is_date = false;
                    }
                    if is_datetime && parse_datetime(s).is_none() && parse_date(s).is_none() {
                        is_datetime = false;
                    }
                }
                _ => {
                    is_bool = false;
                    is_int = false;
                    is_float = false;
                    is_date = false;
                    is_datetime = false;
                }
            }
        }

        if seen == 0 {
            ColumnType::String
        } else if is_bool {
            ColumnType::Boolean
        } else if is_int {
            ColumnType::Integer
        } else if is_float {
            ColumnType::Float
        } else if is_date {
            ColumnType::Date
        } else if is_datetime {
            ColumnType::Datetime
        } else {
            ColumnType::String
        }
    }
}

impl Default for SchemaDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Arrow schema for a column schema; every column is nullable
pub fn to_arrow_schema(schema: &ColumnSchema) -> Arc<Schema> {
    let fields: Vec<Field> = schema
        .iter()
        .map(|(name, column_type)| Field::new(name, column_type.data_type(), true))
        .collect();
    Arc::new(Schema::new(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detect_one(values: Vec<Value>) -> ColumnType {
        let schema = SchemaDetector::new().detect(&["x".to_string()], &[values]);
        schema["x"]
    }

    #[test]
    fn test_numeric_inference() {
        assert_eq!(detect_one(vec![json!(1), json!(null), json!(3)]), ColumnType::Integer);
        assert_eq!(detect_one(vec![json!(1), json!(2.5)]), ColumnType::Float);
    }

    #[test]
    fn test_temporal_inference() {
        assert_eq!(detect_one(vec![json!("2019-07-11"), json!("2019-07-12")]), ColumnType::Date);
        assert_eq!(
            detect_one(vec![json!("2019-07-11"), json!("2019-07-11 08:30:00")]),
            ColumnType::Datetime
        );
        assert_eq!(detect_one(vec![json!("2019-07-11"), json!("tomorrow")]), ColumnType::String);
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(detect_one(vec![json!(true), json!(false)]), ColumnType::Boolean);
        assert_eq!(detect_one(vec![json!(null)]), ColumnType::String);
        assert_eq!(detect_one(vec![json!(true), json!(1)]), ColumnType::String);
    }

    #[test]
    fn test_sample_size_limits_inspection() {
        let detector = SchemaDetector { sample_size: 2 };
        let schema = detector.detect(&["x".to_string()], &[vec![json!(1), json!(2), json!("three")]]);
        assert_eq!(schema["x"], ColumnType::Integer);
    }
}

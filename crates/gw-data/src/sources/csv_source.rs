//! CSV text reader

use csv::ReaderBuilder;
use serde_json::{Number, Value};

use super::RawColumns;
use crate::config::CsvOptions;
use crate::DataError;

/// Read CSV text with a header row into raw columns.
///
/// Fields matching a null pattern become null. Numbers and booleans are
/// turned into JSON scalars unless the column has a type override, in which
/// case the text is kept for coercion against that type.
pub fn read_csv(text: &str, options: &CsvOptions) -> Result<RawColumns, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(options.delimiter_byte()?)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut values: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    let overridden: Vec<bool> = headers
        .iter()
        .map(|h| options.column_types.contains_key(h))
        .collect();

    for result in reader.records() {
        let record = result?;
        for (idx, column) in values.iter_mut().enumerate() {
            let field = record.get(idx).unwrap_or("");
            column.push(field_value(field, options, overridden[idx]));
        }
    }

    let mut raw = RawColumns::new();
    for (name, column) in headers.into_iter().zip(values) {
        raw.push_column(name, column);
    }
    raw.types = options.column_types.clone();
    tracing::debug!("Read {} CSV rows across {} columns", raw.len, raw.names.len());
    Ok(raw)
}

fn field_value(field: &str, options: &CsvOptions, keep_text: bool) -> Value {
    if options.nulls.is_null(field) {
        return Value::Null;
    }
    if keep_text {
        return Value::String(field.to_string());
    }

    let trimmed = field.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    match trimmed {
        "true" | "TRUE" | "True" => Value::Bool(true),
        "false" | "FALSE" | "False" => Value::Bool(false),
        _ => Value::String(field.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::ColumnType;
    use serde_json::json;

    #[test]
    fn test_read_csv_types_fields() {
        let raw = read_csv("a,b,c\n1,x,true\n2.5,,false\n", &CsvOptions::default()).unwrap();

        assert_eq!(raw.names, vec!["a", "b", "c"]);
        assert_eq!(raw.len, 2);
        assert_eq!(raw.values[0], vec![json!(1), json!(2.5)]);
        assert_eq!(raw.values[1], vec![json!("x"), Value::Null]);
        assert_eq!(raw.values[2], vec![json!(true), json!(false)]);
    }

    #[test]
    fn test_override_keeps_text() {
        let mut options = CsvOptions::default();
        options.column_types.insert("zip".to_string(), ColumnType::String);
        let raw = read_csv("zip\n02134\n", &options).unwrap();

        assert_eq!(raw.values[0], vec![json!("02134")]);
        assert_eq!(raw.types.get("zip"), Some(&ColumnType::String));
    }

    #[test]
    fn test_custom_delimiter_and_short_rows() {
        let options = CsvOptions {
            delimiter: ';',
            ..CsvOptions::default()
        };
        let raw = read_csv("a;b\n1;2\n3\n", &options).unwrap();

        assert_eq!(raw.values[1], vec![json!(2), Value::Null]);
    }

    #[test]
    fn test_header_only() {
        let raw = read_csv("a,b\n", &CsvOptions::default()).unwrap();
        assert_eq!(raw.names.len(), 2);
        assert!(raw.is_empty());
    }
}

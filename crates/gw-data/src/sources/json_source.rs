//! Row- and column-oriented JSON readers

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::RawColumns;

/// Read row records; columns appear in first-seen key order
pub fn read_records(records: &[Map<String, Value>]) -> RawColumns {
    let mut positions: IndexMap<&str, usize> = IndexMap::new();
    for record in records {
        for key in record.keys() {
            let next = positions.len();
            positions.entry(key.as_str()).or_insert(next);
        }
    }

    let width = positions.len();
    let mut values = vec![Vec::with_capacity(records.len()); width];
    let mut present = vec![Vec::with_capacity(records.len()); width];
    for record in records {
        for (name, &idx) in &positions {
            match record.get(*name) {
                Some(value) => {
                    values[idx].push(value.clone());
                    present[idx].push(true);
                }
                None => {
                    values[idx].push(Value::Null);
                    present[idx].push(false);
                }
            }
        }
    }

    RawColumns {
        names: positions.keys().map(|k| k.to_string()).collect(),
        values,
        present,
        len: records.len(),
        types: Default::default(),
    }
}

/// Read named columns; shorter columns are padded with absent nulls
pub fn read_columns(columns: &IndexMap<String, Vec<Value>>) -> RawColumns {
    let mut raw = RawColumns::new();
    for (name, values) in columns {
        raw.push_column(name.clone(), values.clone());
    }
    raw.pad();
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_records_track_missing_keys() {
        let records = vec![record(json!({"a": 1, "b": "x"})), record(json!({"c": true, "a": 2}))];
        let raw = read_records(&records);

        assert_eq!(raw.names, vec!["a", "b", "c"]);
        assert_eq!(raw.values[0], vec![json!(1), json!(2)]);
        assert_eq!(raw.present[1], vec![true, false]);
        assert_eq!(raw.values[2], vec![Value::Null, json!(true)]);
    }

    #[test]
    fn test_columns_keep_order() {
        let mut columns = IndexMap::new();
        columns.insert("z".to_string(), vec![json!(1), json!(2)]);
        columns.insert("a".to_string(), vec![json!("x")]);
        let raw = read_columns(&columns);

        assert_eq!(raw.names, vec!["z", "a"]);
        assert_eq!(raw.len, 2);
        assert_eq!(raw.present[1], vec![true, false]);
    }
}

//! Row predicates compiled from filter entries

use std::cmp::Ordering;

use ahash::AHashSet;
use gw_core::{FilterOperator, FilterSpec};
use serde_json::Value;

use crate::cell::{Cell, ColumnType};
use crate::DataError;

#[derive(Debug, Clone)]
enum Operand {
    None,
    Cell(Cell),
    Text(String),
    Set(AHashSet<String>),
}

/// A filter bound to a column position with its operand typed
#[derive(Debug, Clone)]
pub struct RowFilter {
    position: usize,
    operator: FilterOperator,
    operand: Operand,
}

impl RowFilter {
    pub fn compile(spec: &FilterSpec, position: usize, column_type: ColumnType) -> Result<Self, DataError> {
        let mismatch = |value: &Value| DataError::TypeMismatch {
            column: spec.column.clone(),
            value: value.to_string(),
            expected: column_type,
        };
        let value = spec.value.as_ref().unwrap_or(&Value::Null);

        let operand = match spec.operator {
            FilterOperator::IsNull | FilterOperator::IsNotNull => Operand::None,
            FilterOperator::BeginsWith | FilterOperator::EndsWith | FilterOperator::Contains => {
                let text = value.as_str().ok_or_else(|| mismatch(value))?;
                Operand::Text(text.to_string())
            }
            FilterOperator::In | FilterOperator::NotIn => {
                let items = value.as_array().ok_or_else(|| mismatch(value))?;
                let keys = items
                    .iter()
                    .map(|item| {
                        Cell::coerce(item, column_type)
                            .map(|cell| cell.key())
                            .ok_or_else(|| mismatch(item))
                    })
                    .collect::<Result<AHashSet<_>, _>>()?;
                Operand::Set(keys)
            }
            _ => Operand::Cell(Cell::coerce(value, column_type).ok_or_else(|| mismatch(value))?),
        };

        Ok(Self {
            position,
            operator: spec.operator,
            operand,
        })
    }

    /// Whether a table row passes this filter
    pub fn matches(&self, row: &[Cell]) -> bool {
        let cell = &row[self.position];
        match (&self.operator, &self.operand) {
            (FilterOperator::IsNull, _) => cell.is_null(),
            (FilterOperator::IsNotNull, _) => !cell.is_null(),
            (_, _) if cell.is_null() => false,
            (FilterOperator::In, Operand::Set(keys)) => keys.contains(&cell.key()),
            (FilterOperator::NotIn, Operand::Set(keys)) => !keys.contains(&cell.key()),
            (FilterOperator::BeginsWith, Operand::Text(text)) => cell.to_string().starts_with(text.as_str()),
            (FilterOperator::EndsWith, Operand::Text(text)) => cell.to_string().ends_with(text.as_str()),
            (FilterOperator::Contains, Operand::Text(text)) => cell.to_string().contains(text.as_str()),
            (operator, Operand::Cell(operand)) => {
                let ordering = cell.compare(operand);
                match operator {
                    FilterOperator::Eq => ordering == Ordering::Equal,
                    FilterOperator::Ne => ordering != Ordering::Equal,
                    FilterOperator::Lt => ordering == Ordering::Less,
                    FilterOperator::Gt => ordering == Ordering::Greater,
                    FilterOperator::Le => ordering != Ordering::Greater,
                    FilterOperator::Ge => ordering != Ordering::Less,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter(entry: Value, column_type: ColumnType) -> Result<RowFilter, DataError> {
        RowFilter::compile(&FilterSpec::from_json(&entry).unwrap(), 0, column_type)
    }

    #[test]
    fn test_comparisons_coerce_the_operand() {
        let gt = filter(json!(["x", ">", "2"]), ColumnType::Integer).unwrap();
        assert!(gt.matches(&[Cell::Integer(3)]));
        assert!(!gt.matches(&[Cell::Integer(2)]));
        assert!(!gt.matches(&[Cell::Null]));

        let eq = filter(json!(["d", "==", "2019-07-11"]), ColumnType::Date).unwrap();
        let date = crate::cell::parse_date("2019-07-11").unwrap();
        assert!(eq.matches(&[Cell::Date(date)]));
    }

    #[test]
    fn test_text_and_set_operators() {
        let contains = filter(json!(["s", "contains", "ell"]), ColumnType::String).unwrap();
        assert!(contains.matches(&[Cell::String("hello".into())]));

        let not_in = filter(json!(["x", "not in", [1, 2]]), ColumnType::Integer).unwrap();
        assert!(not_in.matches(&[Cell::Integer(3)]));
        assert!(!not_in.matches(&[Cell::Integer(1)]));

        let is_null = filter(json!(["x", "is null"]), ColumnType::Integer).unwrap();
        assert!(is_null.matches(&[Cell::Null]));
    }

    #[test]
    fn test_incompatible_operand_is_rejected() {
        assert!(matches!(
            filter(json!(["x", "<", "abc"]), ColumnType::Integer),
            Err(DataError::TypeMismatch { .. })
        ));
    }
}

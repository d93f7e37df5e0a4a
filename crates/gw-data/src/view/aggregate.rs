//! Aggregate functions over groups of cells

use std::cmp::Ordering;

use ahash::AHashMap;
use gw_core::Aggregate;

use crate::cell::{Cell, ColumnType};

/// Aggregate used when a view does not configure one for a column
pub fn default_aggregate(column_type: ColumnType) -> Aggregate {
    if column_type.is_numeric() {
        Aggregate::Sum
    } else {
        Aggregate::Count
    }
}

/// Type of the values an aggregate produces for a column
pub fn output_type(aggregate: Aggregate, column_type: ColumnType) -> ColumnType {
    match aggregate {
        Aggregate::Count | Aggregate::DistinctCount => ColumnType::Integer,
        Aggregate::Avg | Aggregate::Mean | Aggregate::Median => ColumnType::Float,
        Aggregate::Sum | Aggregate::SumAbs if !column_type.is_numeric() => ColumnType::Float,
        _ => column_type,
    }
}

/// Apply an aggregate to the cells of one group, in table order
pub fn aggregate(aggregate: Aggregate, column_type: ColumnType, cells: &[&Cell]) -> Cell {
    let present = || cells.iter().copied().filter(|cell| !cell.is_null());
    let numbers = || present().filter_map(Cell::as_f64);

    match aggregate {
        Aggregate::Count => Cell::Integer(cells.len() as i64),
        Aggregate::DistinctCount => {
            let mut seen = ahash::AHashSet::new();
            Cell::Integer(present().filter(|cell| seen.insert(cell.key())).count() as i64)
        }
        Aggregate::Sum if column_type == ColumnType::Integer => integer_sum(present().filter_map(integer)),
        Aggregate::SumAbs if column_type == ColumnType::Integer => {
            integer_sum(present().filter_map(integer).map(i128::abs))
        }
        Aggregate::Sum => Cell::Float(numbers().sum()),
        Aggregate::SumAbs => Cell::Float(numbers().map(f64::abs).sum()),
        Aggregate::Avg | Aggregate::Mean => {
            let values: Vec<f64> = numbers().collect();
            if values.is_empty() {
                Cell::Null
            } else {
                Cell::Float(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        Aggregate::Median => {
            let mut values: Vec<f64> = numbers().collect();
            if values.is_empty() {
                return Cell::Null;
            }
            values.sort_by(f64::total_cmp);
            let mid = values.len() / 2;
            if values.len() % 2 == 0 {
                Cell::Float((values[mid - 1] + values[mid]) / 2.0)
            } else {
                Cell::Float(values[mid])
            }
        }
        Aggregate::High => present().max_by(|a, b| a.compare(b)).cloned().unwrap_or(Cell::Null),
        Aggregate::Low => present().min_by(|a, b| a.compare(b)).cloned().unwrap_or(Cell::Null),
        Aggregate::FirstByIndex => cells.first().map(|cell| (*cell).clone()).unwrap_or(Cell::Null),
        Aggregate::LastByIndex => cells.last().map(|cell| (*cell).clone()).unwrap_or(Cell::Null),
        Aggregate::Unique => {
            let mut values = present();
            if let Some(first) = values.next() {
                if values.all(|cell| cell.compare(first) == Ordering::Equal) {
                    return first.clone();
                }
            }
            Cell::Null
        }
        Aggregate::Dominant => {
            let mut counts: AHashMap<String, (usize, usize)> = AHashMap::new();
            for (order, cell) in present().enumerate() {
                counts.entry(cell.key()).or_insert((0, order)).0 += 1;
            }
            counts
                .values()
                .max_by(|(count_a, order_a), (count_b, order_b)| {
                    count_a.cmp(count_b).then(order_b.cmp(order_a))
                })
                .and_then(|&(_, order)| present().nth(order))
                .cloned()
                .unwrap_or(Cell::Null)
        }
    }
}

fn integer(cell: &Cell) -> Option<i128> {
    match cell {
        Cell::Integer(value) => Some(i128::from(*value)),
        _ => None,
    }
}

/// Exact integer total; null when it does not fit in an i64
fn integer_sum(values: impl Iterator<Item = i128>) -> Cell {
    let total: i128 = values.sum();
    i64::try_from(total).map(Cell::Integer).unwrap_or(Cell::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[Cell]) -> Vec<&Cell> {
        values.iter().collect()
    }

    #[test]
    fn test_numeric_aggregates() {
        let values = [Cell::Integer(3), Cell::Null, Cell::Integer(-1), Cell::Integer(4)];
        let group = cells(&values);

        assert_eq!(aggregate(Aggregate::Sum, ColumnType::Integer, &group), Cell::Integer(6));
        assert_eq!(aggregate(Aggregate::SumAbs, ColumnType::Integer, &group), Cell::Integer(8));
        assert_eq!(aggregate(Aggregate::Count, ColumnType::Integer, &group), Cell::Integer(4));
        assert_eq!(aggregate(Aggregate::Avg, ColumnType::Integer, &group), Cell::Float(2.0));
        assert_eq!(aggregate(Aggregate::Median, ColumnType::Integer, &group), Cell::Float(3.0));
        assert_eq!(aggregate(Aggregate::High, ColumnType::Integer, &group), Cell::Integer(4));
        assert_eq!(aggregate(Aggregate::Low, ColumnType::Integer, &group), Cell::Integer(-1));
        assert_eq!(aggregate(Aggregate::FirstByIndex, ColumnType::Integer, &group), Cell::Integer(3));
    }

    #[test]
    fn test_integer_sums_are_exact() {
        let large = (1_i64 << 53) + 1;
        let values = [Cell::Integer(large), Cell::Integer(1)];
        assert_eq!(
            aggregate(Aggregate::Sum, ColumnType::Integer, &cells(&values)),
            Cell::Integer(large + 1)
        );

        let overflowing = [Cell::Integer(i64::MAX), Cell::Integer(1)];
        assert_eq!(aggregate(Aggregate::Sum, ColumnType::Integer, &cells(&overflowing)), Cell::Null);

        let wide = [Cell::Integer(i64::MAX), Cell::Integer(-1)];
        assert_eq!(
            aggregate(Aggregate::Sum, ColumnType::Integer, &cells(&wide)),
            Cell::Integer(i64::MAX - 1)
        );
    }

    #[test]
    fn test_categorical_aggregates() {
        let values = [
            Cell::String("a".into()),
            Cell::String("b".into()),
            Cell::String("b".into()),
            Cell::Null,
        ];
        let group = cells(&values);

        assert_eq!(aggregate(Aggregate::DistinctCount, ColumnType::String, &group), Cell::Integer(2));
        assert_eq!(aggregate(Aggregate::Dominant, ColumnType::String, &group), Cell::String("b".into()));
        assert_eq!(aggregate(Aggregate::Unique, ColumnType::String, &group), Cell::Null);
        assert_eq!(aggregate(Aggregate::LastByIndex, ColumnType::String, &group), Cell::Null);
    }

    #[test]
    fn test_empty_groups() {
        assert_eq!(aggregate(Aggregate::Avg, ColumnType::Float, &[]), Cell::Null);
        assert_eq!(aggregate(Aggregate::Sum, ColumnType::Float, &[]), Cell::Float(0.0));
        assert_eq!(aggregate(Aggregate::Unique, ColumnType::Float, &[]), Cell::Null);
    }

    #[test]
    fn test_output_types() {
        assert_eq!(output_type(Aggregate::Count, ColumnType::String), ColumnType::Integer);
        assert_eq!(output_type(Aggregate::Avg, ColumnType::Integer), ColumnType::Float);
        assert_eq!(output_type(Aggregate::High, ColumnType::Date), ColumnType::Date);
        assert_eq!(default_aggregate(ColumnType::Float), Aggregate::Sum);
        assert_eq!(default_aggregate(ColumnType::Datetime), Aggregate::Count);
    }
}

//! Query views over hosted tables
//!
//! A view is a filtered, sorted and optionally pivoted projection of a
//! table. Nothing is materialized up front: every read recomputes from the
//! current table contents, so a view follows the table's updates.

pub mod aggregate;
pub mod filter;

use std::cmp::Ordering;

use gw_core::{Aggregate, FilterSpec, SortDirection, SortSpec};
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::cell::{Cell, ColumnType};
use crate::schema::ColumnSchema;
use crate::table::TableRef;
use crate::DataError;

use aggregate::{aggregate, default_aggregate, output_type};
use filter::RowFilter;

/// Key carrying the group path of pivoted rows
pub const ROW_PATH: &str = "__ROW_PATH__";

/// Separator between column-pivot values and the column name
pub const COLUMN_SEPARATOR: &str = "|";

/// Query parameters of a view
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Projected columns; empty means every table column
    pub columns: Vec<String>,
    pub row_pivots: Vec<String>,
    pub column_pivots: Vec<String>,
    pub aggregates: IndexMap<String, Aggregate>,
    pub sort: Vec<SortSpec>,
    #[serde(alias = "filters")]
    pub filter: Vec<FilterSpec>,
}

impl ViewConfig {
    pub fn is_pivoted(&self) -> bool {
        !self.row_pivots.is_empty() || !self.column_pivots.is_empty()
    }
}

/// One output row of a view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    /// Group path, present when the view has row pivots
    pub row_path: Option<Vec<Cell>>,
    pub values: IndexMap<String, Cell>,
}

impl Serialize for ViewRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.values.len() + usize::from(self.row_path.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(path) = &self.row_path {
            map.serialize_entry(ROW_PATH, path)?;
        }
        for (name, cell) in &self.values {
            map.serialize_entry(name, cell)?;
        }
        map.end()
    }
}

/// Column-oriented view output
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewColumns {
    pub row_path: Option<Vec<Vec<Cell>>>,
    pub columns: IndexMap<String, Vec<Cell>>,
}

impl Serialize for ViewColumns {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.columns.len() + usize::from(self.row_path.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(paths) = &self.row_path {
            map.serialize_entry(ROW_PATH, paths)?;
        }
        for (name, cells) in &self.columns {
            map.serialize_entry(name, cells)?;
        }
        map.end()
    }
}

/// A row-pivot group and its subgroups
#[derive(Debug)]
struct Group {
    path: Vec<Cell>,
    rows: Vec<usize>,
    children: Vec<Group>,
}

/// Computed contents of a view
struct Output {
    columns: Vec<String>,
    rows: Vec<ViewRow>,
}

/// A query over a hosted table
#[derive(Debug, Clone)]
pub struct View {
    table: TableRef,
    config: ViewConfig,
    filters: Vec<RowFilter>,
}

impl View {
    /// Bind a configuration to a table; every named column must exist
    pub fn new(table: TableRef, mut config: ViewConfig) -> Result<Self, DataError> {
        let schema = table.schema();
        if config.columns.is_empty() {
            config.columns = schema.keys().cloned().collect();
        }

        let named = config
            .columns
            .iter()
            .chain(&config.row_pivots)
            .chain(&config.column_pivots)
            .chain(config.aggregates.keys())
            .chain(config.sort.iter().map(|spec| &spec.column))
            .chain(config.filter.iter().map(|spec| &spec.column));
        for column in named {
            if !schema.contains_key(column) {
                return Err(DataError::UnknownColumn(column.clone()));
            }
        }

        let filters = config
            .filter
            .iter()
            .map(|spec| {
                let (position, _, &column_type) = schema
                    .get_full(&spec.column)
                    .ok_or_else(|| DataError::UnknownColumn(spec.column.clone()))?;
                RowFilter::compile(spec, position, column_type)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            table,
            config,
            filters,
        })
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Configuration with defaults resolved
    pub fn get_config(&self) -> &ViewConfig {
        &self.config
    }

    /// Rows `start_row..end_row` (clamped) as objects keyed by column
    pub fn to_json(&self, start_row: Option<usize>, end_row: Option<usize>) -> Vec<ViewRow> {
        let rows = self.compute().rows;
        let end = end_row.unwrap_or(rows.len()).min(rows.len());
        let start = start_row.unwrap_or(0).min(end);
        rows.into_iter().skip(start).take(end - start).collect()
    }

    /// Rows `start_row..end_row` (clamped) as arrays keyed by column
    pub fn to_columns(&self, start_row: Option<usize>, end_row: Option<usize>) -> ViewColumns {
        let columns = self.compute().columns;
        let rows = self.to_json(start_row, end_row);
        let row_path = (!self.config.row_pivots.is_empty())
            .then(|| rows.iter().map(|row| row.row_path.clone().unwrap_or_default()).collect());
        let columns = columns
            .into_iter()
            .map(|name| {
                let cells = rows
                    .iter()
                    .map(|row| row.values.get(&name).cloned().unwrap_or(Cell::Null))
                    .collect();
                (name, cells)
            })
            .collect();
        ViewColumns { row_path, columns }
    }

    pub fn num_rows(&self) -> usize {
        self.compute().rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.compute().columns.len()
    }

    /// Types of the projected columns; aggregated when the view is pivoted
    pub fn schema(&self) -> ColumnSchema {
        let table_schema = self.table.schema();
        self.config
            .columns
            .iter()
            .filter_map(|column| {
                let column_type = *table_schema.get(column)?;
                let column_type = if self.config.is_pivoted() {
                    output_type(self.aggregate_for(column, column_type), column_type)
                } else {
                    column_type
                };
                Some((column.clone(), column_type))
            })
            .collect()
    }

    fn aggregate_for(&self, column: &str, column_type: ColumnType) -> Aggregate {
        self.config
            .aggregates
            .get(column)
            .copied()
            .unwrap_or_else(|| default_aggregate(column_type))
    }

    fn compute(&self) -> Output {
        self.table.with_table(|table| {
            let schema = table.schema();
            let rows: Vec<Vec<Cell>> = table
                .rows()
                .into_iter()
                .filter(|row| self.filters.iter().all(|f| f.matches(row)))
                .collect();
            let context = Context {
                schema,
                rows: &rows,
                config: &self.config,
            };
            if self.config.is_pivoted() {
                context.pivot(|column, column_type| self.aggregate_for(column, column_type))
            } else {
                context.flat()
            }
        })
    }
}

struct Context<'a> {
    schema: &'a ColumnSchema,
    rows: &'a [Vec<Cell>],
    config: &'a ViewConfig,
}

impl<'a> Context<'a> {
    fn position(&self, column: &str) -> usize {
        self.schema.get_index_of(column).unwrap_or_default()
    }

    /// Row-direction sorts as (position, descending, absolute)
    fn row_sorts(&self) -> Vec<(usize, bool, bool)> {
        self.config
            .sort
            .iter()
            .filter(|spec| spec.direction != SortDirection::None && !spec.direction.is_column_sort())
            .map(|spec| (self.position(&spec.column), spec.direction.is_descending(), spec.direction.is_absolute()))
            .collect()
    }

    fn sorted_rows(&self) -> Vec<usize> {
        let sorts = self.row_sorts();
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by(|&a, &b| {
            sorts
                .iter()
                .map(|&(position, descending, absolute)| {
                    directed(sort_compare(&self.rows[a][position], &self.rows[b][position], absolute), descending)
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        order
    }

    fn flat(&self) -> Output {
        let positions: Vec<(String, usize)> = self
            .config
            .columns
            .iter()
            .map(|column| (column.clone(), self.position(column)))
            .collect();
        let rows = self
            .sorted_rows()
            .into_iter()
            .map(|row| ViewRow {
                row_path: None,
                values: positions
                    .iter()
                    .map(|(name, position)| (name.clone(), self.rows[row][*position].clone()))
                    .collect(),
            })
            .collect();
        Output {
            columns: self.config.columns.clone(),
            rows,
        }
    }

    fn pivot(&self, aggregate_for: impl Fn(&str, ColumnType) -> Aggregate) -> Output {
        let combos = self.column_combos();
        let value_columns: Vec<(String, usize, ColumnType, Aggregate)> = self
            .config
            .columns
            .iter()
            .map(|column| {
                let position = self.position(column);
                let column_type = self.schema[position];
                (column.clone(), position, column_type, aggregate_for(column, column_type))
            })
            .collect();

        let mut columns = Vec::new();
        for combo in &combos {
            for (column, ..) in &value_columns {
                columns.push(pivot_column_name(combo, column));
            }
        }

        let combo_positions: Vec<usize> = self.config.column_pivots.iter().map(|c| self.position(c)).collect();
        let combo_of = |row: usize| -> Vec<Cell> {
            combo_positions.iter().map(|&p| self.rows[row][p].clone()).collect()
        };

        let row_values = |rows: &[usize], aggregated: bool| -> IndexMap<String, Cell> {
            let mut values = IndexMap::new();
            for combo in &combos {
                let members: Vec<usize> = rows.iter().copied().filter(|&r| combo_of(r) == *combo).collect();
                for (column, position, column_type, aggregate_fn) in &value_columns {
                    let cells: Vec<&Cell> = members.iter().map(|&r| &self.rows[r][*position]).collect();
                    let cell = if !aggregated {
                        cells.first().map(|cell| (*cell).clone()).unwrap_or(Cell::Null)
                    } else if cells.is_empty() {
                        Cell::Null
                    } else {
                        aggregate(*aggregate_fn, *column_type, &cells)
                    };
                    values.insert(pivot_column_name(combo, column), cell);
                }
            }
            values
        };

        let rows = if self.config.row_pivots.is_empty() {
            // Column pivots alone split rows without grouping them
            self.sorted_rows()
                .into_iter()
                .map(|row| ViewRow {
                    row_path: None,
                    values: row_values(&[row], false),
                })
                .collect()
        } else {
            let root = self.group(Vec::new(), (0..self.rows.len()).collect(), 0, &value_columns);
            let mut flattened = Vec::new();
            flatten(&root, &mut |group: &Group| {
                flattened.push(ViewRow {
                    row_path: Some(group.path.clone()),
                    values: row_values(&group.rows, true),
                });
            });
            flattened
        };

        Output { columns, rows }
    }

    /// Distinct column-pivot value combinations, ordered per level
    fn column_combos(&self) -> Vec<Vec<Cell>> {
        if self.config.column_pivots.is_empty() {
            return vec![Vec::new()];
        }
        let levels: Vec<(usize, bool)> = self
            .config
            .column_pivots
            .iter()
            .map(|column| {
                let descending = self
                    .config
                    .sort
                    .iter()
                    .find(|spec| spec.column == *column && spec.direction.is_column_sort())
                    .map(|spec| spec.direction.is_descending())
                    .unwrap_or(false);
                (self.position(column), descending)
            })
            .collect();

        let mut seen = IndexMap::new();
        for row in self.rows {
            let combo: Vec<Cell> = levels.iter().map(|&(p, _)| row[p].clone()).collect();
            let key: Vec<String> = combo.iter().map(Cell::key).collect();
            seen.entry(key).or_insert(combo);
        }
        let mut combos: Vec<Vec<Cell>> = seen.into_values().collect();
        combos.sort_by(|a, b| {
            a.iter()
                .zip(b)
                .zip(&levels)
                .map(|((x, y), &(_, descending))| directed(x.compare(y), descending))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        combos
    }

    fn group(
        &self,
        path: Vec<Cell>,
        rows: Vec<usize>,
        depth: usize,
        value_columns: &[(String, usize, ColumnType, Aggregate)],
    ) -> Group {
        let Some(pivot) = self.config.row_pivots.get(depth) else {
            return Group {
                path,
                rows,
                children: Vec::new(),
            };
        };
        let position = self.position(pivot);

        let mut buckets: IndexMap<String, (Cell, Vec<usize>)> = IndexMap::new();
        for &row in &rows {
            let cell = &self.rows[row][position];
            buckets.entry(cell.key()).or_insert_with(|| (cell.clone(), Vec::new())).1.push(row);
        }

        let mut children: Vec<Group> = buckets
            .into_values()
            .map(|(cell, members)| {
                let mut child_path = path.clone();
                child_path.push(cell);
                self.group(child_path, members, depth + 1, value_columns)
            })
            .collect();
        self.sort_siblings(&mut children, depth, value_columns);

        Group { path, rows, children }
    }

    /// Order sibling groups by their pivot value, then by any row sort on
    /// the aggregated value of the sorted column
    fn sort_siblings(
        &self,
        children: &mut [Group],
        depth: usize,
        value_columns: &[(String, usize, ColumnType, Aggregate)],
    ) {
        children.sort_by(|a, b| a.path[depth].compare(&b.path[depth]));

        let sorts: Vec<(SortSpec, ColumnType, Aggregate)> = self
            .config
            .sort
            .iter()
            .filter(|spec| spec.direction != SortDirection::None && !spec.direction.is_column_sort())
            .map(|spec| {
                let position = self.position(&spec.column);
                let column_type = self.schema[position];
                let aggregate_fn = value_columns
                    .iter()
                    .find(|(column, ..)| *column == spec.column)
                    .map(|(.., aggregate_fn)| *aggregate_fn)
                    .unwrap_or_else(|| default_aggregate(column_type));
                (spec.clone(), column_type, aggregate_fn)
            })
            .collect();
        if sorts.is_empty() {
            return;
        }

        let totals = |group: &Group| -> Vec<Cell> {
            sorts
                .iter()
                .map(|(spec, column_type, aggregate_fn)| {
                    if self.config.row_pivots.get(depth) == Some(&spec.column) {
                        return group.path[depth].clone();
                    }
                    let position = self.position(&spec.column);
                    let cells: Vec<&Cell> = group.rows.iter().map(|&r| &self.rows[r][position]).collect();
                    aggregate(*aggregate_fn, *column_type, &cells)
                })
                .collect()
        };
        let keyed: Vec<Vec<Cell>> = children.iter().map(totals).collect();
        let mut order: Vec<usize> = (0..children.len()).collect();
        order.sort_by(|&a, &b| {
            sorts
                .iter()
                .enumerate()
                .map(|(i, (spec, ..))| {
                    directed(
                        sort_compare(&keyed[a][i], &keyed[b][i], spec.direction.is_absolute()),
                        spec.direction.is_descending(),
                    )
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        apply_order(children, &order);
    }
}

fn flatten(group: &Group, visit: &mut impl FnMut(&Group)) {
    visit(group);
    for child in &group.children {
        flatten(child, visit);
    }
}

fn apply_order(children: &mut [Group], order: &[usize]) {
    let mut taken: Vec<Option<Group>> = children
        .iter_mut()
        .map(|group| {
            Some(Group {
                path: std::mem::take(&mut group.path),
                rows: std::mem::take(&mut group.rows),
                children: std::mem::take(&mut group.children),
            })
        })
        .collect();
    for (slot, &from) in children.iter_mut().zip(order) {
        if let Some(group) = taken[from].take() {
            *slot = group;
        }
    }
}

fn pivot_column_name(combo: &[Cell], column: &str) -> String {
    combo
        .iter()
        .map(Cell::to_string)
        .chain(std::iter::once(column.to_string()))
        .collect::<Vec<_>>()
        .join(COLUMN_SEPARATOR)
}

fn sort_compare(a: &Cell, b: &Cell, absolute: bool) -> Ordering {
    match (absolute, a.as_f64(), b.as_f64()) {
        (true, Some(x), Some(y)) => x.abs().total_cmp(&y.abs()),
        _ => a.compare(b),
    }
}

fn directed(ordering: Ordering, descending: bool) -> Ordering {
    if descending {
        ordering.reverse()
    } else {
        ordering
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableOptions;
    use crate::table::TableData;
    use serde_json::{json, Value};

    fn sales() -> TableRef {
        let data = json!([
            {"region": "east", "product": "a", "units": 3, "price": 1.5},
            {"region": "west", "product": "b", "units": 5, "price": 2.0},
            {"region": "east", "product": "b", "units": 4, "price": 2.5},
            {"region": "west", "product": "a", "units": 1, "price": 1.0},
        ]);
        TableRef::from_data(TableData::from_json(&data).unwrap(), TableOptions::default()).unwrap()
    }

    fn config(value: Value) -> ViewConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_default_columns_and_flat_rows() {
        let view = View::new(sales(), ViewConfig::default()).unwrap();

        assert_eq!(view.get_config().columns, vec!["region", "product", "units", "price"]);
        assert_eq!(view.num_rows(), 4);
        assert_eq!(view.num_columns(), 4);
        let rows = serde_json::to_value(view.to_json(Some(1), Some(2))).unwrap();
        assert_eq!(rows, json!([{"region": "west", "product": "b", "units": 5, "price": 2.0}]));
    }

    #[test]
    fn test_filter_sort_and_project() {
        let view = View::new(
            sales(),
            config(json!({
                "columns": ["product", "units"],
                "filter": [["units", ">", 1]],
                "sort": [["units", "desc"]],
            })),
        )
        .unwrap();

        let units = view.to_columns(None, None).columns["units"].clone();
        assert_eq!(units, vec![Cell::Integer(5), Cell::Integer(4), Cell::Integer(3)]);
        assert_eq!(view.schema().keys().collect::<Vec<_>>(), vec!["product", "units"]);
    }

    #[test]
    fn test_row_pivots_are_depth_first_with_total() {
        let view = View::new(
            sales(),
            config(json!({"columns": ["units"], "row_pivots": ["region", "product"]})),
        )
        .unwrap();

        let rows = serde_json::to_value(view.to_json(None, None)).unwrap();
        assert_eq!(
            rows,
            json!([
                {"__ROW_PATH__": [], "units": 13},
                {"__ROW_PATH__": ["east"], "units": 7},
                {"__ROW_PATH__": ["east", "a"], "units": 3},
                {"__ROW_PATH__": ["east", "b"], "units": 4},
                {"__ROW_PATH__": ["west"], "units": 6},
                {"__ROW_PATH__": ["west", "a"], "units": 1},
                {"__ROW_PATH__": ["west", "b"], "units": 5},
            ])
        );
    }

    #[test]
    fn test_row_sort_orders_siblings_by_aggregate() {
        let view = View::new(
            sales(),
            config(json!({
                "columns": ["units"],
                "row_pivots": ["product"],
                "sort": [["units", "desc"]],
            })),
        )
        .unwrap();

        let paths: Vec<Vec<Cell>> = view.to_json(None, None).into_iter().filter_map(|r| r.row_path).collect();
        assert_eq!(paths[1], vec![Cell::String("b".into())]);
        assert_eq!(paths[2], vec![Cell::String("a".into())]);
    }

    #[test]
    fn test_column_pivots_split_value_columns() {
        let view = View::new(
            sales(),
            config(json!({
                "columns": ["units", "price"],
                "row_pivots": ["region"],
                "column_pivots": ["product"],
                "aggregates": {"price": "avg"},
                "sort": [["product", "col desc"]],
            })),
        )
        .unwrap();

        let columns = view.to_columns(None, None);
        let names: Vec<&String> = columns.columns.keys().collect();
        assert_eq!(names, vec!["b|units", "b|price", "a|units", "a|price"]);
        assert_eq!(columns.columns["a|units"], vec![Cell::Integer(4), Cell::Integer(3), Cell::Integer(1)]);
        assert_eq!(columns.columns["b|price"][0], Cell::Float(2.25));
        assert_eq!(view.schema()["price"], ColumnType::Float);
        assert_eq!(columns.row_path.unwrap().len(), 3);
    }

    #[test]
    fn test_views_follow_table_updates() {
        let table = sales();
        let view = View::new(table.clone(), ViewConfig::default()).unwrap();
        table
            .update(TableData::from_json(&json!([{"region": "north", "units": 9}])).unwrap())
            .unwrap();
        assert_eq!(view.num_rows(), 5);
    }

    #[test]
    fn test_unknown_columns_are_rejected() {
        let result = View::new(sales(), config(json!({"row_pivots": ["nope"]})));
        assert!(matches!(result, Err(DataError::UnknownColumn(_))));
    }
}

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::config::{
    self, Aggregate, FilterSpec, Plugin, SortSpec, ValidationError, ViewerConfig,
};
use crate::events::events::StateChanged;
use crate::events::EventBus;

/// The viewer configuration held on the kernel side of a widget.
///
/// Setters validate before storing. Every accepted value is published as a
/// [`StateChanged`] event so the host can push it to the front end.
pub struct ViewerState {
    config: ViewerConfig,
    event_bus: Arc<EventBus>,
}

impl ViewerState {
    /// Create a state holder with the default configuration
    pub fn new() -> Self {
        Self {
            config: ViewerConfig::default(),
            event_bus: Arc::new(EventBus::new()),
        }
    }

    /// The bus on which field changes are published
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn plugin(&self) -> Plugin {
        self.config.plugin
    }

    pub fn columns(&self) -> &[String] {
        &self.config.columns
    }

    pub fn row_pivots(&self) -> &[String] {
        &self.config.row_pivots
    }

    pub fn column_pivots(&self) -> &[String] {
        &self.config.column_pivots
    }

    pub fn aggregates(&self) -> &IndexMap<String, Aggregate> {
        &self.config.aggregates
    }

    pub fn sort(&self) -> &[SortSpec] {
        &self.config.sort
    }

    pub fn filters(&self) -> &[FilterSpec] {
        &self.config.filters
    }

    pub fn plugin_config(&self) -> &Map<String, Value> {
        &self.config.plugin_config
    }

    pub fn dark(&self) -> bool {
        self.config.dark
    }

    pub fn set_plugin(&mut self, plugin: Plugin) {
        self.config.plugin = plugin;
        self.publish("plugin", &self.config.plugin);
    }

    /// Set the plugin by name, rejecting names outside the plugin vocabulary.
    pub fn set_plugin_name(&mut self, name: &str) -> Result<(), ValidationError> {
        let plugin = name.parse()?;
        self.set_plugin(plugin);
        Ok(())
    }

    /// Any string is a valid column name, including the empty one
    pub fn set_columns(&mut self, columns: Vec<String>) {
        self.config.columns = columns;
        self.publish("columns", &self.config.columns);
    }

    pub fn set_row_pivots(&mut self, pivots: Vec<String>) {
        self.config.row_pivots = pivots;
        self.publish("row_pivots", &self.config.row_pivots);
    }

    pub fn set_column_pivots(&mut self, pivots: Vec<String>) {
        self.config.column_pivots = pivots;
        self.publish("column_pivots", &self.config.column_pivots);
    }

    pub fn set_aggregates(&mut self, aggregates: IndexMap<String, Aggregate>) {
        self.config.aggregates = aggregates;
        self.publish("aggregates", &self.config.aggregates);
    }

    pub fn set_sort(&mut self, sort: Vec<SortSpec>) {
        self.config.sort = sort;
        self.publish("sort", &self.config.sort);
    }

    pub fn set_filters(&mut self, filters: Vec<FilterSpec>) -> Result<(), ValidationError> {
        validate_filters(&filters)?;
        self.config.filters = filters;
        self.publish("filters", &self.config.filters);
        Ok(())
    }

    pub fn set_plugin_config(&mut self, plugin_config: Map<String, Value>) {
        self.config.plugin_config = plugin_config;
        self.publish("plugin_config", &self.config.plugin_config);
    }

    pub fn set_dark(&mut self, dark: bool) {
        self.config.dark = dark;
        self.publish("dark", &self.config.dark);
    }

    /// Assign a field from its host-side JSON representation.
    pub fn set_field(&mut self, field: &str, value: &Value) -> Result<(), ValidationError> {
        match field {
            "plugin" => self.set_plugin(config::parse_plugin(value)?),
            "columns" => self.set_columns(config::parse_column_list("columns", value)?),
            "row_pivots" => self.set_row_pivots(config::parse_column_list("row_pivots", value)?),
            "column_pivots" => self.set_column_pivots(config::parse_column_list("column_pivots", value)?),
            "aggregates" => self.set_aggregates(config::parse_aggregates(value)?),
            "sort" => self.set_sort(config::parse_sort(value)?),
            "filters" => self.set_filters(config::parse_filters(value)?)?,
            "plugin_config" => self.set_plugin_config(config::parse_plugin_config(value)?),
            "dark" => self.set_dark(config::parse_dark(value)?),
            other => {
                return Err(ValidationError::new(
                    "field",
                    other,
                    format!("unknown field, expected one of: {}", config::FIELDS.join(", ")),
                ))
            }
        }
        Ok(())
    }

    /// Drop the view configuration that depends on the old column set.
    pub fn reset_view_config(&mut self, columns: Vec<String>, reason: impl Into<String>) {
        let reason: String = reason.into();
        info!("{reason} - resetting widget state");
        self.set_columns(columns);
        self.set_row_pivots(Vec::new());
        self.set_column_pivots(Vec::new());
        self.set_aggregates(IndexMap::new());
        self.set_sort(Vec::new());
        self.config.filters.clear();
        self.publish("filters", &self.config.filters);
    }

    fn publish<T: Serialize + ?Sized>(&self, field: &'static str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                error!(field, "Failed to encode state change: {}", e);
                return;
            }
        };
        debug!(field, %value, "state changed");
        self.event_bus.publish(StateChanged { field, value });
    }
}

impl Default for ViewerState {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_filters(filters: &[FilterSpec]) -> Result<(), ValidationError> {
    for filter in filters {
        if filter.operator.takes_value() && filter.value.is_none() {
            let shown = serde_json::to_string(filter).unwrap_or_default();
            return Err(ValidationError::new("filters", shown, "incomplete filter entry"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilterOperator, SortDirection};
    use crate::events::handler_from_fn;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorded(state: &ViewerState) -> Arc<Mutex<Vec<(String, Value)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        state.event_bus().subscribe::<StateChanged>(handler_from_fn(move |event| {
            if let Some(changed) = event.as_any().downcast_ref::<StateChanged>() {
                sink.lock().push((changed.field.to_string(), changed.value.clone()));
            }
        }));
        seen
    }

    #[test]
    fn test_accepted_values_are_published() {
        let mut state = ViewerState::new();
        let seen = recorded(&state);

        state.set_plugin_name("y_line").unwrap();
        state.set_sort(vec![SortSpec::new("a", SortDirection::Desc)]);

        assert_eq!(state.plugin(), Plugin::YLine);
        assert_eq!(
            *seen.lock(),
            vec![
                ("plugin".to_string(), json!("y_line")),
                ("sort".to_string(), json!([["a", "desc"]])),
            ]
        );
    }

    #[test]
    fn test_rejected_values_leave_state_untouched() {
        let mut state = ViewerState::new();
        let seen = recorded(&state);

        let err = state.set_field("plugin", &json!("spreadsheet")).unwrap_err();
        assert_eq!(err.field, "plugin");
        assert_eq!(state.plugin(), Plugin::Hypergrid);

        let err = state.set_field("sort", &json!([["a", "upwards"]])).unwrap_err();
        assert_eq!(err.field, "sort");
        assert!(state.sort().is_empty());

        assert!(state.set_field("dark", &json!("yes")).is_err());
        assert!(state.set_field("colour", &json!(1)).is_err());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_set_field_covers_every_field() {
        let mut state = ViewerState::new();
        state.set_field("plugin", &json!("heatmap")).unwrap();
        state.set_field("columns", &json!(["a", "b"])).unwrap();
        state.set_field("row_pivots", &json!(["a"])).unwrap();
        state.set_field("column_pivots", &json!(["b"])).unwrap();
        state.set_field("aggregates", &json!({"b": "count"})).unwrap();
        state.set_field("sort", &json!([["b", "asc"]])).unwrap();
        state.set_field("filters", &json!([["a", ">", 1]])).unwrap();
        state.set_field("plugin_config", &json!({"zoom": 2})).unwrap();
        state.set_field("dark", &json!(true)).unwrap();

        assert_eq!(state.plugin(), Plugin::Heatmap);
        assert_eq!(state.columns(), ["a", "b"]);
        assert_eq!(state.aggregates()["b"], Aggregate::Count);
        assert_eq!(state.filters()[0].operator, FilterOperator::Gt);
        assert_eq!(state.plugin_config()["zoom"], json!(2));
        assert!(state.dark());
    }

    #[test]
    fn test_reset_view_config() {
        let mut state = ViewerState::new();
        let seen = recorded(&state);
        state.set_row_pivots(vec!["a".to_string()]);
        state.set_sort(vec![SortSpec::new("a", SortDirection::Asc)]);
        state.set_dark(true);

        state.reset_view_config(vec!["x".to_string(), "y".to_string()], "columns changed");

        assert_eq!(state.columns(), ["x", "y"]);
        assert!(state.row_pivots().is_empty());
        assert!(state.sort().is_empty());
        assert!(state.filters().is_empty());
        assert!(state.dark());

        let fields: Vec<String> = seen.lock().iter().map(|(field, _)| field.clone()).collect();
        assert!(fields.ends_with(&[
            "columns".to_string(),
            "row_pivots".to_string(),
            "column_pivots".to_string(),
            "aggregates".to_string(),
            "sort".to_string(),
            "filters".to_string(),
        ]));
    }

    #[test]
    fn test_unnamed_columns_are_accepted() {
        let mut state = ViewerState::new();
        state.set_field("columns", &json!(["", "a"])).unwrap();
        state.set_field("row_pivots", &json!([""])).unwrap();
        assert_eq!(state.columns(), ["", "a"]);

        state.reset_view_config(vec![String::new()], "columns changed");
        assert_eq!(state.columns(), [""]);
        assert!(state.row_pivots().is_empty());
    }

    #[test]
    fn test_filters_need_an_operand() {
        let mut state = ViewerState::new();
        let err = state
            .set_filters(vec![FilterSpec::new("a", FilterOperator::Gt, None)])
            .unwrap_err();
        assert_eq!(err.field, "filters");
        assert!(state.filters().is_empty());
    }
}

//! Kernel-side half of the grid widget

use std::sync::Arc;

use gw_core::config::FIELDS;
use gw_core::events::events::StateChanged;
use gw_core::{handler_from_fn, SyncManager, ValidationError, ViewerState};
use gw_data::{DataError, EngineResponse, ReplyFn, TableData, TableManager, TableOptions, TableRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::comm::Comm;
use crate::envelope::{InboundMessage, OutboundMessage};
use crate::registration::Registration;

/// Errors surfaced by widget operations
#[derive(Error, Debug)]
pub enum WidgetError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Engine(#[from] DataError),

    #[error("No table has been loaded into the widget")]
    NoTable,
}

/// Viewer configuration a widget is created with.
///
/// Fields hold their host-side JSON form; null leaves the default in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WidgetOptions {
    pub plugin: Value,
    pub columns: Value,
    pub row_pivots: Value,
    pub column_pivots: Value,
    pub aggregates: Value,
    pub sort: Value,
    pub filters: Value,
    pub plugin_config: Value,
    pub dark: Value,
}

impl WidgetOptions {
    /// Read options from a JSON object; unknown keys are rejected
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        WidgetOptions::deserialize(value).map_err(|e| ValidationError::new("options", value.to_string(), e.to_string()))
    }

    fn fields(&self) -> [(&'static str, &Value); 9] {
        [
            ("plugin", &self.plugin),
            ("columns", &self.columns),
            ("row_pivots", &self.row_pivots),
            ("column_pivots", &self.column_pivots),
            ("aggregates", &self.aggregates),
            ("sort", &self.sort),
            ("filters", &self.filters),
            ("plugin_config", &self.plugin_config),
            ("dark", &self.dark),
        ]
    }

    /// Validate every set field into a state holder
    pub fn build_state(&self) -> Result<ViewerState, ValidationError> {
        let mut state = ViewerState::new();
        for (field, value) in self.fields() {
            if !value.is_null() {
                state.set_field(field, value)?;
            }
        }
        Ok(state)
    }
}

/// What `load` binds the widget to
pub enum TableSource {
    /// An existing table; its own options apply
    Table(TableRef),
    /// Data to build a new table from
    Data(TableData),
}

impl From<TableRef> for TableSource {
    fn from(table: TableRef) -> Self {
        TableSource::Table(table)
    }
}

impl From<TableData> for TableSource {
    fn from(data: TableData) -> Self {
        TableSource::Data(data)
    }
}

/// The table a widget displays and the name it is hosted under
#[derive(Debug, Clone)]
pub struct TableBinding {
    pub name: String,
    pub table: TableRef,
}

/// A notebook widget relaying between a front-end viewer and the table engine
pub struct Widget {
    state: ViewerState,
    sync: Arc<SyncManager>,
    comm: Arc<dyn Comm>,
    manager: TableManager,
    binding: Option<TableBinding>,
}

impl Widget {
    /// Create a widget backed by the process-wide table manager
    pub fn new(options: WidgetOptions, comm: Arc<dyn Comm>) -> Result<Self, WidgetError> {
        Self::with_manager(options, comm, TableManager::global())
    }

    pub fn with_manager(options: WidgetOptions, comm: Arc<dyn Comm>, manager: TableManager) -> Result<Self, WidgetError> {
        let state = options.build_state()?;

        let sync = Arc::new(SyncManager::new());
        sync.attach(state.event_bus());
        let sink = comm.clone();
        state.event_bus().subscribe::<StateChanged>(handler_from_fn(move |event| {
            if let Some(changed) = event.as_any().downcast_ref::<StateChanged>() {
                sink.sync_state(changed.field, &changed.value);
            }
        }));

        let widget = Self {
            state,
            sync,
            comm,
            manager,
            binding: None,
        };
        widget.sync_all();
        Ok(widget)
    }

    /// Push registration and every configuration field to the front end
    fn sync_all(&self) {
        for (field, value) in Registration::default().fields() {
            self.comm.sync_state(&field, &value);
        }
        let config = match serde_json::to_value(self.state.config()) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to encode viewer configuration: {}", e);
                return;
            }
        };
        for field in FIELDS {
            let value = config.get(*field).cloned().unwrap_or(Value::Null);
            self.sync.record(field, value.clone());
            self.comm.sync_state(field, &value);
        }
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    /// Mutable state; accepted changes are synchronized to the front end
    pub fn state_mut(&mut self) -> &mut ViewerState {
        &mut self.state
    }

    /// Assign a configuration field from its JSON form
    pub fn set_field(&mut self, field: &str, value: &Value) -> Result<(), WidgetError> {
        Ok(self.state.set_field(field, value)?)
    }

    /// Full synchronized state: registration plus configuration
    pub fn synced_state(&self) -> Map<String, Value> {
        let mut state = Registration::default().fields();
        state.extend(self.sync.snapshot());
        state
    }

    pub fn manager(&self) -> &TableManager {
        &self.manager
    }

    /// The bound table, if `load` has been called
    pub fn table(&self) -> Option<TableRef> {
        self.binding.as_ref().map(|binding| binding.table.clone())
    }

    pub fn table_name(&self) -> Option<&str> {
        self.binding.as_ref().map(|binding| binding.name.as_str())
    }

    /// Bind the widget to a table and announce it to the front end.
    ///
    /// `options` only apply when a new table is built from data. When the
    /// new table's column set differs from the previous one, the view
    /// configuration is reset. Returns the name the table is hosted under.
    pub fn load(&mut self, source: impl Into<TableSource>, options: TableOptions) -> Result<String, WidgetError> {
        let table = match source.into() {
            TableSource::Table(table) => {
                if options != TableOptions::default() {
                    debug!("Ignoring table options for an existing table");
                }
                table
            }
            TableSource::Data(data) => TableRef::from_data(data, options)?,
        };

        let columns = table.columns();
        if let Some(previous) = &self.binding {
            let mut old_columns = previous.table.columns();
            let mut new_columns = columns.clone();
            old_columns.sort();
            new_columns.sort();
            if old_columns != new_columns {
                self.state
                    .reset_view_config(columns.clone(), "New dataset has different columns");
            }
        }
        if self.state.columns().is_empty() {
            self.state.set_columns(columns);
        }

        let name = Uuid::new_v4().to_string();
        self.manager.host_table(name.clone(), table.clone());
        self.comm.send(OutboundMessage::table(name.clone()));
        info!("Loaded table `{}` ({} rows)", name, table.size());

        self.binding = Some(TableBinding {
            name: name.clone(),
            table,
        });
        Ok(name)
    }

    /// Update the bound table
    pub fn update(&self, data: TableData) -> Result<(), WidgetError> {
        let binding = self.binding.as_ref().ok_or(WidgetError::NoTable)?;
        binding.table.update(data)?;
        Ok(())
    }

    /// Send an engine reply to the front end
    pub fn post(&self, response: &EngineResponse) {
        post(self.comm.as_ref(), response);
    }

    /// Handle a custom message from the front end.
    ///
    /// `init` is acknowledged, `table` re-announces the bound table and any
    /// other command goes to the table manager. Everything else is ignored.
    pub fn handle_message(&self, content: &Value, buffers: &[Vec<u8>]) {
        let Some(message) = InboundMessage::parse(content) else {
            debug!("Ignoring non-command message");
            return;
        };
        let Some(command) = message.command() else {
            warn!("Ignoring command with undecodable data");
            return;
        };

        match command.get("cmd").and_then(Value::as_str) {
            Some("init") => self.comm.send(OutboundMessage::ack()),
            Some("table") => match &self.binding {
                Some(binding) => self.comm.send(OutboundMessage::table(binding.name.clone())),
                None => debug!("Table requested before one was loaded"),
            },
            _ => {
                let comm = self.comm.clone();
                let reply: ReplyFn = Arc::new(move |response| post(comm.as_ref(), &response));
                self.manager.process(&command, buffers, reply);
            }
        }
    }
}

fn post(comm: &dyn Comm, response: &EngineResponse) {
    if response.is_error() {
        warn!("Engine request {} failed", response.id());
    }
    match OutboundMessage::command(response) {
        Ok(message) => comm.send(message),
        Err(e) => error!("Failed to encode reply {}: {}", response.id(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::RecordingComm;
    use serde_json::json;

    fn widget(options: WidgetOptions) -> (Widget, Arc<RecordingComm>) {
        let comm = Arc::new(RecordingComm::new());
        let widget = Widget::with_manager(options, comm.clone(), TableManager::new()).unwrap();
        (widget, comm)
    }

    #[test]
    fn test_options_are_validated() {
        let options = WidgetOptions::from_json(&json!({"plugin": "y_bar", "row_pivots": ["a"]})).unwrap();
        let (widget, comm) = widget(options);
        assert_eq!(widget.state().plugin().as_str(), "y_bar");
        assert_eq!(comm.state()["row_pivots"], json!(["a"]));
        assert_eq!(comm.state()["_model_name"], json!("GridModel"));

        let bad = WidgetOptions {
            plugin: json!("pie"),
            ..WidgetOptions::default()
        };
        let result = Widget::with_manager(bad, Arc::new(RecordingComm::new()), TableManager::new());
        assert!(matches!(result, Err(WidgetError::Validation(_))));
        assert!(WidgetOptions::from_json(&json!({"colour": "red"})).is_err());
    }

    #[test]
    fn test_update_requires_a_table() {
        let (widget, _) = widget(WidgetOptions::default());
        let data = TableData::from_json(&json!({"a": [1]})).unwrap();
        assert!(matches!(widget.update(data), Err(WidgetError::NoTable)));
    }

    #[test]
    fn test_load_hosts_and_announces() {
        let (mut widget, comm) = widget(WidgetOptions::default());
        let name = widget
            .load(TableData::from_json(&json!({"a": [1, 2]})).unwrap(), TableOptions::with_index("a"))
            .unwrap();

        assert_eq!(widget.table_name(), Some(name.as_str()));
        assert!(widget.manager().get_table(&name).unwrap().ptr_eq(&widget.table().unwrap()));
        assert_eq!(widget.state().columns(), ["a".to_string()]);
        assert_eq!(comm.messages().last(), Some(&OutboundMessage::table(name.clone())));
        assert_eq!(widget.synced_state()["columns"], json!(["a"]));

        widget.update(TableData::from_json(&json!([{"a": 2}, {"a": 3}])).unwrap()).unwrap();
        assert_eq!(widget.table().unwrap().size(), 3);
    }

    #[test]
    fn test_engine_commands_are_posted_back() {
        let (mut widget, comm) = widget(WidgetOptions::default());
        let name = widget.load(TableData::from_json(&json!({"a": [1, 2]})).unwrap(), TableOptions::default()).unwrap();
        comm.take_messages();

        let command = json!({"cmd": "table_method", "id": 9, "name": name, "method": "size"});
        widget.handle_message(&json!({"type": "cmd", "data": command.to_string()}), &[]);

        let messages = comm.take_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].to_json(),
            json!({"id": 9, "type": "cmd", "data": r#"{"id":9,"data":2}"#})
        );
    }
}

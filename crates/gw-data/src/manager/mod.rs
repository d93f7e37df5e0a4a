//! Registry of hosted tables and views, and the engine command processor

pub mod command;

use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::schema::ColumnSchema;
use crate::table::{TableData, TableRef};
use crate::view::{View, ViewColumns, ViewConfig, ViewRow};
use crate::DataError;

pub use command::{Command, RowWindow};

/// Payload of a successful engine reply
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseData {
    Null,
    Bool(bool),
    Count(usize),
    Strings(Vec<String>),
    Schema(ColumnSchema),
    Rows(Vec<ViewRow>),
    Columns(ViewColumns),
    Config(ViewConfig),
}

/// Reply to one engine command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EngineResponse {
    Data { id: i64, data: ResponseData },
    Error { id: i64, error: String },
}

impl EngineResponse {
    pub fn ok(id: i64, data: ResponseData) -> Self {
        EngineResponse::Data { id, data }
    }

    pub fn error(id: i64, error: impl ToString) -> Self {
        EngineResponse::Error {
            id,
            error: error.to_string(),
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            EngineResponse::Data { id, .. } | EngineResponse::Error { id, .. } => *id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, EngineResponse::Error { .. })
    }
}

/// Callback receiving engine replies
pub type ReplyFn = Arc<dyn Fn(EngineResponse) + Send + Sync>;

#[derive(Default)]
struct Registry {
    tables: RwLock<IndexMap<String, TableRef>>,
    views: RwLock<IndexMap<String, View>>,
}

static GLOBAL: Lazy<TableManager> = Lazy::new(TableManager::new);

/// Hosts tables and views under string names and answers engine commands.
///
/// Clones share the same registry.
#[derive(Clone, Default)]
pub struct TableManager {
    inner: Arc<Registry>,
}

impl TableManager {
    /// Create an independent registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every widget in the process
    pub fn global() -> TableManager {
        GLOBAL.clone()
    }

    /// Host a table, replacing any table already hosted under the name
    pub fn host_table(&self, name: impl Into<String>, table: TableRef) {
        let name = name.into();
        if self.inner.tables.write().insert(name.clone(), table).is_some() {
            info!("Replaced table `{}`", name);
        } else {
            debug!("Hosted table `{}`", name);
        }
    }

    pub fn get_table(&self, name: &str) -> Option<TableRef> {
        self.inner.tables.read().get(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.inner.tables.read().keys().cloned().collect()
    }

    /// Host a view, replacing any view already hosted under the name
    pub fn host_view(&self, name: impl Into<String>, view: View) {
        let name = name.into();
        if self.inner.views.write().insert(name.clone(), view).is_some() {
            debug!("Replaced view `{}`", name);
        }
    }

    pub fn get_view(&self, name: &str) -> Option<View> {
        self.inner.views.read().get(name).cloned()
    }

    /// Drop a view and its update subscription
    pub fn remove_view(&self, name: &str) -> Option<View> {
        let view = self.inner.views.write().shift_remove(name)?;
        view.table().remove_update(name);
        Some(view)
    }

    /// Handle one engine command, answering through `reply`.
    ///
    /// Commands with an unrecognised `cmd` are dropped. Malformed commands
    /// and engine failures are answered with an error reply.
    pub fn process(&self, message: &Value, buffers: &[Vec<u8>], reply: ReplyFn) {
        let Some(cmd) = message.get("cmd").and_then(Value::as_str) else {
            warn!("Dropping engine message without a `cmd`");
            return;
        };
        if !Command::is_known(cmd) {
            warn!("Dropping unrecognised engine command `{}`", cmd);
            return;
        }

        let command = match Command::deserialize(message) {
            Ok(command) => command,
            Err(e) => {
                let id = message.get("id").and_then(Value::as_i64).unwrap_or_default();
                warn!("Malformed `{}` command: {}", cmd, e);
                reply(EngineResponse::error(id, e));
                return;
            }
        };

        let id = command.id();
        match self.execute(command, buffers, &reply) {
            Ok(Some(data)) => reply(EngineResponse::ok(id, data)),
            Ok(None) => {}
            Err(e) => {
                debug!("Command {} failed: {}", id, e);
                reply(EngineResponse::error(id, e));
            }
        }
    }

    /// Run a command; `None` means the reply comes later, from a subscription
    fn execute(&self, command: Command, buffers: &[Vec<u8>], reply: &ReplyFn) -> Result<Option<ResponseData>, DataError> {
        match command {
            Command::Table {
                name, args, options, ..
            } => {
                let data = table_data(&args, buffers)?;
                let table = TableRef::from_data(data, options)?;
                info!("Created table `{}` with {} rows", name, table.size());
                self.host_table(name, table);
                Ok(Some(ResponseData::Null))
            }
            Command::TableMethod {
                name, method, args, ..
            } => {
                let table = self.get_table(&name).ok_or(DataError::UnknownTable(name))?;
                table_method(&table, &method, &args, buffers).map(Some)
            }
            Command::View {
                table_name,
                view_name,
                config,
                ..
            } => {
                let table = self
                    .get_table(&table_name)
                    .ok_or(DataError::UnknownTable(table_name))?;
                let view = View::new(table, config)?;
                self.host_view(view_name, view);
                Ok(Some(ResponseData::Null))
            }
            Command::ViewMethod {
                id,
                name,
                method,
                args,
                subscribe,
            } => {
                let view = self.get_view(&name).ok_or_else(|| DataError::UnknownView(name.clone()))?;
                match method.as_str() {
                    "on_update" => {
                        if !subscribe {
                            debug!("`on_update` on view `{}` without `subscribe`", name);
                        }
                        let reply = reply.clone();
                        view.table().on_update(
                            name,
                            Arc::new(move || reply(EngineResponse::ok(id, ResponseData::Null))),
                        );
                        Ok(None)
                    }
                    "remove_update" => Ok(Some(ResponseData::Bool(view.table().remove_update(&name)))),
                    "delete" => {
                        self.remove_view(&name);
                        Ok(Some(ResponseData::Null))
                    }
                    other => view_method(&view, other, &args).map(Some),
                }
            }
        }
    }
}

/// Data argument of a command; binary buffers are an Arrow IPC stream
fn table_data(args: &[Value], buffers: &[Vec<u8>]) -> Result<TableData, DataError> {
    match (args.first(), buffers.first()) {
        (Some(value), _) if !value.is_null() => TableData::from_json(value),
        (_, Some(bytes)) => Ok(TableData::Arrow(bytes.clone())),
        _ => Err(DataError::UnsupportedFormat("command carries no table data".to_string())),
    }
}

fn table_method(table: &TableRef, method: &str, args: &[Value], buffers: &[Vec<u8>]) -> Result<ResponseData, DataError> {
    match method {
        "schema" => Ok(ResponseData::Schema(table.schema())),
        "size" => Ok(ResponseData::Count(table.size())),
        "columns" => Ok(ResponseData::Strings(table.columns())),
        "update" => {
            table.update(table_data(args, buffers)?)?;
            Ok(ResponseData::Null)
        }
        "clear" => {
            table.clear();
            Ok(ResponseData::Null)
        }
        "replace" => {
            table.replace(table_data(args, buffers)?)?;
            Ok(ResponseData::Null)
        }
        other => Err(DataError::UnsupportedMethod(other.to_string())),
    }
}

fn view_method(view: &View, method: &str, args: &[Value]) -> Result<ResponseData, DataError> {
    let window = RowWindow::from_args(args);
    match method {
        "to_json" => Ok(ResponseData::Rows(view.to_json(window.start_row, window.end_row))),
        "to_columns" => Ok(ResponseData::Columns(view.to_columns(window.start_row, window.end_row))),
        "num_rows" => Ok(ResponseData::Count(view.num_rows())),
        "num_columns" => Ok(ResponseData::Count(view.num_columns())),
        "schema" => Ok(ResponseData::Schema(view.schema())),
        "get_config" => Ok(ResponseData::Config(view.get_config().clone())),
        other => Err(DataError::UnsupportedMethod(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableOptions;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder() -> (ReplyFn, Arc<Mutex<Vec<Value>>>) {
        let replies = Arc::new(Mutex::new(Vec::new()));
        let sink = replies.clone();
        let reply: ReplyFn = Arc::new(move |response| {
            sink.lock().push(serde_json::to_value(response).unwrap());
        });
        (reply, replies)
    }

    fn manager_with_table() -> TableManager {
        let manager = TableManager::new();
        let data = json!([
            {"name": "a", "when": "2019-07-11 19:30:00.250", "n": 1},
            {"name": "b", "when": "2019-07-12 00:00:00", "n": 2},
        ]);
        let table = TableRef::from_data(TableData::from_json(&data).unwrap(), TableOptions::default()).unwrap();
        manager.host_table("t", table);
        manager
    }

    #[test]
    fn test_table_methods() {
        let manager = manager_with_table();
        let (reply, replies) = recorder();

        manager.process(&json!({"cmd": "table_method", "id": 1, "name": "t", "method": "size"}), &[], reply.clone());
        manager.process(&json!({"cmd": "table_method", "id": 2, "name": "t", "method": "schema"}), &[], reply.clone());
        manager.process(
            &json!({"cmd": "table_method", "id": 3, "name": "t", "method": "update", "args": [[{"n": 3}]]}),
            &[],
            reply.clone(),
        );
        manager.process(&json!({"cmd": "table_method", "id": 4, "name": "t", "method": "explode"}), &[], reply);

        let replies = replies.lock();
        assert_eq!(replies[0], json!({"id": 1, "data": 2}));
        assert_eq!(replies[1], json!({"id": 2, "data": {"name": "string", "when": "datetime", "n": "integer"}}));
        assert_eq!(replies[2], json!({"id": 3, "data": null}));
        assert_eq!(replies[3]["id"], json!(4));
        assert!(replies[3]["error"].is_string());
        assert_eq!(manager.get_table("t").unwrap().size(), 3);
    }

    #[test]
    fn test_view_replies_encode_datetimes_as_milliseconds() {
        let manager = manager_with_table();
        let (reply, replies) = recorder();

        manager.process(
            &json!({"cmd": "view", "id": 5, "table_name": "t", "view_name": "v", "config": {"columns": ["when"]}}),
            &[],
            reply.clone(),
        );
        manager.process(
            &json!({"cmd": "view_method", "id": 6, "name": "v", "method": "to_json", "args": [{"end_row": 1}]}),
            &[],
            reply,
        );

        let replies = replies.lock();
        assert_eq!(replies[0], json!({"id": 5, "data": null}));
        assert_eq!(replies[1], json!({"id": 6, "data": [{"when": 1_562_873_400_250_i64}]}));
    }

    #[test]
    fn test_subscriptions_reply_on_every_update() {
        let manager = manager_with_table();
        let (reply, replies) = recorder();

        manager.process(&json!({"cmd": "view", "id": 1, "table_name": "t", "view_name": "v"}), &[], reply.clone());
        manager.process(
            &json!({"cmd": "view_method", "id": 2, "name": "v", "method": "on_update", "subscribe": true}),
            &[],
            reply.clone(),
        );
        let table = manager.get_table("t").unwrap();
        table.update(TableData::from_json(&json!([{"n": 9}])).unwrap()).unwrap();
        table.clear();

        manager.process(&json!({"cmd": "view_method", "id": 3, "name": "v", "method": "delete"}), &[], reply);
        table.clear();

        let replies = replies.lock();
        assert_eq!(replies.len(), 4);
        assert_eq!(replies[1], json!({"id": 2, "data": null}));
        assert_eq!(replies[2], json!({"id": 2, "data": null}));
        assert_eq!(replies[3], json!({"id": 3, "data": null}));
        assert!(manager.get_view("v").is_none());
        assert_eq!(table.listener_count(), 0);
    }

    #[test]
    fn test_unknown_commands_are_dropped() {
        let manager = manager_with_table();
        let (reply, replies) = recorder();

        manager.process(&json!({"cmd": "explode", "id": 1}), &[], reply.clone());
        manager.process(&json!({"id": 2}), &[], reply.clone());
        assert!(replies.lock().is_empty());

        manager.process(&json!({"cmd": "view", "id": 3}), &[], reply.clone());
        manager.process(&json!({"cmd": "view_method", "id": 4, "name": "missing", "method": "num_rows"}), &[], reply);
        let replies = replies.lock();
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|r| r["error"].is_string()));
    }

    #[test]
    fn test_table_command_hosts_a_new_table() {
        let manager = TableManager::new();
        let (reply, replies) = recorder();

        manager.process(
            &json!({"cmd": "table", "id": 1, "name": "x", "args": [{"k": [1, 2]}], "options": {"index": "k"}}),
            &[],
            reply,
        );

        assert_eq!(replies.lock()[0], json!({"id": 1, "data": null}));
        let table = manager.get_table("x").unwrap();
        assert_eq!(table.options().index.as_deref(), Some("k"));
        assert_eq!(manager.table_names(), vec!["x"]);
    }

    #[test]
    fn test_global_is_shared() {
        let name = format!("shared-{}", std::process::id());
        let table = TableRef::from_data(TableData::from_json(&json!({"a": [1]})).unwrap(), TableOptions::default()).unwrap();
        TableManager::global().host_table(name.clone(), table.clone());
        assert!(TableManager::global().get_table(&name).unwrap().ptr_eq(&table));
    }
}

//! Engine commands sent by the front-end viewer

use serde::Deserialize;
use serde_json::Value;

use crate::config::TableOptions;
use crate::view::ViewConfig;

/// A command addressed to the table engine, discriminated by `cmd`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Create and host a table
    Table {
        id: i64,
        name: String,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(default)]
        options: TableOptions,
    },
    /// Call a method on a hosted table
    TableMethod {
        id: i64,
        name: String,
        method: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    /// Create and host a view over a hosted table
    View {
        id: i64,
        table_name: String,
        view_name: String,
        #[serde(default)]
        config: ViewConfig,
    },
    /// Call a method on a hosted view
    ViewMethod {
        id: i64,
        name: String,
        method: String,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(default)]
        subscribe: bool,
    },
}

impl Command {
    /// Every `cmd` value the engine understands
    pub const NAMES: &'static [&'static str] = &["table", "table_method", "view", "view_method"];

    pub fn id(&self) -> i64 {
        match self {
            Command::Table { id, .. }
            | Command::TableMethod { id, .. }
            | Command::View { id, .. }
            | Command::ViewMethod { id, .. } => *id,
        }
    }

    pub fn is_known(cmd: &str) -> bool {
        Self::NAMES.contains(&cmd)
    }
}

/// Row window of `to_json`/`to_columns`, read from the first argument
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RowWindow {
    pub start_row: Option<usize>,
    pub end_row: Option<usize>,
}

impl RowWindow {
    pub fn from_args(args: &[Value]) -> Self {
        args.first()
            .and_then(|options| RowWindow::deserialize(options).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_commands() {
        let command = Command::deserialize(&json!({
            "cmd": "view",
            "id": 3,
            "table_name": "t",
            "view_name": "v",
            "config": {"row_pivots": ["a"]},
        }))
        .unwrap();
        assert_eq!(command.id(), 3);
        match command {
            Command::View { config, .. } => assert_eq!(config.row_pivots, vec!["a"]),
            other => panic!("unexpected command {other:?}"),
        }

        let command = Command::deserialize(&json!({"cmd": "table_method", "id": 4, "name": "t", "method": "size"})).unwrap();
        assert!(matches!(command, Command::TableMethod { ref args, .. } if args.is_empty()));
    }

    #[test]
    fn test_known_names() {
        assert!(Command::is_known("view_method"));
        assert!(!Command::is_known("init"));
    }

    #[test]
    fn test_row_window() {
        assert_eq!(
            RowWindow::from_args(&[json!({"start_row": 2, "end_row": 5})]),
            RowWindow {
                start_row: Some(2),
                end_row: Some(5)
            }
        );
        assert_eq!(RowWindow::from_args(&[]), RowWindow::default());
    }
}

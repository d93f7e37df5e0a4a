//! Front-end model and view the widget is registered against

use serde::Serialize;
use serde_json::{Map, Value};

pub const MODEL_NAME: &str = "GridModel";
pub const VIEW_NAME: &str = "GridView";
pub const MODULE: &str = "@gridwidget/jupyterlab";
pub const MODULE_VERSION: &str = "^0.3.0";

/// Names the front end uses to instantiate the widget's model and view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    #[serde(rename = "_model_name")]
    pub model_name: &'static str,
    #[serde(rename = "_model_module")]
    pub model_module: &'static str,
    #[serde(rename = "_model_module_version")]
    pub model_module_version: &'static str,
    #[serde(rename = "_view_name")]
    pub view_name: &'static str,
    #[serde(rename = "_view_module")]
    pub view_module: &'static str,
    #[serde(rename = "_view_module_version")]
    pub view_module_version: &'static str,
}

impl Registration {
    pub const GRID: Registration = Registration {
        model_name: MODEL_NAME,
        model_module: MODULE,
        model_module_version: MODULE_VERSION,
        view_name: VIEW_NAME,
        view_module: MODULE,
        view_module_version: MODULE_VERSION,
    };

    /// Registration as synchronized state fields
    pub fn fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        }
    }
}

impl Default for Registration {
    fn default() -> Self {
        Registration::GRID
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registration_fields() {
        let fields = Registration::default().fields();
        assert_eq!(fields.len(), 6);
        assert_eq!(fields["_model_name"], json!("GridModel"));
        assert_eq!(fields["_view_name"], json!("GridView"));
        assert_eq!(fields["_view_module"], json!("@gridwidget/jupyterlab"));
        assert_eq!(fields["_model_module_version"], json!("^0.3.0"));
    }
}

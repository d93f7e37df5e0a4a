//! Options applied when a table is created

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::null_handling::NullConfig;
use crate::cell::ColumnType;
use crate::DataError;

/// Update semantics of a table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Primary-key column; updates upsert rows by this key
    pub index: Option<String>,

    /// Row capacity; once full, updates overwrite from row 0
    pub limit: Option<usize>,
}

impl TableOptions {
    pub fn with_index(index: impl Into<String>) -> Self {
        Self {
            index: Some(index.into()),
            limit: None,
        }
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            index: None,
            limit: Some(limit),
        }
    }

    /// Check the options against the columns of the table they apply to
    pub fn validate(&self, columns: &[String]) -> Result<(), DataError> {
        match (&self.index, self.limit) {
            (Some(_), Some(_)) => Err(DataError::InvalidOptions(
                "`index` and `limit` cannot be applied together".to_string(),
            )),
            (_, Some(0)) => Err(DataError::InvalidOptions("`limit` must be positive".to_string())),
            (Some(index), None) if !columns.iter().any(|c| c == index) => Err(DataError::InvalidOptions(
                format!("index column `{index}` is not in the dataset"),
            )),
            _ => Ok(()),
        }
    }
}

/// How CSV text is read into a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub delimiter: char,

    /// Column type overrides; other columns are inferred
    pub column_types: HashMap<String, ColumnType>,

    pub nulls: NullConfig,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            column_types: HashMap::new(),
            nulls: NullConfig::default(),
        }
    }
}

impl CsvOptions {
    pub fn delimiter_byte(&self) -> Result<u8, DataError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| DataError::InvalidOptions(format!("delimiter {:?} is not ASCII", self.delimiter)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn test_index_and_limit_are_exclusive() {
        let options = TableOptions {
            index: Some("a".to_string()),
            limit: Some(10),
        };
        assert!(matches!(options.validate(&columns()), Err(DataError::InvalidOptions(_))));
    }

    #[test]
    fn test_index_must_be_a_column() {
        assert!(TableOptions::with_index("a").validate(&columns()).is_ok());
        assert!(TableOptions::with_index("z").validate(&columns()).is_err());
        assert!(TableOptions::with_limit(0).validate(&columns()).is_err());
        assert!(TableOptions::default().validate(&[]).is_ok());
    }

    #[test]
    fn test_delimiter_must_be_ascii() {
        let mut options = CsvOptions::default();
        assert_eq!(options.delimiter_byte().unwrap(), b',');
        options.delimiter = '§';
        assert!(options.delimiter_byte().is_err());
    }
}

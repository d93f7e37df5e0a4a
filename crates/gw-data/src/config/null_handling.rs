//! Null value handling for CSV loading

use serde::{Serialize, Deserialize};

/// Cell texts read as null
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NullConfig {
    /// Patterns to treat as null
    pub patterns: Vec<String>,

    /// Whether to trim whitespace before checking
    pub trim_whitespace: bool,

    /// Case sensitive matching
    pub case_sensitive: bool,
}

impl Default for NullConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                String::new(),
                "null".to_string(),
                "NULL".to_string(),
                "None".to_string(),
                "NaN".to_string(),
                "N/A".to_string(),
            ],
            trim_whitespace: true,
            case_sensitive: false,
        }
    }
}

impl NullConfig {
    /// Check if a value should be treated as null
    pub fn is_null(&self, value: &str) -> bool {
        let test_value = if self.trim_whitespace {
            value.trim()
        } else {
            value
        };

        self.patterns.iter().any(|pattern| {
            if self.case_sensitive {
                test_value == pattern
            } else {
                test_value.eq_ignore_ascii_case(pattern)
            }
        })
    }

    /// Add a null pattern
    pub fn add_pattern(&mut self, pattern: String) {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_patterns() {
        let config = NullConfig::default();
        assert!(config.is_null(""));
        assert!(config.is_null("  null "));
        assert!(config.is_null("n/a"));
        assert!(!config.is_null("0"));
    }

    #[test]
    fn test_case_sensitive_matching() {
        let mut config = NullConfig {
            patterns: Vec::new(),
            trim_whitespace: false,
            case_sensitive: true,
        };
        config.add_pattern("-".to_string());
        config.add_pattern("-".to_string());
        assert_eq!(config.patterns.len(), 1);
        assert!(config.is_null("-"));
        assert!(!config.is_null(" -"));
    }
}

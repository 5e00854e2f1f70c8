//! Error types for the csvadjust rule engine and pipeline.
//!
//! - [`RuleError`] - Rule parsing and per-row rule evaluation errors
//! - [`ConfigError`] - Configuration file loading errors
//! - [`CsvError`] - CSV decoding, reading and writing errors
//! - [`AdjustError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Rule Errors
// =============================================================================

/// Errors raised while building rules from descriptions or applying them to a row.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    /// The description's `type` tag has no registry entry.
    #[error("Unknown rule type '{tag}', expected one of: {}", .valid.join(", "))]
    UnknownRuleType {
        tag: String,
        valid: Vec<&'static str>,
    },

    /// The description has no string `type` tag at all.
    #[error("Rule description #{index} has no 'type' tag")]
    MissingTypeTag { index: usize },

    /// A field required by the resolved rule is absent.
    #[error("Missing required field '{field}' for rule '{rule}'")]
    MissingRequiredField {
        field: &'static str,
        rule: &'static str,
    },

    /// A required field is present but its value cannot be used.
    #[error("Invalid value for field '{field}' of rule '{rule}': {reason}")]
    InvalidField {
        field: &'static str,
        rule: &'static str,
        reason: String,
    },

    /// A numeric rule was applied to a cell that does not hold a number.
    #[error("Rule '{rule}' needs a number in column {column}, found {found}")]
    TypeMismatch {
        rule: &'static str,
        column: usize,
        found: &'static str,
    },

    /// A rule references a column the row does not have.
    #[error("Column {column} is out of range for a row of {len} columns")]
    ColumnOutOfRange { column: usize, len: usize },

    /// Integer arithmetic left the representable range.
    #[error("Rule '{rule}' overflowed the integer in column {column}")]
    ArithmeticOverflow { rule: &'static str, column: usize },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The resolved configuration path is not a regular file.
    #[error("{} is not a file", .0.display())]
    NotAFile(PathBuf),

    /// Failed to read the configuration.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid JSON or has the wrong shape.
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors during CSV decoding, reading or writing.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read or write a file.
    #[error("CSV IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configured encoding label is not known.
    #[error("Unknown file encoding: {0}")]
    UnknownEncoding(String),

    /// Malformed CSV content.
    #[error("Invalid CSV: {0}")]
    Parse(#[from] csv::Error),

    /// Failed to flush the CSV writer.
    #[error("Failed to write CSV: {0}")]
    Write(String),
}

// =============================================================================
// Adjust Errors (top-level)
// =============================================================================

/// Top-level errors returned by the adjustment pipeline.
#[derive(Debug, Error)]
pub enum AdjustError {
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Rule parsing error.
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    /// A rule failed on a specific data row.
    #[error("Row {row}{}: {source}", .file.as_ref().map(|f| format!(" of {}", f.display())).unwrap_or_default())]
    Row {
        file: Option<PathBuf>,
        row: usize,
        #[source]
        source: RuleError,
    },

    /// Directory or file IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdjustError {
    /// Attach the file being processed to a row error.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            AdjustError::Row { row, source, .. } => AdjustError::Row {
                file: Some(path.into()),
                row,
                source,
            },
            other => other,
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for rule operations.
pub type RuleResult<T> = Result<T, RuleError>;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for pipeline operations.
pub type AdjustResult<T> = Result<T, AdjustError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // RuleError -> AdjustError
        let rule_err = RuleError::MissingRequiredField {
            field: "value",
            rule: "columnequals",
        };
        let adjust_err: AdjustError = rule_err.into();
        assert!(adjust_err.to_string().contains("value"));

        // ConfigError -> AdjustError
        let config_err = ConfigError::NotAFile(PathBuf::from("missing.json"));
        let adjust_err: AdjustError = config_err.into();
        assert!(adjust_err.to_string().contains("missing.json is not a file"));
    }

    #[test]
    fn test_unknown_rule_type_lists_valid_tags() {
        let err = RuleError::UnknownRuleType {
            tag: "multiply".into(),
            valid: vec!["replace", "append"],
        };
        let msg = err.to_string();
        assert!(msg.contains("'multiply'"));
        assert!(msg.contains("replace, append"));
    }

    #[test]
    fn test_row_error_names_file() {
        let err = AdjustError::Row {
            file: None,
            row: 3,
            source: RuleError::ColumnOutOfRange { column: 9, len: 4 },
        }
        .in_file("data/input.csv");

        let msg = err.to_string();
        assert!(msg.starts_with("Row 3 of data/input.csv"));
        assert!(msg.contains("Column 9"));
    }
}

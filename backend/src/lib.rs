//! # csvadjust - Conditional rule-based CSV adjustment
//!
//! csvadjust applies user-configured rules to CSV rows: a row is adjusted
//! only when its conditionals hold, and then each transformer (replace,
//! append, add, subtract) rewrites one of its cells.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ config JSON │────▶│ Rule parser │────▶│  Row loop   │────▶│  CSV files  │
//! │ (lowercase) │     │ (registries)│     │ (cond→xform)│     │  (written)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use csvadjust::{Cell, ColumnEquals, Evaluate, Number, Add, Transform};
//!
//! let mut row = vec![Cell::from("Blue"), Cell::Integer(5)];
//! if ColumnEquals::new(0, "Blue").evaluate(&row).unwrap() {
//!     Add::new(1, Number::Integer(6)).apply(&mut row).unwrap();
//! }
//! assert_eq!(row[1], Cell::Integer(11));
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, rows and field types
//! - [`rules`] - Conditionals, transformers, registries and the rule parser
//! - [`config`] - Configuration file loading
//! - [`parser`] - CSV reading and writing
//! - [`transform`] - Row loop, file and directory pipeline

// Core modules
pub mod error;
pub mod models;

// Rules
pub mod rules;

// Configuration
pub mod config;

// CSV I/O
pub mod parser;

// Adjustment pipeline
pub mod transform;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AdjustError, AdjustResult, ConfigError, ConfigResult, CsvError, CsvResult, RuleError,
    RuleResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, FieldType, Number, Row};

// =============================================================================
// Re-exports - Rules
// =============================================================================

pub use rules::{
    parse_rules, rules_description, Add, Append, ColumnContains, ColumnEquals, Conditional,
    ConditionalType, Evaluate, Registry, Replace, RowContains, RuleDescription, RuleKind,
    Subtract, Transform, Transformer, TransformerType,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{
    AdjustConfig, CsvSettings, Delimiter, Dialect, MatchMode, RowErrorPolicy, UnmatchedRows,
    CONFIG_ENV_VAR, DEFAULT_CONFIG_FILENAME,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, encode_content, parse_bytes,
    parse_csv_file, write_bytes, write_csv_file, CsvFormat, Decoded, ParseResult,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    adjust_bytes, adjust_directory, adjust_file, list_csv_files, AdjustOutcome, AdjustStats,
    AdjustedCsv, FileReport, RowDisposition, RowFailure, RuleSet,
};

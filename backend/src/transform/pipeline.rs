//! High-level pipeline: apply a rule set to rows, files and directories.
//!
//! # Example
//!
//! ```rust,ignore
//! use csvadjust::{adjust_directory, AdjustConfig, RuleSet};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AdjustConfig::load_config(None, None)?;
//!     let rules = RuleSet::from_config(&config)?;
//!
//!     for report in adjust_directory(&config, &rules)? {
//!         println!("{}: {} rows adjusted", report.input.display(), report.stats.matched);
//!     }
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{AdjustConfig, CsvSettings, MatchMode, RowErrorPolicy, UnmatchedRows};
use crate::error::{AdjustError, AdjustResult, RuleError, RuleResult};
use crate::models::{Cell, Row};
use crate::parser::{parse_bytes, write_bytes};
use crate::rules::{Conditional, Evaluate, Transform, Transformer};

// =============================================================================
// Rule set
// =============================================================================

/// Parsed rules plus the policies deciding what happens to each row.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub conditionals: Vec<Conditional>,
    pub transformers: Vec<Transformer>,
    pub match_mode: MatchMode,
    pub unmatched: UnmatchedRows,
    pub on_row_error: RowErrorPolicy,
}

/// What happened to a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDisposition {
    /// Conditionals matched and every transformer ran.
    Transformed,
    /// Conditionals did not match; the row is untouched.
    Unmatched,
}

impl RuleSet {
    /// Parse the configuration's rule descriptions.
    pub fn from_config(config: &AdjustConfig) -> RuleResult<Self> {
        let conditionals = Conditional::parse_all(&config.conditionals)?;
        let transformers = Transformer::parse_all(&config.transformers)?;

        tracing::info!(
            conditionals = conditionals.len(),
            transformers = transformers.len(),
            "rules parsed"
        );

        Ok(Self {
            conditionals,
            transformers,
            match_mode: config.match_mode,
            unmatched: config.unmatched,
            on_row_error: config.on_row_error,
        })
    }

    /// Whether the row's conditionals hold. No conditionals match every row.
    pub fn matches(&self, row: &[Cell]) -> RuleResult<bool> {
        if self.conditionals.is_empty() {
            return Ok(true);
        }

        match self.match_mode {
            MatchMode::All => {
                for conditional in &self.conditionals {
                    if !conditional.evaluate(row)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            MatchMode::Any => {
                for conditional in &self.conditionals {
                    if conditional.evaluate(row)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Evaluate the row and, when it matches, run every transformer in order.
    pub fn adjust_row(&self, row: &mut [Cell]) -> RuleResult<RowDisposition> {
        if !self.matches(row)? {
            return Ok(RowDisposition::Unmatched);
        }

        for transformer in &self.transformers {
            transformer.apply(row)?;
        }
        Ok(RowDisposition::Transformed)
    }

    /// Adjust every row, applying the unmatched and row-error policies.
    pub fn adjust_rows(&self, rows: Vec<Row>) -> AdjustResult<AdjustOutcome> {
        let mut outcome = AdjustOutcome {
            rows: Vec::with_capacity(rows.len()),
            stats: AdjustStats {
                total: rows.len(),
                ..AdjustStats::default()
            },
            failures: Vec::new(),
        };

        for (idx, mut row) in rows.into_iter().enumerate() {
            let row_number = idx + 1;

            match self.adjust_row(&mut row) {
                Ok(RowDisposition::Transformed) => {
                    outcome.stats.matched += 1;
                    outcome.rows.push(row);
                }
                Ok(RowDisposition::Unmatched) => match self.unmatched {
                    UnmatchedRows::Keep => {
                        outcome.stats.unmatched_kept += 1;
                        outcome.rows.push(row);
                    }
                    UnmatchedRows::Drop => outcome.stats.dropped += 1,
                },
                Err(error) => match self.on_row_error {
                    RowErrorPolicy::Abort => {
                        return Err(AdjustError::Row {
                            file: None,
                            row: row_number,
                            source: error,
                        });
                    }
                    RowErrorPolicy::Skip => {
                        tracing::warn!(row = row_number, %error, "skipping row");
                        outcome.stats.failed += 1;
                        outcome.failures.push(RowFailure {
                            row: row_number,
                            error,
                        });
                    }
                },
            }
        }

        Ok(outcome)
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Row counts of one adjustment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdjustStats {
    /// Data rows read.
    pub total: usize,
    /// Rows whose conditionals matched and were transformed.
    pub matched: usize,
    /// Non-matching rows written out unchanged.
    pub unmatched_kept: usize,
    /// Non-matching rows left out.
    pub dropped: usize,
    /// Rows left out because a rule failed on them.
    pub failed: usize,
}

impl AdjustStats {
    pub fn summary(&self) -> String {
        format!(
            "{} rows: {} adjusted, {} unchanged, {} dropped, {} failed",
            self.total, self.matched, self.unmatched_kept, self.dropped, self.failed
        )
    }
}

/// A row skipped because a rule failed on it.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    /// 1-based data row number (headers not counted).
    pub row: usize,
    pub error: RuleError,
}

/// Rows to write plus what happened along the way.
#[derive(Debug, Clone)]
pub struct AdjustOutcome {
    pub rows: Vec<Row>,
    pub stats: AdjustStats,
    pub failures: Vec<RowFailure>,
}

/// CSV output of [`adjust_bytes`].
#[derive(Debug, Clone)]
pub struct AdjustedCsv {
    pub bytes: Vec<u8>,
    pub stats: AdjustStats,
    pub failures: Vec<RowFailure>,
}

/// Report for one processed file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub stats: AdjustStats,
    pub failures: Vec<RowFailure>,
}

// =============================================================================
// Bytes, files and directories
// =============================================================================

/// Adjust CSV bytes; the output keeps the input's format and header.
pub fn adjust_bytes(bytes: &[u8], settings: &CsvSettings, rules: &RuleSet) -> AdjustResult<AdjustedCsv> {
    let parsed = parse_bytes(bytes, settings)?;
    tracing::debug!(
        rows = parsed.rows.len(),
        encoding = parsed.format.encoding.name(),
        delimiter = %(parsed.format.delimiter as char).escape_default(),
        "parsed CSV"
    );

    let outcome = rules.adjust_rows(parsed.rows)?;
    let bytes = write_bytes(parsed.headers.as_deref(), &outcome.rows, parsed.format)?;

    Ok(AdjustedCsv {
        bytes,
        stats: outcome.stats,
        failures: outcome.failures,
    })
}

/// Adjust one file into `output`. Nothing is written when a row error aborts.
pub fn adjust_file(
    settings: &CsvSettings,
    rules: &RuleSet,
    input: &Path,
    output: &Path,
) -> AdjustResult<FileReport> {
    tracing::info!(input = %input.display(), output = %output.display(), "adjusting file");

    let bytes = fs::read(input)?;
    let adjusted = adjust_bytes(&bytes, settings, rules).map_err(|e| e.in_file(input))?;
    fs::write(output, &adjusted.bytes)?;

    tracing::info!(input = %input.display(), "{}", adjusted.stats.summary());

    Ok(FileReport {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        stats: adjusted.stats,
        failures: adjusted.failures,
    })
}

/// CSV files directly inside `dir`, sorted by name.
pub fn list_csv_files(dir: &Path) -> AdjustResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Adjust every CSV file of the configured read directory into the write
/// directory, keeping file names.
pub fn adjust_directory(config: &AdjustConfig, rules: &RuleSet) -> AdjustResult<Vec<FileReport>> {
    let read_dir = config.read_dir();
    let write_dir = config.write_dir();

    let files = list_csv_files(&read_dir)?;
    if files.is_empty() {
        tracing::warn!(dir = %read_dir.display(), "no CSV files found");
        return Ok(Vec::new());
    }

    fs::create_dir_all(&write_dir)?;
    if fs::canonicalize(&read_dir)? == fs::canonicalize(&write_dir)? {
        tracing::warn!(dir = %read_dir.display(), "read and write directories are the same, inputs will be overwritten");
    }

    let mut reports = Vec::with_capacity(files.len());
    for input in files {
        let Some(name) = input.file_name() else {
            continue;
        };
        let output = write_dir.join(name);
        reports.push(adjust_file(&config.csv, rules, &input, &output)?);
    }

    tracing::info!(files = reports.len(), dir = %write_dir.display(), "directory adjusted");
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Number;
    use crate::rules::{Add, ColumnEquals, Replace, RowContains};
    use serde_json::json;

    fn colors() -> Row {
        ["Red", "Green", "Blue", "Yellow", "Orange", "Purple"]
            .into_iter()
            .map(Cell::from)
            .collect()
    }

    fn rule_set(conditionals: Vec<Conditional>, transformers: Vec<Transformer>) -> RuleSet {
        RuleSet {
            conditionals,
            transformers,
            ..RuleSet::default()
        }
    }

    #[test]
    fn test_no_conditionals_match_every_row() {
        let rules = rule_set(vec![], vec![Replace::new(0, "X").into()]);
        let outcome = rules.adjust_rows(vec![colors(), colors()]).unwrap();

        assert_eq!(outcome.stats.matched, 2);
        assert!(outcome.rows.iter().all(|r| r[0] == Cell::from("X")));
    }

    #[test]
    fn test_match_all_and_any() {
        let mut rules = rule_set(
            vec![
                ColumnEquals::new(2, "Blue").into(),
                RowContains::new("nothing-here").into(),
            ],
            vec![],
        );

        assert!(!rules.matches(&colors()).unwrap());

        rules.match_mode = MatchMode::Any;
        assert!(rules.matches(&colors()).unwrap());
    }

    #[test]
    fn test_unmatched_rows_kept_or_dropped() {
        let mut other = colors();
        other[2] = Cell::from("Black");

        let mut rules = rule_set(
            vec![ColumnEquals::new(2, "Blue").into()],
            vec![Replace::new(2, "Navy").into()],
        );

        let outcome = rules.adjust_rows(vec![colors(), other.clone()]).unwrap();
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[0][2], Cell::from("Navy"));
        assert_eq!(outcome.rows[1], other);
        assert_eq!(outcome.stats.unmatched_kept, 1);

        rules.unmatched = UnmatchedRows::Drop;
        let outcome = rules.adjust_rows(vec![colors(), other]).unwrap();
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.stats.dropped, 1);
        assert_eq!(outcome.stats.matched, 1);
    }

    #[test]
    fn test_row_error_aborts_by_default() {
        let rules = rule_set(vec![], vec![Add::new(1, Number::Integer(1)).into()]);
        let numeric = vec![Cell::Integer(1), Cell::Integer(2)];

        let err = rules.adjust_rows(vec![numeric, colors()]).unwrap_err();
        match err {
            AdjustError::Row { row, source, .. } => {
                assert_eq!(row, 2);
                assert!(matches!(source, RuleError::TypeMismatch { rule: "add", column: 1, .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_row_error_skip_drops_row() {
        let mut rules = rule_set(
            vec![],
            vec![
                Replace::new(0, "touched").into(),
                Add::new(1, Number::Integer(1)).into(),
            ],
        );
        rules.on_row_error = RowErrorPolicy::Skip;

        let numeric = vec![Cell::Integer(1), Cell::Integer(2)];
        let outcome = rules.adjust_rows(vec![colors(), numeric]).unwrap();

        assert_eq!(outcome.rows, vec![vec![Cell::from("touched"), Cell::Integer(3)]]);
        assert_eq!(outcome.stats.failed, 1);
        assert_eq!(outcome.failures[0].row, 1);
        assert_eq!(outcome.stats.summary(), "2 rows: 1 adjusted, 0 unchanged, 0 dropped, 1 failed");
    }

    #[test]
    fn test_conditional_index_error_is_a_row_error() {
        let mut rules = rule_set(vec![ColumnEquals::new(3, "x").into()], vec![]);
        rules.on_row_error = RowErrorPolicy::Skip;

        let outcome = rules
            .adjust_rows(vec![vec![Cell::from("short")]])
            .unwrap();
        assert_eq!(
            outcome.failures[0].error,
            RuleError::ColumnOutOfRange { column: 3, len: 1 }
        );
    }

    #[test]
    fn test_rule_set_from_config() {
        let config = AdjustConfig::from_value(json!({
            "conditionals": [{"type": "ColumnEquals", "columnNumber": 0, "value": "Red"}],
            "transformers": [{"type": "append", "columnNumber": 0, "value": "!"}],
            "unmatched": "drop"
        }))
        .unwrap();

        let rules = RuleSet::from_config(&config).unwrap();
        assert_eq!(rules.conditionals.len(), 1);
        assert_eq!(rules.transformers.len(), 1);
        assert_eq!(rules.unmatched, UnmatchedRows::Drop);
    }

    #[test]
    fn test_rule_set_from_config_propagates_parse_errors() {
        let config = AdjustConfig::from_value(json!({
            "transformers": [{"type": "multiply", "columnNumber": 0, "value": 2}]
        }))
        .unwrap();

        assert!(matches!(
            RuleSet::from_config(&config),
            Err(RuleError::UnknownRuleType { .. })
        ));
    }

    #[test]
    fn test_adjust_bytes_keeps_header_and_format() {
        let rules = rule_set(
            vec![ColumnEquals::new(0, "b").into()],
            vec![Add::new(1, Number::Integer(6)).into()],
        );
        let input = "key;count\na;5\nb;5\n";
        let mut settings = CsvSettings::default();
        settings.delimiter = Some(crate::config::Delimiter::Auto);

        let adjusted = adjust_bytes(input.as_bytes(), &settings, &rules).unwrap();

        assert_eq!(
            String::from_utf8(adjusted.bytes).unwrap(),
            "key;count\r\na;5\r\nb;11\r\n"
        );
        assert_eq!(adjusted.stats.total, 2);
        assert_eq!(adjusted.stats.matched, 1);
    }

    #[test]
    fn test_adjust_directory() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("in");
        fs::create_dir(&input_dir).unwrap();
        fs::write(input_dir.join("b.csv"), "name,qty\nBlue,1\nRed,2\n").unwrap();
        fs::write(input_dir.join("a.CSV"), "name,qty\nBlue,10\n").unwrap();
        fs::write(input_dir.join("notes.txt"), "ignored").unwrap();

        let config_path = dir.path().join("csvAdjuster.json");
        fs::write(
            &config_path,
            json!({
                "csv": {"readDirectory": "in", "writeDirectory": "out"},
                "conditionals": [{"type": "columnequals", "columnnumber": 0, "value": "Blue"}],
                "transformers": [{"type": "subtract", "columnnumber": 1, "value": 1}]
            })
            .to_string(),
        )
        .unwrap();

        let config = AdjustConfig::from_file(&config_path).unwrap();
        let rules = RuleSet::from_config(&config).unwrap();
        let reports = adjust_directory(&config, &rules).unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports[0].input.ends_with("a.CSV"));
        assert_eq!(
            fs::read_to_string(dir.path().join("out/a.CSV")).unwrap(),
            "name,qty\r\nBlue,9\r\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("out/b.csv")).unwrap(),
            "name,qty\r\nBlue,0\r\nRed,2\r\n"
        );
        assert!(!dir.path().join("out/notes.txt").exists());
    }

    #[test]
    fn test_adjust_directory_without_csv_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = AdjustConfig {
            base_dir: dir.path().to_path_buf(),
            ..AdjustConfig::default()
        };

        let reports = adjust_directory(&config, &RuleSet::default()).unwrap();
        assert!(reports.is_empty());
        assert!(!dir.path().join("adjusted").exists());
    }

    #[test]
    fn test_adjust_file_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.csv");
        fs::write(&input, "h\ntext\n").unwrap();

        let rules = rule_set(vec![], vec![Add::new(0, Number::Integer(1)).into()]);
        let err = adjust_file(
            &CsvSettings::default(),
            &rules,
            &input,
            &dir.path().join("out.csv"),
        )
        .unwrap_err();

        assert!(matches!(err, AdjustError::Row { file: Some(ref f), row: 1, .. } if f == &input));
        assert!(!dir.path().join("out.csv").exists());
    }
}

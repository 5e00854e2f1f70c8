//! Configuration file loading.
//!
//! The configuration is a JSON document, `csvAdjuster.json` in the working
//! directory unless told otherwise. Keys are case-insensitive: every object
//! key is lowercased before deserialization, and so is every rule `type`
//! tag. Missing keys fall back to defaults.
//!
//! ```json
//! {
//!   "csv": { "readDirectory": "in", "writeDirectory": "out", "fileEncoding": "utf-8", "dialect": "excel" },
//!   "match": "all",
//!   "conditionals": [ { "type": "columnEquals", "columnNumber": 2, "value": "Blue" } ],
//!   "transformers": [ { "type": "replace", "columnNumber": 2, "value": "Black" } ]
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::rules::RuleDescription;

/// File name loaded when none is given.
pub const DEFAULT_CONFIG_FILENAME: &str = "csvAdjuster.json";

/// Environment variable naming a configuration file to use.
pub const CONFIG_ENV_VAR: &str = "CSVADJUST_CONFIG";

// =============================================================================
// Top-level configuration
// =============================================================================

/// Everything a run needs: CSV settings, row policies and rule descriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustConfig {
    #[serde(deserialize_with = "deserialize_csv_section")]
    pub csv: CsvSettings,

    /// How multiple conditionals combine.
    #[serde(rename = "match")]
    pub match_mode: MatchMode,

    /// What happens to rows that do not match.
    pub unmatched: UnmatchedRows,

    /// What happens when a rule fails on a row.
    #[serde(rename = "onrowerror")]
    pub on_row_error: RowErrorPolicy,

    pub conditionals: Vec<RuleDescription>,

    pub transformers: Vec<RuleDescription>,

    /// Directory relative paths are resolved against (the config file's directory).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for AdjustConfig {
    fn default() -> Self {
        Self {
            csv: CsvSettings::default(),
            match_mode: MatchMode::default(),
            unmatched: UnmatchedRows::default(),
            on_row_error: RowErrorPolicy::default(),
            conditionals: Vec::new(),
            transformers: Vec::new(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl AdjustConfig {
    /// Load the configuration from `path/file_name`.
    ///
    /// `file_name` defaults to [`DEFAULT_CONFIG_FILENAME`], `path` to the
    /// current working directory.
    pub fn load_config(file_name: Option<&str>, path: Option<&Path>) -> ConfigResult<Self> {
        let dir = match path {
            Some(p) => p.to_path_buf(),
            None => std::env::current_dir()?,
        };
        let config_path = dir.join(file_name.unwrap_or(DEFAULT_CONFIG_FILENAME));

        Self::from_file(&config_path)
    }

    /// Load the configuration from an explicit file path.
    pub fn from_file(config_path: &Path) -> ConfigResult<Self> {
        if !config_path.is_file() {
            return Err(ConfigError::NotAFile(config_path.to_path_buf()));
        }

        tracing::info!(path = %config_path.display(), "loading configuration");
        let content = fs::read_to_string(config_path)?;

        let mut config = Self::from_json_str(&content)?;
        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.base_dir = parent.to_path_buf();
        }
        Ok(config)
    }

    /// Parse a configuration document.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let raw: Value = serde_json::from_str(json)?;
        Self::from_value(raw)
    }

    /// Build a configuration from an already parsed JSON document.
    pub fn from_value(raw: Value) -> ConfigResult<Self> {
        let mut config: AdjustConfig = serde_json::from_value(lowercase_keys(raw))?;

        config.conditionals = config
            .conditionals
            .into_iter()
            .map(RuleDescription::normalized)
            .collect();
        config.transformers = config
            .transformers
            .into_iter()
            .map(RuleDescription::normalized)
            .collect();

        Ok(config)
    }

    /// Directory scanned for input CSV files.
    pub fn read_dir(&self) -> PathBuf {
        self.base_dir.join(&self.csv.read_directory)
    }

    /// Directory adjusted files are written to.
    pub fn write_dir(&self) -> PathBuf {
        self.base_dir.join(&self.csv.write_directory)
    }
}

/// Recursively lowercase every object key.
pub fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), lowercase_keys(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

// =============================================================================
// CSV settings
// =============================================================================

/// Where CSV files live and how they are encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvSettings {
    #[serde(rename = "readdirectory")]
    pub read_directory: PathBuf,

    #[serde(rename = "writedirectory")]
    pub write_directory: PathBuf,

    /// Encoding label (`utf-8`, `windows-1252`, ...) or `auto`.
    #[serde(rename = "fileencoding")]
    pub file_encoding: String,

    pub dialect: Dialect,

    /// Overrides the dialect's delimiter.
    pub delimiter: Option<Delimiter>,

    /// The first record is a header and passes through untouched.
    #[serde(rename = "hasheaders")]
    pub has_headers: bool,

    /// Recognize integer and float literals in cells.
    #[serde(rename = "parsenumbers")]
    pub parse_numbers: bool,
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            read_directory: PathBuf::from("."),
            write_directory: PathBuf::from("adjusted"),
            file_encoding: "utf-8".to_string(),
            dialect: Dialect::default(),
            delimiter: None,
            has_headers: true,
            parse_numbers: true,
        }
    }
}

/// Accepts `"csv": {...}` as well as the older `"csv": [{...}]`.
fn deserialize_csv_section<'de, D>(deserializer: D) -> Result<CsvSettings, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Section {
        One(CsvSettings),
        Many(Vec<CsvSettings>),
    }

    Ok(match Section::deserialize(deserializer)? {
        Section::One(settings) => settings,
        Section::Many(list) => list.into_iter().next().unwrap_or_default(),
    })
}

/// Named CSV dialects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// Comma separated, CRLF line endings, minimal quoting.
    #[default]
    Excel,
    /// Tab separated, otherwise like excel.
    ExcelTab,
    /// Comma separated, LF line endings, every field quoted.
    Unix,
}

impl Dialect {
    pub fn delimiter(&self) -> u8 {
        match self {
            Dialect::Excel | Dialect::Unix => b',',
            Dialect::ExcelTab => b'\t',
        }
    }
}

/// Explicit delimiter setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Delimiter {
    /// Detect from the first line of each file.
    Auto,
    Char(u8),
}

impl TryFrom<String> for Delimiter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("auto") {
            return Ok(Delimiter::Auto);
        }
        if value == "\\t" {
            return Ok(Delimiter::Char(b'\t'));
        }
        match value.as_bytes() {
            [b] if b.is_ascii() => Ok(Delimiter::Char(*b)),
            _ => Err(format!(
                "delimiter must be a single ASCII character or \"auto\", got {:?}",
                value
            )),
        }
    }
}

impl From<Delimiter> for String {
    fn from(value: Delimiter) -> Self {
        match value {
            Delimiter::Auto => "auto".to_string(),
            Delimiter::Char(b'\t') => "\\t".to_string(),
            Delimiter::Char(b) => (b as char).to_string(),
        }
    }
}

// =============================================================================
// Row policies
// =============================================================================

/// How a row's conditionals combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every conditional must hold.
    #[default]
    All,
    /// At least one conditional must hold.
    Any,
}

/// Disposition of rows whose conditionals do not match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedRows {
    /// Written out unchanged.
    #[default]
    Keep,
    /// Left out of the output.
    Drop,
}

/// Reaction to a rule failing on a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowErrorPolicy {
    /// Fail the whole file.
    #[default]
    Abort,
    /// Leave the row out and carry on.
    Skip,
}

//! Domain models shared by the rule engine and the CSV pipeline.
//!
//! - [`Cell`] - One CSV value (text, integer or float)
//! - [`Number`] - The numeric subset of [`Cell`]
//! - [`Row`] - One CSV record as an ordered sequence of cells
//! - [`FieldType`] - Named inputs a rule variant needs from its description

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// =============================================================================
// Cell
// =============================================================================

/// A single column value.
///
/// Numbers compare by value across kinds (`Integer(5) == Float(5.0)`), text
/// never equals a number (`Integer(5) != Text("5")`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// One CSV record. Index 0 is the first column.
pub type Row = Vec<Cell>;

impl Cell {
    /// Build a text cell.
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Recognize a raw CSV field.
    ///
    /// A field becomes a number only when it is a literal that renders back
    /// to exactly the same text, so untouched cells are written out
    /// byte-for-byte (`"007"` and `"1.50"` stay text).
    pub fn parse(field: &str) -> Self {
        if let Ok(i) = field.parse::<i64>() {
            if i.to_string() == field {
                return Cell::Integer(i);
            }
        }

        let looks_numeric = field.bytes().any(|b| b.is_ascii_digit())
            && field
                .bytes()
                .all(|b| b.is_ascii_digit() || matches!(b, b'-' | b'.'));
        if looks_numeric {
            if let Ok(f) = field.parse::<f64>() {
                let cell = Cell::Float(f);
                if cell.to_string() == field {
                    return cell;
                }
            }
        }

        Cell::Text(field.to_string())
    }

    /// Convert a JSON configuration value.
    ///
    /// Strings and numbers are accepted; booleans, null, arrays and objects
    /// have no cell representation.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Cell::Text(s.clone())),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Cell::Integer(i)),
                None => n.as_f64().map(Cell::Float),
            },
            _ => None,
        }
    }

    /// The numeric value of this cell, if it holds one.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Cell::Integer(i) => Some(Number::Integer(*i)),
            Cell::Float(f) => Some(Number::Float(*f)),
            Cell::Text(_) => None,
        }
    }

    /// Name of the cell's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Cell::Integer(_) => "integer",
            Cell::Float(_) => "float",
            Cell::Text(_) => "text",
        }
    }

    /// Text rendering of the cell (what gets written to CSV).
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Float(x) => {
                let rendered = x.to_string();
                // Keep integral floats distinguishable from integers.
                if x.is_finite() && !rendered.contains('.') {
                    write!(f, "{}.0", rendered)
                } else {
                    f.write_str(&rendered)
                }
            }
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::Text(a), Cell::Text(b)) => a == b,
            (Cell::Text(_), _) | (_, Cell::Text(_)) => false,
            (Cell::Integer(a), Cell::Integer(b)) => a == b,
            (Cell::Float(a), Cell::Float(b)) => a == b,
            (Cell::Integer(i), Cell::Float(f)) | (Cell::Float(f), Cell::Integer(i)) => {
                exact_i64(*f) == Some(*i)
            }
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<Number> for Cell {
    fn from(value: Number) -> Self {
        match value {
            Number::Integer(i) => Cell::Integer(i),
            Number::Float(f) => Cell::Float(f),
        }
    }
}

// =============================================================================
// Number
// =============================================================================

/// A numeric operand or numeric cell content.
///
/// Equality is exact-kind, unlike [`Cell`], so results can be checked for
/// the kind they come out as.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    /// Convert a JSON configuration value; only JSON numbers qualify.
    pub fn from_json(value: &Value) -> Option<Self> {
        let Value::Number(n) = value else {
            return None;
        };
        match n.as_i64() {
            Some(i) => Some(Number::Integer(i)),
            None => n.as_f64().map(Number::Float),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// `self + rhs`; `None` on overflow.
    pub fn checked_add(self, rhs: Number) -> Option<Number> {
        self.combine(rhs, i64::checked_add, |a, b| a + b)
    }

    /// `self - rhs`; `None` on overflow.
    pub fn checked_sub(self, rhs: Number) -> Option<Number> {
        self.combine(rhs, i64::checked_sub, |a, b| a - b)
    }

    /// Integer with integer, or with an integral float, stays an exact
    /// integer. Everything else is float arithmetic, and a non-finite
    /// result counts as overflow.
    fn combine(
        self,
        rhs: Number,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Option<Number> {
        let exact = match (self, rhs) {
            (Number::Integer(a), Number::Integer(b)) => Some((a, b)),
            (Number::Integer(a), Number::Float(b)) => exact_i64(b).map(|b| (a, b)),
            _ => None,
        };
        if let Some((a, b)) = exact {
            return int_op(a, b).map(Number::Integer);
        }

        let result = float_op(self.as_f64(), rhs.as_f64());
        result.is_finite().then_some(Number::Float(result))
    }
}

/// `x` as an `i64` when it is integral and representable.
fn exact_i64(x: f64) -> Option<i64> {
    // -2^63 and 2^63 are exact as f64; i64::MAX is not.
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    (x.fract() == 0.0 && (-BOUND..BOUND).contains(&x)).then_some(x as i64)
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Cell::from(*self).fmt(f)
    }
}

// =============================================================================
// Field Types
// =============================================================================

/// A named input a rule variant requires from its description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Zero-based column index the rule targets.
    #[serde(rename = "columnnumber")]
    ColumnNumber,
    /// Comparison value or operand.
    Value,
}

impl FieldType {
    /// Field name as it appears in a rule description.
    pub fn json_name(&self) -> &'static str {
        match self {
            FieldType::ColumnNumber => "columnnumber",
            FieldType::Value => "value",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.json_name())
    }
}

// =============================================================================
// Tests
// =============================================================================

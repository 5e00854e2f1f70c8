//! Conditionals: predicates that decide whether a row gets adjusted.
//!
//! Column indexes are zero-based. "Contains" compares text renderings, so a
//! numeric cell `1234` contains the value `"23"` and the value `23`.

use serde::Serialize;

use super::{RequiredFields, Registry, RuleKind, CONDITIONAL_REGISTRY};
use crate::error::{RuleError, RuleResult};
use crate::models::{Cell, FieldType};

/// Evaluation contract shared by every conditional.
pub trait Evaluate {
    /// Whether the row satisfies the predicate. Never mutates the row.
    fn evaluate(&self, row: &[Cell]) -> RuleResult<bool>;
}

fn column(row: &[Cell], index: usize) -> RuleResult<&Cell> {
    row.get(index).ok_or(RuleError::ColumnOutOfRange {
        column: index,
        len: row.len(),
    })
}

// =============================================================================
// Variants
// =============================================================================

/// True iff the target column equals the value. Numbers compare by value,
/// text only equals text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnEquals {
    #[serde(rename = "columnnumber")]
    pub column_number: usize,
    pub value: Cell,
}

impl ColumnEquals {
    pub fn new(column_number: usize, value: impl Into<Cell>) -> Self {
        Self {
            column_number,
            value: value.into(),
        }
    }
}

impl Evaluate for ColumnEquals {
    fn evaluate(&self, row: &[Cell]) -> RuleResult<bool> {
        Ok(*column(row, self.column_number)? == self.value)
    }
}

/// True iff the value's text is a substring of the target column's text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnContains {
    #[serde(rename = "columnnumber")]
    pub column_number: usize,
    pub value: Cell,
    #[serde(skip)]
    needle: String,
}

impl ColumnContains {
    pub fn new(column_number: usize, value: impl Into<Cell>) -> Self {
        let value = value.into();
        Self {
            column_number,
            needle: value.to_text(),
            value,
        }
    }
}

impl Evaluate for ColumnContains {
    fn evaluate(&self, row: &[Cell]) -> RuleResult<bool> {
        let cell = column(row, self.column_number)?;
        Ok(cell.to_text().contains(&self.needle))
    }
}

/// True iff any column's text contains the value's text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowContains {
    pub value: Cell,
    #[serde(skip)]
    needle: String,
}

impl RowContains {
    pub fn new(value: impl Into<Cell>) -> Self {
        let value = value.into();
        Self {
            needle: value.to_text(),
            value,
        }
    }
}

impl Evaluate for RowContains {
    fn evaluate(&self, row: &[Cell]) -> RuleResult<bool> {
        // Left to right, stops at the first match.
        Ok(row.iter().any(|cell| cell.to_text().contains(&self.needle)))
    }
}

// =============================================================================
// Conditional (closed set)
// =============================================================================

/// Any conditional the configuration can produce.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Conditional {
    ColumnEquals(ColumnEquals),
    ColumnContains(ColumnContains),
    RowContains(RowContains),
}

impl Conditional {
    /// Parse a batch of conditional descriptions.
    pub fn parse_all(descriptions: &[super::RuleDescription]) -> RuleResult<Vec<Conditional>> {
        super::parse_rules::<ConditionalType>(descriptions)
    }

    /// Registry entry this conditional was built from.
    pub fn kind(&self) -> ConditionalType {
        match self {
            Conditional::ColumnEquals(_) => ConditionalType::ColumnEquals,
            Conditional::ColumnContains(_) => ConditionalType::ColumnContains,
            Conditional::RowContains(_) => ConditionalType::RowContains,
        }
    }
}

impl Evaluate for Conditional {
    fn evaluate(&self, row: &[Cell]) -> RuleResult<bool> {
        match self {
            Conditional::ColumnEquals(c) => c.evaluate(row),
            Conditional::ColumnContains(c) => c.evaluate(row),
            Conditional::RowContains(c) => c.evaluate(row),
        }
    }
}

impl From<ColumnEquals> for Conditional {
    fn from(c: ColumnEquals) -> Self {
        Conditional::ColumnEquals(c)
    }
}

impl From<ColumnContains> for Conditional {
    fn from(c: ColumnContains) -> Self {
        Conditional::ColumnContains(c)
    }
}

impl From<RowContains> for Conditional {
    fn from(c: RowContains) -> Self {
        Conditional::RowContains(c)
    }
}

// =============================================================================
// Registry entries
// =============================================================================

/// The conditional variants a description can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionalType {
    ColumnEquals,
    ColumnContains,
    RowContains,
}

impl RuleKind for ConditionalType {
    type Rule = Conditional;

    const ALL: &'static [Self] = &[
        ConditionalType::ColumnEquals,
        ConditionalType::ColumnContains,
        ConditionalType::RowContains,
    ];

    fn tag(&self) -> &'static str {
        match self {
            ConditionalType::ColumnEquals => "columnequals",
            ConditionalType::ColumnContains => "columncontains",
            ConditionalType::RowContains => "rowcontains",
        }
    }

    fn required_fields(&self) -> &'static [FieldType] {
        match self {
            ConditionalType::ColumnEquals | ConditionalType::ColumnContains => {
                &[FieldType::ColumnNumber, FieldType::Value]
            }
            ConditionalType::RowContains => &[FieldType::Value],
        }
    }

    fn construct(&self, fields: &RequiredFields<'_>) -> RuleResult<Conditional> {
        Ok(match self {
            ConditionalType::ColumnEquals => {
                ColumnEquals::new(fields.column_number()?, fields.cell()?).into()
            }
            ConditionalType::ColumnContains => {
                ColumnContains::new(fields.column_number()?, fields.cell()?).into()
            }
            ConditionalType::RowContains => RowContains::new(fields.cell()?).into(),
        })
    }

    fn registry() -> &'static Registry<Self> {
        &CONDITIONAL_REGISTRY
    }
}

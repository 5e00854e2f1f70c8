//! Transformers: in-place mutations of one cell of a row.
//!
//! String-level transformers (replace, append) accept any cell. Numeric
//! transformers (add, subtract) go through [`numeric_cell`] first and leave
//! the row untouched when the target cell is not a number.

use serde::Serialize;

use super::{RequiredFields, Registry, RuleKind, TRANSFORMER_REGISTRY};
use crate::error::{RuleError, RuleResult};
use crate::models::{Cell, FieldType, Number};

/// Mutation contract shared by every transformer.
///
/// Rows are slices, so a transformer can change cells but never the row's
/// length or column order.
pub trait Transform {
    fn apply(&self, row: &mut [Cell]) -> RuleResult<()>;
}

fn column_mut(row: &mut [Cell], index: usize) -> RuleResult<&mut Cell> {
    let len = row.len();
    row.get_mut(index)
        .ok_or(RuleError::ColumnOutOfRange { column: index, len })
}

// =============================================================================
// String transformers
// =============================================================================

/// Sets the target cell to the value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Replace {
    #[serde(rename = "columnnumber")]
    pub column_number: usize,
    pub value: Cell,
}

impl Replace {
    pub fn new(column_number: usize, value: impl Into<Cell>) -> Self {
        Self {
            column_number,
            value: value.into(),
        }
    }
}

impl Transform for Replace {
    fn apply(&self, row: &mut [Cell]) -> RuleResult<()> {
        *column_mut(row, self.column_number)? = self.value.clone();
        Ok(())
    }
}

/// Appends the value's text to the target cell's text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Append {
    #[serde(rename = "columnnumber")]
    pub column_number: usize,
    pub value: Cell,
}

impl Append {
    pub fn new(column_number: usize, value: impl Into<Cell>) -> Self {
        Self {
            column_number,
            value: value.into(),
        }
    }
}

impl Transform for Append {
    fn apply(&self, row: &mut [Cell]) -> RuleResult<()> {
        let cell = column_mut(row, self.column_number)?;
        let mut text = cell.to_text();
        text.push_str(&self.value.to_text());
        *cell = Cell::Text(text);
        Ok(())
    }
}

// =============================================================================
// Numeric transformers
// =============================================================================

/// Guard shared by the arithmetic transformers: the target must hold a number.
pub fn numeric_cell(row: &[Cell], column: usize, rule: &'static str) -> RuleResult<Number> {
    let cell = row.get(column).ok_or(RuleError::ColumnOutOfRange {
        column,
        len: row.len(),
    })?;

    cell.as_number().ok_or_else(|| {
        tracing::warn!(rule, column, found = cell.kind(), "refusing arithmetic on non-numeric cell");
        RuleError::TypeMismatch {
            rule,
            column,
            found: cell.kind(),
        }
    })
}

fn apply_arithmetic(
    row: &mut [Cell],
    column: usize,
    rule: &'static str,
    op: impl FnOnce(Number) -> Option<Number>,
) -> RuleResult<()> {
    let current = numeric_cell(row, column, rule)?;
    let result = op(current).ok_or(RuleError::ArithmeticOverflow { rule, column })?;
    row[column] = result.into();
    Ok(())
}

/// Adds the operand to the target cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Add {
    #[serde(rename = "columnnumber")]
    pub column_number: usize,
    pub value: Number,
}

impl Add {
    pub fn new(column_number: usize, value: Number) -> Self {
        Self {
            column_number,
            value,
        }
    }
}

impl Transform for Add {
    fn apply(&self, row: &mut [Cell]) -> RuleResult<()> {
        apply_arithmetic(row, self.column_number, "add", |n| n.checked_add(self.value))
    }
}

/// Subtracts the operand from the target cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subtract {
    #[serde(rename = "columnnumber")]
    pub column_number: usize,
    pub value: Number,
}

impl Subtract {
    pub fn new(column_number: usize, value: Number) -> Self {
        Self {
            column_number,
            value,
        }
    }
}

impl Transform for Subtract {
    fn apply(&self, row: &mut [Cell]) -> RuleResult<()> {
        apply_arithmetic(row, self.column_number, "subtract", |n| {
            n.checked_sub(self.value)
        })
    }
}

// =============================================================================
// Transformer (closed set)
// =============================================================================

/// Any transformer the configuration can produce.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transformer {
    Replace(Replace),
    Append(Append),
    Add(Add),
    Subtract(Subtract),
}

impl Transformer {
    /// Parse a batch of transformer descriptions.
    pub fn parse_all(descriptions: &[super::RuleDescription]) -> RuleResult<Vec<Transformer>> {
        super::parse_rules::<TransformerType>(descriptions)
    }

    pub fn kind(&self) -> TransformerType {
        match self {
            Transformer::Replace(_) => TransformerType::Replace,
            Transformer::Append(_) => TransformerType::Append,
            Transformer::Add(_) => TransformerType::Add,
            Transformer::Subtract(_) => TransformerType::Subtract,
        }
    }
}

impl Transform for Transformer {
    fn apply(&self, row: &mut [Cell]) -> RuleResult<()> {
        match self {
            Transformer::Replace(t) => t.apply(row),
            Transformer::Append(t) => t.apply(row),
            Transformer::Add(t) => t.apply(row),
            Transformer::Subtract(t) => t.apply(row),
        }
    }
}

impl From<Replace> for Transformer {
    fn from(t: Replace) -> Self {
        Transformer::Replace(t)
    }
}

impl From<Append> for Transformer {
    fn from(t: Append) -> Self {
        Transformer::Append(t)
    }
}

impl From<Add> for Transformer {
    fn from(t: Add) -> Self {
        Transformer::Add(t)
    }
}

impl From<Subtract> for Transformer {
    fn from(t: Subtract) -> Self {
        Transformer::Subtract(t)
    }
}

// =============================================================================
// Registry entries
// =============================================================================

/// The transformer variants a description can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformerType {
    Replace,
    Append,
    Add,
    Subtract,
}

impl RuleKind for TransformerType {
    type Rule = Transformer;

    const ALL: &'static [Self] = &[
        TransformerType::Replace,
        TransformerType::Append,
        TransformerType::Add,
        TransformerType::Subtract,
    ];

    fn tag(&self) -> &'static str {
        match self {
            TransformerType::Replace => "replace",
            TransformerType::Append => "append",
            TransformerType::Add => "add",
            TransformerType::Subtract => "subtract",
        }
    }

    fn required_fields(&self) -> &'static [FieldType] {
        &[FieldType::ColumnNumber, FieldType::Value]
    }

    fn construct(&self, fields: &RequiredFields<'_>) -> RuleResult<Transformer> {
        Ok(match self {
            TransformerType::Replace => Replace::new(fields.column_number()?, fields.cell()?).into(),
            TransformerType::Append => Append::new(fields.column_number()?, fields.cell()?).into(),
            TransformerType::Add => Add::new(fields.column_number()?, fields.number()?).into(),
            TransformerType::Subtract => {
                Subtract::new(fields.column_number()?, fields.number()?).into()
            }
        })
    }

    fn registry() -> &'static Registry<Self> {
        &TRANSFORMER_REGISTRY
    }
}

//! Rule model: conditionals, transformers and the description parser.
//!
//! This module provides:
//! - `conditional`: predicates deciding whether a row is adjusted
//! - `transformer`: in-place mutations of a row's cells
//! - [`Registry`]: the fixed tag → variant table of each rule family
//! - [`parse_rules`]: turns declarative descriptions into typed rules
//!
//! ## Usage Flow
//!
//! ```text
//! JSON descriptions → parse_rules (registry lookup, required fields) → Vec<Conditional>/Vec<Transformer>
//! ```
//!
//! ## Example
//!
//! ```rust
//! use csvadjust::rules::{Conditional, Evaluate, RuleDescription};
//! use csvadjust::Cell;
//! use serde_json::json;
//!
//! let descriptions: Vec<RuleDescription> = serde_json::from_value(json!([
//!     {"type": "columnequals", "columnnumber": 2, "value": "Blue"}
//! ]))
//! .unwrap();
//!
//! let conditionals = Conditional::parse_all(&descriptions).unwrap();
//! let row = vec![Cell::from("Red"), Cell::from("Green"), Cell::from("Blue")];
//! assert!(conditionals[0].evaluate(&row).unwrap());
//! ```

pub mod conditional;
pub mod transformer;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

use crate::error::{RuleError, RuleResult};
use crate::models::{Cell, FieldType, Number};

pub use conditional::{
    ColumnContains, ColumnEquals, Conditional, ConditionalType, Evaluate, RowContains,
};
pub use transformer::{Add, Append, Replace, Subtract, Transform, Transformer, TransformerType};

/// Key holding the rule's type tag in a description.
pub const TYPE_KEY: &str = "type";

// =============================================================================
// Rule Description
// =============================================================================

/// Declarative form of a rule as read from configuration.
///
/// `{ "type": "<tag>", "<fieldname>": <value>, ... }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleDescription(Map<String, Value>);

impl RuleDescription {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// The `type` tag, if present and a string.
    pub fn type_tag(&self) -> Option<&str> {
        self.0.get(TYPE_KEY).and_then(Value::as_str)
    }

    /// Raw value of a named field.
    pub fn get(&self, field: FieldType) -> Option<&Value> {
        self.0.get(field.json_name())
    }

    /// Names of fields other than `type`.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str).filter(|k| *k != TYPE_KEY)
    }

    /// Lowercase every key and the `type` tag.
    pub fn normalized(self) -> Self {
        let fields = self
            .0
            .into_iter()
            .map(|(key, value)| {
                let key = key.to_lowercase();
                let value = match value {
                    Value::String(tag) if key == TYPE_KEY => Value::String(tag.to_lowercase()),
                    other => other,
                };
                (key, value)
            })
            .collect();
        Self(fields)
    }
}

impl From<Map<String, Value>> for RuleDescription {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

// =============================================================================
// Required Fields
// =============================================================================

/// Values of a description's required fields, in required-field order.
#[derive(Debug)]
pub struct RequiredFields<'a> {
    rule: &'static str,
    values: Vec<(FieldType, &'a Value)>,
}

impl<'a> RequiredFields<'a> {
    /// Collect the fields `kind` requires, failing on the first absent one.
    pub fn collect<K: RuleKind>(kind: K, description: &'a RuleDescription) -> RuleResult<Self> {
        let rule = kind.tag();
        let values = kind
            .required_fields()
            .iter()
            .map(|&field| {
                description
                    .get(field)
                    .map(|value| (field, value))
                    .ok_or(RuleError::MissingRequiredField {
                        field: field.json_name(),
                        rule,
                    })
            })
            .collect::<RuleResult<Vec<_>>>()?;

        Ok(Self { rule, values })
    }

    fn raw(&self, field: FieldType) -> RuleResult<&'a Value> {
        self.values
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, value)| *value)
            .ok_or(RuleError::MissingRequiredField {
                field: field.json_name(),
                rule: self.rule,
            })
    }

    fn invalid(&self, field: FieldType, reason: impl Into<String>) -> RuleError {
        RuleError::InvalidField {
            field: field.json_name(),
            rule: self.rule,
            reason: reason.into(),
        }
    }

    /// `columnnumber` as a zero-based index.
    pub fn column_number(&self) -> RuleResult<usize> {
        let raw = self.raw(FieldType::ColumnNumber)?;
        raw.as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                self.invalid(
                    FieldType::ColumnNumber,
                    format!("expected a non-negative integer, got {}", raw),
                )
            })
    }

    /// `value` as a cell (string or number).
    pub fn cell(&self) -> RuleResult<Cell> {
        let raw = self.raw(FieldType::Value)?;
        Cell::from_json(raw).ok_or_else(|| {
            self.invalid(
                FieldType::Value,
                format!("expected a string or a number, got {}", raw),
            )
        })
    }

    /// `value` as a numeric operand.
    pub fn number(&self) -> RuleResult<Number> {
        let raw = self.raw(FieldType::Value)?;
        Number::from_json(raw).ok_or_else(|| {
            self.invalid(FieldType::Value, format!("expected a number, got {}", raw))
        })
    }
}

// =============================================================================
// Rule Kinds and Registry
// =============================================================================

/// A closed family of rule variants (conditional types, transformer types).
pub trait RuleKind: Copy + fmt::Debug + Sized + Send + Sync + 'static {
    /// The rule object this family constructs.
    type Rule;

    /// Every variant, in declaration order.
    const ALL: &'static [Self];

    /// Identifier used as `type` tag in descriptions.
    fn tag(&self) -> &'static str;

    /// Fields this variant needs, in construction order.
    fn required_fields(&self) -> &'static [FieldType];

    /// Build the rule from its collected required fields.
    fn construct(&self, fields: &RequiredFields<'_>) -> RuleResult<Self::Rule>;

    /// The family's registry.
    fn registry() -> &'static Registry<Self>;
}

/// Fixed mapping from tag to rule variant.
#[derive(Debug)]
pub struct Registry<K: 'static> {
    by_tag: HashMap<&'static str, K>,
    tags: Vec<&'static str>,
}

impl<K: RuleKind> Registry<K> {
    /// Build the registry from every variant of the family.
    ///
    /// # Panics
    /// If two variants share a tag.
    pub fn build() -> Self {
        let mut by_tag = HashMap::with_capacity(K::ALL.len());
        let mut tags = Vec::with_capacity(K::ALL.len());

        for &kind in K::ALL {
            let tag = kind.tag();
            if let Some(existing) = by_tag.insert(tag, kind) {
                panic!("duplicate rule tag '{}' for {:?} and {:?}", tag, existing, kind);
            }
            tags.push(tag);
        }

        Self { by_tag, tags }
    }

    /// Exact, case-sensitive lookup.
    pub fn lookup(&self, tag: &str) -> Option<K> {
        self.by_tag.get(tag).copied()
    }

    /// All tags in declaration order.
    pub fn tags(&self) -> &[&'static str] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

pub(crate) static CONDITIONAL_REGISTRY: Lazy<Registry<ConditionalType>> =
    Lazy::new(Registry::build);

pub(crate) static TRANSFORMER_REGISTRY: Lazy<Registry<TransformerType>> =
    Lazy::new(Registry::build);

// =============================================================================
// Parser
// =============================================================================

/// Parse a batch of descriptions into rules of family `K`.
///
/// Output order matches input order. The first failing description aborts
/// the whole batch.
pub fn parse_rules<K: RuleKind>(descriptions: &[RuleDescription]) -> RuleResult<Vec<K::Rule>> {
    let registry = K::registry();
    let mut rules = Vec::with_capacity(descriptions.len());

    for (index, description) in descriptions.iter().enumerate() {
        let tag = description
            .type_tag()
            .ok_or(RuleError::MissingTypeTag { index })?;

        let kind = registry
            .lookup(tag)
            .ok_or_else(|| RuleError::UnknownRuleType {
                tag: tag.to_string(),
                valid: registry.tags().to_vec(),
            })?;

        let fields = RequiredFields::collect(kind, description)?;

        for extra in description
            .field_names()
            .filter(|name| !kind.required_fields().iter().any(|f| f.json_name() == *name))
        {
            tracing::debug!(rule = tag, field = extra, "ignoring unused rule field");
        }

        rules.push(kind.construct(&fields)?);
    }

    tracing::debug!(count = rules.len(), "parsed rule batch");
    Ok(rules)
}

/// A human-readable table of every rule tag and its required fields.
pub fn rules_description() -> String {
    let mut out = String::from("| family | type | required fields |\n|---|---|---|\n");

    for kind in ConditionalType::ALL {
        out.push_str(&format!(
            "| conditional | {} | {} |\n",
            kind.tag(),
            field_list(kind.required_fields())
        ));
    }
    for kind in TransformerType::ALL {
        out.push_str(&format!(
            "| transformer | {} | {} |\n",
            kind.tag(),
            field_list(kind.required_fields())
        ));
    }

    out
}

fn field_list(fields: &[FieldType]) -> String {
    fields
        .iter()
        .map(FieldType::json_name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptions(value: Value) -> Vec<RuleDescription> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_registries_are_complete() {
        assert_eq!(CONDITIONAL_REGISTRY.len(), 3);
        assert_eq!(
            CONDITIONAL_REGISTRY.tags(),
            ["columnequals", "columncontains", "rowcontains"]
        );
        assert_eq!(TRANSFORMER_REGISTRY.len(), 4);
        assert_eq!(
            TRANSFORMER_REGISTRY.tags(),
            ["replace", "append", "add", "subtract"]
        );
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Clashing {
        First,
        Second,
    }

    static CLASHING_REGISTRY: Lazy<Registry<Clashing>> = Lazy::new(Registry::build);

    impl RuleKind for Clashing {
        type Rule = ();

        const ALL: &'static [Self] = &[Clashing::First, Clashing::Second];

        fn tag(&self) -> &'static str {
            "same"
        }

        fn required_fields(&self) -> &'static [FieldType] {
            &[]
        }

        fn construct(&self, _fields: &RequiredFields<'_>) -> RuleResult<()> {
            Ok(())
        }

        fn registry() -> &'static Registry<Self> {
            &CLASHING_REGISTRY
        }
    }

    #[test]
    #[should_panic(expected = "duplicate rule tag 'same'")]
    fn test_duplicate_tag_panics_on_build() {
        Registry::<Clashing>::build();
    }

    #[test]
    #[should_panic(expected = "duplicate rule tag 'same'")]
    fn test_duplicate_tag_panics_on_first_parse() {
        let _ = parse_rules::<Clashing>(&[]);
    }

    #[test]
    fn test_lookup_is_exact() {
        assert_eq!(
            CONDITIONAL_REGISTRY.lookup("rowcontains"),
            Some(ConditionalType::RowContains)
        );
        assert_eq!(CONDITIONAL_REGISTRY.lookup("RowContains"), None);
        assert_eq!(TRANSFORMER_REGISTRY.lookup("multiply"), None);
    }

    #[test]
    fn test_each_variant_builds_from_exactly_its_required_fields() {
        fn sample(field: FieldType) -> Value {
            match field {
                FieldType::ColumnNumber => json!(1),
                FieldType::Value => json!(3),
            }
        }

        for kind in ConditionalType::ALL {
            let mut fields = Map::new();
            fields.insert(TYPE_KEY.into(), json!(kind.tag()));
            for &f in kind.required_fields() {
                fields.insert(f.json_name().into(), sample(f));
            }
            let parsed = parse_rules::<ConditionalType>(&[RuleDescription::new(fields)]);
            assert!(parsed.is_ok(), "{:?}: {:?}", kind, parsed);
        }

        for kind in TransformerType::ALL {
            let mut fields = Map::new();
            fields.insert(TYPE_KEY.into(), json!(kind.tag()));
            for &f in kind.required_fields() {
                fields.insert(f.json_name().into(), sample(f));
            }
            let parsed = parse_rules::<TransformerType>(&[RuleDescription::new(fields)]);
            assert!(parsed.is_ok(), "{:?}: {:?}", kind, parsed);
        }
    }

    #[test]
    fn test_parse_preserves_order() {
        let parsed = parse_rules::<ConditionalType>(&descriptions(json!([
            {"type": "columnequals", "columnnumber": 2, "value": "whatever"},
            {"type": "columncontains", "columnnumber": 7, "value": 9.2},
            {"type": "rowcontains", "value": "Mango"}
        ])))
        .unwrap();

        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].kind(), ConditionalType::ColumnEquals);
        assert_eq!(parsed[1].kind(), ConditionalType::ColumnContains);
        assert_eq!(parsed[2].kind(), ConditionalType::RowContains);
    }

    #[test]
    fn test_unknown_type_aborts_batch() {
        let err = parse_rules::<TransformerType>(&descriptions(json!([
            {"type": "replace", "columnnumber": 0, "value": "x"},
            {"type": "multiply", "columnnumber": 0, "value": 2}
        ])))
        .unwrap_err();

        assert_eq!(
            err,
            RuleError::UnknownRuleType {
                tag: "multiply".into(),
                valid: vec!["replace", "append", "add", "subtract"],
            }
        );
    }

    #[test]
    fn test_conditional_tag_is_unknown_to_transformers() {
        let err = parse_rules::<TransformerType>(&descriptions(json!([
            {"type": "columnequals", "columnnumber": 0, "value": "x"}
        ])))
        .unwrap_err();
        assert!(matches!(err, RuleError::UnknownRuleType { .. }));
    }

    #[test]
    fn test_missing_required_field() {
        let err = parse_rules::<ConditionalType>(&descriptions(json!([
            {"type": "columnequals", "columnnumber": 2}
        ])))
        .unwrap_err();

        assert_eq!(
            err,
            RuleError::MissingRequiredField {
                field: "value",
                rule: "columnequals",
            }
        );
    }

    #[test]
    fn test_missing_type_tag() {
        let err = parse_rules::<ConditionalType>(&descriptions(json!([
            {"type": "rowcontains", "value": "a"},
            {"value": "b"}
        ])))
        .unwrap_err();
        assert_eq!(err, RuleError::MissingTypeTag { index: 1 });

        let err = parse_rules::<ConditionalType>(&descriptions(json!([
            {"type": 4, "value": "b"}
        ])))
        .unwrap_err();
        assert_eq!(err, RuleError::MissingTypeTag { index: 0 });
    }

    #[test]
    fn test_invalid_column_number() {
        for bad in [json!(-1), json!("2"), json!(1.5)] {
            let err = parse_rules::<TransformerType>(&[RuleDescription::new(
                json!({"type": "replace", "columnnumber": bad, "value": "x"})
                    .as_object()
                    .unwrap()
                    .clone(),
            )])
            .unwrap_err();
            assert!(
                matches!(err, RuleError::InvalidField { field: "columnnumber", rule: "replace", .. }),
                "{:?}",
                err
            );
        }
    }

    #[test]
    fn test_arithmetic_operand_must_be_numeric() {
        let err = parse_rules::<TransformerType>(&descriptions(json!([
            {"type": "add", "columnnumber": 0, "value": "6"}
        ])))
        .unwrap_err();
        assert!(matches!(
            err,
            RuleError::InvalidField { field: "value", rule: "add", .. }
        ));
    }

    #[test]
    fn test_value_must_be_string_or_number() {
        let err = parse_rules::<ConditionalType>(&descriptions(json!([
            {"type": "rowcontains", "value": [1, 2]}
        ])))
        .unwrap_err();
        assert!(matches!(
            err,
            RuleError::InvalidField { field: "value", rule: "rowcontains", .. }
        ));
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let parsed = parse_rules::<ConditionalType>(&descriptions(json!([
            {"type": "rowcontains", "columnnumber": 4, "value": "urp", "note": "legacy"}
        ])))
        .unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_normalized_lowercases_keys_and_tag() {
        let description: RuleDescription = serde_json::from_value(json!(
            {"Type": "ColumnEquals", "ColumnNumber": 1, "Value": "Green"}
        ))
        .unwrap();
        let normalized = description.normalized();

        assert_eq!(normalized.type_tag(), Some("columnequals"));
        assert_eq!(normalized.get(FieldType::ColumnNumber), Some(&json!(1)));
        // Values other than the tag keep their case.
        assert_eq!(normalized.get(FieldType::Value), Some(&json!("Green")));
    }

    #[test]
    fn test_rules_description_lists_every_tag() {
        let table = rules_description();
        for tag in CONDITIONAL_REGISTRY
            .tags()
            .iter()
            .chain(TRANSFORMER_REGISTRY.tags())
        {
            assert!(table.contains(tag), "missing {}", tag);
        }
        assert!(table.contains("| rowcontains | value |"));
    }
}

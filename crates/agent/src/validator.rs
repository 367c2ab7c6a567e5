//! Structural validation of candidates against a schema

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::candidate::CandidateObject;
use crate::schema::{FieldType, Schema};

/// Which rule a value breaks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ViolationKind {
    MissingRequired,
    TypeMismatch { expected: String, found: String },
    EnumOutOfRange { value: String },
    MalformedNestedObject { detail: String },
}

/// A broken rule on a named field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Top-level field name; list elements are reported as `field[i]`
    pub field: String,
    pub kind: ViolationKind,
}

impl Violation {
    fn new(field: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::MissingRequired => write!(f, "{}: required field is unset", self.field),
            ViolationKind::TypeMismatch { expected, found } => {
                write!(f, "{}: expected {}, found {}", self.field, expected, found)
            }
            ViolationKind::EnumOutOfRange { value } => {
                write!(f, "{}: '{}' is not an allowed value", self.field, value)
            }
            ViolationKind::MalformedNestedObject { detail } => {
                write!(f, "{}: malformed object ({})", self.field, detail)
            }
        }
    }
}

/// Check every schema field of `candidate`
pub fn validate(schema: &Schema, candidate: &CandidateObject) -> Vec<Violation> {
    let mut violations = Vec::new();
    for field in &schema.fields {
        match candidate.get(&field.name) {
            None if field.required => {
                violations.push(Violation::new(&field.name, ViolationKind::MissingRequired))
            }
            None => {}
            Some(value) => violations.extend(check_value(&field.name, &field.field_type, value)),
        }
    }
    violations
}

/// Check a single value against a field type
pub fn check_value(field: &str, field_type: &FieldType, value: &Value) -> Vec<Violation> {
    match (field_type, value) {
        (FieldType::String, Value::String(_))
        | (FieldType::Number, Value::Number(_))
        | (FieldType::Boolean, Value::Bool(_)) => Vec::new(),
        (FieldType::Enum { values }, Value::String(s)) => {
            if values.iter().any(|v| v == s) {
                Vec::new()
            } else {
                vec![Violation::new(
                    field,
                    ViolationKind::EnumOutOfRange { value: s.clone() },
                )]
            }
        }
        (FieldType::Object { fields }, Value::Object(map)) => {
            let problems: Vec<String> = fields
                .iter()
                .flat_map(|nested| match map.get(&nested.name) {
                    None | Some(Value::Null) if nested.required => {
                        vec![format!("missing '{}'", nested.name)]
                    }
                    None | Some(Value::Null) => Vec::new(),
                    Some(inner) => check_value(&nested.name, &nested.field_type, inner)
                        .into_iter()
                        .map(|v| v.to_string())
                        .collect(),
                })
                .collect();

            if problems.is_empty() {
                Vec::new()
            } else {
                vec![Violation::new(
                    field,
                    ViolationKind::MalformedNestedObject {
                        detail: problems.join("; "),
                    },
                )]
            }
        }
        (FieldType::List { items }, Value::Array(elements)) => elements
            .iter()
            .enumerate()
            .flat_map(|(i, element)| check_value(&format!("{}[{}]", field, i), items, element))
            .collect(),
        (expected, found) => vec![Violation::new(
            field,
            ViolationKind::TypeMismatch {
                expected: expected.label(),
                found: json_kind(found).to_string(),
            },
        )],
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

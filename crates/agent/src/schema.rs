//! Target schema description
//!
//! A schema is a list of named fields, each with a [`FieldType`]. Schemas
//! arrive either in the native encoding:
//!
//! ```json
//! {"fields": [{"name": "founded_year", "type": "number", "required": true}]}
//! ```
//!
//! or as a JSON Schema object (`{"type": "object", "properties": {...}}`).
//! [`Schema::validate`] must pass before a schema is used for a run.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Schema errors. All of these are fatal for a run.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("schema has no fields")]
    Empty,

    #[error("duplicate field name: {0}")]
    DuplicateField(String),

    #[error("field with empty name under '{0}'")]
    EmptyFieldName(String),

    #[error("enum field '{0}' has no values")]
    EmptyEnum(String),

    #[error("enum field '{field}' lists '{value}' more than once")]
    DuplicateEnumValue { field: String, value: String },

    #[error("object field '{0}' has no nested fields")]
    EmptyObject(String),

    #[error("unsupported type for '{field}': {found}")]
    UnsupportedType { field: String, found: String },

    #[error("schema is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Field type, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Enum { values: Vec<String> },
    Object { fields: Vec<FieldSpec> },
    List { items: Box<FieldType> },
}

impl FieldType {
    /// Short name used in violations and prompts
    pub fn label(&self) -> String {
        match self {
            FieldType::String => "string".to_string(),
            FieldType::Number => "number".to_string(),
            FieldType::Boolean => "boolean".to_string(),
            FieldType::Enum { values } => format!("one of [{}]", values.join(", ")),
            FieldType::Object { .. } => "object".to_string(),
            FieldType::List { items } => format!("list of {}", items.label()),
        }
    }
}

/// One named field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Description if present, otherwise the name with underscores spelled out
    pub fn hint(&self) -> String {
        match &self.description {
            Some(description) if !description.trim().is_empty() => description.trim().to_string(),
            _ => self.name.replace(['_', '-'], " "),
        }
    }
}

/// Declarative description of the object a run should produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Parse either the native encoding or a JSON Schema object
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        if value.get("fields").is_some() {
            return Ok(serde_json::from_value(value.clone())?);
        }
        Self::from_json_schema(value)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Import a JSON Schema `object` definition
    pub fn from_json_schema(value: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            fields: fields_from_json_schema("$", value)?,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Check the schema itself is well formed
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::Empty);
        }
        validate_fields("$", &self.fields)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.fields {
            write!(f, "- {} ({}", field.name, field.field_type.label())?;
            if field.required {
                write!(f, ", required")?;
            }
            write!(f, ")")?;
            if let Some(description) = &field.description {
                write!(f, ": {}", description)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn validate_fields(parent: &str, fields: &[FieldSpec]) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for field in fields {
        if field.name.trim().is_empty() {
            return Err(SchemaError::EmptyFieldName(parent.to_string()));
        }
        let path = if parent == "$" {
            field.name.clone()
        } else {
            format!("{}.{}", parent, field.name)
        };
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::DuplicateField(path));
        }
        validate_type(&path, &field.field_type)?;
    }
    Ok(())
}

fn validate_type(path: &str, field_type: &FieldType) -> Result<(), SchemaError> {
    match field_type {
        FieldType::Enum { values } => {
            if values.is_empty() {
                return Err(SchemaError::EmptyEnum(path.to_string()));
            }
            let mut seen = HashSet::new();
            for value in values {
                if !seen.insert(value.to_lowercase()) {
                    return Err(SchemaError::DuplicateEnumValue {
                        field: path.to_string(),
                        value: value.clone(),
                    });
                }
            }
            Ok(())
        }
        FieldType::Object { fields } => {
            if fields.is_empty() {
                return Err(SchemaError::EmptyObject(path.to_string()));
            }
            validate_fields(path, fields)
        }
        FieldType::List { items } => validate_type(&format!("{}[]", path), items),
        FieldType::String | FieldType::Number | FieldType::Boolean => Ok(()),
    }
}

fn fields_from_json_schema(path: &str, value: &Value) -> Result<Vec<FieldSpec>, SchemaError> {
    let properties = value
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| SchemaError::UnsupportedType {
            field: path.to_string(),
            found: "object without properties".to_string(),
        })?;

    let required: HashSet<&str> = value
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, property)| {
            let field_path = if path == "$" {
                name.clone()
            } else {
                format!("{}.{}", path, name)
            };
            Ok(FieldSpec {
                name: name.clone(),
                field_type: type_from_json_schema(&field_path, property)?,
                required: required.contains(name.as_str()),
                description: property
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        })
        .collect()
}

fn type_from_json_schema(path: &str, property: &Value) -> Result<FieldType, SchemaError> {
    if let Some(values) = property.get("enum").and_then(Value::as_array) {
        return Ok(FieldType::Enum {
            values: values
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        });
    }

    let declared = property.get("type").and_then(Value::as_str).unwrap_or("");
    match declared {
        "string" => Ok(FieldType::String),
        "number" | "integer" => Ok(FieldType::Number),
        "boolean" => Ok(FieldType::Boolean),
        "object" => Ok(FieldType::Object {
            fields: fields_from_json_schema(path, property)?,
        }),
        "array" => {
            let items = property.get("items").unwrap_or(&Value::Null);
            Ok(FieldType::List {
                items: Box::new(type_from_json_schema(&format!("{}[]", path), items)?),
            })
        }
        other => Err(SchemaError::UnsupportedType {
            field: path.to_string(),
            found: if other.is_empty() {
                "missing type".to_string()
            } else {
                other.to_string()
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn company() -> Schema {
        Schema::new(vec![
            FieldSpec::new("name", FieldType::String).required(),
            FieldSpec::new("founded_year", FieldType::Number).required(),
            FieldSpec::new("public", FieldType::Boolean),
        ])
    }

    #[test]
    fn test_native_encoding() {
        let value = json!({
            "fields": [
                {"name": "name", "type": "string", "required": true},
                {"name": "stage", "type": "enum", "values": ["seed", "series_a"]},
                {"name": "tags", "type": "list", "items": {"type": "string"}},
                {"name": "hq", "type": "object", "fields": [{"name": "city", "type": "string"}]}
            ]
        });

        let schema = Schema::from_value(&value).unwrap();
        assert_eq!(schema.fields.len(), 4);
        assert!(schema.field("name").unwrap().required);
        assert!(!schema.field("stage").unwrap().required);
        assert_eq!(
            schema.field("tags").unwrap().field_type,
            FieldType::List {
                items: Box::new(FieldType::String)
            }
        );
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_json_schema_import() {
        let value = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Legal name"},
                "employees": {"type": "integer"},
                "status": {"type": "string", "enum": ["active", "defunct"]},
                "founders": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["name"]
        });

        let schema = Schema::from_value(&value).unwrap();
        let name = schema.field("name").unwrap();
        assert!(name.required);
        assert_eq!(name.description.as_deref(), Some("Legal name"));
        assert_eq!(schema.field("employees").unwrap().field_type, FieldType::Number);
        assert!(matches!(
            schema.field("status").unwrap().field_type,
            FieldType::Enum { .. }
        ));
        assert_eq!(schema.required_fields().count(), 1);
    }

    #[test]
    fn test_json_schema_unsupported_type() {
        let value = json!({"type": "object", "properties": {"x": {"type": "null"}}});
        let err = Schema::from_value(&value).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedType { .. }));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let schema = Schema::new(vec![
            FieldSpec::new("name", FieldType::String),
            FieldSpec::new("name", FieldType::Number),
        ]);
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::DuplicateField(name)) if name == "name"
        ));
    }

    #[test]
    fn test_validate_rejects_nested_duplicates() {
        let schema = Schema::new(vec![FieldSpec::new(
            "hq",
            FieldType::Object {
                fields: vec![
                    FieldSpec::new("city", FieldType::String),
                    FieldSpec::new("city", FieldType::String),
                ],
            },
        )]);
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::DuplicateField(path)) if path == "hq.city"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        assert!(matches!(Schema::default().validate(), Err(SchemaError::Empty)));

        let empty_enum = Schema::new(vec![FieldSpec::new(
            "stage",
            FieldType::Enum { values: vec![] },
        )]);
        assert!(matches!(empty_enum.validate(), Err(SchemaError::EmptyEnum(_))));

        let repeated = Schema::new(vec![FieldSpec::new(
            "stage",
            FieldType::Enum {
                values: vec!["Seed".to_string(), "seed".to_string()],
            },
        )]);
        assert!(matches!(
            repeated.validate(),
            Err(SchemaError::DuplicateEnumValue { .. })
        ));

        let blank = Schema::new(vec![FieldSpec::new(" ", FieldType::String)]);
        assert!(matches!(blank.validate(), Err(SchemaError::EmptyFieldName(_))));

        let hollow = Schema::new(vec![FieldSpec::new(
            "hq",
            FieldType::List {
                items: Box::new(FieldType::Object { fields: vec![] }),
            },
        )]);
        assert!(matches!(hollow.validate(), Err(SchemaError::EmptyObject(p)) if p == "hq[]"));
    }

    #[test]
    fn test_display_and_hint() {
        let text = company().to_string();
        assert!(text.contains("- name (string, required)"));
        assert!(text.contains("- public (boolean)"));

        let field = FieldSpec::new("founded_year", FieldType::Number);
        assert_eq!(field.hint(), "founded year");
        assert_eq!(field.describe("Year of founding").hint(), "Year of founding");
    }
}

//! Candidate objects produced by extraction

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::schema::Schema;

/// Value of one field plus the evidence backing it.
///
/// `value == None` means unset. An unset field may still carry `sources`
/// when it is `contested`: those are the items that disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FieldValue {
    pub value: Option<Value>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub contested: bool,
}

impl FieldValue {
    pub fn set(value: Value, sources: Vec<String>) -> Self {
        Self {
            value: Some(value),
            sources,
            contested: false,
        }
    }

    pub fn contested(sources: Vec<String>) -> Self {
        Self {
            value: None,
            sources,
            contested: true,
        }
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

/// Best-effort structured result of one extraction pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CandidateObject {
    pub fields: BTreeMap<String, FieldValue>,
}

impl CandidateObject {
    /// Every schema field present and unset
    pub fn unset(schema: &Schema) -> Self {
        Self {
            fields: schema
                .fields
                .iter()
                .map(|f| (f.name.clone(), FieldValue::default()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).and_then(|f| f.value.as_ref())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn sources(&self, name: &str) -> &[String] {
        self.fields
            .get(name)
            .map(|f| f.sources.as_slice())
            .unwrap_or(&[])
    }

    pub fn set_count(&self) -> usize {
        self.fields.values().filter(|f| f.is_set()).count()
    }

    /// Required schema fields that are currently unset
    pub fn unset_required(&self, schema: &Schema) -> BTreeSet<String> {
        schema
            .required_fields()
            .filter(|f| !self.is_set(&f.name))
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn contested_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, f)| f.contested)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Every source id cited by any field
    pub fn cited_sources(&self) -> BTreeSet<&str> {
        self.fields
            .values()
            .flat_map(|f| f.sources.iter().map(String::as_str))
            .collect()
    }

    /// Plain JSON object, unset fields as `null`
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, f)| (name.clone(), f.value.clone().unwrap_or(Value::Null)))
            .collect();
        Value::Object(map)
    }
}

//! Turns evidence into a candidate object

use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::candidate::{CandidateObject, FieldValue};
use crate::evidence::EvidenceItem;
use crate::reasoning::{ExtractionDraft, ExtractionRequest, Reasoner, ReasoningError};
use crate::schema::{FieldType, Schema};
use crate::validator::check_value;

/// Extraction failed after every retry
#[derive(Error, Debug)]
#[error("extraction failed after {attempts} attempt(s): {source}")]
pub struct ExtractionError {
    pub attempts: u32,
    #[source]
    pub source: ReasoningError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Doubled after every failed attempt
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_backoff: Duration::ZERO,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff: Duration::from_millis(500),
        }
    }
}

pub struct Extractor<R: Reasoner> {
    reasoner: Arc<R>,
}

impl<R: Reasoner> Extractor<R> {
    pub fn new(reasoner: Arc<R>) -> Self {
        Self { reasoner }
    }

    /// One extraction pass. With no evidence the result is all-unset and
    /// the reasoner is not consulted.
    pub async fn extract(
        &self,
        request: ExtractionRequest<'_>,
    ) -> Result<CandidateObject, ReasoningError> {
        if request.evidence.is_empty() {
            debug!("No evidence, skipping extraction call");
            return Ok(CandidateObject::unset(request.schema));
        }
        let draft = self.reasoner.extract(request).await?;
        Ok(assemble(request.schema, request.evidence, draft))
    }

    pub async fn extract_with_retry(
        &self,
        request: ExtractionRequest<'_>,
        policy: &RetryPolicy,
    ) -> Result<CandidateObject, ExtractionError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.extract(request).await {
                Ok(candidate) => return Ok(candidate),
                Err(e) if attempt > policy.max_retries => {
                    return Err(ExtractionError {
                        attempts: attempt,
                        source: e,
                    })
                }
                Err(e) => {
                    let delay = policy.backoff(attempt);
                    warn!(
                        "Extraction attempt {} failed: {}; retrying in {:?}",
                        attempt, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Build a candidate from reasoner proposals.
///
/// Proposals for unknown fields, proposals whose sources are not in
/// `evidence`, and values that do not fit the field type are discarded.
/// A field with disagreeing proposals is left unset and marked contested.
pub fn assemble(
    schema: &Schema,
    evidence: &[EvidenceItem],
    draft: ExtractionDraft,
) -> CandidateObject {
    let known: HashSet<&str> = evidence.iter().map(|e| e.source_id.as_str()).collect();
    let mut grouped: BTreeMap<String, Vec<(Value, Vec<String>)>> = BTreeMap::new();

    for proposal in draft.proposals {
        let Some(spec) = schema.field(&proposal.field) else {
            debug!("Dropping proposal for unknown field {}", proposal.field);
            continue;
        };
        if proposal.value.is_null() {
            continue;
        }

        let mut sources: Vec<String> = Vec::new();
        for source in proposal.sources {
            if known.contains(source.as_str()) && !sources.contains(&source) {
                sources.push(source);
            }
        }
        if sources.is_empty() {
            debug!("Dropping unsourced proposal for {}", spec.name);
            continue;
        }

        let value = coerce(&spec.field_type, proposal.value);
        if !check_value(&spec.name, &spec.field_type, &value).is_empty() {
            debug!("Dropping ill-typed proposal for {}", spec.name);
            continue;
        }

        grouped
            .entry(spec.name.clone())
            .or_default()
            .push((value, sources));
    }

    let mut candidate = CandidateObject::unset(schema);
    for (name, proposals) in grouped {
        let first = &proposals[0].0;
        let agree = proposals.iter().all(|(v, _)| values_agree(first, v));

        let mut sources: Vec<String> = Vec::new();
        for (_, cited) in &proposals {
            for source in cited {
                if !sources.contains(source) {
                    sources.push(source.clone());
                }
            }
        }

        let field = if agree {
            FieldValue::set(first.clone(), sources)
        } else {
            debug!("Conflicting values for {}", name);
            FieldValue::contested(sources)
        };
        candidate.fields.insert(name, field);
    }
    candidate
}

/// Lenient conversion toward the declared type. Values that cannot be
/// converted are returned unchanged for the type check to reject.
pub fn coerce(field_type: &FieldType, value: Value) -> Value {
    match (field_type, value) {
        (FieldType::Number, Value::String(s)) => parse_number(&s).unwrap_or(Value::String(s)),
        (FieldType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Value::Bool(true),
            "false" | "no" => Value::Bool(false),
            _ => Value::String(s),
        },
        (FieldType::String, Value::Number(n)) => Value::String(n.to_string()),
        (FieldType::Enum { values }, Value::String(s)) => {
            let wanted = s.trim();
            values
                .iter()
                .find(|v| v.eq_ignore_ascii_case(wanted))
                .map(|v| Value::String(v.clone()))
                .unwrap_or(Value::String(s))
        }
        // JSON Schema enums of numbers or booleans are held as their string form
        (FieldType::Enum { values }, scalar @ (Value::Number(_) | Value::Bool(_))) => {
            let wanted = scalar.to_string();
            values
                .iter()
                .find(|v| **v == wanted)
                .map(|v| Value::String(v.clone()))
                .unwrap_or(scalar)
        }
        (FieldType::Object { fields }, Value::Object(mut map)) => {
            for nested in fields {
                if let Some(inner) = map.remove(&nested.name) {
                    map.insert(nested.name.clone(), coerce(&nested.field_type, inner));
                }
            }
            Value::Object(map)
        }
        (FieldType::List { items }, Value::Array(elements)) => Value::Array(
            elements
                .into_iter()
                .map(|element| coerce(items, element))
                .collect(),
        ),
        (FieldType::List { items }, scalar) => Value::Array(vec![coerce(items, scalar)]),
        (_, value) => value,
    }
}

fn parse_number(text: &str) -> Option<Value> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if let Ok(i) = cleaned.parse::<i64>() {
        return Some(Value::Number(i.into()));
    }
    let f = cleaned.parse::<f64>().ok()?;
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        return Some(Value::Number((f as i64).into()));
    }
    Number::from_f64(f).map(Value::Number)
}

/// Equality that ignores case and surrounding whitespace in strings and
/// integer/float representation in numbers
pub fn values_agree(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.trim().to_lowercase() == y.trim().to_lowercase(),
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_agree(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).map(|w| values_agree(v, w)).unwrap_or(false))
        }
        _ => a == b,
    }
}

//! Scores candidates and decides whether another round is needed

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::candidate::CandidateObject;
use crate::evidence::EvidenceItem;
use crate::query;
use crate::reasoning::{CritiqueRequest, Reasoner};
use crate::schema::Schema;
use crate::validator::{Violation, ViolationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Prevents satisfaction
    Blocking,
    Warning,
}

/// A problem found with a candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Issue {
    pub fn blocking(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Blocking,
            message: message.into(),
            field: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            field: None,
        }
    }

    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Blocking => "blocking",
            Severity::Warning => "warning",
        };
        match &self.field {
            Some(field) => write!(f, "[{}] {}: {}", severity, field, self.message),
            None => write!(f, "[{}] {}", severity, self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReflectionVerdict {
    pub satisfied: bool,
    pub missing_fields: BTreeSet<String>,
    pub issues: Vec<Issue>,
    pub follow_up_queries: Vec<String>,
}

impl ReflectionVerdict {
    pub fn has_blocking(&self) -> bool {
        self.issues.iter().any(Issue::is_blocking)
    }
}

pub struct Reflector<R: Reasoner> {
    reasoner: Arc<R>,
}

impl<R: Reasoner> Reflector<R> {
    pub fn new(reasoner: Arc<R>) -> Self {
        Self { reasoner }
    }

    /// Ask the reasoner for a critique and fold it into a verdict.
    ///
    /// `notes` are issues raised earlier in the iteration, e.g. a failed
    /// extraction. If the reasoner fails the verdict is structural only.
    pub async fn reflect(
        &self,
        topic: &str,
        schema: &Schema,
        candidate: &CandidateObject,
        evidence: &[EvidenceItem],
        notes: Vec<Issue>,
    ) -> ReflectionVerdict {
        let mut issues = notes;
        let mut follow_up_queries = Vec::new();

        let request = CritiqueRequest {
            topic,
            schema,
            candidate,
            evidence,
        };
        match self.reasoner.critique(request).await {
            Ok(critique) => {
                debug!(
                    "Critique: {} issues, {} follow-ups",
                    critique.issues.len(),
                    critique.follow_up_queries.len()
                );
                issues.extend(critique.issues);
                follow_up_queries = critique.follow_up_queries;
            }
            Err(e) => {
                warn!("Critique failed, using structural verdict: {}", e);
                issues.push(Issue::warning(format!("critique unavailable: {}", e)));
            }
        }

        finalize(topic, schema, candidate, issues, follow_up_queries)
    }
}

/// Verdict built from validator output without a reasoning call
pub fn from_violations(
    topic: &str,
    schema: &Schema,
    candidate: &CandidateObject,
    violations: &[Violation],
    notes: Vec<Issue>,
) -> ReflectionVerdict {
    let mut issues = notes;
    issues.extend(
        violations
            .iter()
            .filter(|v| v.kind != ViolationKind::MissingRequired)
            .map(|v| Issue::blocking(v.to_string()).on_field(root_field(&v.field))),
    );
    finalize(topic, schema, candidate, issues, Vec::new())
}

/// Enforce verdict invariants regardless of what the reasoner said.
///
/// `missing_fields` is recomputed from the candidate, contested fields are
/// reported, and follow-ups are synthesized when fields are missing but the
/// reasoner suggested none.
pub fn finalize(
    topic: &str,
    schema: &Schema,
    candidate: &CandidateObject,
    mut issues: Vec<Issue>,
    follow_up_queries: Vec<String>,
) -> ReflectionVerdict {
    let missing_fields = candidate.unset_required(schema);

    for field in candidate.contested_fields() {
        let already_reported = issues
            .iter()
            .any(|i| i.field.as_deref() == Some(field) && i.message.contains("conflict"));
        if !already_reported {
            issues.push(
                Issue::warning(format!(
                    "sources conflict ({})",
                    candidate.sources(field).join(", ")
                ))
                .on_field(field),
            );
        }
    }

    let satisfied = missing_fields.is_empty() && !issues.iter().any(Issue::is_blocking);

    let follow_up_queries = if satisfied {
        Vec::new()
    } else {
        let mut queries = query::dedupe(follow_up_queries);
        if queries.is_empty() && !missing_fields.is_empty() {
            queries = query::follow_ups_for(topic, schema, &missing_fields);
        }
        queries
    };

    ReflectionVerdict {
        satisfied,
        missing_fields,
        issues,
        follow_up_queries,
    }
}

fn root_field(path: &str) -> &str {
    path.split('[').next().unwrap_or(path)
}

//! Reasoning collaborator used by the extractor and the reflector

pub mod llm;
pub mod prompts;

pub use llm::LlmReasoner;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::candidate::CandidateObject;
use crate::evidence::EvidenceItem;
use crate::reflector::{Issue, ReflectionVerdict};
use crate::schema::Schema;

#[derive(Error, Debug)]
pub enum ReasoningError {
    #[error("provider error: {0}")]
    Provider(#[from] enrich_provider::ProviderError),

    #[error("model did not call {0}")]
    MissingToolCall(String),

    #[error("malformed model output: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("reasoner unavailable: {0}")]
    Unavailable(String),
}

/// Inputs to one extraction pass
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub topic: &'a str,
    pub schema: &'a Schema,
    pub evidence: &'a [EvidenceItem],
    pub previous: Option<&'a CandidateObject>,
    /// Last verdict when re-extracting over unchanged evidence
    pub feedback: Option<&'a ReflectionVerdict>,
}

impl<'a> ExtractionRequest<'a> {
    pub fn new(topic: &'a str, schema: &'a Schema, evidence: &'a [EvidenceItem]) -> Self {
        Self {
            topic,
            schema,
            evidence,
            previous: None,
            feedback: None,
        }
    }
}

/// A value the reasoner proposes for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProposal {
    pub field: String,
    pub value: Value,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl FieldProposal {
    pub fn new(field: impl Into<String>, value: Value, sources: &[&str]) -> Self {
        Self {
            field: field.into(),
            value,
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Raw reasoner output before post-processing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractionDraft {
    #[serde(default)]
    pub proposals: Vec<FieldProposal>,
}

/// Inputs to a critique
#[derive(Debug, Clone, Copy)]
pub struct CritiqueRequest<'a> {
    pub topic: &'a str,
    pub schema: &'a Schema,
    pub candidate: &'a CandidateObject,
    pub evidence: &'a [EvidenceItem],
}

/// Reasoner judgement of a candidate
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Critique {
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub follow_up_queries: Vec<String>,
}

/// Non-deterministic judgement, isolated so tests can script it
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn extract(
        &self,
        request: ExtractionRequest<'_>,
    ) -> Result<ExtractionDraft, ReasoningError>;

    async fn critique(&self, request: CritiqueRequest<'_>) -> Result<Critique, ReasoningError>;
}

//! Scripted collaborators for orchestrator tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use enrich_agent::{
    Critique, CritiqueRequest, ExtractionDraft, ExtractionRequest, FieldProposal, FieldSpec,
    FieldType, RawDocument, RawToolOutput, Reasoner, ReasoningError, Schema, ToolError,
    ToolGateway, ToolRequest,
};

type ExtractFn =
    dyn Fn(&ExtractionRequest<'_>) -> Result<ExtractionDraft, ReasoningError> + Send + Sync;
type CritiqueFn = dyn Fn(&CritiqueRequest<'_>) -> Result<Critique, ReasoningError> + Send + Sync;

/// Reasoner driven by closures, counting calls
pub struct StubReasoner {
    extract: Box<ExtractFn>,
    critique: Box<CritiqueFn>,
    pub extract_calls: AtomicUsize,
    pub critique_calls: AtomicUsize,
    pub feedback_seen: AtomicUsize,
}

impl StubReasoner {
    pub fn new(
        extract: impl Fn(&ExtractionRequest<'_>) -> Result<ExtractionDraft, ReasoningError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            extract: Box::new(extract),
            critique: Box::new(|_: &CritiqueRequest<'_>| Ok(Critique::default())),
            extract_calls: AtomicUsize::new(0),
            critique_calls: AtomicUsize::new(0),
            feedback_seen: AtomicUsize::new(0),
        }
    }

    /// Proposes `value` for `field` citing every evidence item containing `needle`
    pub fn from_rules(rules: Vec<(&'static str, &'static str, Value)>) -> Self {
        Self::new(move |request| {
            let proposals = rules
                .iter()
                .flat_map(|(field, needle, value)| {
                    request
                        .evidence
                        .iter()
                        .filter(move |item| item.content.contains(needle))
                        .map(move |item| FieldProposal {
                            field: field.to_string(),
                            value: value.clone(),
                            sources: vec![item.source_id.clone()],
                        })
                })
                .collect();
            Ok(ExtractionDraft { proposals })
        })
    }

    pub fn with_critique(
        mut self,
        critique: impl Fn(&CritiqueRequest<'_>) -> Result<Critique, ReasoningError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.critique = Box::new(critique);
        self
    }

    pub fn extract_count(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    pub fn critique_count(&self) -> usize {
        self.critique_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reasoner for StubReasoner {
    async fn extract(
        &self,
        request: ExtractionRequest<'_>,
    ) -> Result<ExtractionDraft, ReasoningError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        if request.feedback.is_some() {
            self.feedback_seen.fetch_add(1, Ordering::SeqCst);
        }
        (self.extract)(&request)
    }

    async fn critique(&self, request: CritiqueRequest<'_>) -> Result<Critique, ReasoningError> {
        self.critique_calls.fetch_add(1, Ordering::SeqCst);
        (self.critique)(&request)
    }
}

/// Scripted response for a request target
#[derive(Clone)]
pub enum Scripted {
    Docs(Vec<RawDocument>),
    /// One document whose source id is the rendered request, e.g. `lookup(Acme)`
    Echo,
    Fail,
    Hang,
}

/// Gateway answering from a script and recording every request
pub struct StubGateway {
    by_target: HashMap<String, Scripted>,
    fallback: Scripted,
    pub requests: Mutex<Vec<ToolRequest>>,
}

impl StubGateway {
    pub fn new(fallback: Scripted) -> Self {
        Self {
            by_target: HashMap::new(),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, target: &str, response: Scripted) -> Self {
        self.by_target.insert(target.to_string(), response);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ToolGateway for StubGateway {
    async fn execute(&self, request: &ToolRequest) -> Result<RawToolOutput, ToolError> {
        self.requests.lock().unwrap().push(request.clone());
        let scripted = self
            .by_target
            .get(request.target())
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());

        match scripted {
            Scripted::Docs(documents) => Ok(RawToolOutput { documents }),
            Scripted::Echo => Ok(RawToolOutput::single(RawDocument::new(
                request.to_string(),
                format!("results for {}", request.target()),
            ))),
            Scripted::Fail => Err(ToolError::Status {
                target: request.target().to_string(),
                status: 503,
            }),
            Scripted::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(RawToolOutput::default())
            }
        }
    }
}

pub fn company_schema() -> Schema {
    Schema::new(vec![
        FieldSpec::new("name", FieldType::String).required(),
        FieldSpec::new("founded_year", FieldType::Number).required(),
    ])
}

pub fn doc(source_id: &str, content: &str) -> RawDocument {
    RawDocument::new(source_id, content)
}

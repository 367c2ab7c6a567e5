//! Reasoner backed by a chat-completion provider

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

use enrich_provider::{ChatParams, Message, Provider, Tool, ToolChoice};

use super::prompts;
use super::{
    Critique, CritiqueRequest, ExtractionDraft, ExtractionRequest, Reasoner, ReasoningError,
};
use crate::evidence::EvidenceItem;
use crate::schema::Schema;
use crate::tools::web::truncate_chars;

const DEFAULT_EVIDENCE_CHARS: usize = 6_000;

/// Structured output is obtained by forcing a single tool call and
/// deserializing its arguments.
pub struct LlmReasoner<P: Provider> {
    provider: Arc<P>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    max_evidence_chars: usize,
}

impl<P: Provider> LlmReasoner<P> {
    pub fn new(provider: Arc<P>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 4096,
            temperature: 0.0,
            max_evidence_chars: DEFAULT_EVIDENCE_CHARS,
        }
    }

    pub fn from_config(provider: Arc<P>, config: &enrich_config::Config) -> Self {
        let defaults = &config.research.defaults;
        Self::new(provider, defaults.model.clone())
            .with_sampling(defaults.max_tokens, defaults.temperature)
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Per-item character cap when rendering evidence
    pub fn with_evidence_limit(mut self, max_chars: usize) -> Self {
        self.max_evidence_chars = max_chars;
        self
    }

    async fn call_tool<T: DeserializeOwned>(
        &self,
        system: &str,
        user: String,
        tool: Tool,
    ) -> Result<T, ReasoningError> {
        let name = tool.function.name.clone();
        let params = ChatParams {
            model: self.model.clone(),
            messages: vec![Message::system(system), Message::user(user)],
            tools: vec![tool],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            tool_choice: ToolChoice::Required(name.clone()),
        };

        let response = self.provider.chat(params).await?;
        debug!("{} used {} tokens", name, response.usage.total_tokens);

        let call = response
            .tool_call(&name)
            .ok_or_else(|| ReasoningError::MissingToolCall(name.clone()))?;
        parse_arguments(&call.arguments)
    }

    fn render_evidence(&self, out: &mut String, evidence: &[EvidenceItem]) {
        out.push_str("Evidence:\n");
        for item in evidence {
            let _ = match &item.title {
                Some(title) => writeln!(out, "[{}] {}", item.source_id, title),
                None => writeln!(out, "[{}]", item.source_id),
            };
            out.push_str(&truncate_chars(&item.content, self.max_evidence_chars));
            out.push_str("\n\n");
        }
    }
}

fn parse_arguments<T: DeserializeOwned>(arguments: &Value) -> Result<T, ReasoningError> {
    match arguments {
        Value::String(raw) => Ok(serde_json::from_str(raw)?),
        other => Ok(serde_json::from_value(other.clone())?),
    }
}

fn extraction_tool(schema: &Schema) -> Tool {
    Tool::new(
        prompts::EXTRACTION_TOOL,
        prompts::EXTRACTION_TOOL_DESCRIPTION,
        json!({
            "type": "object",
            "properties": {
                "proposals": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "field": { "type": "string", "enum": schema.field_names() },
                            "value": { "description": "Value matching the field type" },
                            "sources": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["field", "value", "sources"]
                    }
                }
            },
            "required": ["proposals"]
        }),
    )
}

fn critique_tool() -> Tool {
    Tool::new(
        prompts::CRITIQUE_TOOL,
        prompts::CRITIQUE_TOOL_DESCRIPTION,
        json!({
            "type": "object",
            "properties": {
                "issues": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "severity": { "type": "string", "enum": ["blocking", "warning"] },
                            "message": { "type": "string" },
                            "field": { "type": "string" }
                        },
                        "required": ["severity", "message"]
                    }
                },
                "follow_up_queries": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["issues", "follow_up_queries"]
        }),
    )
}

#[async_trait]
impl<P: Provider> Reasoner for LlmReasoner<P> {
    async fn extract(
        &self,
        request: ExtractionRequest<'_>,
    ) -> Result<ExtractionDraft, ReasoningError> {
        let mut user = String::new();
        let _ = writeln!(user, "Topic: {}\n\nFields:\n{}", request.topic, request.schema);
        self.render_evidence(&mut user, request.evidence);

        if let Some(previous) = request.previous {
            let _ = writeln!(user, "Previous record:\n{}\n", previous.to_value());
        }
        if let Some(feedback) = request.feedback {
            user.push_str("Problems found with the previous record:\n");
            for issue in &feedback.issues {
                let _ = writeln!(user, "- {}", issue);
            }
        }

        debug!(
            "Extracting {} fields from {} evidence items",
            request.schema.fields.len(),
            request.evidence.len()
        );
        self.call_tool(
            prompts::EXTRACTION_SYSTEM,
            user,
            extraction_tool(request.schema),
        )
        .await
    }

    async fn critique(&self, request: CritiqueRequest<'_>) -> Result<Critique, ReasoningError> {
        let mut user = String::new();
        let _ = writeln!(user, "Topic: {}\n\nFields:\n{}", request.topic, request.schema);
        let _ = writeln!(user, "Record:\n{}\n", request.candidate.to_value());
        self.render_evidence(&mut user, request.evidence);

        self.call_tool(prompts::CRITIQUE_SYSTEM, user, critique_tool())
            .await
    }
}

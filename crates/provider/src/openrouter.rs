//! OpenRouter / OpenAI-compatible provider

use crate::*;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, trace};

const OPENROUTER_BASE: &str = "https://openrouter.ai/api/v1";
const OPENAI_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat-completions client for OpenRouter, OpenAI and vLLM-style endpoints
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

// Wire shapes of a chat-completions response. Only the fields we read.

#[derive(Deserialize)]
struct CompletionBody {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    /// A JSON-encoded string on most endpoints, an object on some vLLM builds
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl WireToolCall {
    fn into_tool_call(self) -> ToolCall {
        let arguments = match self.function.arguments {
            serde_json::Value::String(raw) => {
                serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
            }
            other => other,
        };
        ToolCall {
            id: self.id,
            name: self.function.name,
            arguments,
        }
    }
}

impl OpenRouterProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        let api_key = api_key.into();
        let routed = api_key.starts_with("sk-or-")
            || api_base
                .as_deref()
                .map_or(false, |base| base.contains("openrouter"));

        let (fallback_base, fallback_model) = if routed {
            (OPENROUTER_BASE, "anthropic/claude-sonnet-4")
        } else {
            (OPENAI_BASE, "gpt-4o")
        };
        let api_base = api_base.unwrap_or_else(|| fallback_base.to_string());

        Self {
            client: build_client(DEFAULT_TIMEOUT),
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            default_model: default_model.unwrap_or_else(|| fallback_model.to_string()),
        }
    }

    /// Per-request timeout for completions
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn build_request(&self, params: &ChatParams) -> serde_json::Value {
        let model = if params.model.is_empty() {
            &self.default_model
        } else {
            &params.model
        };

        let mut body = json!({
            "model": model,
            "messages": &params.messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        if !params.tools.is_empty() {
            body["tools"] = json!(params.tools);
            body["tool_choice"] = match &params.tool_choice {
                ToolChoice::Auto => json!("auto"),
                ToolChoice::None => json!("none"),
                ToolChoice::Required(name) => json!({
                    "type": "function",
                    "function": {"name": name},
                }),
            };
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let body: CompletionBody =
            serde_json::from_value(json).map_err(|_| ProviderError::InvalidResponse)?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or(ProviderError::InvalidResponse)?;

        let finish_reason = choice.finish_reason.unwrap_or_else(|| "stop".to_string());
        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(WireToolCall::into_tool_call)
            .collect();

        // A forced tool call cut off mid-arguments cannot be parsed downstream
        if finish_reason == "length" && !tool_calls.is_empty() {
            return Err(ProviderError::Truncated);
        }

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls,
            finish_reason,
            usage: body.usage.unwrap_or_default(),
        })
    }
}

fn build_client(timeout: Duration) -> Client {
    Client::builder().timeout(timeout).build().unwrap_or_default()
}

#[async_trait::async_trait]
impl Provider for OpenRouterProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        let url = format!("{}/chat/completions", self.api_base);
        trace!("POST {} ({} tools)", url, params.tools.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(&params))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }

        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(ProviderError::Api(message));
        }

        let parsed = self.parse_response(serde_json::from_str(&text)?)?;
        debug!(
            "Completion finished ({}) with {} tool call(s)",
            parsed.finish_reason,
            parsed.tool_calls.len()
        );
        Ok(parsed)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

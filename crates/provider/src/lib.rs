//! Reasoning provider abstraction
//!
//! A chat-completion interface with tool calling, plus an
//! OpenRouter/OpenAI-compatible implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use thiserror::Error;

pub mod openrouter;

pub use openrouter::OpenRouterProvider;

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("no API key configured")]
    NoApiKey,

    #[error("invalid response")]
    InvalidResponse,

    #[error("rate limited")]
    RateLimited,

    #[error("completion cut off at the token limit")]
    Truncated,
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// A tool invocation requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Chat completion result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub finish_reason: String,
    #[serde(default)]
    pub usage: Usage,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// First call to the named tool, if the model made one
    pub fn tool_call(&self, name: &str) -> Option<&ToolCall> {
        self.tool_calls.iter().find(|call| call.name == name)
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: "stop".to_string(),
            usage: Usage::default(),
        }
    }

    /// Response consisting of a single tool call
    pub fn with_tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_0".to_string(),
                name: name.into(),
                arguments,
            }],
            finish_reason: "tool_calls".to_string(),
            usage: Usage::default(),
        }
    }
}

/// Token accounting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Speaker of a prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// Prompt message. Requests are single-shot, so history never carries tool results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Tool offered to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Request parameters
#[derive(Debug, Clone)]
pub struct ChatParams {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tool_choice: ToolChoice,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self {
            model: String::new(),
            messages: Vec::new(),
            tools: Vec::new(),
            max_tokens: 4096,
            temperature: 0.0,
            tool_choice: ToolChoice::Auto,
        }
    }
}

/// Tool selection mode
#[derive(Debug, Clone)]
pub enum ToolChoice {
    Auto,
    Required(String),
    None,
}

/// Chat-completion backend
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse>;
    fn default_model(&self) -> String;
    fn is_configured(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ========== ProviderError Tests ==========

    #[test]
    fn test_provider_error_display() {
        assert_eq!(ProviderError::NoApiKey.to_string(), "no API key configured");
        assert_eq!(
            ProviderError::Api("bad model".to_string()).to_string(),
            "API error: bad model"
        );
        assert_eq!(ProviderError::InvalidResponse.to_string(), "invalid response");
        assert_eq!(ProviderError::RateLimited.to_string(), "rate limited");
        assert!(ProviderError::Truncated.to_string().contains("token limit"));
    }

    // ========== ChatResponse Tests ==========

    #[test]
    fn test_chat_response_text() {
        let response = ChatResponse::text("done");
        assert_eq!(response.content, Some("done".to_string()));
        assert!(!response.has_tool_calls());
        assert_eq!(response.finish_reason, "stop");
    }

    #[test]
    fn test_chat_response_tool_call_lookup() {
        let response = ChatResponse::with_tool_call("record_extraction", json!({"fields": []}));
        assert!(response.has_tool_calls());
        assert_eq!(response.finish_reason, "tool_calls");

        let call = response.tool_call("record_extraction").unwrap();
        assert_eq!(call.arguments, json!({"fields": []}));
        assert!(response.tool_call("record_critique").is_none());
    }

    #[test]
    fn test_chat_response_deserialize_defaults() {
        let response: ChatResponse = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.usage.total_tokens, 0);
    }

    // ========== Message Tests ==========

    #[test]
    fn test_message_roles_serialize_lowercase() {
        assert_eq!(Message::system("s").role, Role::System);
        let value = serde_json::to_value(Message::user("Hello")).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "Hello"}));
        assert_eq!(serde_json::to_value(Role::System).unwrap(), "system");
    }

    // ========== Tool Tests ==========

    #[test]
    fn test_tool_new() {
        let params = json!({"type": "object", "properties": {}});
        let tool = Tool::new("record_critique", "Record a critique", params.clone());
        assert_eq!(tool.tool_type, "function");
        assert_eq!(tool.function.name, "record_critique");
        assert_eq!(tool.function.parameters, params);
    }

    // ========== ChatParams Tests ==========

    #[test]
    fn test_chat_params_default() {
        let params = ChatParams::default();
        assert!(params.model.is_empty());
        assert_eq!(params.max_tokens, 4096);
        assert_eq!(params.temperature, 0.0);
        assert!(matches!(params.tool_choice, ToolChoice::Auto));
    }
}

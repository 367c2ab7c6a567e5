//! Tool gateway: research actions behind one interface

pub mod document;
pub mod web;

pub use document::{
    DocumentError, DocumentFormat, DocumentProcessor, ParsedDocument, PlainTextProcessor,
};
pub use web::{FetchDocumentTool, LookupTool, WebSearchTool};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::evidence::{EvidenceItem, EvidenceOrigin};

/// Kind of research action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    WebSearch,
    FetchDocument,
    Lookup,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::WebSearch => "web_search",
            ActionKind::FetchDocument => "fetch_document",
            ActionKind::Lookup => "lookup",
        }
    }

    /// Evidence origin for results of this action
    pub fn origin(&self) -> EvidenceOrigin {
        match self {
            ActionKind::WebSearch => EvidenceOrigin::Search,
            ActionKind::FetchDocument | ActionKind::Lookup => EvidenceOrigin::Document,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single research action with its parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ToolRequest {
    WebSearch { query: String },
    /// URL or local path
    FetchDocument { location: String },
    Lookup { identifier: String },
}

impl ToolRequest {
    pub fn search(query: impl Into<String>) -> Self {
        ToolRequest::WebSearch {
            query: query.into(),
        }
    }

    pub fn fetch(location: impl Into<String>) -> Self {
        ToolRequest::FetchDocument {
            location: location.into(),
        }
    }

    pub fn lookup(identifier: impl Into<String>) -> Self {
        ToolRequest::Lookup {
            identifier: identifier.into(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            ToolRequest::WebSearch { .. } => ActionKind::WebSearch,
            ToolRequest::FetchDocument { .. } => ActionKind::FetchDocument,
            ToolRequest::Lookup { .. } => ActionKind::Lookup,
        }
    }

    /// The query, location or identifier
    pub fn target(&self) -> &str {
        match self {
            ToolRequest::WebSearch { query } => query,
            ToolRequest::FetchDocument { location } => location,
            ToolRequest::Lookup { identifier } => identifier,
        }
    }

    /// Identity used to spot repeated requests: kind plus lowercased target
    pub fn key(&self) -> RequestKey {
        (self.kind(), self.target().to_lowercase())
    }
}

pub type RequestKey = (ActionKind, String);

impl fmt::Display for ToolRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.target())
    }
}

/// One piece of content returned by a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub source_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl RawDocument {
    pub fn new(source_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            content: content.into(),
            title: None,
        }
    }

    pub fn into_evidence(self, origin: EvidenceOrigin) -> EvidenceItem {
        let item = EvidenceItem::new(self.source_id, self.content, origin);
        match self.title {
            Some(title) => item.with_title(title),
            None => item,
        }
    }
}

/// Unstructured tool output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawToolOutput {
    pub documents: Vec<RawDocument>,
}

impl RawToolOutput {
    pub fn single(document: RawDocument) -> Self {
        Self {
            documents: vec![document],
        }
    }
}

/// Per-request tool failure. Never fatal for a run.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("no tool registered for {0}")]
    Unsupported(ActionKind),

    #[error("tool not configured: {0}")]
    NotConfigured(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{target} returned HTTP {status}")]
    Status { target: String, status: u16 },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("document error: {0}")]
    Document(#[from] DocumentError),
}

/// Uniform entry point for research actions
#[async_trait]
pub trait ToolGateway: Send + Sync {
    async fn execute(&self, request: &ToolRequest) -> Result<RawToolOutput, ToolError>;
}

/// A tool serving one action kind
#[async_trait]
pub trait ResearchTool: Send + Sync {
    fn kind(&self) -> ActionKind;
    fn description(&self) -> &str;
    async fn run(&self, request: &ToolRequest) -> Result<RawToolOutput, ToolError>;
}

type BoxedTool = Box<dyn ResearchTool>;

/// Gateway that dispatches on [`ActionKind`]
pub struct ToolRegistry {
    tools: HashMap<ActionKind, BoxedTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, replacing any previous tool of the same kind
    pub fn register<T: ResearchTool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.kind(), Box::new(tool));
    }

    pub fn get(&self, kind: ActionKind) -> Option<&dyn ResearchTool> {
        self.tools.get(&kind).map(|t| t.as_ref())
    }

    pub fn has(&self, kind: ActionKind) -> bool {
        self.tools.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<ActionKind> {
        let mut kinds: Vec<ActionKind> = self.tools.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    /// Registry with the web search, fetch and lookup tools built from config
    pub fn from_config(config: &enrich_config::Config) -> Self {
        let mut registry = Self::new();
        registry.register(WebSearchTool::from_config(config));
        registry.register(FetchDocumentTool::from_config(config));
        registry.register(LookupTool::from_config(config));
        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolGateway for ToolRegistry {
    async fn execute(&self, request: &ToolRequest) -> Result<RawToolOutput, ToolError> {
        let tool = self
            .tools
            .get(&request.kind())
            .ok_or(ToolError::Unsupported(request.kind()))?;
        tool.run(request).await
    }
}

//! Web tools: web_search, fetch_document and lookup

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use super::document::{
    load_local, DocumentError, DocumentFormat, DocumentProcessor, PlainTextProcessor,
};
use super::{ActionKind, RawDocument, RawToolOutput, ResearchTool, ToolError, ToolRequest};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";
const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";

/// Web search tool using Brave Search API
pub struct WebSearchTool {
    api_key: String,
    max_results: u32,
    endpoint: String,
    client: reqwest::Client,
}

impl WebSearchTool {
    /// Falls back to `BRAVE_API_KEY` when no key is given
    pub fn new(api_key: Option<String>, max_results: u32) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("BRAVE_API_KEY").ok())
            .unwrap_or_default();
        Self {
            api_key,
            max_results: max_results.clamp(1, 20),
            endpoint: BRAVE_SEARCH_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &enrich_config::Config) -> Self {
        Self::new(config.search_api_key(), config.search_max_results())
    }

    /// Point at a Brave-compatible endpoint other than the public API
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl ResearchTool for WebSearchTool {
    fn kind(&self) -> ActionKind {
        ActionKind::WebSearch
    }

    fn description(&self) -> &str {
        "Search the web. One document per result, keyed by URL."
    }

    async fn run(&self, request: &ToolRequest) -> Result<RawToolOutput, ToolError> {
        let ToolRequest::WebSearch { query } = request else {
            return Err(ToolError::InvalidRequest(request.to_string()));
        };
        if self.api_key.is_empty() {
            return Err(ToolError::NotConfigured("BRAVE_API_KEY".to_string()));
        }
        debug!("Web search: {}", query);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query.as_str()), ("count", &self.max_results.to_string())])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Status {
                target: "search API".to_string(),
                status: status.as_u16(),
            });
        }

        let data: Value = response.json().await?;
        Ok(parse_search_results(&data, self.max_results as usize))
    }
}

/// Turn a Brave response body into documents. Results without a URL are skipped.
pub fn parse_search_results(data: &Value, max_results: usize) -> RawToolOutput {
    let results = data
        .get("web")
        .and_then(|w| w.get("results"))
        .and_then(|r| r.as_array());

    let Some(results) = results else {
        return RawToolOutput::default();
    };

    let documents = results
        .iter()
        .filter_map(|item| {
            let url = item.get("url").and_then(|u| u.as_str())?.trim();
            if url.is_empty() {
                return None;
            }
            let title = item.get("title").and_then(|t| t.as_str()).unwrap_or("");
            let desc = item
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or("");
            let content = [title, desc]
                .iter()
                .filter(|s| !s.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join("\n");
            let mut doc = RawDocument::new(url, content);
            if !title.is_empty() {
                doc.title = Some(title.to_string());
            }
            Some(doc)
        })
        .take(max_results)
        .collect();

    RawToolOutput { documents }
}

/// Fetches a URL or reads a local file
pub struct FetchDocumentTool {
    max_chars: usize,
    max_file_bytes: u64,
    processor: Box<dyn DocumentProcessor>,
    client: reqwest::Client,
}

impl FetchDocumentTool {
    pub fn new(max_chars: usize, max_file_bytes: u64) -> Self {
        Self {
            max_chars,
            max_file_bytes,
            processor: Box::new(PlainTextProcessor::new()),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &enrich_config::Config) -> Self {
        Self::new(config.fetch_max_chars(), config.max_document_bytes())
    }

    pub fn with_processor(mut self, processor: impl DocumentProcessor + 'static) -> Self {
        self.processor = Box::new(processor);
        self
    }

    async fn fetch_url(&self, url: &str) -> Result<RawDocument, ToolError> {
        debug!("Fetching URL: {}", url);
        let response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Status {
                target: url.to_string(),
                status: status.as_u16(),
            });
        }

        let format = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(DocumentFormat::from_content_type)
            .unwrap_or(DocumentFormat::Unknown);
        let bytes = read_capped(response, self.max_file_bytes).await?;
        let parsed = self.processor.convert(&bytes, format)?;

        Ok(RawDocument {
            source_id: url.to_string(),
            content: truncate_chars(&parsed.text, self.max_chars),
            title: parsed.title,
        })
    }

    async fn read_file(&self, location: &str) -> Result<RawDocument, ToolError> {
        let path = Path::new(location);
        let parsed = load_local(path, self.max_file_bytes, self.processor.as_ref()).await?;
        Ok(RawDocument {
            source_id: location.to_string(),
            content: truncate_chars(&parsed.text, self.max_chars),
            title: parsed.title,
        })
    }
}

/// Read a response body, giving up once it exceeds `limit` bytes
async fn read_capped(mut response: reqwest::Response, limit: u64) -> Result<Vec<u8>, ToolError> {
    if let Some(size) = response.content_length() {
        if size > limit {
            return Err(DocumentError::TooLarge { size, limit }.into());
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let size = (body.len() + chunk.len()) as u64;
        if size > limit {
            return Err(DocumentError::TooLarge { size, limit }.into());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

impl Default for FetchDocumentTool {
    fn default() -> Self {
        Self::new(40_000, 50 * 1024 * 1024)
    }
}

#[async_trait]
impl ResearchTool for FetchDocumentTool {
    fn kind(&self) -> ActionKind {
        ActionKind::FetchDocument
    }

    fn description(&self) -> &str {
        "Fetch a URL or read a local file as plain text."
    }

    async fn run(&self, request: &ToolRequest) -> Result<RawToolOutput, ToolError> {
        let ToolRequest::FetchDocument { location } = request else {
            return Err(ToolError::InvalidRequest(request.to_string()));
        };
        let location = location.trim();
        if location.is_empty() {
            return Err(ToolError::InvalidRequest("empty location".to_string()));
        }

        let document = if is_url(location) {
            self.fetch_url(location).await?
        } else {
            self.read_file(location).await?
        };
        Ok(RawToolOutput::single(document))
    }
}

/// Resolves an identifier through a URL template, then fetches it
pub struct LookupTool {
    url_template: String,
    fetch: FetchDocumentTool,
}

impl LookupTool {
    /// `url_template` must contain `{id}`
    pub fn new(url_template: impl Into<String>, fetch: FetchDocumentTool) -> Self {
        Self {
            url_template: url_template.into(),
            fetch,
        }
    }

    pub fn from_config(config: &enrich_config::Config) -> Self {
        Self::new(
            config.tools.lookup.url_template.clone(),
            FetchDocumentTool::from_config(config),
        )
    }

    pub fn resolve(&self, identifier: &str) -> String {
        let encoded = identifier.trim().replace(' ', "_");
        self.url_template.replace("{id}", &encoded)
    }
}

#[async_trait]
impl ResearchTool for LookupTool {
    fn kind(&self) -> ActionKind {
        ActionKind::Lookup
    }

    fn description(&self) -> &str {
        "Look up an identifier in the configured reference source."
    }

    async fn run(&self, request: &ToolRequest) -> Result<RawToolOutput, ToolError> {
        let ToolRequest::Lookup { identifier } = request else {
            return Err(ToolError::InvalidRequest(request.to_string()));
        };
        if identifier.trim().is_empty() {
            return Err(ToolError::InvalidRequest("empty identifier".to_string()));
        }
        if !self.url_template.contains("{id}") {
            return Err(ToolError::NotConfigured(
                "lookup url_template has no {id} placeholder".to_string(),
            ));
        }
        let url = self.resolve(identifier);
        let document = self.fetch.fetch_url(&url).await?;
        Ok(RawToolOutput::single(document))
    }
}

pub fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Truncate to at most `max_chars` characters, on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

//! Configuration management for enrich
//!
//! Loads and saves research parameters, provider credentials and tool
//! settings from `~/.enrich/config.json`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir, reports_dir};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config not found: {0}")]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Credentials for one OpenAI-compatible endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// All known reasoning endpoints
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openrouter: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub vllm: ProviderConfig,
}

/// Default parameters for a research run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchDefaults {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Reflection rounds allowed after the first pass
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_max_requests_per_phase")]
    pub max_requests_per_phase: usize,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_extraction_retries")]
    pub extraction_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for ResearchDefaults {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_iterations: default_max_iterations(),
            max_requests_per_phase: default_max_requests_per_phase(),
            max_concurrent_requests: default_max_concurrent_requests(),
            tool_timeout_secs: default_tool_timeout_secs(),
            extraction_retries: default_extraction_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_iterations() -> u32 {
    6
}

fn default_max_requests_per_phase() -> usize {
    5
}

fn default_max_concurrent_requests() -> usize {
    4
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_extraction_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

/// Research section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResearchConfig {
    #[serde(default)]
    pub defaults: ResearchDefaults,
}

/// Web search tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_max_results() -> u32 {
    10
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            max_results: default_max_results(),
        }
    }
}

/// Document fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebFetchConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_max_chars() -> usize {
    40_000
}

impl Default for WebFetchConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

/// Web tools configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebToolsConfig {
    #[serde(default)]
    pub search: WebSearchConfig,
    #[serde(default)]
    pub fetch: WebFetchConfig,
}

/// Identifier lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// `{id}` is replaced with the trimmed identifier, spaces as `_`
    #[serde(default = "default_lookup_template")]
    pub url_template: String,
}

fn default_lookup_template() -> String {
    "https://en.wikipedia.org/api/rest_v1/page/summary/{id}".to_string()
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            url_template: default_lookup_template(),
        }
    }
}

/// Local document handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    #[serde(default = "default_max_file_mb")]
    pub max_file_mb: u64,
}

fn default_max_file_mb() -> u64 {
    50
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            max_file_mb: default_max_file_mb(),
        }
    }
}

/// Tool configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    #[serde(default)]
    pub web: WebToolsConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Load from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from a specific location, falling back to defaults when absent
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("Reading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to a specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("Writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// First configured API key, in order openrouter, openai, vllm
    pub fn api_key(&self) -> Option<String> {
        [
            &self.providers.openrouter,
            &self.providers.openai,
            &self.providers.vllm,
        ]
        .into_iter()
        .map(|p| p.api_key.clone())
        .find(|key| !key.is_empty())
    }

    /// API base matching the key returned by [`Config::api_key`]
    pub fn api_base(&self) -> Option<String> {
        if !self.providers.openrouter.api_key.is_empty() {
            return self
                .providers
                .openrouter
                .api_base
                .clone()
                .or_else(|| Some("https://openrouter.ai/api/v1".to_string()));
        }

        if !self.providers.openai.api_key.is_empty() {
            return self.providers.openai.api_base.clone();
        }

        self.providers
            .vllm
            .api_base
            .clone()
            .filter(|base| !base.is_empty())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn default_model(&self) -> String {
        self.research.defaults.model.clone()
    }

    /// Search API key, if configured
    pub fn search_api_key(&self) -> Option<String> {
        let key = &self.tools.web.search.api_key;
        if key.is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }

    pub fn search_max_results(&self) -> u32 {
        self.tools.web.search.max_results
    }

    pub fn fetch_max_chars(&self) -> usize {
        self.tools.web.fetch.max_chars
    }

    pub fn max_document_bytes(&self) -> u64 {
        self.tools.documents.max_file_mb * 1024 * 1024
    }
}

/// Write a default config if none exists and make sure the report directory is present
pub async fn init() -> Result<Config> {
    let config_path = config_path();

    if config_path.exists() {
        warn!("Config already exists at {:?}", config_path);
    } else {
        let config = Config::default();
        config.save().await?;
        info!("Config created at {:?}", config_path);
    }

    let reports = reports_dir();
    tokio::fs::create_dir_all(&reports).await?;
    info!("Reports directory ready at {:?}", reports);

    Config::load().await
}

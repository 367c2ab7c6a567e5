//! enrich command implementations

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use enrich_agent::{
    EvidenceItem, LlmReasoner, Orchestrator, RunConfig, RunInput, RunOutput, RunStatus, Schema,
    ToolRegistry,
};
use enrich_config::{paths::safe_filename, Config};
use enrich_provider::OpenRouterProvider;

/// Arguments of `enrich run`
pub struct RunArgs {
    pub topic: String,
    pub schema: PathBuf,
    pub max_iterations: Option<u32>,
    pub seeds: Vec<PathBuf>,
    pub documents: Vec<String>,
    pub output: Option<PathBuf>,
}

/// Initialize config and report directory
pub async fn init_command() -> Result<()> {
    println!("Initializing enrich...");

    let config = enrich_config::init().await?;

    println!("\nConfig:  {}", enrich_config::config_path().display());
    println!("Reports: {}", enrich_config::reports_dir().display());
    println!("\nNext steps:");
    if !config.has_api_key() {
        println!("  1. Add a model API key under providers in the config file");
        println!("     Get one at: https://openrouter.ai/keys");
    }
    if config.search_api_key().is_none() {
        println!("  2. Set tools.web.search.api_key or BRAVE_API_KEY for web search");
    }
    println!("  Then: enrich run --topic \"Acme Corp\" --schema schema.json");

    Ok(())
}

async fn load_schema(path: &Path) -> Result<Schema> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read schema file {}", path.display()))?;
    let schema = Schema::from_json_str(&text)
        .with_context(|| format!("cannot parse schema file {}", path.display()))?;
    Ok(schema)
}

/// Parse and validate a schema file, printing its fields
pub async fn schema_command(path: &Path) -> Result<()> {
    let schema = load_schema(path).await?;
    schema.validate()?;

    println!("{} fields, {} required", schema.fields.len(), schema.required_fields().count());
    print!("{}", schema);
    Ok(())
}

/// Research a topic. Returns `false` when the run failed.
pub async fn run_command(args: RunArgs) -> Result<bool> {
    let config = Config::load().await?;
    let schema = load_schema(&args.schema).await?;

    let api_key = config
        .api_key()
        .context("No API key configured. Set one in ~/.enrich/config.json")?;
    let provider =
        OpenRouterProvider::new(api_key, config.api_base(), Some(config.default_model()));
    let reasoner = Arc::new(LlmReasoner::from_config(Arc::new(provider), &config));
    let gateway = Arc::new(ToolRegistry::from_config(&config));

    if config.search_api_key().is_none() && std::env::var("BRAVE_API_KEY").is_err() {
        warn!("No search API key configured, web_search requests will fail");
    }

    let mut run_config = RunConfig::from(&config.research.defaults);
    if let Some(max_iterations) = args.max_iterations {
        run_config.max_iterations = max_iterations;
    }

    let mut input = RunInput::new(args.topic, schema);
    for path in &args.seeds {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read seed file {}", path.display()))?;
        input = input.with_seed(EvidenceItem::manual(path.display().to_string(), content));
    }
    for location in args.documents {
        input = input.with_document(location);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping at the next phase boundary");
            on_interrupt.cancel();
        }
    });

    let orchestrator = Orchestrator::new(reasoner, gateway, run_config);
    let output = orchestrator.run_with_cancel(input, cancel).await;

    let report_path = match args.output {
        Some(path) => path,
        None => default_report_path(&output),
    };
    write_report(&output, &report_path).await?;

    print_summary(&output);
    println!("\nReport: {}", report_path.display());

    Ok(output.status != RunStatus::Failed)
}

fn default_report_path(output: &RunOutput) -> PathBuf {
    let stem = safe_filename(&output.topic);
    let stamp = output.finished_at.format("%Y%m%d-%H%M%S");
    enrich_config::reports_dir().join(format!("{}-{}.json", stem, stamp))
}

async fn write_report(output: &RunOutput, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(output)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("cannot write report to {}", path.display()))?;
    info!("Report written to {}", path.display());
    Ok(())
}

fn print_summary(output: &RunOutput) {
    println!("Topic:      {}", output.topic);
    println!("Status:     {}", output.status);
    if let Some(reason) = &output.failure {
        println!("Reason:     {}", reason);
    }
    println!("Iterations: {}", output.iteration_count);
    println!("Evidence:   {} items", output.evidence.len());

    println!();
    for (name, field) in &output.candidate_object.fields {
        match &field.value {
            Some(value) => println!("  {}: {}  [{}]", name, value, field.sources.join(", ")),
            None if field.contested => {
                println!("  {}: (contested: {})", name, field.sources.join(", "))
            }
            None => println!("  {}: -", name),
        }
    }

    if let Some(verdict) = output.last_verdict() {
        for issue in &verdict.issues {
            println!("  ! {}", issue);
        }
    }
}

/// Show configuration status
pub async fn status_command() -> Result<()> {
    let config_path = enrich_config::config_path();
    let reports = enrich_config::reports_dir();

    println!("enrich status");
    println!(
        "Config:   {} {}",
        config_path.display(),
        if config_path.exists() { "[OK]" } else { "[Missing]" }
    );
    println!(
        "Reports:  {} {}",
        reports.display(),
        if reports.exists() { "[OK]" } else { "[Missing]" }
    );

    let config = Config::load().await?;
    let defaults = &config.research.defaults;
    println!("Model:    {}", config.default_model());
    println!(
        "API key:  {}",
        if config.has_api_key() { "[Set]" } else { "[Missing]" }
    );
    println!(
        "Search:   {}",
        if config.search_api_key().is_some() || std::env::var("BRAVE_API_KEY").is_ok() {
            "[Set]"
        } else {
            "[Missing]"
        }
    );
    println!(
        "Limits:   {} iterations, {} requests/phase, {} concurrent, {}s timeout",
        defaults.max_iterations,
        defaults.max_requests_per_phase,
        defaults.max_concurrent_requests,
        defaults.tool_timeout_secs
    );

    let registry = ToolRegistry::from_config(&config);
    println!("\nTools:");
    for kind in registry.kinds() {
        if let Some(tool) = registry.get(kind) {
            println!("  {:<15} {}", kind.as_str(), tool.description());
        }
    }

    Ok(())
}

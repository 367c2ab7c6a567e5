//! Tests for tool registry

use async_trait::async_trait;

use enrich_agent::tools::{
    ActionKind, RawDocument, RawToolOutput, ResearchTool, ToolError, ToolGateway, ToolRegistry,
    ToolRequest,
};
use enrich_config::Config;

struct EchoSearch;

#[async_trait]
impl ResearchTool for EchoSearch {
    fn kind(&self) -> ActionKind {
        ActionKind::WebSearch
    }

    fn description(&self) -> &str {
        "echo"
    }

    async fn run(&self, request: &ToolRequest) -> Result<RawToolOutput, ToolError> {
        Ok(RawToolOutput::single(RawDocument::new(
            format!("echo:{}", request.target()),
            request.target(),
        )))
    }
}

#[test]
fn test_registry_new() {
    let registry = ToolRegistry::new();
    assert!(registry.kinds().is_empty());
}

#[test]
fn test_registry_default() {
    let registry: ToolRegistry = Default::default();
    assert!(!registry.has(ActionKind::WebSearch));
}

#[test]
fn test_registry_from_config_has_all_kinds() {
    let registry = ToolRegistry::from_config(&Config::default());
    assert_eq!(
        registry.kinds(),
        vec![
            ActionKind::FetchDocument,
            ActionKind::Lookup,
            ActionKind::WebSearch
        ]
    );
    assert!(registry.get(ActionKind::Lookup).is_some());
}

#[test]
fn test_register_replaces_same_kind() {
    let mut registry = ToolRegistry::from_config(&Config::default());
    registry.register(EchoSearch);
    assert_eq!(registry.kinds().len(), 3);
    assert_eq!(
        registry.get(ActionKind::WebSearch).unwrap().description(),
        "echo"
    );
}

#[tokio::test]
async fn test_execute_dispatches_by_kind() {
    let mut registry = ToolRegistry::new();
    registry.register(EchoSearch);

    let output = registry
        .execute(&ToolRequest::search("acme"))
        .await
        .unwrap();
    assert_eq!(output.documents[0].source_id, "echo:acme");
}

#[tokio::test]
async fn test_execute_unknown_kind_is_unsupported() {
    let registry = ToolRegistry::new();
    let result = registry.execute(&ToolRequest::lookup("acme")).await;
    assert!(matches!(
        result,
        Err(ToolError::Unsupported(ActionKind::Lookup))
    ));
}

#[test]
fn test_request_display_and_serde() {
    let request = ToolRequest::fetch("https://acme.test");
    assert_eq!(request.to_string(), "fetch_document(https://acme.test)");

    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["action"], "fetch_document");
    assert_eq!(value["location"], "https://acme.test");
    assert_eq!(ActionKind::Lookup.origin(), enrich_agent::EvidenceOrigin::Document);
}

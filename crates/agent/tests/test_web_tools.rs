//! Tests for web tools against a local HTTP server

use mockito::{Matcher, Server};
use std::io::Write;
use serde_json::json;

use enrich_agent::tools::{
    DocumentError, DocumentFormat, FetchDocumentTool, LookupTool, ResearchTool, ToolError,
    WebSearchTool,
};
use enrich_agent::ToolRequest;

#[tokio::test]
async fn test_web_search_maps_results_to_documents() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/search")
        .match_header("X-Subscription-Token", "test-key")
        .match_query(Matcher::UrlEncoded("q".into(), "Acme Corp".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"web": {"results": [
                {
                    "title": "Acme Corp",
                    "url": "https://acme.test",
                    "description": "Makers of anvils since 1949"
                },
                {"title": "Acme - Wiki", "url": "https://wiki.test/Acme"}
            ]}})
            .to_string(),
        )
        .create_async()
        .await;

    let tool = WebSearchTool::new(Some("test-key".into()), 10)
        .with_endpoint(format!("{}/search", server.url()));
    let output = tool.run(&ToolRequest::search("Acme Corp")).await.unwrap();

    mock.assert_async().await;
    assert_eq!(output.documents.len(), 2);
    assert_eq!(output.documents[0].source_id, "https://acme.test");
    assert!(output.documents[0].content.contains("since 1949"));
}

#[tokio::test]
async fn test_web_search_http_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/search")
        .match_query(Matcher::Any)
        .with_status(429)
        .create_async()
        .await;

    let tool = WebSearchTool::new(Some("test-key".into()), 10)
        .with_endpoint(format!("{}/search", server.url()));
    let result = tool.run(&ToolRequest::search("Acme")).await;

    assert!(matches!(result, Err(ToolError::Status { status: 429, .. })));
}

#[tokio::test]
async fn test_fetch_html_converts_to_text() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/about")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(concat!(
            "<html><head><title>About Acme</title><script>var x = 1;</script></head>",
            "<body><h1>Acme</h1><p>Founded in 1949.</p></body></html>"
        ))
        .create_async()
        .await;

    let url = format!("{}/about", server.url());
    let output = FetchDocumentTool::default()
        .run(&ToolRequest::fetch(url.clone()))
        .await
        .unwrap();

    let document = &output.documents[0];
    assert_eq!(document.source_id, url);
    assert_eq!(document.title.as_deref(), Some("About Acme"));
    assert!(document.content.contains("Founded in 1949."));
    assert!(!document.content.contains("<p>"));
}

#[tokio::test]
async fn test_fetch_truncates_to_limit() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/long")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("x".repeat(500))
        .create_async()
        .await;

    let output = FetchDocumentTool::new(100, 1024)
        .run(&ToolRequest::fetch(format!("{}/long", server.url())))
        .await
        .unwrap();

    assert_eq!(output.documents[0].content.chars().count(), 100);
}

#[tokio::test]
async fn test_fetch_unsupported_format_fails_per_document() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/report.docx")
        .with_status(200)
        .with_header("content-type", "application/msword")
        .with_body("PK\x03\x04")
        .create_async()
        .await;

    let result = FetchDocumentTool::default()
        .run(&ToolRequest::fetch(format!("{}/report.docx", server.url())))
        .await;

    assert!(matches!(
        result,
        Err(ToolError::Document(DocumentError::Unsupported(DocumentFormat::Word)))
    ));
}

#[tokio::test]
async fn test_fetch_pdf_served_as_octet_stream() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/annual-report")
        .with_status(200)
        .with_header("content-type", "application/octet-stream")
        .with_body(include_bytes!("fixtures/acme_report.pdf").as_slice())
        .create_async()
        .await;

    let output = FetchDocumentTool::default()
        .run(&ToolRequest::fetch(format!("{}/annual-report", server.url())))
        .await
        .unwrap();

    assert!(output.documents[0].content.contains("1949"));
}

#[tokio::test]
async fn test_fetch_rejects_body_over_size_limit() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/huge")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("x".repeat(5 * 1024 * 1024))
        .create_async()
        .await;

    let result = FetchDocumentTool::new(10, 1024)
        .run(&ToolRequest::fetch(format!("{}/huge", server.url())))
        .await;

    assert!(matches!(
        result,
        Err(ToolError::Document(DocumentError::TooLarge { limit: 1024, .. }))
    ));
}

#[tokio::test]
async fn test_fetch_rejects_chunked_body_over_size_limit() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/stream")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_chunked_body(|w| {
            for _ in 0..8 {
                w.write_all(&[b'x'; 512])?;
            }
            Ok(())
        })
        .create_async()
        .await;

    let result = FetchDocumentTool::new(10, 1024)
        .run(&ToolRequest::fetch(format!("{}/stream", server.url())))
        .await;

    assert!(matches!(
        result,
        Err(ToolError::Document(DocumentError::TooLarge { limit: 1024, .. }))
    ));
}

#[tokio::test]
async fn test_fetch_not_found() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/missing")
        .with_status(404)
        .create_async()
        .await;

    let result = FetchDocumentTool::default()
        .run(&ToolRequest::fetch(format!("{}/missing", server.url())))
        .await;

    assert!(matches!(result, Err(ToolError::Status { status: 404, .. })));
}

#[tokio::test]
async fn test_lookup_resolves_template() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/summary/Acme_Corp")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"extract": "Acme Corporation is a fictional company."}"#)
        .create_async()
        .await;

    let tool = LookupTool::new(
        format!("{}/summary/{{id}}", server.url()),
        FetchDocumentTool::default(),
    );
    let output = tool.run(&ToolRequest::lookup("Acme Corp")).await.unwrap();

    mock.assert_async().await;
    assert!(output.documents[0].content.contains("fictional company"));
    assert!(output.documents[0].source_id.ends_with("/summary/Acme_Corp"));
}

#[tokio::test]
async fn test_lookup_without_placeholder_is_not_configured() {
    let tool = LookupTool::new("https://ref.test/static", FetchDocumentTool::default());
    let result = tool.run(&ToolRequest::lookup("Acme")).await;
    assert!(matches!(result, Err(ToolError::NotConfigured(_))));
}

//! Document conversion: raw bytes to plain text

use scraper::{Html, Selector};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Per-document failure; the run carries on without the document
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("unsupported document format: {0:?}")]
    Unsupported(DocumentFormat),

    #[error("document is empty")]
    Empty,

    #[error("document is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("document is not valid UTF-8")]
    Encoding,

    #[error("unreadable document: {0}")]
    Unreadable(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Markdown,
    Html,
    Json,
    Pdf,
    Word,
    Image,
    Unknown,
}

impl DocumentFormat {
    pub fn from_content_type(content_type: &str) -> Self {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        match mime.as_str() {
            "text/html" | "application/xhtml+xml" => DocumentFormat::Html,
            "text/markdown" => DocumentFormat::Markdown,
            "application/json" => DocumentFormat::Json,
            "application/pdf" => DocumentFormat::Pdf,
            "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                DocumentFormat::Word
            }
            m if m.starts_with("image/") => DocumentFormat::Image,
            m if m.starts_with("text/") => DocumentFormat::PlainText,
            _ => DocumentFormat::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match extension.as_str() {
            "txt" | "text" | "csv" => DocumentFormat::PlainText,
            "md" | "markdown" => DocumentFormat::Markdown,
            "html" | "htm" => DocumentFormat::Html,
            "json" => DocumentFormat::Json,
            "pdf" => DocumentFormat::Pdf,
            "doc" | "docx" => DocumentFormat::Word,
            "png" | "jpg" | "jpeg" | "gif" | "tiff" | "webp" => DocumentFormat::Image,
            _ => DocumentFormat::Unknown,
        }
    }
}

/// Text extracted from a document
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub text: String,
    pub title: Option<String>,
}

/// Converts fetched bytes to text
pub trait DocumentProcessor: Send + Sync {
    fn convert(
        &self,
        bytes: &[u8],
        format: DocumentFormat,
    ) -> Result<ParsedDocument, DocumentError>;
}

const HTML_WRAP_WIDTH: usize = 120;
const MAX_TITLE_CHARS: usize = 200;

/// Converts text, markdown, JSON, HTML and PDF to plain text.
/// Word documents and images are rejected.
#[derive(Debug, Clone, Default)]
pub struct PlainTextProcessor;

impl PlainTextProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentProcessor for PlainTextProcessor {
    fn convert(
        &self,
        bytes: &[u8],
        format: DocumentFormat,
    ) -> Result<ParsedDocument, DocumentError> {
        // Servers often label PDFs as application/octet-stream
        let format = if bytes.starts_with(b"%PDF-") {
            DocumentFormat::Pdf
        } else {
            format
        };

        match format {
            DocumentFormat::Pdf => return pdf_text(bytes),
            DocumentFormat::Word | DocumentFormat::Image => {
                return Err(DocumentError::Unsupported(format))
            }
            _ => {}
        }

        let text = std::str::from_utf8(bytes).map_err(|_| DocumentError::Encoding)?;
        let parsed = if format == DocumentFormat::Html || looks_like_html(text) {
            ParsedDocument {
                text: html2text::from_read(bytes, HTML_WRAP_WIDTH),
                title: html_title(text),
            }
        } else {
            ParsedDocument {
                text: text.to_string(),
                title: None,
            }
        };

        if parsed.text.trim().is_empty() {
            return Err(DocumentError::Empty);
        }
        Ok(parsed)
    }
}

/// Text layer of a PDF. The first non-empty line stands in for the title.
fn pdf_text(bytes: &[u8]) -> Result<ParsedDocument, DocumentError> {
    // pdf-extract panics on some malformed files instead of returning an error
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| DocumentError::Unreadable("malformed PDF".to_string()))?
        .map_err(|e| DocumentError::Unreadable(e.to_string()))?;

    if extracted.trim().is_empty() {
        return Err(DocumentError::Empty);
    }
    let title = extracted
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(MAX_TITLE_CHARS).collect());

    debug!("Extracted {} chars from PDF", extracted.len());
    Ok(ParsedDocument {
        text: extracted,
        title,
    })
}

fn looks_like_html(text: &str) -> bool {
    let head: String = text.trim_start().chars().take(64).collect::<String>().to_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Contents of `<title>`, if any
pub fn html_title(html: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .next()
        .map(|node| node.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Read and convert a local file, enforcing a size limit
pub async fn load_local(
    path: &Path,
    max_bytes: u64,
    processor: &dyn DocumentProcessor,
) -> Result<ParsedDocument, DocumentError> {
    if !path.exists() {
        return Err(DocumentError::NotFound(path.display().to_string()));
    }

    let size = tokio::fs::metadata(path).await?.len();
    if size == 0 {
        return Err(DocumentError::Empty);
    }
    if size > max_bytes {
        return Err(DocumentError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    debug!("Loading local document {:?} ({} bytes)", path, size);
    let bytes = tokio::fs::read(path).await?;
    let mut parsed = processor.convert(&bytes, DocumentFormat::from_path(path))?;
    if parsed.title.is_none() {
        parsed.title = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);
    }
    Ok(parsed)
}

//! Document Text Extractors
//!
//! Local (non-LLM) text extraction for PDFs and plain text. Images have no
//! local extractor; their text comes from the OCR round-trip in
//! [`crate::classifier`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{IngestionError, Result};

/// Result of text extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Extracted text content
    pub text: String,
    /// Detected content type
    pub content_type: String,
    /// Character encoding used
    pub encoding: String,
    /// Name of the parser that produced the text
    pub parser: String,
    /// Warnings during extraction
    pub warnings: Vec<String>,
}

impl ExtractionResult {
    pub fn new(text: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            content_type: content_type.into(),
            encoding: "utf-8".to_string(),
            parser: String::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_parser(mut self, parser: impl Into<String>) -> Self {
        self.parser = parser.into();
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// True when there is nothing worth sending to the classifier
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Trait for document text extractors
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text from document content
    async fn extract(&self, content: &[u8]) -> Result<ExtractionResult>;

    /// Get supported content types
    fn supported_types(&self) -> Vec<&'static str>;

    /// Check if this extractor can handle the content type
    fn can_handle(&self, content_type: &str) -> bool {
        let content_type = content_type.trim().to_lowercase();
        self.supported_types()
            .iter()
            .any(|&t| content_type.starts_with(t))
    }

    /// Get extractor name
    fn name(&self) -> &'static str;
}

/// Plain text extractor
pub struct PlainTextExtractor {
    /// Maximum content size to process
    max_size: usize,
}

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self {
            max_size: 50 * 1024 * 1024,
        }
    }

    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, content: &[u8]) -> Result<ExtractionResult> {
        if content.len() > self.max_size {
            return Err(IngestionError::ExtractionFailed(format!(
                "Content too large: {} bytes (max {})",
                content.len(),
                self.max_size
            )));
        }

        let mut result = match std::str::from_utf8(content) {
            Ok(s) => ExtractionResult::new(s, "text/plain"),
            Err(_) => {
                let (decoded, actual_encoding, had_errors) =
                    encoding_rs::WINDOWS_1252.decode(content);
                let mut result = ExtractionResult::new(decoded.into_owned(), "text/plain")
                    .with_warning("Content was not valid UTF-8; decoded as Windows-1252");
                result.encoding = if had_errors {
                    "windows-1252-lossy".to_string()
                } else {
                    actual_encoding.name().to_lowercase()
                };
                result
            }
        };
        result.parser = self.name().to_string();

        debug!(
            encoding = %result.encoding,
            size = content.len(),
            "Extracted plain text"
        );

        Ok(result)
    }

    fn supported_types(&self) -> Vec<&'static str> {
        vec!["text/plain"]
    }

    fn name(&self) -> &'static str {
        "plain_text"
    }
}

/// A single PDF text-layer parser
pub trait PdfParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(&self, content: &[u8]) -> Result<String>;
}

/// Whole-document text layer via `pdf-extract`
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractParser;

impl PdfParser for PdfExtractParser {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn parse(&self, content: &[u8]) -> Result<String> {
        pdf_extract::extract_text_from_mem(content)
            .map_err(|e| IngestionError::ExtractionFailed(e.to_string()))
    }
}

/// Page-by-page text via `lopdf`; survives documents whose fonts or
/// structure trip up the whole-document parser
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfParser;

impl PdfParser for LopdfParser {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn parse(&self, content: &[u8]) -> Result<String> {
        let mut document = lopdf::Document::load_mem(content)
            .map_err(|e| IngestionError::ExtractionFailed(format!("failed to load PDF: {}", e)))?;

        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(IngestionError::ExtractionFailed(
                "password-protected PDF".to_string(),
            ));
        }
        document.decompress();

        let mut pages: Vec<u32> = document.get_pages().keys().copied().collect();
        pages.sort_unstable();

        let mut text = String::new();
        for page in pages {
            match document.extract_text(&[page]) {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push('\n');
                }
                Err(e) => debug!(page, error = %e, "Skipping unreadable PDF page"),
            }
        }
        Ok(text)
    }
}

/// PDF extractor: tries each parser in order, first success wins
pub struct PdfTextExtractor {
    parsers: Vec<Arc<dyn PdfParser>>,
}

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self::with_parsers(vec![Arc::new(PdfExtractParser), Arc::new(LopdfParser)])
    }

    pub fn with_parsers(parsers: Vec<Arc<dyn PdfParser>>) -> Self {
        Self { parsers }
    }
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the parsers in order on the calling thread, containing panics
fn parse_with_fallback(parsers: &[Arc<dyn PdfParser>], content: &[u8]) -> Result<ExtractionResult> {
    let mut failures = Vec::new();

    for parser in parsers {
        // Font and stream decoding in the parsers can panic on malformed input.
        let outcome = catch_unwind(AssertUnwindSafe(|| parser.parse(content)))
            .unwrap_or_else(|_| Err(IngestionError::ExtractionFailed("parser panicked".to_string())));

        match outcome {
            Ok(text) => {
                debug!(parser = parser.name(), chars = text.len(), "Extracted PDF text");
                let mut result =
                    ExtractionResult::new(text, "application/pdf").with_parser(parser.name());
                result.warnings = failures;
                return Ok(result);
            }
            Err(e) => {
                warn!(parser = parser.name(), error = %e, "PDF parser failed");
                failures.push(format!("{}: {}", parser.name(), e));
            }
        }
    }

    Err(IngestionError::ExtractionFailed(format!(
        "all PDF parsers failed ({})",
        failures.join("; ")
    )))
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, content: &[u8]) -> Result<ExtractionResult> {
        // Parsing is CPU-bound; keep it off the async worker threads.
        let parsers = self.parsers.clone();
        let content: Arc<[u8]> = Arc::from(content);
        tokio::task::spawn_blocking(move || parse_with_fallback(&parsers, &content))
            .await
            .map_err(|e| IngestionError::ExtractionFailed(format!("PDF parsing task failed: {}", e)))?
    }

    fn supported_types(&self) -> Vec<&'static str> {
        vec!["application/pdf"]
    }

    fn name(&self) -> &'static str {
        "pdf"
    }
}

/// Registry of text extractors
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Create with default extractors
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PdfTextExtractor::new()));
        registry.register(Arc::new(PlainTextExtractor::new()));
        registry
    }

    /// Register an extractor
    pub fn register(&mut self, extractor: Arc<dyn TextExtractor>) {
        self.extractors.push(extractor);
    }

    /// Get extractor for content type
    pub fn get_extractor(&self, content_type: &str) -> Option<Arc<dyn TextExtractor>> {
        self.extractors
            .iter()
            .find(|e| e.can_handle(content_type))
            .cloned()
    }

    /// List all registered extractors
    pub fn list(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

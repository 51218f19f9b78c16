//! Document ingestion for Harbor
//!
//! Turns uploaded vessel documents into classified, persisted records:
//!
//! - Text extraction for PDFs (primary and fallback parsers), images (LLM OCR)
//!   and plain text
//! - Metadata and classification extraction through a single JSON-mode LLM call
//! - Enforcement of the closed maritime taxonomy
//! - A compensating upload sequence across temp storage, permanent storage
//!   and the documents table
//! - Document reads, updates, sharing and the background status worker

pub mod analyzer;
pub mod backends;
pub mod classifier;
pub mod dates;
pub mod documents;
pub mod extractors;
pub mod llm;
pub mod prompts;
pub mod rules;
pub mod saga;
pub mod shares;
pub mod taxonomy;
pub mod upload;
pub mod validator;
pub mod worker;

// Re-exports
pub use analyzer::{DocumentAnalysis, DocumentAnalyzer};
pub use backends::Backends;
pub use classifier::{ExtractedMetadata, MetadataExtractor, RawAnalysis, StructuredExtraction};
pub use documents::{
    BatchDownload, BatchDownloadItem, DocumentPatch, DocumentService, DocumentView, StatusChange,
};
pub use extractors::{
    ExtractionResult, ExtractorRegistry, PdfParser, PdfTextExtractor, PlainTextExtractor,
    TextExtractor,
};
pub use llm::{ChatMessage, LlmClient, OpenAiClient};
pub use shares::{CreateShareRequest, ResolvedShare, ShareOutcome, ShareService};
pub use upload::{UploadError, UploadNotice, UploadOutcome, UploadPipeline, UploadRequest};
pub use validator::validate_classification;
pub use worker::{DocumentWorker, JobQueue};

/// Error types for extraction and classification
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("LLM authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("LLM rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl IngestionError {
    /// Failures that a later attempt cannot fix without operator action
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IngestionError::AuthenticationFailed(_) | IngestionError::UnsupportedFileType(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, IngestionError>;

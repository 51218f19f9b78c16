//! Bytes + MIME type to text, metadata and a validated classification

use std::sync::Arc;
use tracing::{debug, info, warn};

use harbor_core::{Confidence, DocumentCategory, KeyValuePair, ValidatedClassification};

use crate::classifier::{ExtractedMetadata, MetadataExtractor, StructuredExtraction};
use crate::extractors::ExtractorRegistry;
use crate::llm::LlmClient;
use crate::validator::{manual_review_classification, validate_classification};
use crate::{IngestionError, Result};

/// Stored in place of document text when nothing could be extracted
pub const EXTRACTION_FAILED_TEXT: &str = "Text extraction failed";

/// Everything learned about an uploaded file
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentAnalysis {
    pub text: String,
    pub metadata: Option<ExtractedMetadata>,
    pub classification: ValidatedClassification,
    pub key_value_pairs: Vec<KeyValuePair>,
    /// Why the classification fell back to manual-review defaults
    pub degraded: Option<String>,
    pub warnings: Vec<String>,
}

impl DocumentAnalysis {
    /// Analysis used when the file could not be read at all
    pub fn failed(reason: &str) -> Self {
        Self {
            text: EXTRACTION_FAILED_TEXT.to_string(),
            metadata: None,
            classification: manual_review_classification("text extraction failed"),
            key_value_pairs: Vec::new(),
            degraded: Some(reason.to_string()),
            warnings: Vec::new(),
        }
    }

    fn from_extraction(text: String, extraction: StructuredExtraction) -> Self {
        let classification =
            validate_classification(&extraction.classification, Some(&extraction.metadata));
        Self {
            text,
            classification,
            key_value_pairs: extraction.key_value_pairs,
            degraded: extraction
                .parse_failure
                .map(|reason| format!("AI response could not be parsed: {}", reason)),
            metadata: Some(extraction.metadata),
            warnings: Vec::new(),
        }
    }

    pub fn expiry_date(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.expiry_date.as_deref())
    }

    /// Most specific document type known: model's reading first
    pub fn detected_document_type(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.document_type.as_deref())
            .or(self
                .classification
                .original_ai_classification
                .specific_document_type
                .as_deref())
    }
}

/// MIME families the analyzer accepts
pub fn is_supported_mime(mime_type: &str) -> bool {
    let mime = base_mime(mime_type);
    mime == "application/pdf" || mime == "text/plain" || mime.starts_with("image/")
}

fn base_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// Text extractor: dispatches on MIME type and always ends with a
/// validated classification
#[derive(Clone)]
pub struct DocumentAnalyzer {
    registry: Arc<ExtractorRegistry>,
    extractor: MetadataExtractor,
}

impl DocumentAnalyzer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self::with_registry(llm, ExtractorRegistry::with_defaults())
    }

    pub fn with_registry(llm: Arc<dyn LlmClient>, registry: ExtractorRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            extractor: MetadataExtractor::new(llm),
        }
    }

    pub async fn extract(
        &self,
        bytes: &[u8],
        mime_type: &str,
        type_hint: Option<&str>,
    ) -> Result<DocumentAnalysis> {
        let mime = base_mime(mime_type);

        if mime.starts_with("image/") {
            return self.analyze_image(bytes, &mime, type_hint).await;
        }

        let extractor = self
            .registry
            .get_extractor(&mime)
            .ok_or_else(|| IngestionError::UnsupportedFileType(mime.clone()))?;
        let extracted = extractor.extract(bytes).await?;

        if mime == "text/plain" {
            debug!(chars = extracted.text.len(), "Plain text stored without AI analysis");
            return Ok(DocumentAnalysis {
                text: extracted.text,
                metadata: None,
                classification: plain_text_classification(),
                key_value_pairs: Vec::new(),
                degraded: None,
                warnings: extracted.warnings,
            });
        }

        if extracted.is_blank() {
            info!(parser = %extracted.parser, "PDF has no text layer, skipping AI analysis");
            let mut analysis = DocumentAnalysis {
                text: extracted.text,
                metadata: None,
                classification: manual_review_classification("no text layer"),
                key_value_pairs: Vec::new(),
                degraded: Some("PDF contains no extractable text".to_string()),
                warnings: extracted.warnings,
            };
            analysis.warnings.push("PDF contains no extractable text".to_string());
            return Ok(analysis);
        }

        match self.extractor.extract_from_text(&extracted.text, type_hint).await {
            Ok(structured) => {
                let mut analysis = DocumentAnalysis::from_extraction(extracted.text, structured);
                analysis.warnings.extend(extracted.warnings);
                Ok(analysis)
            }
            Err(e) => {
                // The text is still worth keeping; only the classification degrades.
                warn!(error = %e, "Classification failed for extracted PDF text");
                Ok(DocumentAnalysis {
                    text: extracted.text,
                    metadata: None,
                    classification: manual_review_classification("AI analysis failed"),
                    key_value_pairs: Vec::new(),
                    degraded: Some(e.to_string()),
                    warnings: extracted.warnings,
                })
            }
        }
    }

    async fn analyze_image(
        &self,
        bytes: &[u8],
        mime: &str,
        type_hint: Option<&str>,
    ) -> Result<DocumentAnalysis> {
        let structured = self
            .extractor
            .extract_from_image(bytes, mime, type_hint)
            .await?;
        let text = structured.full_text.clone().unwrap_or_default();
        if text.is_empty() {
            warn!(mime, "OCR returned no text");
        }
        Ok(DocumentAnalysis::from_extraction(text, structured))
    }
}

fn plain_text_classification() -> ValidatedClassification {
    ValidatedClassification {
        category: DocumentCategory::General,
        subcategory: "other".to_string(),
        original_ai_classification: Default::default(),
        confidence: Confidence::Medium,
        explanation: "Plain text document; no automatic classification performed".to_string(),
    }
}

//! Metadata and classification extraction
//!
//! Sends either extracted text or an image to the LLM and decodes the reply.
//! The reply is untrusted: the outermost `{...}` span is decoded strictly
//! into [`AnalysisPayload`], and anything else becomes
//! [`RawAnalysis::Unparsed`], which maps to a low-confidence classification
//! flagged for manual review.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use harbor_core::{KeyValuePair, RawClassification};

use crate::dates::normalize_date;
use crate::llm::{ChatMessage, LlmClient};
use crate::prompts;
use crate::Result;

/// Document metadata as reported by the model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub certificate_number: Option<String>,
    #[serde(default)]
    pub issue_date: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub vessel_name: Option<String>,
    #[serde(default)]
    pub imo_number: Option<String>,
}

impl ExtractedMetadata {
    /// Normalize dates and drop blank fields
    fn normalized(self) -> Self {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let date = |v: Option<String>| clean(v).map(|s| normalize_date(&s));
        Self {
            title: clean(self.title),
            document_type: clean(self.document_type),
            issuer: clean(self.issuer),
            certificate_number: clean(self.certificate_number),
            issue_date: date(self.issue_date),
            expiry_date: date(self.expiry_date),
            vessel_name: clean(self.vessel_name),
            imo_number: clean(self.imo_number),
        }
    }
}

/// The JSON object the model is asked to return
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub metadata: ExtractedMetadata,
    pub classification: RawClassification,
    #[serde(default)]
    pub key_value_pairs: Vec<KeyValuePair>,
}

/// Outcome of decoding a model reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawAnalysis {
    Parsed(AnalysisPayload),
    Unparsed { reason: String, raw: String },
}

impl RawAnalysis {
    pub fn parse(content: &str) -> Self {
        let Some(span) = outermost_object(content) else {
            return RawAnalysis::Unparsed {
                reason: "no JSON object in response".to_string(),
                raw: content.to_string(),
            };
        };

        match serde_json::from_str::<AnalysisPayload>(span) {
            Ok(payload) => RawAnalysis::Parsed(payload),
            Err(e) => RawAnalysis::Unparsed {
                reason: e.to_string(),
                raw: content.to_string(),
            },
        }
    }
}

/// First `{` through last `}`
fn outermost_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

/// Classification used when the model reply cannot be decoded
pub fn unparsed_classification() -> RawClassification {
    RawClassification {
        primary_category: Some("general".to_string()),
        subcategory: Some("other".to_string()),
        specific_document_type: None,
        confidence: Some("Low".to_string()),
        explanation: Some(
            "The AI response could not be parsed; manual review required".to_string(),
        ),
    }
}

/// Decoded, date-normalized extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredExtraction {
    /// OCR transcription; only present for image input
    pub full_text: Option<String>,
    pub metadata: ExtractedMetadata,
    pub classification: RawClassification,
    pub key_value_pairs: Vec<KeyValuePair>,
    /// Set when the reply could not be decoded
    pub parse_failure: Option<String>,
}

impl From<RawAnalysis> for StructuredExtraction {
    fn from(analysis: RawAnalysis) -> Self {
        match analysis {
            RawAnalysis::Parsed(payload) => Self {
                full_text: payload.full_text.filter(|t| !t.trim().is_empty()),
                metadata: payload.metadata.normalized(),
                classification: payload.classification,
                key_value_pairs: payload
                    .key_value_pairs
                    .into_iter()
                    .filter(|kv| !kv.key.trim().is_empty())
                    .collect(),
                parse_failure: None,
            },
            RawAnalysis::Unparsed { reason, raw } => {
                warn!(
                    reason = %reason,
                    preview = %raw.chars().take(200).collect::<String>(),
                    "Could not parse LLM response"
                );
                Self {
                    full_text: None,
                    metadata: ExtractedMetadata::default(),
                    classification: unparsed_classification(),
                    key_value_pairs: Vec::new(),
                    parse_failure: Some(reason),
                }
            }
        }
    }
}

/// Metadata & classification extractor backed by an [`LlmClient`]
#[derive(Clone)]
pub struct MetadataExtractor {
    llm: Arc<dyn LlmClient>,
}

impl MetadataExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Analyze text already pulled out of a document
    pub async fn extract_from_text(
        &self,
        text: &str,
        type_hint: Option<&str>,
    ) -> Result<StructuredExtraction> {
        let messages = vec![
            ChatMessage::system(prompts::system_prompt(type_hint)),
            ChatMessage::user(prompts::text_prompt(text, type_hint)),
        ];
        let content = self.llm.complete_json(messages).await?;
        let extraction = StructuredExtraction::from(RawAnalysis::parse(&content));

        debug!(
            parsed = extraction.parse_failure.is_none(),
            pairs = extraction.key_value_pairs.len(),
            "Text analyzed"
        );
        Ok(extraction)
    }

    /// OCR and analyze an image in one round-trip
    pub async fn extract_from_image(
        &self,
        bytes: &[u8],
        mime_type: &str,
        type_hint: Option<&str>,
    ) -> Result<StructuredExtraction> {
        let data_url = format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes));
        let messages = vec![
            ChatMessage::system(prompts::system_prompt(type_hint)),
            ChatMessage::user_with_image(prompts::image_prompt(type_hint), data_url),
        ];
        let content = self.llm.complete_json(messages).await?;
        let extraction = StructuredExtraction::from(RawAnalysis::parse(&content));

        debug!(
            parsed = extraction.parse_failure.is_none(),
            text_chars = extraction.full_text.as_deref().map(str::len).unwrap_or(0),
            "Image analyzed"
        );
        Ok(extraction)
    }
}

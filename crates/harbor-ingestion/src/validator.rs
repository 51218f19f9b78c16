//! Taxonomy enforcement for model classifications
//!
//! Total and idempotent: any input maps to a category and subcategory that
//! exist in [`crate::taxonomy`], and the model's original answer is kept
//! alongside for audit.

use tracing::warn;

use harbor_core::{Confidence, DocumentCategory, RawClassification, ValidatedClassification};

use crate::classifier::ExtractedMetadata;
use crate::taxonomy;

pub const DEFAULT_EXPLANATION: &str = "Classified automatically from the document content";

pub fn validate_classification(
    raw: &RawClassification,
    metadata: Option<&ExtractedMetadata>,
) -> ValidatedClassification {
    let document_type = metadata
        .and_then(|m| m.document_type.as_deref())
        .or(raw.specific_document_type.as_deref())
        .unwrap_or("unknown");

    let parsed = raw
        .primary_category
        .as_deref()
        .map(str::parse::<DocumentCategory>);

    let (category, subcategory) = match parsed {
        Some(Ok(category)) => {
            let subcategory = raw
                .subcategory
                .as_deref()
                .and_then(|s| taxonomy::canonical_subcategory(category, s));
            match subcategory {
                Some(subcategory) => (category, subcategory),
                None => {
                    let fallback = taxonomy::default_subcategory(category);
                    warn!(
                        category = %category,
                        subcategory = ?raw.subcategory,
                        fallback,
                        document_type,
                        "Subcategory not in taxonomy"
                    );
                    (category, fallback)
                }
            }
        }
        _ => {
            warn!(
                category = ?raw.primary_category,
                document_type,
                "Category not in taxonomy, using general/other"
            );
            (DocumentCategory::General, "other")
        }
    };

    let confidence = raw
        .confidence
        .as_deref()
        .and_then(|c| c.parse::<Confidence>().ok())
        .unwrap_or_default();

    let explanation = raw
        .explanation
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_EXPLANATION)
        .to_string();

    ValidatedClassification {
        category,
        subcategory: subcategory.to_string(),
        original_ai_classification: raw.clone(),
        confidence,
        explanation,
    }
}

/// Classification recorded when no usable analysis exists
pub fn manual_review_classification(reason: &str) -> ValidatedClassification {
    ValidatedClassification {
        category: DocumentCategory::General,
        subcategory: "other".to_string(),
        original_ai_classification: RawClassification::default(),
        confidence: Confidence::Low,
        explanation: format!("Automatic classification unavailable ({}); manual review required", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(category: Option<&str>, subcategory: Option<&str>) -> RawClassification {
        RawClassification {
            primary_category: category.map(String::from),
            subcategory: subcategory.map(String::from),
            specific_document_type: Some("Safety Management Certificate".to_string()),
            confidence: Some("High".to_string()),
            explanation: Some("ISM certificate".to_string()),
        }
    }

    #[test]
    fn test_valid_classification_passes_through() {
        let validated = validate_classification(&raw(Some("statutory"), Some("safety")), None);

        assert_eq!(validated.category, DocumentCategory::Statutory);
        assert_eq!(validated.subcategory, "safety");
        assert_eq!(validated.confidence, Confidence::High);
        assert_eq!(validated.explanation, "ISM certificate");
    }

    #[test]
    fn test_invalid_subcategory_uses_first_of_category() {
        let validated =
            validate_classification(&raw(Some("statutory"), Some("invalid_sub")), None);

        assert_eq!(validated.category, DocumentCategory::Statutory);
        assert_eq!(validated.subcategory, "safety");

        let missing = validate_classification(&raw(Some("crew"), None), None);
        assert_eq!(missing.subcategory, "competency");
    }

    #[test]
    fn test_invalid_category_becomes_general_other() {
        let validated =
            validate_classification(&raw(Some("invalid_category"), Some("safety")), None);

        assert_eq!(validated.category, DocumentCategory::General);
        assert_eq!(validated.subcategory, "other");
        assert_eq!(
            validated.original_ai_classification.primary_category.as_deref(),
            Some("invalid_category")
        );

        let missing = validate_classification(&RawClassification::default(), None);
        assert_eq!(missing.category, DocumentCategory::General);
        assert_eq!(missing.confidence, Confidence::Medium);
        assert_eq!(missing.explanation, DEFAULT_EXPLANATION);
    }

    #[test]
    fn test_output_is_always_in_taxonomy() {
        let inputs = [
            raw(Some("Commercial"), Some("Cargo")),
            raw(Some("inspection"), Some("port state control")),
            raw(Some(""), Some("")),
            raw(None, Some("other")),
            raw(Some("general"), Some("drawings")),
        ];
        for input in inputs {
            let validated = validate_classification(&input, None);
            assert!(taxonomy::is_valid(validated.category.as_str(), &validated.subcategory));
        }
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            raw(Some("statutory"), Some("safety")),
            raw(Some("statutory"), Some("invalid_sub")),
            raw(Some("invalid_category"), None),
            RawClassification::default(),
        ];
        for input in inputs {
            let once = validate_classification(&input, None);
            let twice = validate_classification(&once.original_ai_classification, None);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_manual_review_classification() {
        let fallback = manual_review_classification("text extraction failed");
        assert_eq!(fallback.category, DocumentCategory::General);
        assert_eq!(fallback.subcategory, "other");
        assert_eq!(fallback.confidence, Confidence::Low);
        assert!(fallback.explanation.contains("manual review"));
    }
}

//! Document upload orchestration
//!
//! Upload runs as a saga over three stores that share no transaction:
//!
//! 1. Validate the request (no side effects)
//! 2. Check the vessel exists
//! 3. Stage the file in the temp bucket            (undo: remove temp object)
//! 4. Extract text and classify (failure is non-fatal)
//! 5. Settle category and subcategory
//! 6. Copy to the permanent bucket, drop the temp   (undo: remove permanent object)
//! 7. Derive permanence, expiry and status
//! 8. Insert the document row
//! 9. Write the `upload` access log (best-effort)
//! 10. Queue a status recompute (fire-and-forget)
//!
//! A failure at steps 3, 6 or 8 runs the recorded undo steps newest-first
//! and returns the error of the step that failed.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use harbor_backend::Bucket;
use harbor_core::{
    AccessAction, AccessLogEntry, AppError, CompanyId, Document, DocumentCategory, DocumentId,
    Job, JobPublisher, UploadConfig, UserId, VesselId,
};

use crate::analyzer::{DocumentAnalysis, DocumentAnalyzer};
use crate::backends::Backends;
use crate::dates::normalize_date;
use crate::rules::{initial_status, resolve_permanence, PermanenceInputs};
use crate::saga::{Compensation, Saga};
use crate::taxonomy;

/// MIME types accepted for upload, with the extension used for storage keys
pub const ALLOWED_MIME_TYPES: &[(&str, &str)] = &[
    ("application/pdf", ".pdf"),
    ("image/jpeg", ".jpg"),
    ("image/png", ".png"),
    ("image/gif", ".gif"),
    ("image/webp", ".webp"),
    ("text/plain", ".txt"),
];

/// Errors that abort an upload
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Permission(String),

    #[error("Vessel not found: {0}")]
    VesselNotFound(String),

    #[error("Failed to upload file to temporary storage: {0}")]
    StorageUploadFailed(String),

    #[error("Failed to move file to permanent storage: {0}")]
    StorageMoveFailed(String),

    #[error("Failed to save document record: {0}")]
    PersistenceFailed(String),

    #[error("Backend unavailable: {0}")]
    Upstream(String),
}

impl UploadError {
    pub fn status_code(&self) -> u16 {
        match self {
            UploadError::Validation(_) => 400,
            UploadError::Permission(_) => 403,
            UploadError::VesselNotFound(_) => 404,
            _ => 500,
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Validation(msg) => AppError::validation(msg),
            UploadError::Permission(msg) => AppError::permission(msg),
            UploadError::VesselNotFound(_) => AppError::not_found(err.to_string()),
            _ => AppError::upstream(err.to_string()),
        }
    }
}

/// Non-fatal conditions reported alongside a created document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadNotice {
    /// Text extraction or classification fell back to manual-review defaults
    ExtractionDegraded { reason: String },
    AccessLogFailed { reason: String },
    StatusJobNotQueued { reason: String },
}

impl UploadNotice {
    pub fn message(&self) -> String {
        match self {
            UploadNotice::ExtractionDegraded { reason } => format!(
                "Automatic extraction was incomplete ({}); please review the classification",
                reason
            ),
            UploadNotice::AccessLogFailed { reason } => {
                format!("Upload was not recorded in the access log: {}", reason)
            }
            UploadNotice::StatusJobNotQueued { reason } => {
                format!("Status refresh was not scheduled: {}", reason)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub document: Document,
    pub notices: Vec<UploadNotice>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

/// Caller-supplied upload metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    #[validate(custom = "not_blank")]
    pub vessel_id: String,
    #[validate(custom = "not_blank")]
    pub title: String,
    #[validate(custom = "not_blank")]
    pub document_type: String,
    #[validate(custom = "not_blank")]
    pub user_id: String,
    pub category: Option<String>,
    pub expiry_date: Option<String>,
    pub is_permanent: Option<bool>,
    pub filename: Option<String>,
    pub mime_type: String,
    #[serde(skip)]
    pub company_id: Option<CompanyId>,
    #[serde(skip)]
    pub ip_address: Option<String>,
    #[serde(skip)]
    pub user_agent: Option<String>,
}

/// Request fields after validation
struct CheckedUpload {
    vessel_id: VesselId,
    user_id: UserId,
    mime_type: &'static str,
    extension: String,
    category: Option<DocumentCategory>,
}

/// Required fields in the order they are reported
const REQUIRED_FIELDS: &[(&str, &str)] = &[
    ("vessel_id", "vesselId"),
    ("title", "title"),
    ("document_type", "documentType"),
    ("user_id", "userId"),
];

/// Document persistence orchestrator
#[derive(Clone)]
pub struct UploadPipeline {
    config: UploadConfig,
    backends: Backends,
    analyzer: DocumentAnalyzer,
    jobs: Arc<dyn JobPublisher>,
}

impl UploadPipeline {
    pub fn new(
        config: UploadConfig,
        backends: Backends,
        analyzer: DocumentAnalyzer,
        jobs: Arc<dyn JobPublisher>,
    ) -> Self {
        Self {
            config,
            backends,
            analyzer,
            jobs,
        }
    }

    #[instrument(skip(self, bytes, request), fields(vessel_id = %request.vessel_id, size = bytes.len()))]
    pub async fn upload(
        &self,
        bytes: &[u8],
        request: UploadRequest,
    ) -> Result<UploadOutcome, UploadError> {
        let checked = self.check(bytes, &request)?;
        let company_id = request.company_id.ok_or_else(|| {
            UploadError::Permission("A company is required to upload documents".to_string())
        })?;

        let vessel = self
            .backends
            .vessels
            .get(checked.vessel_id)
            .await
            .map_err(|e| UploadError::Upstream(e.to_string()))?
            .ok_or_else(|| UploadError::VesselNotFound(checked.vessel_id.to_string()))?;

        if vessel.company_id != company_id {
            // Same response as a missing vessel; other tenants' vessels are invisible.
            return Err(UploadError::VesselNotFound(checked.vessel_id.to_string()));
        }

        let document_id = DocumentId::new();
        let file_name = format!("{}{}", Uuid::new_v4(), checked.extension);
        let temp_path = format!("{}/{}", checked.user_id, file_name);
        let mut saga = Saga::new("document_upload", self.backends.storage.as_ref());

        self.backends
            .storage
            .upload(Bucket::Temp, &temp_path, bytes, checked.mime_type)
            .await
            .map_err(|e| UploadError::StorageUploadFailed(e.to_string()))?;
        let temp_step = Compensation::remove_object(Bucket::Temp, &temp_path);
        saga.record(temp_step.clone());

        let mut notices = Vec::new();
        let analysis = match self
            .analyzer
            .extract(bytes, checked.mime_type, Some(&request.document_type))
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(document_id = %document_id, error = %e, "Text extraction failed, continuing with defaults");
                DocumentAnalysis::failed(&e.to_string())
            }
        };
        if let Some(reason) = &analysis.degraded {
            notices.push(UploadNotice::ExtractionDegraded {
                reason: reason.clone(),
            });
        }

        let (category, subcategory) = settle_classification(&analysis, checked.category);

        let permanent_path = permanent_path(
            &checked.vessel_id,
            &request.document_type,
            category,
            &checked.user_id,
            &file_name,
        );
        if let Err(e) = self
            .backends
            .storage
            .copy_object(
                (Bucket::Temp, &temp_path),
                (Bucket::Permanent, &permanent_path),
                checked.mime_type,
            )
            .await
        {
            return Err(saga
                .abort(UploadError::StorageMoveFailed(e.to_string()))
                .await);
        }
        saga.record(Compensation::remove_object(Bucket::Permanent, &permanent_path));

        match self
            .backends
            .storage
            .remove(Bucket::Temp, std::slice::from_ref(&temp_path))
            .await
        {
            Ok(()) => saga.release(&temp_step),
            Err(e) => warn!(path = %temp_path, error = %e, "Failed to remove temp object"),
        }

        let caller_expiry = request.expiry_date.as_deref().map(normalize_date);
        let document_type_for_rules = analysis
            .detected_document_type()
            .unwrap_or(&request.document_type);
        let permanence = resolve_permanence(&PermanenceInputs {
            document_type: document_type_for_rules,
            category: Some(category),
            ai_expiry_date: analysis.expiry_date(),
            caller_is_permanent: request.is_permanent,
            caller_expiry_date: caller_expiry.as_deref(),
        });

        let now = Utc::now();
        let metadata = analysis.metadata.clone().unwrap_or_default();
        let document = Document {
            id: document_id,
            vessel_id: checked.vessel_id,
            title: request.title.trim().to_string(),
            document_type: request.document_type.trim().to_string(),
            category,
            subcategory,
            classification_confidence: analysis.classification.confidence,
            classification_explanation: analysis.classification.explanation.clone(),
            original_ai_classification: Some(
                analysis.classification.original_ai_classification.clone(),
            ),
            issuer: metadata.issuer,
            certificate_number: metadata.certificate_number,
            issue_date: metadata.issue_date,
            expiry_date: permanence.expiry_date().map(String::from),
            is_permanent: permanence.is_permanent(),
            status: initial_status(
                &permanence,
                now.date_naive(),
                self.config.expiring_soon_days,
            ),
            is_archived: false,
            full_text: analysis.text,
            file_path: permanent_path,
            file_type: checked.mime_type.to_string(),
            file_size: bytes.len() as u64,
            original_filename: request.filename.clone(),
            key_value_pairs: analysis.key_value_pairs,
            uploaded_by: checked.user_id,
            created_at: now,
            updated_at: now,
        };

        let stored = match self.backends.documents.insert(&document).await {
            Ok(stored) => stored,
            Err(e) => {
                return Err(saga
                    .abort(UploadError::PersistenceFailed(e.to_string()))
                    .await)
            }
        };
        saga.commit();

        let mut entry = AccessLogEntry::new(AccessAction::Upload).with_document(stored.id);
        entry.user_id = Some(checked.user_id);
        entry.ip_address = request.ip_address.clone();
        entry.user_agent = request.user_agent.clone();
        if let Some(reason) = self.backends.record_access(entry).await {
            notices.push(UploadNotice::AccessLogFailed { reason });
        }

        if let Err(e) = self
            .jobs
            .publish(Job::RecomputeStatus {
                document_id: stored.id,
            })
            .await
        {
            warn!(document_id = %stored.id, error = %e, "Failed to queue status recompute");
            notices.push(UploadNotice::StatusJobNotQueued {
                reason: e.to_string(),
            });
        }

        info!(
            document_id = %stored.id,
            category = %stored.category,
            subcategory = %stored.subcategory,
            is_permanent = stored.is_permanent,
            notices = notices.len(),
            "Document uploaded"
        );

        Ok(UploadOutcome {
            document: stored,
            notices,
        })
    }

    fn check(&self, bytes: &[u8], request: &UploadRequest) -> Result<CheckedUpload, UploadError> {
        if let Err(errors) = request.validate() {
            let fields = errors.field_errors();
            let missing = REQUIRED_FIELDS
                .iter()
                .find(|(field, _)| fields.contains_key(field))
                .map(|(_, name)| *name)
                .unwrap_or("request");
            return Err(UploadError::Validation(format!(
                "Missing required field: {}",
                missing
            )));
        }

        let vessel_id = VesselId::parse(request.vessel_id.trim())
            .ok_or_else(|| UploadError::Validation("Invalid vesselId".to_string()))?;
        let user_id = UserId::parse(request.user_id.trim())
            .ok_or_else(|| UploadError::Validation("Invalid userId".to_string()))?;

        let (mime_type, default_extension) = resolve_mime(request)?;

        if bytes.len() as u64 > self.config.max_file_size_bytes {
            return Err(UploadError::Validation(format!(
                "File size exceeds the maximum limit of {}MB",
                self.config.max_file_size_bytes / (1024 * 1024)
            )));
        }

        let extension = request
            .filename
            .as_deref()
            .and_then(|f| Path::new(f).extension())
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_else(|| default_extension.to_string());

        let category = request
            .category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .and_then(|c| c.parse::<DocumentCategory>().ok());

        Ok(CheckedUpload {
            vessel_id,
            user_id,
            mime_type,
            extension,
            category,
        })
    }
}

/// Declared MIME type, or the one implied by the filename when the client
/// sent none or a generic one
fn resolve_mime(request: &UploadRequest) -> Result<(&'static str, &'static str), UploadError> {
    let declared = request
        .mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    let mime = if declared.is_empty() || declared == "application/octet-stream" {
        request
            .filename
            .as_deref()
            .and_then(|f| mime_guess::from_path(f).first())
            .map(|m| m.essence_str().to_string())
            .unwrap_or(declared)
    } else {
        declared
    };

    ALLOWED_MIME_TYPES
        .iter()
        .find(|(allowed, _)| *allowed == mime)
        .copied()
        .ok_or_else(|| {
            UploadError::Validation(format!(
                "Unsupported file type: {}",
                if mime.is_empty() { "unknown" } else { mime.as_str() }
            ))
        })
}

/// Final category: the validated classification, unless analysis degraded
/// and the caller declared a category of their own
fn settle_classification(
    analysis: &DocumentAnalysis,
    caller_category: Option<DocumentCategory>,
) -> (DocumentCategory, String) {
    let classification = &analysis.classification;
    let ai_category = match (&analysis.degraded, caller_category) {
        (Some(_), Some(_)) => None,
        _ => Some(classification.category),
    };
    let category = resolve_category(ai_category, caller_category);

    let subcategory = if category == classification.category {
        classification.subcategory.clone()
    } else {
        taxonomy::default_subcategory(category).to_string()
    };
    (category, subcategory)
}

pub fn resolve_category(
    validated: Option<DocumentCategory>,
    caller: Option<DocumentCategory>,
) -> DocumentCategory {
    validated.or(caller).unwrap_or(DocumentCategory::Statutory)
}

fn path_segment(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect()
}

pub fn permanent_path(
    vessel_id: &VesselId,
    document_type: &str,
    category: DocumentCategory,
    user_id: &UserId,
    file_name: &str,
) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        vessel_id,
        path_segment(document_type),
        category,
        user_id,
        file_name
    )
}

//! Document reads, updates and lifecycle operations

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use harbor_backend::Bucket;
use harbor_core::{
    AccessAction, AccessLogEntry, Actor, AppError, AppResult, CompanyId, Document, DocumentId,
    DocumentJson, DocumentStatus, Job, JobPublisher, RawClassification, Vessel, VesselId,
};

use crate::analyzer::DocumentAnalyzer;
use crate::backends::Backends;
use crate::dates::normalize_date;
use crate::rules::{compute_status, requires_expiry, EXPIRING_SOON_DAYS};
use crate::validator::validate_classification;

/// A document with a time-limited download link
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentView {
    pub document: Document,
    pub download_url: Option<String>,
}

impl Serialize for DocumentView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        DocumentJson::from(&self.document)
            .with_download_url(self.download_url.as_deref())
            .serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDownloadItem {
    pub document_id: DocumentId,
    pub title: String,
    pub file_name: String,
    pub download_url: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDownload {
    pub items: Vec<BatchDownloadItem>,
    /// Requested ids that matched no document
    pub missing: Vec<DocumentId>,
}

/// Editable document fields. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub document_type: Option<String>,
    pub issuer: Option<String>,
    pub certificate_number: Option<String>,
    pub issue_date: Option<String>,
    pub expiry_date: Option<String>,
    pub is_permanent: Option<bool>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self == &DocumentPatch::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub document_id: DocumentId,
    pub previous: DocumentStatus,
    pub current: DocumentStatus,
    pub changed: bool,
}

/// Document operations other than upload
#[derive(Clone)]
pub struct DocumentService {
    backends: Backends,
    analyzer: DocumentAnalyzer,
    jobs: Arc<dyn JobPublisher>,
    signed_url_ttl: Duration,
    expiring_soon_days: i64,
}

impl DocumentService {
    pub fn new(
        backends: Backends,
        analyzer: DocumentAnalyzer,
        jobs: Arc<dyn JobPublisher>,
    ) -> Self {
        Self {
            backends,
            analyzer,
            jobs,
            signed_url_ttl: Duration::from_secs(3600),
            expiring_soon_days: EXPIRING_SOON_DAYS,
        }
    }

    pub fn with_signed_url_ttl(mut self, ttl: Duration) -> Self {
        self.signed_url_ttl = ttl;
        self
    }

    pub fn with_expiring_soon_days(mut self, days: i64) -> Self {
        self.expiring_soon_days = days;
        self
    }

    pub(crate) fn backends(&self) -> &Backends {
        &self.backends
    }

    pub(crate) fn signed_url_ttl(&self) -> Duration {
        self.signed_url_ttl
    }

    async fn load(&self, id: DocumentId) -> AppResult<Document> {
        self.backends
            .documents
            .get(id)
            .await
            .map_err(|e| AppError::upstream(e.to_string()))?
            .ok_or_else(|| AppError::not_found(format!("Document not found: {}", id)))
    }

    async fn load_vessel(&self, id: VesselId) -> AppResult<Vessel> {
        self.backends
            .vessels
            .get(id)
            .await
            .map_err(|e| AppError::upstream(e.to_string()))?
            .ok_or_else(|| AppError::not_found(format!("Vessel not found: {}", id)))
    }

    /// Document readable by the actor; other companies' documents look missing
    async fn load_for(&self, id: DocumentId, actor: &Actor) -> AppResult<Document> {
        let company_id = require_company(actor)?;
        let document = self.load(id).await?;
        let vessel = self.load_vessel(document.vessel_id).await?;
        if vessel.company_id != company_id {
            return Err(AppError::not_found(format!("Document not found: {}", id)));
        }
        Ok(document)
    }

    pub(crate) async fn signed_url(&self, document: &Document) -> Result<String, String> {
        self.backends
            .storage
            .create_signed_url(Bucket::Permanent, &document.file_path, self.signed_url_ttl)
            .await
            .map_err(|e| e.to_string())
    }

    async fn with_download_urls(&self, documents: Vec<Document>) -> Vec<DocumentView> {
        let urls = join_all(documents.iter().map(|d| self.signed_url(d))).await;
        documents
            .into_iter()
            .zip(urls)
            .map(|(document, url)| {
                let download_url = match url {
                    Ok(url) => Some(url),
                    Err(e) => {
                        warn!(document_id = %document.id, error = %e, "Failed to sign download URL");
                        None
                    }
                };
                DocumentView {
                    document,
                    download_url,
                }
            })
            .collect()
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn view_document(&self, id: DocumentId, actor: &Actor) -> AppResult<DocumentView> {
        let document = self.load_for(id, actor).await?;
        let mut views = self.with_download_urls(vec![document]).await;
        let view = views
            .pop()
            .ok_or_else(|| AppError::internal("download URL fan-out lost the document"))?;

        self.backends
            .record_access(
                AccessLogEntry::new(AccessAction::View)
                    .with_document(id)
                    .with_actor(actor),
            )
            .await;
        Ok(view)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn list_vessel_documents(
        &self,
        vessel_id: VesselId,
        include_archived: bool,
        actor: &Actor,
    ) -> AppResult<Vec<DocumentView>> {
        let company_id = require_company(actor)?;
        let vessel = self.load_vessel(vessel_id).await?;
        if vessel.company_id != company_id {
            return Err(AppError::not_found(format!("Vessel not found: {}", vessel_id)));
        }

        let documents = self
            .backends
            .documents
            .list_by_vessel(vessel_id, include_archived)
            .await
            .map_err(|e| AppError::upstream(e.to_string()))?;
        debug!(count = documents.len(), "Listing vessel documents");

        Ok(self.with_download_urls(documents).await)
    }

    /// Signed links for several documents at once.
    ///
    /// Fails with 404 when none of the ids exist and 403 when any found
    /// document belongs to another company. Individual signing failures
    /// are reported per item.
    #[instrument(skip(self, ids, actor), fields(count = ids.len()))]
    pub async fn batch_download(
        &self,
        ids: &[DocumentId],
        company_id: CompanyId,
        actor: &Actor,
    ) -> AppResult<BatchDownload> {
        if ids.is_empty() {
            return Err(AppError::validation("documentIds must not be empty"));
        }

        let documents = self
            .backends
            .documents
            .get_many(ids)
            .await
            .map_err(|e| AppError::upstream(e.to_string()))?;
        if documents.is_empty() {
            return Err(AppError::not_found("No documents found"));
        }

        self.ensure_company(&documents, company_id).await?;

        let missing = ids
            .iter()
            .filter(|id| !documents.iter().any(|d| d.id == **id))
            .copied()
            .collect();

        let urls = join_all(documents.iter().map(|d| self.signed_url(d))).await;
        let items: Vec<BatchDownloadItem> = documents
            .iter()
            .zip(urls)
            .map(|(document, url)| {
                let (download_url, error) = match url {
                    Ok(url) => (Some(url), None),
                    Err(e) => (None, Some(e)),
                };
                BatchDownloadItem {
                    document_id: document.id,
                    title: document.title.clone(),
                    file_name: download_name(document),
                    download_url,
                    error,
                }
            })
            .collect();

        for item in items.iter().filter(|i| i.download_url.is_some()) {
            self.backends
                .record_access(
                    AccessLogEntry::new(AccessAction::Download)
                        .with_document(item.document_id)
                        .with_actor(actor),
                )
                .await;
        }

        Ok(BatchDownload { items, missing })
    }

    /// Every document must sit on a vessel owned by `company_id`
    pub(crate) async fn ensure_company(
        &self,
        documents: &[Document],
        company_id: CompanyId,
    ) -> AppResult<()> {
        let mut vessel_ids: Vec<VesselId> = documents.iter().map(|d| d.vessel_id).collect();
        vessel_ids.sort();
        vessel_ids.dedup();

        for vessel_id in vessel_ids {
            let owner = self
                .backends
                .vessels
                .get(vessel_id)
                .await
                .map_err(|e| AppError::upstream(e.to_string()))?
                .map(|v| v.company_id);
            if owner != Some(company_id) {
                warn!(vessel_id = %vessel_id, company_id = %company_id, "Cross-company document access denied");
                return Err(AppError::permission(
                    "You do not have access to one or more of the requested documents",
                ));
            }
        }
        Ok(())
    }

    #[instrument(skip(self, patch, actor), fields(user_id = %actor.user_id))]
    pub async fn update_document(
        &self,
        id: DocumentId,
        patch: DocumentPatch,
        actor: &Actor,
    ) -> AppResult<Document> {
        if patch.is_empty() {
            return Err(AppError::validation("No fields to update"));
        }
        let mut document = self.load_for(id, actor).await?;

        if let Some(title) = non_blank(&patch.title) {
            document.title = title;
        }
        if let Some(document_type) = non_blank(&patch.document_type) {
            document.document_type = document_type;
        }
        if let Some(issuer) = patch.issuer.as_deref() {
            document.issuer = Some(issuer.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(number) = patch.certificate_number.as_deref() {
            document.certificate_number = Some(number.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(date) = non_blank(&patch.issue_date) {
            document.issue_date = Some(normalize_date(&date));
        }

        if patch.category.is_some() || patch.subcategory.is_some() {
            let requested = RawClassification {
                primary_category: patch
                    .category
                    .clone()
                    .or_else(|| Some(document.category.to_string())),
                subcategory: patch.subcategory.clone(),
                specific_document_type: Some(document.document_type.clone()),
                confidence: Some(document.classification_confidence.to_string()),
                explanation: Some("Classification set manually".to_string()),
            };
            let validated = validate_classification(&requested, None);
            document.category = validated.category;
            document.subcategory = validated.subcategory;
            document.classification_explanation = validated.explanation;
        }

        apply_permanence(&mut document, &patch)?;
        if let Some(status) = compute_status(
            document.is_permanent,
            document.expiry_date.as_deref(),
            Utc::now().date_naive(),
            self.expiring_soon_days,
        ) {
            document.status = status;
        }
        document.updated_at = Utc::now();

        let updated = self
            .backends
            .documents
            .update(&document)
            .await
            .map_err(|e| AppError::upstream(e.to_string()))?;

        self.backends
            .record_access(
                AccessLogEntry::new(AccessAction::Update)
                    .with_document(id)
                    .with_actor(actor),
            )
            .await;
        self.publish(Job::RecomputeStatus { document_id: id }).await;

        info!(document_id = %id, "Document updated");
        Ok(updated)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn archive_document(&self, id: DocumentId, actor: &Actor) -> AppResult<Document> {
        let mut document = self.load_for(id, actor).await?;
        if document.is_archived {
            return Ok(document);
        }

        document.is_archived = true;
        document.updated_at = Utc::now();
        let archived = self
            .backends
            .documents
            .update(&document)
            .await
            .map_err(|e| AppError::upstream(e.to_string()))?;

        self.backends
            .record_access(
                AccessLogEntry::new(AccessAction::Archive)
                    .with_document(id)
                    .with_actor(actor),
            )
            .await;

        info!(document_id = %id, "Document archived");
        Ok(archived)
    }

    /// Recompute the expiry-derived status; writes only when it changed
    #[instrument(skip(self))]
    pub async fn recompute_status(&self, id: DocumentId) -> AppResult<StatusChange> {
        let mut document = self.load(id).await?;
        let previous = document.status;

        let current = match compute_status(
            document.is_permanent,
            document.expiry_date.as_deref(),
            Utc::now().date_naive(),
            self.expiring_soon_days,
        ) {
            Some(status) => status,
            None => {
                warn!(
                    document_id = %id,
                    expiry_date = ?document.expiry_date,
                    "Expiry date not understood, status left unchanged"
                );
                previous
            }
        };

        if current == previous {
            debug!(document_id = %id, status = previous.as_str(), "Status unchanged");
            return Ok(StatusChange {
                document_id: id,
                previous,
                current,
                changed: false,
            });
        }

        document.status = current;
        document.updated_at = Utc::now();
        self.backends
            .documents
            .update(&document)
            .await
            .map_err(|e| AppError::upstream(e.to_string()))?;

        info!(
            document_id = %id,
            from = previous.as_str(),
            to = current.as_str(),
            "Document status changed"
        );
        Ok(StatusChange {
            document_id: id,
            previous,
            current,
            changed: true,
        })
    }

    /// Manual recompute on behalf of a caller. Visibility is checked without
    /// touching the access log.
    pub async fn recompute_status_for(
        &self,
        id: DocumentId,
        actor: &Actor,
    ) -> AppResult<StatusChange> {
        self.load_for(id, actor).await?;
        self.recompute_status(id).await
    }

    /// Queue a reprocess job after checking the document is visible
    pub async fn request_reprocess(&self, id: DocumentId, actor: &Actor) -> AppResult<()> {
        self.load_for(id, actor).await?;
        self.jobs
            .publish(Job::ReprocessDocument { document_id: id })
            .await
            .map_err(|e| AppError::internal(format!("Could not queue reprocessing: {}", e)))
    }

    /// Download the stored file, analyze it again and write back the
    /// classification and extracted metadata
    #[instrument(skip(self))]
    pub async fn reprocess_document(&self, id: DocumentId) -> AppResult<Document> {
        let mut document = self.load(id).await?;

        let bytes = self
            .backends
            .storage
            .download(Bucket::Permanent, &document.file_path)
            .await
            .map_err(|e| AppError::upstream(format!("Failed to download document: {}", e)))?;

        let analysis = self
            .analyzer
            .extract(&bytes, &document.file_type, Some(&document.document_type))
            .await
            .map_err(|e| AppError::upstream(format!("Reprocessing failed: {}", e)))?;

        if let Some(reason) = &analysis.degraded {
            // Keep the previous classification rather than replace it with defaults.
            warn!(document_id = %id, reason = %reason, "Reprocessing degraded, classification kept");
        } else {
            document.category = analysis.classification.category;
            document.subcategory = analysis.classification.subcategory.clone();
            document.classification_confidence = analysis.classification.confidence;
            document.classification_explanation = analysis.classification.explanation.clone();
            document.original_ai_classification =
                Some(analysis.classification.original_ai_classification.clone());
        }

        if let Some(metadata) = &analysis.metadata {
            document.issuer = metadata.issuer.clone().or(document.issuer);
            document.certificate_number =
                metadata.certificate_number.clone().or(document.certificate_number);
            document.issue_date = metadata.issue_date.clone().or(document.issue_date);

            if let Some(expiry) = &metadata.expiry_date {
                if requires_expiry(&document.document_type, document.category) {
                    document.expiry_date = Some(expiry.clone());
                    document.is_permanent = false;
                }
            }
        }
        if !analysis.text.trim().is_empty() {
            document.full_text = analysis.text;
        }
        if !analysis.key_value_pairs.is_empty() {
            document.key_value_pairs = analysis.key_value_pairs;
        }
        if let Some(status) = compute_status(
            document.is_permanent,
            document.expiry_date.as_deref(),
            Utc::now().date_naive(),
            self.expiring_soon_days,
        ) {
            document.status = status;
        }
        document.updated_at = Utc::now();

        let updated = self
            .backends
            .documents
            .update(&document)
            .await
            .map_err(|e| AppError::upstream(e.to_string()))?;
        info!(document_id = %id, category = %updated.category, "Document reprocessed");
        Ok(updated)
    }

    async fn publish(&self, job: Job) {
        if let Err(e) = self.jobs.publish(job.clone()).await {
            warn!(job = job.kind(), document_id = %job.document_id(), error = %e, "Failed to queue job");
        }
    }
}

/// Apply permanence edits while keeping exactly one of expiry date and
/// permanence set
/// Every caller-facing operation is scoped to the caller's company
fn require_company(actor: &Actor) -> AppResult<CompanyId> {
    actor.company_id.ok_or_else(|| {
        warn!(user_id = %actor.user_id, "Document access without a company");
        AppError::permission("A company is required to access documents")
    })
}

fn apply_permanence(document: &mut Document, patch: &DocumentPatch) -> AppResult<()> {
    let expiry = non_blank(&patch.expiry_date).map(|d| normalize_date(&d));

    match (patch.is_permanent, expiry) {
        (Some(true), Some(_)) => {
            return Err(AppError::validation(
                "A document cannot be permanent and have an expiry date",
            ))
        }
        (Some(true), None) => {
            document.is_permanent = true;
            document.expiry_date = None;
            document.status = DocumentStatus::Permanent;
        }
        (_, Some(date)) => {
            document.is_permanent = false;
            document.expiry_date = Some(date);
        }
        (Some(false), None) => {
            if document.expiry_date.is_none() {
                return Err(AppError::validation(
                    "An expiry date is required when a document is not permanent",
                ));
            }
            document.is_permanent = false;
        }
        (None, None) => {}
    }
    Ok(())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// File name offered to the browser for a download
fn download_name(document: &Document) -> String {
    if let Some(name) = &document.original_filename {
        return name.clone();
    }
    let extension = document
        .file_path
        .rsplit('/')
        .next()
        .and_then(|f| f.rsplit_once('.'))
        .map(|(_, ext)| format!(".{}", ext))
        .unwrap_or_default();
    format!("{}{}", document.title, extension)
}

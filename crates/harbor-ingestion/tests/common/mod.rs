//! Shared fixtures for harbor-ingestion integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use harbor_backend::{
    BackendError, Bucket, DocumentRepository, InMemoryBackend, InMemoryEmailSender,
    InMemoryObjectStorage, ObjectStorage,
};
use harbor_core::{
    CompanyId, Confidence, Document, DocumentCategory, DocumentId, DocumentStatus, JobMessage,
    UploadConfig, UserId, Vessel, VesselId,
};
use harbor_ingestion::{
    Backends, ChatMessage, DocumentAnalyzer, DocumentService, IngestionError, JobQueue, LlmClient,
    UploadPipeline, UploadRequest,
};

/// LLM double that replays one canned reply and counts calls
pub struct ScriptedLlm {
    reply: std::result::Result<String, IngestionError>,
    calls: Mutex<usize>,
}

impl ScriptedLlm {
    pub fn replying(json: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(json.to_string()),
            calls: Mutex::new(0),
        })
    }

    pub fn failing(error: IngestionError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(error),
            calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete_json(&self, _messages: Vec<ChatMessage>) -> harbor_ingestion::Result<String> {
        *self.calls.lock() += 1;
        self.reply.clone()
    }
}

/// Reply shaped like the JSON the classification prompt asks for
pub fn analysis_reply(
    document_type: &str,
    category: &str,
    subcategory: Option<&str>,
    expiry_date: Option<&str>,
) -> serde_json::Value {
    serde_json::json!({
        "fullText": format!("{} issued to MV Northern Star", document_type),
        "metadata": {
            "title": document_type,
            "documentType": document_type,
            "issuer": "Maritime Authority",
            "certificateNumber": "NS-2041",
            "issueDate": "2025-03-15",
            "expiryDate": expiry_date,
            "vesselName": "MV Northern Star",
            "imoNumber": "9876543"
        },
        "classification": {
            "primaryCategory": category,
            "subcategory": subcategory,
            "specificDocumentType": document_type,
            "confidence": "High",
            "explanation": "Issued under SOLAS"
        },
        "keyValuePairs": [{"key": "Port of Registry", "value": "Monrovia"}]
    })
}

/// Object storage that refuses writes to one bucket
pub struct RejectingStorage {
    pub inner: InMemoryObjectStorage,
    pub reject_uploads_to: Bucket,
}

#[async_trait]
impl ObjectStorage for RejectingStorage {
    async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> harbor_backend::Result<()> {
        if bucket == self.reject_uploads_to {
            return Err(BackendError::Storage(format!("{} bucket unavailable", bucket)));
        }
        self.inner.upload(bucket, path, bytes, content_type).await
    }

    async fn download(&self, bucket: Bucket, path: &str) -> harbor_backend::Result<Vec<u8>> {
        self.inner.download(bucket, path).await
    }

    async fn remove(&self, bucket: Bucket, paths: &[String]) -> harbor_backend::Result<()> {
        self.inner.remove(bucket, paths).await
    }

    async fn create_signed_url(
        &self,
        bucket: Bucket,
        path: &str,
        expires_in: Duration,
    ) -> harbor_backend::Result<String> {
        self.inner.create_signed_url(bucket, path, expires_in).await
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> String {
        self.inner.public_url(bucket, path)
    }
}

/// Document table whose inserts always fail
pub struct RejectingInserts {
    pub inner: InMemoryBackend,
}

#[async_trait]
impl DocumentRepository for RejectingInserts {
    async fn insert(&self, _document: &Document) -> harbor_backend::Result<Document> {
        Err(BackendError::Api {
            status: 503,
            message: "database unavailable".to_string(),
        })
    }

    async fn get(&self, id: DocumentId) -> harbor_backend::Result<Option<Document>> {
        DocumentRepository::get(&self.inner, id).await
    }

    async fn get_many(&self, ids: &[DocumentId]) -> harbor_backend::Result<Vec<Document>> {
        self.inner.get_many(ids).await
    }

    async fn update(&self, document: &Document) -> harbor_backend::Result<Document> {
        self.inner.update(document).await
    }

    async fn list_by_vessel(
        &self,
        vessel_id: VesselId,
        include_archived: bool,
    ) -> harbor_backend::Result<Vec<Document>> {
        self.inner.list_by_vessel(vessel_id, include_archived).await
    }
}

/// In-memory wiring around one vessel
pub struct Harness {
    pub tables: InMemoryBackend,
    pub storage: InMemoryObjectStorage,
    pub email: InMemoryEmailSender,
    pub backends: Backends,
    pub company_id: CompanyId,
    pub vessel: Vessel,
    pub user_id: UserId,
    pub queue: JobQueue,
    pub jobs: mpsc::Receiver<JobMessage>,
}

impl Harness {
    pub fn new() -> Self {
        let tables = InMemoryBackend::new();
        let storage = InMemoryObjectStorage::new();
        let email = InMemoryEmailSender::new();
        let company_id = CompanyId::new();
        let vessel = Vessel {
            id: VesselId::new(),
            company_id,
            name: "MV Northern Star".to_string(),
            imo_number: Some("9876543".to_string()),
        };
        tables.add_vessel(vessel.clone());
        let backends = Backends::in_memory(&tables, &storage, &email);
        let (queue, jobs) = JobQueue::channel(16);

        Self {
            tables,
            storage,
            email,
            backends,
            company_id,
            vessel,
            user_id: UserId::new(),
            queue,
            jobs,
        }
    }

    pub fn pipeline(&self, llm: Arc<dyn LlmClient>) -> UploadPipeline {
        self.pipeline_with(DocumentAnalyzer::new(llm))
    }

    pub fn pipeline_with(&self, analyzer: DocumentAnalyzer) -> UploadPipeline {
        UploadPipeline::new(
            UploadConfig::default(),
            self.backends.clone(),
            analyzer,
            Arc::new(self.queue.clone()),
        )
    }

    pub fn service(&self, llm: Arc<dyn LlmClient>) -> DocumentService {
        DocumentService::new(
            self.backends.clone(),
            DocumentAnalyzer::new(llm),
            Arc::new(self.queue.clone()),
        )
    }

    pub fn request(&self, title: &str, document_type: &str, mime_type: &str) -> UploadRequest {
        UploadRequest {
            vessel_id: self.vessel.id.to_string(),
            title: title.to_string(),
            document_type: document_type.to_string(),
            user_id: self.user_id.to_string(),
            mime_type: mime_type.to_string(),
            company_id: Some(self.company_id),
            ..Default::default()
        }
    }

    /// Store a document row directly, bypassing upload
    pub async fn seed_document(&self, expiry_date: Option<String>, status: DocumentStatus) -> Document {
        let now = Utc::now();
        let id = DocumentId::new();
        let path = format!(
            "{}/Safety Equipment Certificate/statutory/{}/{}.pdf",
            self.vessel.id, self.user_id, id
        );
        self.storage
            .upload(Bucket::Permanent, &path, b"%PDF-1.4 seed", "application/pdf")
            .await
            .unwrap();
        let document = Document {
            id,
            vessel_id: self.vessel.id,
            title: "Seeded".to_string(),
            document_type: "Safety Equipment Certificate".to_string(),
            category: DocumentCategory::Statutory,
            subcategory: "safety".to_string(),
            classification_confidence: Confidence::High,
            classification_explanation: "seeded".to_string(),
            original_ai_classification: None,
            issuer: None,
            certificate_number: None,
            issue_date: None,
            is_permanent: expiry_date.is_none(),
            expiry_date,
            status,
            is_archived: false,
            full_text: "seeded text".to_string(),
            file_path: path,
            file_type: "application/pdf".to_string(),
            file_size: 13,
            original_filename: None,
            key_value_pairs: Vec::new(),
            uploaded_by: self.user_id,
            created_at: now,
            updated_at: now,
        };
        self.backends.documents.insert(&document).await.unwrap()
    }
}

//! Table access traits

use async_trait::async_trait;

use harbor_core::{
    AccessLogEntry, Document, DocumentId, Share, Vessel, VesselId,
};

use crate::Result;

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn insert(&self, document: &Document) -> Result<Document>;

    async fn get(&self, id: DocumentId) -> Result<Option<Document>>;

    async fn get_many(&self, ids: &[DocumentId]) -> Result<Vec<Document>>;

    /// Replace the stored row with `document`
    async fn update(&self, document: &Document) -> Result<Document>;

    /// Documents of a vessel, newest first
    async fn list_by_vessel(&self, vessel_id: VesselId, include_archived: bool)
        -> Result<Vec<Document>>;
}

#[async_trait]
pub trait VesselRepository: Send + Sync {
    async fn get(&self, id: VesselId) -> Result<Option<Vessel>>;
}

/// Append-only access log
#[async_trait]
pub trait AccessLogRepository: Send + Sync {
    async fn append(&self, entry: &AccessLogEntry) -> Result<()>;

    async fn list_for_document(&self, document_id: DocumentId) -> Result<Vec<AccessLogEntry>>;
}

#[async_trait]
pub trait ShareRepository: Send + Sync {
    async fn insert(&self, share: &Share) -> Result<Share>;

    async fn get_by_token(&self, token: &str) -> Result<Option<Share>>;
}

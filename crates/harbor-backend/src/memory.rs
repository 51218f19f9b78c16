//! In-memory collaborators for local runs and tests

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use harbor_core::{
    AccessLogEntry, Document, DocumentId, Share, Vessel, VesselId,
};

use crate::repository::{AccessLogRepository, DocumentRepository, ShareRepository, VesselRepository};
use crate::storage::{Bucket, ObjectStorage};
use crate::{BackendError, Result};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// Object storage kept in process memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryObjectStorage {
    objects: Arc<RwLock<HashMap<(Bucket, String), StoredObject>>>,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, bucket: Bucket, path: &str) -> bool {
        self.objects.read().contains_key(&(bucket, path.to_string()))
    }

    /// Paths currently stored in a bucket, sorted
    pub fn paths(&self, bucket: Bucket) -> Vec<String> {
        let mut paths: Vec<String> = self
            .objects
            .read()
            .keys()
            .filter(|(b, _)| *b == bucket)
            .map(|(_, p)| p.clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn content_type(&self, bucket: Bucket, path: &str) -> Option<String> {
        self.objects
            .read()
            .get(&(bucket, path.to_string()))
            .map(|o| o.content_type.clone())
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<()> {
        let mut objects = self.objects.write();
        let key = (bucket, path.to_string());
        if objects.contains_key(&key) {
            return Err(BackendError::Conflict(format!("{}/{}", bucket, path)));
        }
        objects.insert(
            key,
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn download(&self, bucket: Bucket, path: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .get(&(bucket, path.to_string()))
            .map(|o| o.bytes.clone())
            .ok_or_else(|| BackendError::NotFound(format!("{}/{}", bucket, path)))
    }

    async fn remove(&self, bucket: Bucket, paths: &[String]) -> Result<()> {
        let mut objects = self.objects.write();
        for path in paths {
            objects.remove(&(bucket, path.clone()));
        }
        Ok(())
    }

    async fn create_signed_url(
        &self,
        bucket: Bucket,
        path: &str,
        expires_in: Duration,
    ) -> Result<String> {
        if !self.contains(bucket, path) {
            return Err(BackendError::NotFound(format!("{}/{}", bucket, path)));
        }
        Ok(format!(
            "memory://{}/{}?token={}&expires_in={}",
            bucket,
            path,
            uuid::Uuid::new_v4().as_simple(),
            expires_in.as_secs()
        ))
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> String {
        format!("memory://{}/{}", bucket, path)
    }
}

/// Tables kept in process memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    documents: Arc<RwLock<HashMap<DocumentId, Document>>>,
    vessels: Arc<RwLock<HashMap<VesselId, Vessel>>>,
    access_logs: Arc<RwLock<Vec<AccessLogEntry>>>,
    shares: Arc<RwLock<HashMap<String, Share>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vessel(&self, vessel: Vessel) {
        self.vessels.write().insert(vessel.id, vessel);
    }

    pub fn document_count(&self) -> usize {
        self.documents.read().len()
    }

    pub fn access_logs(&self) -> Vec<AccessLogEntry> {
        self.access_logs.read().clone()
    }
}

#[async_trait]
impl DocumentRepository for InMemoryBackend {
    async fn insert(&self, document: &Document) -> Result<Document> {
        let mut documents = self.documents.write();
        if documents.contains_key(&document.id) {
            return Err(BackendError::Conflict(document.id.to_string()));
        }
        documents.insert(document.id, document.clone());
        Ok(document.clone())
    }

    async fn get(&self, id: DocumentId) -> Result<Option<Document>> {
        Ok(self.documents.read().get(&id).cloned())
    }

    async fn get_many(&self, ids: &[DocumentId]) -> Result<Vec<Document>> {
        let documents = self.documents.read();
        Ok(ids.iter().filter_map(|id| documents.get(id).cloned()).collect())
    }

    async fn update(&self, document: &Document) -> Result<Document> {
        let mut documents = self.documents.write();
        match documents.get_mut(&document.id) {
            Some(existing) => {
                *existing = document.clone();
                Ok(document.clone())
            }
            None => Err(BackendError::NotFound(document.id.to_string())),
        }
    }

    async fn list_by_vessel(
        &self,
        vessel_id: VesselId,
        include_archived: bool,
    ) -> Result<Vec<Document>> {
        let mut documents: Vec<Document> = self
            .documents
            .read()
            .values()
            .filter(|d| d.vessel_id == vessel_id && (include_archived || !d.is_archived))
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }
}

#[async_trait]
impl VesselRepository for InMemoryBackend {
    async fn get(&self, id: VesselId) -> Result<Option<Vessel>> {
        Ok(self.vessels.read().get(&id).cloned())
    }
}

#[async_trait]
impl AccessLogRepository for InMemoryBackend {
    async fn append(&self, entry: &AccessLogEntry) -> Result<()> {
        self.access_logs.write().push(entry.clone());
        Ok(())
    }

    async fn list_for_document(&self, document_id: DocumentId) -> Result<Vec<AccessLogEntry>> {
        Ok(self
            .access_logs
            .read()
            .iter()
            .filter(|e| e.document_id == Some(document_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ShareRepository for InMemoryBackend {
    async fn insert(&self, share: &Share) -> Result<Share> {
        self.shares.write().insert(share.token.clone(), share.clone());
        Ok(share.clone())
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Share>> {
        Ok(self.shares.read().get(token).cloned())
    }
}

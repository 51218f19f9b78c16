//! Collaborator handles shared by the upload pipeline and document services

use std::sync::Arc;
use tracing::warn;

use harbor_backend::{
    AccessLogRepository, DocumentRepository, EmailSender, InMemoryBackend, InMemoryEmailSender,
    InMemoryObjectStorage, ObjectStorage, ShareRepository, VesselRepository,
};
use harbor_core::AccessLogEntry;

#[derive(Clone)]
pub struct Backends {
    pub storage: Arc<dyn ObjectStorage>,
    pub documents: Arc<dyn DocumentRepository>,
    pub vessels: Arc<dyn VesselRepository>,
    pub access_logs: Arc<dyn AccessLogRepository>,
    pub shares: Arc<dyn ShareRepository>,
    pub email: Arc<dyn EmailSender>,
}

impl Backends {
    /// Wire every collaborator to process-local implementations
    pub fn in_memory(
        tables: &InMemoryBackend,
        storage: &InMemoryObjectStorage,
        email: &InMemoryEmailSender,
    ) -> Self {
        let tables = Arc::new(tables.clone());
        Self {
            storage: Arc::new(storage.clone()),
            documents: tables.clone(),
            vessels: tables.clone(),
            access_logs: tables.clone(),
            shares: tables,
            email: Arc::new(email.clone()),
        }
    }

    /// Append to the access log. Failures are logged and reported back,
    /// never propagated.
    pub async fn record_access(&self, entry: AccessLogEntry) -> Option<String> {
        match self.access_logs.append(&entry).await {
            Ok(()) => None,
            Err(e) => {
                warn!(
                    action = entry.action.as_str(),
                    document_id = ?entry.document_id,
                    error = %e,
                    "Failed to write access log"
                );
                Some(e.to_string())
            }
        }
    }
}

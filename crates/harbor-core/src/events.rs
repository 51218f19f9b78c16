//! Background job messages.
//!
//! Work that must not hold up the HTTP response (status recomputation,
//! re-running extraction) is published as a [`JobMessage`] and consumed by a
//! detached worker. Callers observe the result by re-fetching the document.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::DocumentId;

/// Work items understood by the document worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    /// Recompute the expiry-derived status of a document
    RecomputeStatus { document_id: DocumentId },
    /// Download the stored file and run extraction/classification again
    ReprocessDocument { document_id: DocumentId },
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::RecomputeStatus { .. } => "document.recompute_status",
            Job::ReprocessDocument { .. } => "document.reprocess",
        }
    }

    pub fn document_id(&self) -> DocumentId {
        match self {
            Job::RecomputeStatus { document_id } | Job::ReprocessDocument { document_id } => {
                *document_id
            }
        }
    }
}

/// Envelope carried on the job queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub id: Uuid,
    pub job: Job,
    pub enqueued_at: DateTime<Utc>,
}

impl JobMessage {
    pub fn new(job: Job) -> Self {
        Self {
            id: Uuid::new_v4(),
            job,
            enqueued_at: Utc::now(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("job queue is closed")]
    QueueClosed,

    #[error("job queue is full")]
    QueueFull,
}

/// Trait for publishing jobs to a queue.
#[async_trait]
pub trait JobPublisher: Send + Sync {
    /// Enqueue a job without waiting for it to run.
    async fn publish(&self, job: Job) -> Result<(), JobError>;
}

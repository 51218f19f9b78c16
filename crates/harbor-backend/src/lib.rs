//! External collaborators of the Harbor document service.
//!
//! The managed backend (tables and object storage) and the transactional
//! email provider are consumed through the traits in this crate:
//!
//! - [`ObjectStorage`] - temp and permanent buckets, signed URLs
//! - [`DocumentRepository`], [`VesselRepository`], [`AccessLogRepository`],
//!   [`ShareRepository`] - table access
//! - [`EmailSender`] - outbound notifications
//!
//! Each trait has an HTTP implementation ([`SupabaseClient`],
//! [`ResendEmailSender`]) and an in-memory one used for local runs and tests.

pub mod email;
pub mod memory;
pub mod repository;
pub mod storage;
pub mod supabase;

pub use email::{EmailMessage, EmailSender, InMemoryEmailSender, ResendEmailSender};
pub use memory::{InMemoryBackend, InMemoryObjectStorage};
pub use repository::{AccessLogRepository, DocumentRepository, ShareRepository, VesselRepository};
pub use storage::{Bucket, ObjectStorage};
pub use supabase::{SupabaseClient, SupabaseConfig};

use thiserror::Error;

/// Errors returned by backend collaborators
#[derive(Error, Debug)]
pub enum BackendError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response
    #[error("Backend API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
            || matches!(self, BackendError::Api { status: 404, .. })
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;

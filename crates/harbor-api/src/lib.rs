//! HTTP API for the Harbor document service
//!
//! Routes live under `/api`; `/health` sits at the root. Caller identity is
//! taken from the `x-user-id` and `x-company-id` headers set by the upstream
//! gateway.

pub mod rest;

pub use rest::error::ApiError;
pub use rest::router::create_router;

use harbor_core::RuntimeEnvironment;
use harbor_ingestion::{DocumentService, ShareService, UploadPipeline};

/// Services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub uploads: UploadPipeline,
    pub documents: DocumentService,
    pub shares: ShareService,
    pub runtime: RuntimeEnvironment,
    /// Largest accepted file, in bytes
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(uploads: UploadPipeline, documents: DocumentService, shares: ShareService) -> Self {
        Self {
            uploads,
            documents,
            shares,
            runtime: RuntimeEnvironment::Production,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }

    pub fn with_runtime(mut self, runtime: RuntimeEnvironment) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Convert an error for the response, keeping the cause chain only
    /// where the runtime allows it
    pub fn fail(&self, error: impl Into<ApiError>) -> ApiError {
        let error = error.into();
        if self.runtime.exposes_error_details() {
            error
        } else {
            error.without_details()
        }
    }
}

//! API error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use harbor_core::AppError;
use harbor_ingestion::UploadError;

/// Body of every failed response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error returned by handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn without_details(mut self) -> Self {
        self.details = None;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, err.error_code(), err.to_string()).with_details(format!("{:?}", err))
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        let details = format!("{:?}", err);
        ApiError::from(AppError::from(err)).with_details(details)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, error = %self.message, "Request failed");
        } else {
            tracing::debug!(code = self.code, error = %self.message, "Request rejected");
        }

        let body = ErrorBody {
            success: false,
            error: self.message,
            code: self.code,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(AppError::gone("expired")).status(),
            StatusCode::GONE
        );
        assert_eq!(
            ApiError::from(AppError::permission("no")).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(UploadError::StorageMoveFailed("copy".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upload_validation_keeps_message() {
        let err = ApiError::from(UploadError::Validation(
            "File size exceeds the maximum limit of 50MB".to_string(),
        ));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "File size exceeds the maximum limit of 50MB");
    }

    #[test]
    fn test_body_omits_empty_details() {
        let body = ErrorBody {
            success: false,
            error: "Document not found".to_string(),
            code: "NOT_FOUND",
            details: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("details").is_none());
    }
}

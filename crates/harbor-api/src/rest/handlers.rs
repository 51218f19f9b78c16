//! Route handlers

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use harbor_core::{AppError, DocumentId, DocumentJson, VesselId};
use harbor_ingestion::{CreateShareRequest, DocumentPatch, UploadRequest};

use crate::rest::error::ApiError;
use crate::rest::middleware::Caller;
use crate::AppState;

type HandlerResult<T> = Result<T, ApiError>;

fn parse_document_id(raw: &str) -> Result<DocumentId, ApiError> {
    DocumentId::parse(raw).ok_or_else(|| ApiError::bad_request("Invalid document id"))
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "harbor",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /api/documents` (multipart: `file` plus metadata fields)
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    mut multipart: Multipart,
) -> HandlerResult<impl IntoResponse> {
    let mut request = UploadRequest {
        user_id: caller.actor().user_id.to_string(),
        company_id: caller.actor().company_id,
        ip_address: caller.actor().ip_address.clone(),
        user_agent: caller.actor().user_agent.clone(),
        ..Default::default()
    };
    let mut file: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        state.fail(multipart_error(&state, e.status(), e.body_text()))
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                request.filename = field.file_name().map(String::from);
                request.mime_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    state.fail(multipart_error(&state, e.status(), e.body_text()))
                })?;
                file = Some(bytes.to_vec());
            }
            other => {
                let value = field.text().await.map_err(|e| {
                    state.fail(multipart_error(&state, e.status(), e.body_text()))
                })?;
                apply_text_field(&mut request, other, value);
            }
        }
    }

    let bytes = file.ok_or_else(|| state.fail(AppError::validation("No file uploaded")))?;
    debug!(size = bytes.len(), mime = %request.mime_type, "Upload received");

    let outcome = state
        .uploads
        .upload(&bytes, request)
        .await
        .map_err(|e| state.fail(e))?;
    let warnings: Vec<String> = outcome.notices.iter().map(|n| n.message()).collect();

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "document": DocumentJson::from(&outcome.document),
            "warnings": warnings,
        })),
    ))
}

fn apply_text_field(request: &mut UploadRequest, name: &str, value: String) {
    let optional = |v: String| Some(v).filter(|s| !s.trim().is_empty());
    match name {
        "vesselId" => request.vessel_id = value,
        "title" => request.title = value,
        "documentType" => request.document_type = value,
        "userId" if !value.trim().is_empty() => request.user_id = value,
        "category" => request.category = optional(value),
        "expiryDate" => request.expiry_date = optional(value),
        "isPermanent" => request.is_permanent = value.trim().parse::<bool>().ok(),
        "mimeType" if request.mime_type.is_empty() => request.mime_type = value,
        _ => debug!(field = name, "Ignoring unknown upload field"),
    }
}

fn multipart_error(state: &AppState, status: StatusCode, text: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::from(AppError::validation(format!(
            "File size exceeds the maximum limit of {}MB",
            state.max_upload_bytes / (1024 * 1024)
        )));
    }
    ApiError::bad_request(format!("Malformed upload: {}", text))
}

/// `GET /api/documents/:id`
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> HandlerResult<impl IntoResponse> {
    let id = parse_document_id(&id)?;
    let view = state
        .documents
        .view_document(id, caller.actor())
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(json!({ "success": true, "document": view })))
}

/// `PATCH /api/documents/:id`
pub async fn update_document(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(patch): Json<DocumentPatch>,
) -> HandlerResult<impl IntoResponse> {
    let id = parse_document_id(&id)?;
    let document = state
        .documents
        .update_document(id, patch, caller.actor())
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(json!({ "success": true, "document": DocumentJson::from(&document) })))
}

/// `POST /api/documents/:id/archive`
pub async fn archive_document(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> HandlerResult<impl IntoResponse> {
    let id = parse_document_id(&id)?;
    let document = state
        .documents
        .archive_document(id, caller.actor())
        .await
        .map_err(|e| state.fail(e))?;
    info!(document_id = %id, "Archived via API");
    Ok(Json(json!({ "success": true, "document": DocumentJson::from(&document) })))
}

/// `POST /api/documents/:id/status`
pub async fn recompute_status(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> HandlerResult<impl IntoResponse> {
    let id = parse_document_id(&id)?;
    let change = state
        .documents
        .recompute_status_for(id, caller.actor())
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(json!({ "success": true, "status": change })))
}

/// `POST /api/documents/:id/reprocess`
pub async fn reprocess_document(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> HandlerResult<impl IntoResponse> {
    let id = parse_document_id(&id)?;
    state
        .documents
        .request_reprocess(id, caller.actor())
        .await
        .map_err(|e| state.fail(e))?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "message": "Reprocessing started; fetch the document to see the result",
        })),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub include_archived: bool,
}

/// `GET /api/vessels/:id/documents`
pub async fn list_vessel_documents(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(vessel_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> HandlerResult<impl IntoResponse> {
    let vessel_id =
        VesselId::parse(&vessel_id).ok_or_else(|| ApiError::bad_request("Invalid vessel id"))?;
    let documents = state
        .documents
        .list_vessel_documents(vessel_id, query.include_archived, caller.actor())
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(documents))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDownloadBody {
    pub document_ids: Vec<DocumentId>,
}

/// `POST /api/documents/batch-download`
pub async fn batch_download(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(body): Json<BatchDownloadBody>,
) -> HandlerResult<impl IntoResponse> {
    let company_id = caller.company_id()?;
    let batch = state
        .documents
        .batch_download(&body.document_ids, company_id, caller.actor())
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(json!({ "success": true, "items": batch.items, "missing": batch.missing })))
}

/// `POST /api/shares`
pub async fn create_share(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(body): Json<CreateShareRequest>,
) -> HandlerResult<impl IntoResponse> {
    let company_id = caller.company_id()?;
    let outcome = state
        .shares
        .create_share(body, company_id, caller.actor())
        .await
        .map_err(|e| state.fail(e))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "share": {
                "id": outcome.share.id,
                "token": outcome.share.token,
                "link": outcome.link,
                "expiresAt": outcome.share.expires_at,
            },
            "deliveries": outcome.deliveries,
        })),
    ))
}

/// `GET /api/shares/:token`, used by external recipients
pub async fn resolve_share(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> HandlerResult<impl IntoResponse> {
    let share = state
        .shares
        .resolve_share(&token)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(json!({ "success": true, "share": share })))
}

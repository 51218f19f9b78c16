//! Axum router configuration

use crate::{
    rest::{handlers, middleware},
    AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Room for multipart framing and metadata fields around the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    let state = Arc::new(state);

    let api = Router::new()
        // Documents
        .route("/documents", post(handlers::upload_document))
        .route("/documents/batch-download", post(handlers::batch_download))
        .route(
            "/documents/:id",
            get(handlers::get_document).patch(handlers::update_document),
        )
        .route("/documents/:id/archive", post(handlers::archive_document))
        .route("/documents/:id/status", post(handlers::recompute_status))
        .route("/documents/:id/reprocess", post(handlers::reprocess_document))
        // Vessels
        .route("/vessels/:id/documents", get(handlers::list_vessel_documents))
        // Shares
        .route("/shares", post(handlers::create_share))
        .route("/shares/:token", get(handlers::resolve_share))
        .layer(DefaultBodyLimit::max(body_limit));

    // Health check routes (no caller headers required)
    let health_routes = Router::new().route("/health", get(handlers::health_check));

    Router::new()
        .nest("/api", api)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(middleware::request_id_middleware))
                .layer(cors_layer()),
        )
        .with_state(state)
}

/// Configure CORS layer
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(
            std::env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .parse::<HeaderValue>()
                .unwrap_or(HeaderValue::from_static("*")),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            middleware::REQUEST_ID,
            middleware::USER_ID,
            middleware::COMPANY_ID,
        ])
        .max_age(Duration::from_secs(3600))
}

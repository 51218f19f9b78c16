//! Router tests driven through `tower::ServiceExt::oneshot`.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use harbor_api::{create_router, AppState};
use harbor_backend::{InMemoryBackend, InMemoryEmailSender, InMemoryObjectStorage};
use harbor_core::{CompanyId, RuntimeEnvironment, UploadConfig, UserId, Vessel, VesselId};
use harbor_ingestion::{
    Backends, ChatMessage, DocumentAnalyzer, DocumentService, JobQueue, LlmClient, ShareService,
    UploadPipeline,
};

const BOUNDARY: &str = "harbor-test-boundary";

struct SilentLlm;

#[async_trait]
impl LlmClient for SilentLlm {
    async fn complete_json(&self, _messages: Vec<ChatMessage>) -> harbor_ingestion::Result<String> {
        Ok("{}".to_string())
    }
}

struct TestApp {
    router: Router,
    tables: InMemoryBackend,
    vessel_id: VesselId,
    company_id: CompanyId,
    user_id: UserId,
}

impl TestApp {
    fn new(runtime: RuntimeEnvironment) -> Self {
        let tables = InMemoryBackend::new();
        let storage = InMemoryObjectStorage::new();
        let email = InMemoryEmailSender::new();
        let company_id = CompanyId::new();
        let vessel_id = VesselId::new();
        tables.add_vessel(Vessel {
            id: vessel_id,
            company_id,
            name: "MV Test".to_string(),
            imo_number: None,
        });

        let backends = Backends::in_memory(&tables, &storage, &email);
        let analyzer = DocumentAnalyzer::new(Arc::new(SilentLlm));
        // Receiver dropped: queued jobs are reported as notices, not failures.
        let (queue, _receiver) = JobQueue::channel(16);
        let jobs = Arc::new(queue);

        let uploads = UploadPipeline::new(
            UploadConfig::default(),
            backends.clone(),
            analyzer.clone(),
            jobs.clone(),
        );
        let documents = DocumentService::new(backends, analyzer, jobs);
        let shares = ShareService::new(documents.clone(), "http://localhost:5173", "test@harbor");
        let state = AppState::new(uploads, documents, shares)
            .with_runtime(runtime)
            .with_max_upload_bytes(1024 * 1024);

        Self {
            router: create_router(state),
            tables,
            vessel_id,
            company_id,
            user_id: UserId::new(),
        }
    }

    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", self.user_id.to_string())
            .header("x-company-id", self.company_id.to_string())
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

fn multipart(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Body {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

async fn upload_memo(app: &TestApp) -> (StatusCode, Value) {
    let vessel_id = app.vessel_id.to_string();
    let request = app
        .request("POST", "/api/documents")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(multipart(
            &[
                ("vesselId", &vessel_id),
                ("title", "Bunker note"),
                ("documentType", "Bunker Delivery Note"),
            ],
            Some(("bdn.txt", "text/plain", b"500 MT VLSFO delivered at Singapore")),
        ))
        .unwrap();
    app.send(request).await
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new(RuntimeEnvironment::Test);
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_upload_then_fetch() {
    let app = TestApp::new(RuntimeEnvironment::Test);

    let (status, body) = upload_memo(&app).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["document"]["category"], "general");
    assert_eq!(body["document"]["isPermanent"], true);
    assert!(body["document"].get("is_permanent").is_none());
    assert_eq!(app.tables.document_count(), 1);

    let id = body["document"]["id"].as_str().unwrap().to_string();
    let (status, body) = app
        .send(
            app.request("GET", &format!("/api/documents/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["document"]["downloadUrl"].is_string());
    assert!(body["document"]["vesselId"].is_string());

    let (status, body) = app
        .send(
            app.request("GET", &format!("/api/vessels/{}/documents", app.vessel_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_upload_missing_title_is_400() {
    let app = TestApp::new(RuntimeEnvironment::Production);
    let vessel_id = app.vessel_id.to_string();
    let request = app
        .request("POST", "/api/documents")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(multipart(
            &[("vesselId", &vessel_id), ("documentType", "Memo")],
            Some(("memo.txt", "text/plain", b"hello")),
        ))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Missing required field: title");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_missing_caller_is_401() {
    let app = TestApp::new(RuntimeEnvironment::Test);
    let request = Request::builder()
        .uri(format!("/api/documents/{}", uuid_like()))
        .body(Body::empty())
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing x-user-id header");
}

#[tokio::test]
async fn test_missing_company_is_403() {
    let app = TestApp::new(RuntimeEnvironment::Test);
    let (_, body) = upload_memo(&app).await;
    let id = body["document"]["id"].as_str().unwrap().to_string();

    for (method, uri) in [
        ("GET", format!("/api/documents/{id}")),
        ("POST", format!("/api/documents/{id}/archive")),
        ("POST", format!("/api/documents/{id}/status")),
        ("GET", format!("/api/vessels/{}/documents", app.vessel_id)),
    ] {
        let request = Request::builder()
            .method(method)
            .uri(&uri)
            .header("x-user-id", app.user_id.to_string())
            .body(Body::empty())
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}: {body}");
    }
}

#[tokio::test]
async fn test_manual_recompute_writes_no_access_log() {
    let app = TestApp::new(RuntimeEnvironment::Test);
    let (_, body) = upload_memo(&app).await;
    let id = body["document"]["id"].as_str().unwrap().to_string();
    assert_eq!(app.tables.access_logs().len(), 1);

    let (status, body) = app
        .send(
            app.request("POST", &format!("/api/documents/{id}/status"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"]["changed"], false);
    assert_eq!(app.tables.access_logs().len(), 1);
}

#[tokio::test]
async fn test_unknown_document_is_404_with_details_in_development() {
    let app = TestApp::new(RuntimeEnvironment::Development);
    let (status, body) = app
        .send(
            app.request("GET", &format!("/api/documents/{}", uuid_like()))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn test_invalid_document_id_is_400() {
    let app = TestApp::new(RuntimeEnvironment::Test);
    let (status, _) = app
        .send(
            app.request("GET", "/api/documents/not-an-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_batch_download_cross_company_is_403() {
    let app = TestApp::new(RuntimeEnvironment::Test);
    let (_, body) = upload_memo(&app).await;
    let id = body["document"]["id"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method("POST")
        .uri("/api/documents/batch-download")
        .header("x-user-id", UserId::new().to_string())
        .header("x-company-id", CompanyId::new().to_string())
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "documentIds": [id] }).to_string()))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_share_round_trip() {
    let app = TestApp::new(RuntimeEnvironment::Test);
    let (_, body) = upload_memo(&app).await;
    let id = body["document"]["id"].as_str().unwrap().to_string();

    let request = app
        .request("POST", "/api/shares")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "documentIds": [id],
                "recipients": ["pilot@port.example"],
                "expiresInDays": 2
            })
            .to_string(),
        ))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["deliveries"][0]["sent"], true);

    let token = body["share"]["token"].as_str().unwrap().to_string();
    let request = Request::builder()
        .uri(format!("/api/shares/{token}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["share"]["documents"].as_array().map(Vec::len), Some(1));

    let request = Request::builder()
        .uri("/api/shares/unknown")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn uuid_like() -> String {
    UserId::new().to_string()
}

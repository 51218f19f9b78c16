//! Supabase-compatible backend client (PostgREST tables + Storage API)

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use harbor_core::{
    AccessLogEntry, Document, DocumentId, Share, Vessel, VesselId,
};

use crate::repository::{AccessLogRepository, DocumentRepository, ShareRepository, VesselRepository};
use crate::storage::{Bucket, ObjectStorage};
use crate::{BackendError, Result};

const DOCUMENTS_TABLE: &str = "documents";
const VESSELS_TABLE: &str = "vessels";
const ACCESS_LOGS_TABLE: &str = "document_access_logs";
const SHARES_TABLE: &str = "document_shares";

/// Connection settings for the managed backend
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
    pub temp_bucket: String,
    pub permanent_bucket: String,
    pub timeout: Duration,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            service_role_key: service_role_key.into(),
            temp_bucket: "temp-documents".to_string(),
            permanent_bucket: "vessel-documents".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_buckets(mut self, temp: impl Into<String>, permanent: impl Into<String>) -> Self {
        self.temp_bucket = temp.into();
        self.permanent_bucket = permanent.into();
        self
    }
}

/// Client for tables and object storage of the managed backend
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: Url,
    service_key: Secret<String>,
    temp_bucket: String,
    permanent_bucket: String,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url)
            .field("service_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize)]
struct SignRequest {
    #[serde(rename = "expiresIn")]
    expires_in: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

#[derive(Serialize)]
struct RemoveRequest<'a> {
    prefixes: &'a [String],
}

impl SupabaseClient {
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(BackendError::Config("SUPABASE_URL is not set".to_string()));
        }
        let mut base_url = Url::parse(config.url.trim())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("harbor-backend/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(BackendError::Http)?;

        Ok(Self {
            http,
            base_url,
            service_key: Secret::new(config.service_role_key),
            temp_bucket: config.temp_bucket,
            permanent_bucket: config.permanent_bucket,
        })
    }

    fn bucket_name(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Temp => &self.temp_bucket,
            Bucket::Permanent => &self.permanent_bucket,
        }
    }

    /// Build a URL from path segments; each segment is percent-encoded
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| BackendError::Config("backend URL cannot be a base".to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                path.extend(segment.split('/').filter(|s| !s.is_empty()));
            }
        }
        Ok(url)
    }

    fn table_url(&self, table: &str) -> Result<Url> {
        self.url(["rest", "v1", table])
    }

    fn object_url(&self, prefix: &str, bucket: Bucket, path: &str) -> Result<Url> {
        self.url(["storage", "v1", prefix, self.bucket_name(bucket), path])
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let key = self.service_key.expose_secret();
        request
            .header("apikey", key.as_str())
            .header(header::AUTHORIZATION, format!("Bearer {}", key))
    }

    /// Map a non-success response to an error
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(BackendError::NotFound(message)),
            StatusCode::CONFLICT => Err(BackendError::Conflict(message)),
            _ => Err(BackendError::Api {
                status: status.as_u16(),
                message,
            }),
        }
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, filters: &[(&str, String)]) -> Result<Vec<T>> {
        let mut url = self.table_url(table)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            for (column, filter) in filters {
                query.append_pair(column, filter);
            }
        }

        let response = self.authorized(self.http.get(url)).send().await?;
        let rows = Self::check(response).await?.json().await?;
        Ok(rows)
    }

    async fn insert_row<T: Serialize + DeserializeOwned>(&self, table: &str, row: &T) -> Result<T> {
        let response = self
            .authorized(self.http.post(self.table_url(table)?))
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        let mut rows: Vec<T> = Self::check(response).await?.json().await?;
        rows.pop()
            .ok_or_else(|| BackendError::Storage(format!("insert into {} returned no row", table)))
    }

    async fn update_row<T: Serialize + DeserializeOwned>(&self, table: &str, id: &str, row: &T) -> Result<T> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{}", id));

        let response = self
            .authorized(self.http.patch(url))
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        let mut rows: Vec<T> = Self::check(response).await?.json().await?;
        rows.pop().ok_or_else(|| BackendError::NotFound(format!("{} {}", table, id)))
    }
}

#[async_trait]
impl ObjectStorage for SupabaseClient {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<()> {
        let response = self
            .authorized(self.http.post(self.object_url("object", bucket, path)?))
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes.to_vec())
            .send()
            .await?;
        Self::check(response).await?;
        debug!(bucket = %bucket, path = %path, "Object uploaded");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn download(&self, bucket: Bucket, path: &str) -> Result<Vec<u8>> {
        let response = self
            .authorized(self.http.get(self.object_url("object", bucket, path)?))
            .send()
            .await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    #[instrument(skip(self))]
    async fn remove(&self, bucket: Bucket, paths: &[String]) -> Result<()> {
        let url = self.url(["storage", "v1", "object", self.bucket_name(bucket)])?;
        let response = self
            .authorized(self.http.delete(url))
            .json(&RemoveRequest { prefixes: paths })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn create_signed_url(
        &self,
        bucket: Bucket,
        path: &str,
        expires_in: Duration,
    ) -> Result<String> {
        let response = self
            .authorized(self.http.post(self.object_url("object/sign", bucket, path)?))
            .json(&SignRequest {
                expires_in: expires_in.as_secs(),
            })
            .send()
            .await?;
        let signed: SignResponse = Self::check(response).await?.json().await?;

        // The provider answers with a path relative to /storage/v1
        let relative = signed.signed_url.trim_start_matches('/');
        let storage_root = self.url(["storage", "v1", ""])?;
        Ok(format!("{}/{}", storage_root.as_str().trim_end_matches('/'), relative))
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> String {
        self.object_url("object/public", bucket, path)
            .map(|u| u.to_string())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentRepository for SupabaseClient {
    async fn insert(&self, document: &Document) -> Result<Document> {
        self.insert_row(DOCUMENTS_TABLE, document).await
    }

    async fn get(&self, id: DocumentId) -> Result<Option<Document>> {
        let mut rows: Vec<Document> = self
            .select(DOCUMENTS_TABLE, &[("id", format!("eq.{}", id))])
            .await?;
        Ok(rows.pop())
    }

    async fn get_many(&self, ids: &[DocumentId]) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let list = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",");
        self.select(DOCUMENTS_TABLE, &[("id", format!("in.({})", list))]).await
    }

    async fn update(&self, document: &Document) -> Result<Document> {
        self.update_row(DOCUMENTS_TABLE, &document.id.to_string(), document).await
    }

    async fn list_by_vessel(
        &self,
        vessel_id: VesselId,
        include_archived: bool,
    ) -> Result<Vec<Document>> {
        let mut filters = vec![
            ("vessel_id", format!("eq.{}", vessel_id)),
            ("order", "created_at.desc".to_string()),
        ];
        if !include_archived {
            filters.push(("is_archived", "eq.false".to_string()));
        }
        self.select(DOCUMENTS_TABLE, &filters).await
    }
}

#[async_trait]
impl VesselRepository for SupabaseClient {
    async fn get(&self, id: VesselId) -> Result<Option<Vessel>> {
        let mut rows: Vec<Vessel> = self
            .select(VESSELS_TABLE, &[("id", format!("eq.{}", id))])
            .await?;
        Ok(rows.pop())
    }
}

#[async_trait]
impl AccessLogRepository for SupabaseClient {
    async fn append(&self, entry: &AccessLogEntry) -> Result<()> {
        self.insert_row(ACCESS_LOGS_TABLE, entry).await.map(|_| ())
    }

    async fn list_for_document(&self, document_id: DocumentId) -> Result<Vec<AccessLogEntry>> {
        self.select(
            ACCESS_LOGS_TABLE,
            &[
                ("document_id", format!("eq.{}", document_id)),
                ("order", "timestamp.desc".to_string()),
            ],
        )
        .await
    }
}

#[async_trait]
impl ShareRepository for SupabaseClient {
    async fn insert(&self, share: &Share) -> Result<Share> {
        self.insert_row(SHARES_TABLE, share).await
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Share>> {
        let mut rows: Vec<Share> = self
            .select(SHARES_TABLE, &[("token", format!("eq.{}", token))])
            .await?;
        Ok(rows.pop())
    }
}

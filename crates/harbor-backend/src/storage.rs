//! Object storage abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Result;

/// Storage areas used by the upload flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Transient, per-user staging area
    Temp,
    /// Durable, vessel/category-keyed location
    Permanent,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Temp => "temp",
            Bucket::Permanent => "permanent",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, bucket: Bucket, path: &str, bytes: &[u8], content_type: &str)
        -> Result<()>;

    async fn download(&self, bucket: Bucket, path: &str) -> Result<Vec<u8>>;

    async fn remove(&self, bucket: Bucket, paths: &[String]) -> Result<()>;

    /// Issue a time-limited download link
    async fn create_signed_url(&self, bucket: Bucket, path: &str, expires_in: Duration)
        -> Result<String>;

    fn public_url(&self, bucket: Bucket, path: &str) -> String;

    /// Copy an object between buckets. The source is left in place.
    async fn copy_object(
        &self,
        from: (Bucket, &str),
        to: (Bucket, &str),
        content_type: &str,
    ) -> Result<()> {
        let bytes = self.download(from.0, from.1).await?;
        self.upload(to.0, to.1, &bytes, content_type).await
    }
}

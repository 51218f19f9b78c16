//! Transactional email delivery

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{header, Client};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::{BackendError, Result};

/// A single outbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Resend-compatible HTTP email sender
#[derive(Clone)]
pub struct ResendEmailSender {
    http: Client,
    base_url: String,
    api_key: Secret<String>,
}

impl std::fmt::Debug for ResendEmailSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendEmailSender")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl ResendEmailSender {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(BackendError::Http)?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: Secret::new(api_key.into()),
        })
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/emails", self.base_url))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!(recipients = message.to.len(), subject = %message.subject, "Email sent");
        Ok(())
    }
}

/// Records messages instead of delivering them
#[derive(Debug, Default, Clone)]
pub struct InMemoryEmailSender {
    sent: Arc<RwLock<Vec<EmailMessage>>>,
}

impl InMemoryEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.read().clone()
    }
}

#[async_trait]
impl EmailSender for InMemoryEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(to = ?message.to, subject = %message.subject, "Email captured (no provider configured)");
        self.sent.write().push(message.clone());
        Ok(())
    }
}

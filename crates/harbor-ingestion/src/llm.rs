//! Chat-completions client for the hosted LLM
//!
//! One request per call, JSON response mode, no retries. Authentication and
//! rate-limit responses are surfaced as distinct errors so callers can tell a
//! misconfigured key from a busy provider.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use harbor_core::LlmConfig;

use crate::{IngestionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// Image reference inside a multimodal message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// User message carrying an inline image as a data URL
    pub fn user_with_image(text: impl Into<String>, data_url: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: data_url.into(),
                        detail: Some("high".to_string()),
                    },
                },
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    response_format: ResponseFormat,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// A JSON-mode chat model
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the conversation and return the raw content of the first choice
    async fn complete_json(&self, messages: Vec<ChatMessage>) -> Result<String>;
}

/// OpenAI-compatible chat completions client
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    endpoint: String,
    api_key: Secret<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| IngestionError::ExtractionFailed(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: Secret::new(config.api_key.clone()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    #[instrument(skip(self, messages), fields(model = %self.model))]
    async fn complete_json(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: &messages,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| IngestionError::ExtractionFailed(format!("LLM request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED => IngestionError::AuthenticationFailed(body),
                StatusCode::TOO_MANY_REQUESTS => IngestionError::RateLimited(body),
                _ => IngestionError::ExtractionFailed(format!(
                    "LLM API error ({}): {}",
                    status.as_u16(),
                    body
                )),
            });
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            IngestionError::ExtractionFailed(format!("invalid LLM response: {}", e))
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| IngestionError::ExtractionFailed("empty LLM response".to_string()))?;

        debug!(chars = content.len(), "LLM completion received");
        Ok(content)
    }
}

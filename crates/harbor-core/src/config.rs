use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Well-known variable names recognised alongside the `HARBOR__*` namespace.
const WELL_KNOWN_OVERRIDES: &[(&str, &str)] = &[
    ("OPENAI_KEY", "llm.api_key"),
    ("SUPABASE_URL", "backend.url"),
    ("SUPABASE_SERVICE_ROLE_KEY", "backend.service_role_key"),
    ("RESEND_API_KEY", "email.api_key"),
    ("NODE_ENV", "runtime"),
    ("PORT", "server.port"),
];

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub runtime: RuntimeEnvironment,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub backend: BackendConfig,
    pub email: EmailConfig,
    pub upload: UploadConfig,
    pub links: LinksConfig,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_vars(std::env::vars().collect())
    }

    /// Load configuration from an explicit variable map
    pub fn load_from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let builder = Self::with_defaults(Config::builder())?.add_source(
            Environment::with_prefix("HARBOR")
                .separator("__")
                .try_parsing(true)
                .source(Some(vars.clone())),
        );

        let builder = WELL_KNOWN_OVERRIDES
            .iter()
            .try_fold(builder, |builder, (var, key)| {
                builder.set_override_option(*key, vars.get(*var).cloned())
            })?;

        builder.build()?.try_deserialize()
    }

    /// Load configuration from file with environment overrides
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let builder = Self::with_defaults(Config::builder())?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("HARBOR").separator("__"));

        builder.build()?.try_deserialize()
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("runtime", "development")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("llm.api_key", "")?
            .set_default("llm.model", "gpt-4o")?
            .set_default("llm.base_url", "https://api.openai.com/v1")?
            .set_default("llm.temperature", 0.1)?
            .set_default("llm.max_tokens", 4096)?
            .set_default("llm.timeout_seconds", 120)?
            .set_default("backend.url", "")?
            .set_default("backend.service_role_key", "")?
            .set_default("backend.temp_bucket", "temp-documents")?
            .set_default("backend.permanent_bucket", "vessel-documents")?
            .set_default("backend.signed_url_ttl_seconds", 3600)?
            .set_default("email.base_url", "https://api.resend.com")?
            .set_default("email.from", "Harbor Documents <documents@harbor-maritime.com>")?
            .set_default("upload.max_file_size_bytes", 50 * 1024 * 1024)?
            .set_default("upload.expiring_soon_days", 30)?
            .set_default("upload.share_default_days", 7)?
            .set_default("links.production_base_url", "https://app.harbor-maritime.com")?
            .set_default("links.development_base_url", "http://localhost:5173")
    }

    /// Base URL used when building links sent to users
    pub fn public_base_url(&self) -> &str {
        if self.runtime.is_production() {
            &self.links.production_base_url
        } else {
            &self.links.development_base_url
        }
    }
}

/// Deployment environment, read from `NODE_ENV`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    Production,
    Development,
    Test,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, RuntimeEnvironment::Production)
    }

    /// Whether error details (cause chains) may be exposed in responses
    pub fn exposes_error_details(&self) -> bool {
        matches!(self, RuntimeEnvironment::Development)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// LLM provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_llm_timeout_seconds(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_llm_timeout_seconds() -> u64 {
    120
}

/// Managed backend (tables + object storage) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Empty selects the in-memory backend
    pub url: String,
    pub service_role_key: String,
    pub temp_bucket: String,
    pub permanent_bucket: String,
    #[serde(default = "default_signed_url_ttl_seconds")]
    pub signed_url_ttl_seconds: u64,
}

impl BackendConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.service_role_key.trim().is_empty()
    }
}

fn default_signed_url_ttl_seconds() -> u64 {
    3600
}

/// Transactional email configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub from: String,
}

/// Upload constraints and lifecycle thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_file_size_bytes: u64,
    pub expiring_soon_days: i64,
    pub share_default_days: i64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 50 * 1024 * 1024,
            expiring_soon_days: 30,
            share_default_days: 7,
        }
    }
}

/// Base URLs for links sent out to users
#[derive(Debug, Clone, Deserialize)]
pub struct LinksConfig {
    pub production_base_url: String,
    pub development_base_url: String,
}

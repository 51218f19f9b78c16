//! Application state and initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use harbor_api::AppState;
use harbor_backend::{
    EmailSender, InMemoryBackend, InMemoryEmailSender, InMemoryObjectStorage, ResendEmailSender,
    SupabaseClient, SupabaseConfig,
};
use harbor_core::AppConfig;
use harbor_ingestion::{
    Backends, DocumentAnalyzer, DocumentService, DocumentWorker, JobQueue, OpenAiClient,
    ShareService, UploadPipeline,
};

use crate::cli::Args;
use crate::server::Server;

/// Load configuration from the optional file, then apply CLI overrides
pub fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from_file(&path.to_string_lossy())
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AppConfig::load().context("Failed to load configuration from environment")?,
    };

    if let Some(port) = args.port {
        config.server = config.server.with_port(port);
    }
    Ok(config)
}

fn build_backends(config: &AppConfig) -> Result<Backends> {
    let email: Arc<dyn EmailSender> = match &config.email.api_key {
        Some(key) if !key.trim().is_empty() => Arc::new(
            ResendEmailSender::new(&config.email.base_url, key)
                .context("Failed to create email client")?,
        ),
        _ => {
            warn!("RESEND_API_KEY not set; share emails are kept in memory");
            Arc::new(InMemoryEmailSender::new())
        }
    };

    if !config.backend.is_configured() {
        warn!("Backend not configured; documents are stored in memory and lost on restart");
        let mut backends = Backends::in_memory(
            &InMemoryBackend::new(),
            &InMemoryObjectStorage::new(),
            &InMemoryEmailSender::new(),
        );
        backends.email = email;
        return Ok(backends);
    }

    let backend = &config.backend;
    let client = SupabaseClient::new(
        SupabaseConfig::new(&backend.url, &backend.service_role_key)
            .with_buckets(&backend.temp_bucket, &backend.permanent_bucket),
    )
    .context("Failed to create backend client")?;
    let client = Arc::new(client);
    info!(url = %backend.url, "Using managed backend");

    Ok(Backends {
        storage: client.clone(),
        documents: client.clone(),
        vessels: client.clone(),
        access_logs: client.clone(),
        shares: client,
        email,
    })
}

/// Wire every service and the background worker from configuration
pub fn build_state(config: &AppConfig, queue_capacity: usize) -> Result<(AppState, DocumentWorker)> {
    info!("Initializing application components");

    if config.llm.api_key.trim().is_empty() {
        warn!("OPENAI_KEY not set; classification requests will fail and uploads degrade");
    }
    let llm = OpenAiClient::new(&config.llm).context("Failed to create LLM client")?;
    info!(model = llm.model(), "LLM client ready");
    let analyzer = DocumentAnalyzer::new(Arc::new(llm));

    let backends = build_backends(config)?;
    let (queue, receiver) = JobQueue::channel(queue_capacity);
    let jobs = Arc::new(queue);

    let uploads = UploadPipeline::new(
        config.upload.clone(),
        backends.clone(),
        analyzer.clone(),
        jobs.clone(),
    );
    let documents = DocumentService::new(backends, analyzer, jobs)
        .with_signed_url_ttl(Duration::from_secs(config.backend.signed_url_ttl_seconds))
        .with_expiring_soon_days(config.upload.expiring_soon_days);
    let shares = ShareService::new(
        documents.clone(),
        config.public_base_url(),
        config.email.from.clone(),
    )
    .with_default_days(config.upload.share_default_days);

    let worker = DocumentWorker::new(documents.clone(), receiver);
    let max_upload_bytes = usize::try_from(config.upload.max_file_size_bytes)
        .context("upload.max_file_size_bytes does not fit in memory")?;
    let state = AppState::new(uploads, documents, shares)
        .with_runtime(config.runtime)
        .with_max_upload_bytes(max_upload_bytes);

    Ok((state, worker))
}

/// Main application
pub struct App {
    config: AppConfig,
    state: AppState,
    worker: JoinHandle<()>,
}

impl App {
    /// Build the application with all dependencies
    pub async fn build(args: Args) -> Result<Self> {
        args.validate().context("Invalid command line arguments")?;

        let config = load_config(&args)?;
        let backend_mode = if config.backend.is_configured() {
            "managed"
        } else {
            "in-memory"
        };
        let email_mode = match config.email.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => "resend",
            _ => "in-memory",
        };
        info!(
            runtime = ?config.runtime,
            backend = backend_mode,
            email = email_mode,
            max_upload_mb = config.upload.max_file_size_bytes / (1024 * 1024),
            "Configuration loaded"
        );

        let (state, worker) = build_state(&config, args.job_queue_capacity)?;
        let worker = worker.spawn();

        Ok(Self {
            config,
            state,
            worker,
        })
    }

    /// Run the application until a shutdown signal arrives
    pub async fn run(self) -> Result<()> {
        info!("HTTP address: {}", self.config.server.address());

        let server = Server::new(self.config.server.clone(), self.state);
        let result = server.run().await;

        // Dropping the router releases the queue senders; pending jobs are abandoned
        self.worker.abort();
        result
    }
}

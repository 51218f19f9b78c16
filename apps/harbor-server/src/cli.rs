//! Command-line argument parsing

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "harbor-server",
    about = "Harbor vessel document service",
    version,
    long_about = "Ingests vessel documents, extracts and classifies them with an LLM, \
                  and serves them to fleet users and external recipients."
)]
pub struct Args {
    /// Optional configuration file; environment variables override it
    #[arg(short, long, env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// HTTP server port, overriding configuration
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        env = "LOG_LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    /// Enable JSON log format (useful for production)
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,

    /// Capacity of the background job queue
    #[arg(long, env = "JOB_QUEUE_CAPACITY", default_value = "1024")]
    pub job_queue_capacity: usize,
}

impl Args {
    /// Validate the arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.job_queue_capacity == 0 {
            anyhow::bail!("job queue capacity must be greater than zero");
        }
        if let Some(path) = &self.config {
            if !path.exists() {
                anyhow::bail!("configuration file not found: {}", path.display());
            }
        }
        Ok(())
    }
}

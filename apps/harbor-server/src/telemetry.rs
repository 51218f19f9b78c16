//! Telemetry initialization (logging and tracing)

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Args;

/// Guards that must be kept alive for the duration of the program
pub struct TelemetryGuards;

/// Initialize telemetry stack (logging)
pub fn init_telemetry(args: &Args) -> Result<TelemetryGuards> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(&args.log_level)))
        .context("Failed to create environment filter")?;

    if args.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true))
            .try_init()
            .context("Failed to install JSON subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true),
            )
            .try_init()
            .context("Failed to install subscriber")?;
    };

    Ok(TelemetryGuards)
}

/// Our crates at the requested level, HTTP plumbing one step quieter
fn filter_directive(level: &str) -> String {
    let quiet = match level {
        "trace" | "debug" => "info",
        _ => "warn",
    };
    format!("{level},hyper={quiet},reqwest={quiet},lopdf=error,pdf_extract=error")
}

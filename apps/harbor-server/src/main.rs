mod app;
mod cli;
mod server;
mod telemetry;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use crate::app::App;
use crate::cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let _guards = telemetry::init_telemetry(&args)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %args.log_level,
        json_logs = args.json_logs,
        "Starting harbor-server"
    );

    let app = match App::build(args).await {
        Ok(app) => app,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return Err(e);
        }
    };

    let result = app.run().await;
    match &result {
        Ok(()) => info!("harbor-server stopped"),
        Err(e) => error!("harbor-server stopped with error: {:#}", e),
    }
    result
}

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use fieldtech_agent::backend::HttpBackend;
use fieldtech_agent::cli::{self, Cli};
use fieldtech_agent::config::Config;
use fieldtech_agent::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load()?;
    init_logging(&config.logging);

    info!("Starting FieldTech agent v{}", env!("CARGO_PKG_VERSION"));

    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    cli::run(cli, &config, backend).await
}

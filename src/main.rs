//! Bastion - orchestration service for upstream LLM providers
//!
//! CLI entry point for the Bastion server.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use server::config::{AppConfig, LogFormat};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod cli;
mod server;

const DEFAULT_LOG_FILTER: &str = "bastion=info,bastion_core=info,bastion_llm=info,tower_http=info";

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match config.logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    let cli = cli::Cli::parse();
    let config = server::load_config().context("Failed to load configuration")?;

    init_logging(&config);
    if dotenv.is_err() {
        warn!(".env file not found; relying on the process environment");
    }

    cli::run(cli, config).await
}

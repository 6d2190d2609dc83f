//! CLI module for Bastion
//!
//! - `serve`: start the HTTP front door (default)
//! - `check`: validate configuration and print the provider table

use crate::server::config::AppConfig;
use crate::server::{self, resolve_provider, Resolved};
use anyhow::Result;
use clap::{Parser, Subcommand};

/// Bastion orchestration service
#[derive(Parser, Debug)]
#[command(name = "bastion")]
#[command(about = "Safety, caching and failover in front of upstream LLM providers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Start the server (default)
    Serve,
    /// Validate configuration and list providers
    Check,
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => server::run(config).await,
        Commands::Check => check(&config),
    }
}

/// One provider table row
fn provider_rows(
    config: &AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<[String; 5]> {
    config
        .providers
        .iter()
        .map(|entry| {
            let state = match resolve_provider(entry, config, &lookup) {
                Ok(Resolved::Ready(_)) => "ready".to_string(),
                Ok(Resolved::MissingKey(var)) => format!("missing {var}"),
                Err(e) => format!("error: {e}"),
            };
            [
                entry.name.clone(),
                entry.kind.to_string(),
                entry.model.clone(),
                entry.priority.to_string(),
                state,
            ]
        })
        .collect()
}

fn check(config: &AppConfig) -> Result<()> {
    config.checkpoint.validate()?;

    println!(
        "Server      {}:{}",
        config.server.host, config.server.port
    );
    println!(
        "Store       {}",
        if config.redis.use_memory {
            "in-memory"
        } else {
            config.redis.url.as_str()
        }
    );
    println!(
        "Budget      {} tokens ({} reserved)",
        config.token_budget.max_tokens, config.token_budget.overlap_reserve
    );
    println!();
    println!(
        "{:<14} {:<14} {:<32} {:>8}  {}",
        "PROVIDER", "KIND", "MODEL", "PRIORITY", "STATUS"
    );
    let rows = provider_rows(config, |var| std::env::var(var).ok());
    for [name, kind, model, priority, state] in &rows {
        println!("{name:<14} {kind:<14} {model:<32} {priority:>8}  {state}");
    }

    let ready = rows.iter().filter(|r| r[4] == "ready").count();
    println!();
    println!("{ready} of {} providers ready", rows.len());
    if ready == 0 {
        anyhow::bail!("no provider is usable; set at least one API key");
    }
    Ok(())
}

//! Storelens CLI
//!
//! Command-line interface for interacting with the Storelens product
//! service.
//!
//! # Usage
//!
//! ```bash
//! storelens --help
//! storelens health
//! ```

#![deny(unsafe_code)]

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

/// Storelens CLI - product service command-line interface
#[derive(Parser)]
#[command(name = "storelens")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// API server URL
    #[arg(
        short,
        long,
        env = "STORELENS_API_URL",
        default_value = "http://localhost:5001"
    )]
    api_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API server health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Health) => check_health(&cli.api_url).await?,
        None => {
            println!("Storelens CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

async fn check_health(api_url: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", api_url.trim_end_matches('/'));
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("Failed to reach {url}"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("Health check failed: {url} returned {status}");
    }

    let body: serde_json::Value = response
        .json()
        .await
        .context("Health response was not valid JSON")?;
    println!(
        "{} v{} is {}",
        body["service"].as_str().unwrap_or("unknown"),
        body["version"].as_str().unwrap_or("?"),
        body["status"].as_str().unwrap_or("unknown")
    );

    Ok(())
}

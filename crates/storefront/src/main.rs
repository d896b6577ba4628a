//! Storefront - command-line client for the storefront API
//!
//! Main entry point for the `storefront` CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{auth, request};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Storefront - command-line client for the storefront API
#[derive(Parser)]
#[command(name = "storefront")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// API base URL (default: http://localhost:1988/api/v1)
    #[arg(long, global = true, env = "STOREFRONT_BASE_URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Session management
    Auth(auth::AuthArgs),

    /// Send an authenticated request to the API
    Request(request::RequestArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = storefront_config::load_config(None)?;
    let mut config = loaded.config;
    if let Some(url) = cli.base_url {
        config.api.base_url = Some(url);
    }

    // Console (human-readable) + rotating JSON file under the data directory
    let filter = if cli.verbose {
        "storefront=debug,storefront_gateway=debug,storefront_config=debug,info"
    } else {
        "storefront=info,storefront_gateway=warn,storefront_config=warn,warn"
    };

    let log_dir = config.session.effective_data_dir().join("logs");
    let file_appender = tracing_appender::rolling::daily(&log_dir, "storefront.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(cli.verbose)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "storefront=trace,storefront_gateway=trace,storefront_config=debug,info",
                )),
        )
        .init();

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }
    for path in loaded.sources.iter().filter(|s| s.loaded).map(|s| &s.path) {
        tracing::debug!(path = %path.display(), "loaded config");
    }

    let ctx = commands::Context {
        config,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Auth(args) => auth::run(args, &ctx).await,
        Commands::Request(args) => request::run(args, &ctx).await,
    }
}

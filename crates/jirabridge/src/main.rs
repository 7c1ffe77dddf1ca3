//! jirabridge - credential-injecting proxy for the Jira Cloud REST API
//!
//! Main entry point for the jirabridge CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{authorize_url, config, serve};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// jirabridge - credential-injecting proxy for the Jira Cloud REST API
#[derive(Parser)]
#[command(name = "jirabridge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory for rotating JSON log files (disabled when unset)
    #[arg(long, global = true, env = "JIRABRIDGE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Path to config file (overrides default discovery)
    #[arg(long, global = true, env = "JIRABRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the proxy server
    Serve(serve::ServeArgs),

    /// Print the authorization URL for a redirect URI
    AuthorizeUrl(authorize_url::AuthorizeUrlArgs),

    /// Show the effective configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable), plus rotating JSON file when a log dir is set.
    // RUST_LOG overrides the console filter.
    let filter = if cli.verbose {
        "jirabridge=debug,jirabridge_proxy=debug,jirabridge_config=debug,tower_http=debug,info"
    } else {
        "jirabridge=info,jirabridge_proxy=info,warn"
    };
    let console_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let (file_writer, _guard) = match &cli.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "jirabridge.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (Some(non_blocking), Some(guard))
        }
        None => (None, None),
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(console_filter),
        )
        .with(file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "jirabridge=trace,jirabridge_proxy=trace,jirabridge_config=trace,info",
                ))
        }))
        .init();

    let ctx = commands::Context {
        config_path: cli.config,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::AuthorizeUrl(args) => authorize_url::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

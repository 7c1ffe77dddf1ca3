//! Serve command - runs the proxy server.

use std::net::SocketAddr;

use anyhow::Result;
use clap::Args;

use jirabridge_config::{AuthMode, BridgeConfig, TenantMode};
use jirabridge_proxy::ProxyServer;

use super::Context;

/// Arguments for the serve command.
///
/// CLI arguments override config file and environment values.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Credential mode: oauth or service_account (overrides config)
    #[arg(long)]
    pub auth_mode: Option<AuthMode>,

    /// Tenant mode: fixed_host or cloud_id_lookup (overrides config)
    #[arg(long)]
    pub tenant_mode: Option<TenantMode>,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }
    for source in loaded.loaded_from() {
        tracing::info!(path = %source.display(), "Loaded config file");
    }

    let mut config = loaded.config;
    apply_overrides(&mut config, &args)?;

    let jira = config.jira();
    tracing::info!(
        auth_mode = %jira.auth_mode,
        tenant_mode = %jira.tenant_mode,
        "Credential and tenant modes"
    );
    // Missing settings only fail the requests that need them.
    for key in config.missing_settings() {
        tracing::warn!(setting = key, "Setting not configured");
    }

    let server = ProxyServer::new(&config)?;
    server.run(shutdown_signal()).await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut BridgeConfig, args: &ServeArgs) -> Result<()> {
    let mut server = config.server();
    if let Some(ref bind) = args.bind {
        server.bind = bind.clone();
    }
    if let Some(port) = args.port {
        let mut addr: SocketAddr = server.bind_addr()?;
        addr.set_port(port);
        server.bind = addr.to_string();
    }
    config.server = Some(server);

    let mut jira = config.jira();
    if let Some(mode) = args.auth_mode {
        jira.auth_mode = mode;
    }
    if let Some(mode) = args.tenant_mode {
        jira.tenant_mode = mode;
    }
    config.jira = Some(jira);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining requests");
}

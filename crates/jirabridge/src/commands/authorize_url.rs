//! Authorize-url command - prints the consent URL without starting a server.

use anyhow::Result;
use clap::Args;

use jirabridge_proxy::OAuthConfig;
use jirabridge_proxy::oauth::build_authorization_url;

use super::Context;

/// Arguments for the authorize-url command.
#[derive(Args, Debug)]
pub struct AuthorizeUrlArgs {
    /// Callback URL registered with the OAuth app
    #[arg(long)]
    pub redirect_uri: String,

    /// Opaque state echoed back on the callback
    #[arg(long)]
    pub state: Option<String>,
}

/// Run the authorize-url command.
pub async fn run(args: AuthorizeUrlArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let oauth = OAuthConfig::from(&loaded.config.oauth());

    let url = build_authorization_url(&oauth, &args.redirect_uri, args.state.as_deref())?;
    println!("{}", url);
    Ok(())
}

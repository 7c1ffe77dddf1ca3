//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved configuration with secrets redacted (default)
    Show,

    /// Show which config files are checked and their precedence
    Which,

    /// Show the user configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Path => cmd_path(),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;

    println!("# jirabridge configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults and environment)");
    } else {
        for source in &sources {
            println!("# loaded: {}", source.display());
        }
    }
    for warning in &loaded.warnings {
        println!("# warning: {}", warning);
    }
    for key in config.missing_settings() {
        println!("# missing: {}", key);
    }
    println!();

    print!("{}", config.redacted().to_toml()?);
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    println!("Config files (lowest precedence first):");
    for source in &loaded.sources {
        let status = if source.loaded { "loaded" } else { "not found" };
        println!("  {} ({})", source.path.display(), status);
    }
    println!("  environment variables");
    if ctx.verbose {
        println!("  command-line flags (serve only)");
    }
    Ok(())
}

fn cmd_path() -> Result<()> {
    match jirabridge_config::xdg_config_path() {
        Some(path) => println!("{}", path.display()),
        None => println!("Could not determine config directory"),
    }
    Ok(())
}

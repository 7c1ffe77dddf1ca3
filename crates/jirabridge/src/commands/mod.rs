//! CLI command handlers.

use std::path::PathBuf;

use anyhow::Result;

use jirabridge_config::LoadedConfig;

pub mod authorize_url;
pub mod config;
pub mod serve;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file; discovery is used when unset.
    pub config_path: Option<PathBuf>,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load configuration from the explicit file or by discovery, with the
    /// environment applied on top.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = match &self.config_path {
            Some(path) => jirabridge_config::load_explicit(path)?,
            None => jirabridge_config::load_config(None)?,
        };
        Ok(loaded)
    }
}

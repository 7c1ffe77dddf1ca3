//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/jirabridge/config.toml` (XDG user config)
//! 2. `./jirabridge.toml` (project-local)
//! 3. Environment variables
//! 4. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{BridgeConfig, ConfigError, Result};

/// Project-local file, looked up in the working (or given) directory.
const PROJECT_CONFIG_FILE: &str = "jirabridge.toml";

/// File name inside the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

const APP_NAME: &str = "jirabridge";

/// Overrides the user config directory.
const CONFIG_DIR_ENV: &str = "JIRABRIDGE_CONFIG_DIR";

/// One candidate config file.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// False when the file was absent or malformed.
    pub loaded: bool,
}

/// Merged configuration plus what went into it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: BridgeConfig,
    /// Candidate files, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading (plaintext secrets, bad files).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths that contributed to the merged config.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration from the user dir, the project dir and the process
/// environment.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None, |k| std::env::var(k).ok())
}

/// Load configuration with explicit control over the user config directory
/// and the environment lookup.
pub fn load_config_with_options<F>(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
    env: F,
) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = BridgeConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User config: explicit dir, then JIRABRIDGE_CONFIG_DIR, then platform default
    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    // 2. Project-local config
    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    // Checked before the env overlay: env-supplied secrets are fine
    check_plaintext_secrets(&config, &mut warnings);

    // 3. Environment
    config.apply_env(env)?;

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load an explicit config file, then apply the process environment.
pub fn load_explicit(path: &Path) -> Result<LoadedConfig> {
    let mut config = load_config_file(path)?;
    let mut warnings = Vec::new();
    check_plaintext_secrets(&config, &mut warnings);
    config.apply_env(|k| std::env::var(k).ok())?;

    Ok(LoadedConfig {
        config,
        sources: vec![ConfigSource {
            path: path.to_path_buf(),
            loaded: true,
        }],
        warnings,
    })
}

/// Load config from a specific file path (no discovery, no env).
pub fn load_config_file(path: &Path) -> Result<BridgeConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    BridgeConfig::from_toml(&contents)
}

/// Get the XDG config file path for jirabridge.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the XDG config directory for jirabridge.
///
/// Checks `JIRABRIDGE_CONFIG_DIR` first, then falls back to platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Merge one file into `config` if it exists.
///
/// A malformed file is reported as a warning and skipped.
fn load_layer(config: &mut BridgeConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

fn check_plaintext_secrets(config: &BridgeConfig, warnings: &mut Vec<String>) {
    if config
        .oauth
        .as_ref()
        .is_some_and(|o| o.client_secret.is_some())
    {
        warnings.push(
            "[oauth] contains a plaintext client_secret. \
             Consider setting ATLASSIAN_CLIENT_SECRET instead."
                .to_string(),
        );
    }
    if config.jira.as_ref().is_some_and(|j| j.api_token.is_some()) {
        warnings.push(
            "[jira] contains a plaintext api_token. \
             Consider setting JIRA_API_TOKEN instead."
                .to_string(),
        );
    }
}

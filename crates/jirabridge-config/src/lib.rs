//! Configuration system for jirabridge.
//!
//! Provides TOML-based configuration with:
//! - Config file layering (XDG user config + project-local overrides)
//! - Environment overrides for secrets and deployment modes
//! - Explicit `auth_mode` / `tenant_mode` selection instead of
//!   hard-coded handler variants

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    load_config, load_config_file, load_config_with_options, load_explicit, xdg_config_dir,
    xdg_config_path, ConfigSource, LoadedConfig,
};
pub use error::{ConfigError, Result};
pub use types::*;

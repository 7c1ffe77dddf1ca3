//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [server]      # bind address, request logging, body limits
//! [oauth]       # Atlassian OAuth app + identity-provider endpoints
//! [jira]        # auth/tenant mode, upstream host, service account
//! [upstream]    # outbound call limits
//! ```

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default bind address for the proxy.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Default max inbound body size (10 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Default timeout for every outbound call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Atlassian identity-provider authorization endpoint.
pub const ATLASSIAN_AUTHORIZE_URL: &str = "https://auth.atlassian.com/authorize";

/// Atlassian token endpoint.
pub const ATLASSIAN_TOKEN_URL: &str = "https://auth.atlassian.com/oauth/token";

/// Endpoint listing the cloud sites a token can reach.
pub const ATLASSIAN_ACCESSIBLE_RESOURCES_URL: &str =
    "https://api.atlassian.com/oauth/token/accessible-resources";

/// Tenant-scoped Jira gateway; the cloud id is appended.
pub const ATLASSIAN_GATEWAY_URL: &str = "https://api.atlassian.com/ex/jira";

/// Scopes requested on every authorization.
pub const DEFAULT_SCOPE: &str = "read:jira-user read:jira-work write:jira-work";

/// API audience requested on every authorization.
pub const DEFAULT_AUDIENCE: &str = "api.atlassian.com";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. a project-local
/// override of just `[jira]`) can be loaded and merged section by section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub server: Option<ServerSection>,
    pub oauth: Option<OAuthSection>,
    pub jira: Option<JiraSection>,
    pub upstream: Option<UpstreamSection>,
}

impl BridgeConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: BridgeConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.oauth.is_some() {
            self.oauth = other.oauth;
        }
        if other.jira.is_some() {
            self.jira = other.jira;
        }
        if other.upstream.is_some() {
            self.upstream = other.upstream;
        }
    }

    /// Server section, or defaults.
    pub fn server(&self) -> ServerSection {
        self.server.clone().unwrap_or_default()
    }

    /// OAuth section, or defaults.
    pub fn oauth(&self) -> OAuthSection {
        self.oauth.clone().unwrap_or_default()
    }

    /// Jira section, or defaults.
    pub fn jira(&self) -> JiraSection {
        self.jira.clone().unwrap_or_default()
    }

    /// Upstream section, or defaults.
    pub fn upstream(&self) -> UpstreamSection {
        self.upstream.clone().unwrap_or_default()
    }

    /// Apply environment overrides on top of file configuration.
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`; tests pass a map.
    /// Empty values are treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let mut oauth = self.oauth();
        if let Some(v) = get(env::CLIENT_ID) {
            oauth.client_id = Some(v);
        }
        if let Some(v) = get(env::CLIENT_SECRET) {
            oauth.client_secret = Some(v);
        }
        self.oauth = Some(oauth);

        let mut jira = self.jira();
        if let Some(v) = get(env::JIRA_BASE_URL) {
            jira.base_url = Some(v);
        }
        if let Some(v) = get(env::JIRA_CLOUD_ID) {
            jira.cloud_id = Some(v);
        }
        if let Some(v) = get(env::JIRA_EMAIL) {
            jira.email = Some(v);
        }
        if let Some(v) = get(env::JIRA_API_TOKEN) {
            jira.api_token = Some(v);
        }
        if let Some(v) = get(env::AUTH_MODE) {
            jira.auth_mode = parse_env(env::AUTH_MODE, &v)?;
        }
        if let Some(v) = get(env::TENANT_MODE) {
            jira.tenant_mode = parse_env(env::TENANT_MODE, &v)?;
        }
        self.jira = Some(jira);

        if let Some(v) = get(env::TIMEOUT_SECS) {
            let mut upstream = self.upstream();
            upstream.timeout_secs = parse_env(env::TIMEOUT_SECS, &v)?;
            self.upstream = Some(upstream);
        }

        Ok(())
    }

    /// Settings the active modes need but that are not configured.
    ///
    /// Returned as setting keys (never values) so they can be logged.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let oauth = self.oauth();
        let jira = self.jira();
        let mut missing = Vec::new();

        if oauth.client_id.is_none() {
            missing.push("oauth.client_id");
        }
        if oauth.client_secret.is_none() {
            missing.push("oauth.client_secret");
        }
        match jira.tenant_mode {
            TenantMode::FixedHost if jira.base_url.is_none() => missing.push("jira.base_url"),
            TenantMode::CloudIdLookup if jira.cloud_id.is_none() => missing.push("jira.cloud_id"),
            _ => {}
        }
        if jira.auth_mode == AuthMode::ServiceAccount {
            if jira.email.is_none() {
                missing.push("jira.email");
            }
            if jira.api_token.is_none() {
                missing.push("jira.api_token");
            }
        }
        missing
    }

    /// Copy with every secret replaced by a placeholder, for display.
    pub fn redacted(&self) -> BridgeConfig {
        let mut copy = self.clone();
        if let Some(ref mut oauth) = copy.oauth
            && oauth.client_secret.is_some()
        {
            oauth.client_secret = Some(REDACTED.to_string());
        }
        if let Some(ref mut jira) = copy.jira
            && jira.api_token.is_some()
        {
            jira.api_token = Some(REDACTED.to_string());
        }
        copy
    }
}

/// Placeholder used when displaying secrets.
pub const REDACTED: &str = "[REDACTED]";

/// Environment variable names consumed at startup.
pub mod env {
    pub const CLIENT_ID: &str = "ATLASSIAN_CLIENT_ID";
    pub const CLIENT_SECRET: &str = "ATLASSIAN_CLIENT_SECRET";
    pub const JIRA_BASE_URL: &str = "JIRA_BASE_URL";
    pub const JIRA_CLOUD_ID: &str = "JIRA_CLOUD_ID";
    pub const JIRA_EMAIL: &str = "JIRA_EMAIL";
    pub const JIRA_API_TOKEN: &str = "JIRA_API_TOKEN";
    pub const AUTH_MODE: &str = "AUTH_MODE";
    pub const TENANT_MODE: &str = "TENANT_MODE";
    pub const TIMEOUT_SECS: &str = "UPSTREAM_TIMEOUT_SECS";
}

fn parse_env<T>(var: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    /// Address to bind to.
    pub bind: String,
    /// Log every request with method, path, status and duration.
    pub request_logging: bool,
    /// Permissive CORS for browser-based plugin hosts.
    pub cors: bool,
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            request_logging: true,
            cors: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl ServerSection {
    /// Parse the bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                field: "server.bind".to_string(),
                reason: e.to_string(),
            }
        })
    }
}

/// `[oauth]` section: the Atlassian OAuth 2.0 (3LO) app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OAuthSection {
    pub client_id: Option<String>,
    /// Never accepted from callers; file or `ATLASSIAN_CLIENT_SECRET` only.
    pub client_secret: Option<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub accessible_resources_url: String,
    pub scope: String,
    pub audience: String,
}

impl Default for OAuthSection {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            authorize_url: ATLASSIAN_AUTHORIZE_URL.to_string(),
            token_url: ATLASSIAN_TOKEN_URL.to_string(),
            accessible_resources_url: ATLASSIAN_ACCESSIBLE_RESOURCES_URL.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
        }
    }
}

/// `[jira]` section: how forwarded calls reach Jira.
///
/// `Debug` never prints `api_token`.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JiraSection {
    pub auth_mode: AuthMode,
    pub tenant_mode: TenantMode,
    /// Site root for `fixed_host`, e.g. `https://example.atlassian.net`.
    pub base_url: Option<String>,
    /// Gateway root for `cloud_id_lookup`.
    pub gateway_url: String,
    /// Pinned cloud id for `cloud_id_lookup`.
    pub cloud_id: Option<String>,
    /// Service account email (`service_account` mode).
    pub email: Option<String>,
    /// Service account API token (`service_account` mode).
    pub api_token: Option<String>,
    /// Replace upstream 401 bodies with a fixed message.
    pub mask_upstream_unauthorized: bool,
}

impl Default for JiraSection {
    fn default() -> Self {
        Self {
            auth_mode: AuthMode::default(),
            tenant_mode: TenantMode::default(),
            base_url: None,
            gateway_url: ATLASSIAN_GATEWAY_URL.to_string(),
            cloud_id: None,
            email: None,
            api_token: None,
            mask_upstream_unauthorized: true,
        }
    }
}

impl std::fmt::Debug for JiraSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraSection")
            .field("auth_mode", &self.auth_mode)
            .field("tenant_mode", &self.tenant_mode)
            .field("base_url", &self.base_url)
            .field("gateway_url", &self.gateway_url)
            .field("cloud_id", &self.cloud_id)
            .field("email", &self.email)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "mask_upstream_unauthorized",
                &self.mask_upstream_unauthorized,
            )
            .finish()
    }
}

/// `[upstream]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamSection {
    pub timeout_secs: u64,
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl UpstreamSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Modes
// ─────────────────────────────────────────────────────────────────────────────

/// Which credential the proxy injects into forwarded calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Per-caller OAuth bearer token from the inbound `Authorization` header.
    #[default]
    #[serde(rename = "oauth")]
    OAuth,
    /// Fixed Basic credential from the configured service account.
    ServiceAccount,
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "oauth" => Ok(Self::OAuth),
            "service_account" | "service-account" | "basic" => Ok(Self::ServiceAccount),
            other => Err(format!(
                "unknown auth mode '{}' (expected oauth or service_account)",
                other
            )),
        }
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OAuth => write!(f, "oauth"),
            Self::ServiceAccount => write!(f, "service_account"),
        }
    }
}

/// How forwarded calls address the Jira tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantMode {
    /// Single-tenant site host (`<base_url>/rest/api/3/`).
    #[default]
    FixedHost,
    /// Tenant-scoped gateway (`<gateway_url>/<cloud_id>/rest/api/3/`);
    /// the token flow also resolves and returns the cloud id.
    CloudIdLookup,
}

impl FromStr for TenantMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed_host" | "fixed-host" => Ok(Self::FixedHost),
            "cloud_id_lookup" | "cloud-id-lookup" | "cloud_id" => Ok(Self::CloudIdLookup),
            other => Err(format!(
                "unknown tenant mode '{}' (expected fixed_host or cloud_id_lookup)",
                other
            )),
        }
    }
}

impl std::fmt::Display for TenantMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FixedHost => write!(f, "fixed_host"),
            Self::CloudIdLookup => write!(f, "cloud_id_lookup"),
        }
    }
}

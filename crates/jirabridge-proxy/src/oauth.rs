//! OAuth 2.0 (3LO) flow against the Atlassian identity provider.
//!
//! Two entry points: building the authorization redirect, and exchanging an
//! authorization code (or refresh token) for tokens, optionally followed by
//! cloud-id resolution. Tokens are handed back to the caller and never stored.

use std::time::Instant;

use axum::http::Method;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use jirabridge_config::{OAuthSection, TenantMode};

use crate::error::{ProxyError, Result};
use crate::observe::{SharedObserver, UpstreamEvent, UpstreamKind};

/// Identity-provider settings for the OAuth app.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub accessible_resources_url: String,
    pub scope: String,
    pub audience: String,
}

impl From<&OAuthSection> for OAuthConfig {
    fn from(section: &OAuthSection) -> Self {
        Self {
            client_id: section.client_id.clone(),
            client_secret: section.client_secret.clone(),
            authorize_url: section.authorize_url.clone(),
            token_url: section.token_url.clone(),
            accessible_resources_url: section.accessible_resources_url.clone(),
            scope: section.scope.clone(),
            audience: section.audience.clone(),
        }
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("accessible_resources_url", &self.accessible_resources_url)
            .field("scope", &self.scope)
            .field("audience", &self.audience)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization redirect
// ─────────────────────────────────────────────────────────────────────────────

/// Build the authorization URL for the OAuth flow.
///
/// Pure: identical inputs always produce the identical URL. `prompt=consent`
/// forces re-consent so granted scopes stay current.
pub fn build_authorization_url(
    config: &OAuthConfig,
    redirect_uri: &str,
    state: Option<&str>,
) -> Result<String> {
    let client_id = config
        .client_id
        .as_deref()
        .ok_or_else(|| ProxyError::Config("oauth.client_id".to_string()))?;

    let mut params = vec![
        ("response_type", "code"),
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("scope", config.scope.as_str()),
        ("audience", config.audience.as_str()),
        ("prompt", "consent"),
    ];
    if let Some(state) = state {
        params.push(("state", state));
    }

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let separator = if config.authorize_url.contains('?') {
        '&'
    } else {
        '?'
    };
    Ok(format!("{}{}{}", config.authorize_url, separator, query))
}

// ─────────────────────────────────────────────────────────────────────────────
// Token exchange
// ─────────────────────────────────────────────────────────────────────────────

/// Grant being exchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    AuthorizationCode { code: String, redirect_uri: String },
    RefreshToken { refresh_token: String },
}

/// A validated caller request for tokens. The client secret is never part of
/// it; it always comes from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub client_id: String,
    pub grant: Grant,
}

impl TokenRequest {
    /// Validate caller-supplied fields, looked up through `field`.
    ///
    /// `grant_type` defaults to `authorization_code`.
    pub fn from_fields<'a, F>(field: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let get = |name: &str| field(name).map(str::trim).filter(|v| !v.is_empty());
        let require = |name: &str| {
            get(name)
                .map(str::to_string)
                .ok_or_else(|| ProxyError::InvalidRequest(format!("Missing required field: {}", name)))
        };

        let grant = match get("grant_type").unwrap_or("authorization_code") {
            "authorization_code" => Grant::AuthorizationCode {
                code: require("code")?,
                redirect_uri: require("redirect_uri")?,
            },
            "refresh_token" => Grant::RefreshToken {
                refresh_token: require("refresh_token")?,
            },
            other => {
                return Err(ProxyError::InvalidRequest(format!(
                    "Unsupported grant_type: {}",
                    other
                )));
            }
        };

        Ok(Self {
            client_id: require("client_id")?,
            grant,
        })
    }
}

/// Tokens returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenExchangeResult {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    /// Empty string when the provider omitted it, never null.
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_id: Option<String>,
}

#[derive(Serialize)]
struct TokenGrantBody<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

/// Provider token response; every field optional so that malformed
/// responses are reported rather than failing to parse.
#[derive(Debug, Default, Deserialize)]
struct ProviderTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessibleResource {
    id: Option<String>,
}

const EXCHANGE_FAILED: &str = "Failed to exchange token";
const CLOUD_ID_FAILED: &str = "Failed to get cloud ID";
const AUTH_FAILED: &str = "Failed to complete authentication";

/// Runs the token exchange (and, in cloud mode, tenant resolution).
#[derive(Debug, Clone)]
pub struct TokenExchange {
    client: Client,
    config: OAuthConfig,
    tenant_mode: TenantMode,
    observer: SharedObserver,
}

impl TokenExchange {
    pub fn new(
        client: Client,
        config: OAuthConfig,
        tenant_mode: TenantMode,
        observer: SharedObserver,
    ) -> Self {
        Self {
            client,
            config,
            tenant_mode,
            observer,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Exchange the grant for tokens. All-or-nothing: a failed cloud-id
    /// lookup fails the whole exchange even though tokens were issued.
    pub async fn exchange(&self, request: TokenRequest) -> Result<TokenExchangeResult> {
        let client_secret = self
            .config
            .client_secret
            .as_deref()
            .ok_or_else(|| ProxyError::Config("oauth.client_secret".to_string()))?;

        let body = match &request.grant {
            Grant::AuthorizationCode { code, redirect_uri } => TokenGrantBody {
                grant_type: "authorization_code",
                client_id: &request.client_id,
                client_secret,
                code: Some(code.as_str()),
                redirect_uri: Some(redirect_uri.as_str()),
                refresh_token: None,
            },
            Grant::RefreshToken { refresh_token } => TokenGrantBody {
                grant_type: "refresh_token",
                client_id: &request.client_id,
                client_secret,
                code: None,
                redirect_uri: None,
                refresh_token: Some(refresh_token.as_str()),
            },
        };

        let tokens = self.request_tokens(&body).await?;

        let (access_token, expires_in) = match (tokens.access_token, tokens.expires_in) {
            (Some(access_token), Some(expires_in)) if !access_token.is_empty() => {
                (access_token, expires_in)
            }
            _ => {
                tracing::warn!("Token response missing access_token or expires_in");
                return Err(ProxyError::TokenExchange(EXCHANGE_FAILED.to_string()));
            }
        };

        // Providers that do not rotate refresh tokens omit them on refresh.
        let refresh_token = match (tokens.refresh_token, &request.grant) {
            (Some(token), _) => token,
            (None, Grant::RefreshToken { refresh_token }) => refresh_token.clone(),
            (None, Grant::AuthorizationCode { .. }) => String::new(),
        };

        let cloud_id = match self.tenant_mode {
            TenantMode::CloudIdLookup => Some(self.resolve_cloud_id(&access_token).await?),
            TenantMode::FixedHost => None,
        };

        Ok(TokenExchangeResult {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            refresh_token,
            scope: tokens.scope,
            cloud_id,
        })
    }

    async fn request_tokens(&self, body: &TokenGrantBody<'_>) -> Result<ProviderTokenResponse> {
        let started = Instant::now();
        let sent = self
            .client
            .post(&self.config.token_url)
            .json(body)
            .send()
            .await;
        self.observe(
            UpstreamKind::TokenExchange,
            Method::POST,
            &self.config.token_url,
            sent.as_ref().ok().map(|r| r.status().as_u16()),
            started,
        );

        let response = sent.map_err(|e| {
            tracing::warn!(error = %e.without_url(), "Token request failed");
            ProxyError::TokenExchange(AUTH_FAILED.to_string())
        })?;
        let status = response.status();
        let parsed = match response.bytes().await {
            Ok(body) => decode_token_response(status, &body),
            Err(e) => {
                tracing::warn!(
                    status = %status.as_u16(),
                    error = %e.without_url(),
                    "Failed to read token response"
                );
                ProviderTokenResponse::default()
            }
        };

        if !status.is_success() {
            return Err(ProxyError::TokenExchange(describe_provider_error(&parsed)));
        }
        Ok(parsed)
    }

    /// Look up the first cloud site the token can reach.
    pub async fn resolve_cloud_id(&self, access_token: &str) -> Result<String> {
        let started = Instant::now();
        let sent = self
            .client
            .get(&self.config.accessible_resources_url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await;
        self.observe(
            UpstreamKind::AccessibleResources,
            Method::GET,
            &self.config.accessible_resources_url,
            sent.as_ref().ok().map(|r| r.status().as_u16()),
            started,
        );

        let response = sent.map_err(|e| {
            tracing::warn!(error = %e.without_url(), "Accessible resources request failed");
            ProxyError::TokenExchange(AUTH_FAILED.to_string())
        })?;
        if !response.status().is_success() {
            return Err(ProxyError::TokenExchange(CLOUD_ID_FAILED.to_string()));
        }

        let resources: Vec<AccessibleResource> = response
            .json()
            .await
            .map_err(|_| ProxyError::TokenExchange(CLOUD_ID_FAILED.to_string()))?;

        resources
            .into_iter()
            .next()
            .and_then(|r| r.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProxyError::TokenExchange(CLOUD_ID_FAILED.to_string()))
    }

    fn observe(
        &self,
        kind: UpstreamKind,
        method: Method,
        target: &str,
        status: Option<u16>,
        started: Instant,
    ) {
        self.observer.upstream_completed(&UpstreamEvent {
            kind,
            method,
            target: target.to_string(),
            status,
            duration: started.elapsed(),
        });
    }
}

/// Error message for a rejected token call. Only the provider's `error` and
/// `error_description` fields are surfaced.
/// Decode a token endpoint body. An unparseable body is logged and treated
/// as empty, so the caller reports a missing token or the provider status.
fn decode_token_response(status: reqwest::StatusCode, body: &[u8]) -> ProviderTokenResponse {
    match serde_json::from_slice(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(
                status = %status.as_u16(),
                error = %e,
                "Unreadable token response"
            );
            ProviderTokenResponse::default()
        }
    }
}

fn describe_provider_error(parsed: &ProviderTokenResponse) -> String {
    match (&parsed.error, &parsed.error_description) {
        (Some(error), Some(description)) => {
            format!("{}: {} ({})", EXCHANGE_FAILED, error, description)
        }
        (Some(error), None) => format!("{}: {}", EXCHANGE_FAILED, error),
        (None, Some(description)) => format!("{}: {}", EXCHANGE_FAILED, description),
        (None, None) => EXCHANGE_FAILED.to_string(),
    }
}

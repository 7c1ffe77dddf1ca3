//! Credential resolution for forwarded calls.
//!
//! Exactly one scheme is active per deployment: the caller's own OAuth bearer
//! token, or a fixed service account sent as HTTP Basic.

use axum::http::{HeaderMap, HeaderValue, header};
use base64::{Engine, engine::general_purpose::STANDARD};

use jirabridge_config::{AuthMode, JiraSection};

use crate::error::{ProxyError, Result};

/// Message for a missing or non-bearer `Authorization` header.
pub const MISSING_TOKEN: &str = "Missing or invalid authorization token";

/// Credential injected into one upstream call.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Per-request token taken from the inbound `Authorization: Bearer` header.
    BearerToken(String),
    /// Service account loaded from configuration.
    BasicServiceAccount { email: String, api_token: String },
}

impl Credentials {
    /// Freshly computed `Authorization` header value.
    pub fn header_value(&self) -> Result<HeaderValue> {
        let raw = match self {
            Credentials::BearerToken(token) => format!("Bearer {}", token),
            Credentials::BasicServiceAccount { email, api_token } => {
                format!("Basic {}", STANDARD.encode(format!("{}:{}", email, api_token)))
            }
        };
        let mut value = HeaderValue::from_str(&raw)
            .map_err(|_| ProxyError::Unauthorized(MISSING_TOKEN.to_string()))?;
        value.set_sensitive(true);
        Ok(value)
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Credentials::BearerToken(_) => "bearer",
            Credentials::BasicServiceAccount { .. } => "basic",
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::BearerToken(_) => f.write_str("BearerToken([REDACTED])"),
            Credentials::BasicServiceAccount { email, .. } => f
                .debug_struct("BasicServiceAccount")
                .field("email", email)
                .field("api_token", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Decides which credential a forwarded call carries.
#[derive(Clone)]
pub struct CredentialProvider {
    mode: AuthMode,
    service_account: Option<Credentials>,
}

impl CredentialProvider {
    /// Build from the `[jira]` section. Service-account material is captured
    /// once here and never re-read.
    pub fn from_config(jira: &JiraSection) -> Self {
        let service_account = match (&jira.email, &jira.api_token) {
            (Some(email), Some(api_token)) => Some(Credentials::BasicServiceAccount {
                email: email.clone(),
                api_token: api_token.clone(),
            }),
            _ => None,
        };
        Self {
            mode: jira.auth_mode,
            service_account,
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Resolve the credential for one inbound request.
    ///
    /// OAuth mode fails with 401 when the caller has no bearer token; service
    /// account mode fails with 500 when the account is not configured.
    pub fn resolve(&self, headers: &HeaderMap) -> Result<Credentials> {
        match self.mode {
            AuthMode::OAuth => extract_bearer(headers)
                .map(|token| Credentials::BearerToken(token.to_string()))
                .ok_or_else(|| ProxyError::Unauthorized(MISSING_TOKEN.to_string())),
            AuthMode::ServiceAccount => self
                .service_account
                .clone()
                .ok_or_else(|| ProxyError::Config("jira.email/jira.api_token".to_string())),
        }
    }
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("mode", &self.mode)
            .field("service_account", &self.service_account.is_some())
            .finish()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The scheme match is case-insensitive; an empty token counts as missing.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn service_account_config() -> JiraSection {
        JiraSection {
            auth_mode: AuthMode::ServiceAccount,
            email: Some("bot@example.com".to_string()),
            api_token: Some("s3cret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(
            extract_bearer(&headers_with_auth("Bearer abc123")),
            Some("abc123")
        );
        assert_eq!(extract_bearer(&headers_with_auth("bearer abc")), Some("abc"));
        assert_eq!(extract_bearer(&headers_with_auth("Basic abc")), None);
        assert_eq!(extract_bearer(&headers_with_auth("Bearer ")), None);
        assert_eq!(extract_bearer(&headers_with_auth("abc123")), None);
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }

    #[test]
    fn test_oauth_mode_requires_bearer() {
        let provider = CredentialProvider::from_config(&JiraSection::default());
        let err = provider.resolve(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ProxyError::Unauthorized(_)));

        let creds = provider
            .resolve(&headers_with_auth("Bearer caller-token"))
            .unwrap();
        assert_eq!(creds, Credentials::BearerToken("caller-token".to_string()));
        assert_eq!(
            creds.header_value().unwrap().to_str().unwrap(),
            "Bearer caller-token"
        );
    }

    #[test]
    fn test_service_account_ignores_inbound_auth() {
        let provider = CredentialProvider::from_config(&service_account_config());
        let creds = provider
            .resolve(&headers_with_auth("Bearer caller-token"))
            .unwrap();

        let expected = format!("Basic {}", STANDARD.encode("bot@example.com:s3cret"));
        let value = creds.header_value().unwrap();
        assert_eq!(value.to_str().unwrap(), expected);
        assert_ne!(value.to_str().unwrap(), "Bearer caller-token");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_service_account_missing_is_config_error() {
        let config = JiraSection {
            auth_mode: AuthMode::ServiceAccount,
            email: Some("bot@example.com".to_string()),
            ..Default::default()
        };
        let provider = CredentialProvider::from_config(&config);
        let err = provider.resolve(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ProxyError::Config(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::BasicServiceAccount {
            email: "bot@example.com".to_string(),
            api_token: "s3cret".to_string(),
        };
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("s3cret"));
        assert!(shown.contains("bot@example.com"));

        let shown = format!("{:?}", Credentials::BearerToken("caller-secret".to_string()));
        assert!(!shown.contains("caller-secret"));
    }
}

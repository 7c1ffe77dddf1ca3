//! Credential-injecting reverse proxy for the Jira Cloud REST API.
//!
//! Callers authenticate once through the Atlassian OAuth flow (or not at all,
//! in service-account mode) and then send plain REST calls to `/jira/...`.
//! The proxy attaches the right `Authorization` header and returns Jira's
//! response unchanged apart from framing headers.
//!
//! # Components
//!
//! - [`oauth`]: authorization redirect, token exchange, cloud-id lookup
//! - [`credentials`]: bearer extraction and service-account Basic auth
//! - [`filter`]: header and query filtering between caller and Jira
//! - [`upstream`]: target URL composition and outbound request building
//! - [`forward`]: executes forwarded calls and maps responses
//! - [`observe`]: structured events for every upstream call
//! - [`proxy`]: axum server and routes

pub mod credentials;
pub mod error;
pub mod filter;
pub mod forward;
pub mod middleware;
pub mod oauth;
pub mod observe;
pub mod proxy;
pub mod upstream;

pub use credentials::{CredentialProvider, Credentials};
pub use error::{ProxyError, Result};
pub use forward::{ForwardingExecutor, UpstreamResponse};
pub use oauth::{OAuthConfig, TokenExchange, TokenExchangeResult, TokenRequest};
pub use observe::{
    ProxyObserver, RecordingObserver, TracingObserver, UpstreamEvent, UpstreamKind,
};
pub use proxy::ProxyServer;
pub use upstream::{InboundRequest, JiraTarget, UpstreamRequest};

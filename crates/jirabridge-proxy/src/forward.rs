//! Forwarding executor: one inbound call in, one Jira call out.
//!
//! Upstream application errors (4xx/5xx) are passed through untouched; only
//! transport failures become proxy errors. The one exception is an upstream
//! 401, which is masked by default so provider detail never reaches callers.

use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;
use reqwest::Client;

use jirabridge_config::JiraSection;

use crate::credentials::CredentialProvider;
use crate::error::{ProxyError, Result};
use crate::filter::{filter_response_headers, redact_headers};
use crate::observe::{SharedObserver, UpstreamEvent, UpstreamKind};
use crate::upstream::{InboundRequest, JiraTarget, UpstreamRequest};

/// Fixed message for a masked upstream 401.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized - invalid credentials";

/// Raw response captured from Jira.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Interpretation of an upstream body.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Empty,
    Json(serde_json::Value),
    Text(Bytes),
}

impl UpstreamResponse {
    /// Parse the body: JSON when it parses, raw bytes otherwise.
    pub fn parsed_body(&self) -> ParsedBody {
        if self.body.is_empty() {
            return ParsedBody::Empty;
        }
        match serde_json::from_slice(&self.body) {
            Ok(value) => ParsedBody::Json(value),
            Err(_) => ParsedBody::Text(self.body.clone()),
        }
    }
}

/// Executes forwarded calls against a single Jira target.
#[derive(Debug, Clone)]
pub struct ForwardingExecutor {
    client: Client,
    credentials: CredentialProvider,
    jira: JiraSection,
    observer: SharedObserver,
}

impl ForwardingExecutor {
    /// Create an executor. A missing Jira host or cloud id is only reported
    /// when a request actually needs it.
    pub fn new(client: Client, jira: &JiraSection, observer: SharedObserver) -> Self {
        Self {
            client,
            credentials: CredentialProvider::from_config(jira),
            jira: jira.clone(),
            observer,
        }
    }

    /// Forward one inbound request and map the result into a response.
    pub async fn forward(&self, inbound: InboundRequest) -> Result<Response> {
        // Credentials first: a caller without a token never reaches Jira.
        let credentials = self.credentials.resolve(&inbound.headers)?;
        let target = JiraTarget::from_config(&self.jira)?;

        let request = UpstreamRequest::build(&inbound, &credentials, &target)?;
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            scheme = credentials.scheme(),
            headers = ?redact_headers(&request.headers),
            "Forwarding request to Jira"
        );

        let upstream = self.execute(request).await?;
        tracing::debug!(
            status = %upstream.status.as_u16(),
            headers = ?redact_headers(&upstream.headers),
            body_len = upstream.body.len(),
            "Jira response received"
        );

        self.map_response(upstream)
    }

    /// Issue the call and capture status, headers and body.
    pub async fn execute(&self, request: UpstreamRequest) -> Result<UpstreamResponse> {
        let target = request.target();
        let method = request.method.clone();
        let started = Instant::now();

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let result = async {
            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(|e| ProxyError::Network {
                message: "Failed to read Jira response".to_string(),
                status: Some(status.as_u16()),
                detail: Some(e.without_url().to_string()),
            })?;
            Ok::<_, ProxyError>(UpstreamResponse {
                status,
                headers,
                body,
            })
        }
        .await;

        self.observer.upstream_completed(&UpstreamEvent {
            kind: UpstreamKind::JiraApi,
            method,
            target,
            status: result.as_ref().ok().map(|r| r.status.as_u16()),
            duration: started.elapsed(),
        });

        result
    }

    /// Map a captured upstream response onto the downstream contract.
    pub fn map_response(&self, upstream: UpstreamResponse) -> Result<Response> {
        if upstream.status == StatusCode::UNAUTHORIZED && self.jira.mask_upstream_unauthorized {
            return Err(ProxyError::Unauthorized(UNAUTHORIZED_MESSAGE.to_string()));
        }

        let mut headers = filter_response_headers(&upstream.headers);
        let body = match upstream.parsed_body() {
            ParsedBody::Empty => Body::empty(),
            ParsedBody::Json(_) => {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                Body::from(upstream.body)
            }
            ParsedBody::Text(raw) => Body::from(raw),
        };

        let mut response = Response::builder()
            .status(upstream.status)
            .body(body)
            .map_err(|e| ProxyError::network("Failed to build response", e))?;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

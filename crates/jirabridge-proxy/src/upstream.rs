//! Upstream request construction.
//!
//! Turns an [`InboundRequest`] plus [`Credentials`] into the exact call sent
//! to Jira. Pure and deterministic; no I/O happens here.

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, Method, Uri, header};
use url::Url;

use jirabridge_config::{JiraSection, TenantMode};

use crate::credentials::Credentials;
use crate::error::{ProxyError, Result};
use crate::filter::{filter_request_headers, forwarded_query, parse_query, routing_values};

/// Jira REST API v3 path, relative to the site or gateway root.
pub const REST_API_PATH: &str = "rest/api/3/";

/// A request received on the Jira passthrough route.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Resource path segments, still percent-encoded.
    pub segments: Vec<String>,
    /// Query pairs in arrival order, routing key included.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    /// Split an inbound URI under `prefix` into segments and query pairs.
    ///
    /// When the path carries no segments, the routing-key query values are
    /// used instead (`/jira?path=issue&path=ABC-1`).
    pub fn from_parts(
        method: Method,
        uri: &Uri,
        prefix: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        let query = parse_query(uri.query());
        let rest = uri.path().strip_prefix(prefix).unwrap_or_default();

        let mut segments: Vec<String> = rest
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if segments.is_empty() {
            segments = routing_values(&query)
                .flat_map(|v| v.split('/'))
                .filter(|s| !s.is_empty())
                .map(|s| urlencoding::encode(s).into_owned())
                .collect();
        }

        Self {
            method,
            segments,
            query,
            headers,
            body,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Whether a body is attached upstream at all.
    fn carries_body(&self) -> bool {
        !self.body.is_empty() && self.method != Method::GET && self.method != Method::HEAD
    }
}

/// Where forwarded calls land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JiraTarget {
    /// `<base_url>/rest/api/3/`
    FixedHost { base_url: String },
    /// `<gateway_url>/<cloud_id>/rest/api/3/`
    CloudGateway {
        gateway_url: String,
        cloud_id: String,
    },
}

impl JiraTarget {
    /// Resolve from the `[jira]` section; a missing host or cloud id is a
    /// configuration error.
    pub fn from_config(jira: &JiraSection) -> Result<Self> {
        match jira.tenant_mode {
            TenantMode::FixedHost => jira
                .base_url
                .clone()
                .map(|base_url| JiraTarget::FixedHost { base_url })
                .ok_or_else(|| ProxyError::Config("jira.base_url".to_string())),
            TenantMode::CloudIdLookup => jira
                .cloud_id
                .clone()
                .map(|cloud_id| JiraTarget::CloudGateway {
                    gateway_url: jira.gateway_url.clone(),
                    cloud_id,
                })
                .ok_or_else(|| ProxyError::Config("jira.cloud_id".to_string())),
        }
    }

    /// REST API root, always ending in `/`.
    pub fn api_base(&self) -> String {
        match self {
            JiraTarget::FixedHost { base_url } => {
                format!("{}/{}", base_url.trim_end_matches('/'), REST_API_PATH)
            }
            JiraTarget::CloudGateway {
                gateway_url,
                cloud_id,
            } => format!(
                "{}/{}/{}",
                gateway_url.trim_end_matches('/'),
                urlencoding::encode(cloud_id),
                REST_API_PATH
            ),
        }
    }
}

/// A fully composed call to Jira.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl UpstreamRequest {
    /// Compose the upstream call.
    ///
    /// Bodies with a JSON or missing content type go out as
    /// `application/json`; other content types are forwarded byte-for-byte
    /// with their original type.
    pub fn build(
        inbound: &InboundRequest,
        credentials: &Credentials,
        target: &JiraTarget,
    ) -> Result<Self> {
        let url = compose_url(target, &inbound.segments, &forwarded_query(&inbound.query))?;

        let mut headers = filter_request_headers(&inbound.headers);
        headers.insert(header::AUTHORIZATION, credentials.header_value()?);

        let body = if inbound.carries_body() {
            if is_json_or_absent(inbound.content_type()) {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
            Some(inbound.body.clone())
        } else {
            None
        };

        Ok(Self {
            url,
            method: inbound.method.clone(),
            headers,
            body,
        })
    }

    /// Target without the query string, for logs and events.
    pub fn target(&self) -> String {
        let mut shown = self.url.clone();
        shown.set_query(None);
        shown.to_string()
    }
}

/// Join segments onto the API base and append the forwarded query.
///
/// Segments that would climb out of the API root (`..`) are rejected.
pub fn compose_url(
    target: &JiraTarget,
    segments: &[String],
    query: &[(String, String)],
) -> Result<Url> {
    let base = target.api_base();
    let base_url = Url::parse(&base).map_err(|e| {
        ProxyError::Config(format!("valid Jira base URL ({})", e))
    })?;

    let mut url = Url::parse(&format!("{}{}", base, segments.join("/")))
        .map_err(|e| ProxyError::InvalidRequest(format!("Invalid Jira path: {}", e)))?;

    if url.origin() != base_url.origin() || !url.path().starts_with(base_url.path()) {
        return Err(ProxyError::InvalidRequest(
            "Invalid Jira path: escapes the REST API root".to_string(),
        ));
    }

    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in query {
            pairs.append_pair(k, v);
        }
    }

    Ok(url)
}

fn is_json_or_absent(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(ct) => {
            let essence = ct.split(';').next().unwrap_or_default().trim();
            essence.eq_ignore_ascii_case("application/json")
                || essence.to_ascii_lowercase().ends_with("+json")
        }
    }
}

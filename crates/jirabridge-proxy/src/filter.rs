//! Header and query-string filtering between the caller and Jira.

use axum::http::{HeaderMap, HeaderName, header};

/// Query key that carries path segments in catch-all routing; never forwarded.
pub const ROUTING_KEY: &str = "path";

/// Inbound headers that are never copied upstream. `authorization` is always
/// replaced by the computed credential.
const EXCLUDED_REQUEST_HEADERS: &[HeaderName] = &[
    header::HOST,
    header::CONTENT_LENGTH,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::AUTHORIZATION,
];

/// Payload-framing headers recomputed when the final response is written.
const EXCLUDED_RESPONSE_HEADERS: &[HeaderName] = &[
    header::CONTENT_LENGTH,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
];

/// Headers whose values are never written to logs.
const SENSITIVE_HEADERS: &[HeaderName] = &[
    header::AUTHORIZATION,
    header::PROXY_AUTHORIZATION,
    header::COOKIE,
    header::SET_COOKIE,
];

/// Copy inbound headers that are safe to send to Jira.
pub fn filter_request_headers(inbound: &HeaderMap) -> HeaderMap {
    copy_except(inbound, EXCLUDED_REQUEST_HEADERS)
}

/// Copy upstream response headers, dropping payload-framing ones.
pub fn filter_response_headers(upstream: &HeaderMap) -> HeaderMap {
    copy_except(upstream, EXCLUDED_RESPONSE_HEADERS)
}

fn copy_except(source: &HeaderMap, excluded: &[HeaderName]) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if !excluded.contains(name) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

/// Parse a raw query string into ordered pairs. Repeated keys are kept.
pub fn parse_query(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    })
    .unwrap_or_default()
}

/// Query pairs to forward: everything except the routing key, order kept.
pub fn forwarded_query(pairs: &[(String, String)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .filter(|(k, _)| k != ROUTING_KEY)
        .cloned()
        .collect()
}

/// Values of the routing key, in order.
pub fn routing_values(pairs: &[(String, String)]) -> impl Iterator<Item = &str> {
    pairs
        .iter()
        .filter(|(k, _)| k == ROUTING_KEY)
        .map(|(_, v)| v.as_str())
}

/// Render headers for logging with sensitive values replaced.
pub fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if SENSITIVE_HEADERS.contains(name) || value.is_sensitive() {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("<binary>").to_string()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}

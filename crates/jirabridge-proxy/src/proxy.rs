//! HTTP server for the Jira bridge.
//!
//! Routes:
//! - `GET /authorize`: redirect to the Atlassian consent screen
//! - `POST /token`: exchange an authorization code or refresh token
//! - `ANY /jira`, `/jira/`, `/jira/{*path}`: forward to the Jira REST API with injected credentials
//!
//! Fixed-method routes answer other methods with a JSON 405, and bodies over
//! `server.max_body_size` get a JSON 413.
//! - `GET /health`

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router as AxumRouter,
    body::Bytes,
    extract::{DefaultBodyLimit, RawQuery, State, rejection::BytesRejection},
    http::{HeaderMap, Method, StatusCode, Uri, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
};
use reqwest::Client;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use jirabridge_config::{BridgeConfig, ServerSection};

use crate::error::{ProxyError, Result};
use crate::filter::parse_query;
use crate::forward::ForwardingExecutor;
use crate::middleware::request_logging_middleware;
use crate::oauth::{
    OAuthConfig, TokenExchange, TokenExchangeResult, TokenRequest, build_authorization_url,
};
use crate::observe::{SharedObserver, TracingObserver};
use crate::upstream::InboundRequest;

/// Route prefix for forwarded Jira calls.
pub const JIRA_PREFIX: &str = "/jira";

/// Shared state for request handlers. Read-only after startup.
#[derive(Debug)]
struct ProxyState {
    oauth: OAuthConfig,
    tokens: TokenExchange,
    forwarder: ForwardingExecutor,
}

/// The Jira bridge server.
pub struct ProxyServer {
    server: ServerSection,
    state: Arc<ProxyState>,
}

impl ProxyServer {
    /// Create a server that reports upstream calls through `tracing`.
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Create a server with a custom upstream observer.
    pub fn with_observer(config: &BridgeConfig, observer: SharedObserver) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.upstream().timeout())
            .build()
            .map_err(|e| ProxyError::network("Failed to build HTTP client", e))?;

        let jira = config.jira();
        let oauth = OAuthConfig::from(&config.oauth());
        let tokens = TokenExchange::new(
            client.clone(),
            oauth.clone(),
            jira.tenant_mode,
            observer.clone(),
        );
        let forwarder = ForwardingExecutor::new(client, &jira, observer);

        Ok(Self {
            server: config.server(),
            state: Arc::new(ProxyState {
                oauth,
                tokens,
                forwarder,
            }),
        })
    }

    /// Build the axum router.
    pub fn router(&self) -> AxumRouter {
        let mut router = AxumRouter::new()
            .route("/health", get(handle_health))
            .route("/authorize", any(handle_authorize))
            .route("/token", any(handle_token))
            .route(JIRA_PREFIX, any(handle_jira))
            .route("/jira/", any(handle_jira))
            .route("/jira/{*path}", any(handle_jira))
            .with_state(self.state.clone())
            .layer(DefaultBodyLimit::max(self.server.max_body_size));

        if self.server.request_logging {
            router = router.layer(middleware::from_fn(request_logging_middleware));
        }

        if self.server.cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router.layer(TraceLayer::new_for_http())
    }

    fn bind_addr(&self) -> std::io::Result<SocketAddr> {
        self.server.bind_addr().map_err(std::io::Error::other)
    }

    /// Run the server until `shutdown` resolves, then drain in-flight requests.
    pub async fn run(
        self,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.bind_addr()?).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "Starting Jira bridge");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }

    /// Run with graceful shutdown, returning the bound address.
    pub async fn run_with_shutdown(
        self,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind(self.bind_addr()?).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "Starting Jira bridge");
        tokio::spawn(async move {
            axum::serve(listener, self.router())
                .with_graceful_shutdown(shutdown)
                .await
                .ok();
        });
        Ok(local_addr)
    }
}

/// Handle GET /health
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "jirabridge"
    }))
}

/// Handle GET /authorize
async fn handle_authorize(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    if method != Method::GET {
        return Err(ProxyError::MethodNotAllowed);
    }
    let pairs = parse_query(query.as_deref());

    let redirect_uri = match single_value(&pairs, "redirect_uri") {
        SingleValue::One(v) if !v.is_empty() => v,
        SingleValue::Many => {
            return Err(ProxyError::InvalidRequest(
                "redirect_uri must be a single value".to_string(),
            ));
        }
        _ => {
            return Err(ProxyError::InvalidRequest(
                "Missing required parameter: redirect_uri".to_string(),
            ));
        }
    };
    let state_param = match single_value(&pairs, "state") {
        SingleValue::One(v) => Some(v),
        _ => None,
    };

    let url = build_authorization_url(&state.oauth, redirect_uri, state_param)?;
    tracing::debug!(
        has_state = state_param.is_some(),
        "Redirecting to authorization endpoint"
    );
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
}

enum SingleValue<'a> {
    None,
    One(&'a str),
    Many,
}

fn single_value<'a>(pairs: &'a [(String, String)], key: &str) -> SingleValue<'a> {
    let mut values = pairs.iter().filter(|(k, _)| k == key).map(|(_, v)| v.as_str());
    match (values.next(), values.next()) {
        (None, _) => SingleValue::None,
        (Some(v), None) => SingleValue::One(v),
        (Some(_), Some(_)) => SingleValue::Many,
    }
}

/// Handle POST /token
async fn handle_token(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<Json<TokenExchangeResult>> {
    if method != Method::POST {
        return Err(ProxyError::MethodNotAllowed);
    }
    let body = body?;

    let fields = token_fields(&headers, query.as_deref(), &body)?;
    let request = TokenRequest::from_fields(|name| fields.get(name).map(String::as_str))?;
    let result = state.tokens.exchange(request).await?;

    tracing::info!(
        has_refresh_token = !result.refresh_token.is_empty(),
        has_cloud_id = result.cloud_id.is_some(),
        "Token exchange succeeded"
    );
    Ok(Json(result))
}

/// Collect caller fields: query string first, then the body on top.
fn token_fields(
    headers: &HeaderMap,
    query: Option<&str>,
    body: &[u8],
) -> Result<HashMap<String, String>> {
    let mut fields: HashMap<String, String> = parse_query(query).into_iter().collect();

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(fields);
    }

    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        fields.extend(url::form_urlencoded::parse(body).into_owned());
        return Ok(fields);
    }

    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ProxyError::InvalidRequest(format!("Invalid JSON body: {}", e)))?;
    let serde_json::Value::Object(map) = value else {
        return Err(ProxyError::InvalidRequest(
            "Request body must be a JSON object".to_string(),
        ));
    };
    for (key, value) in map {
        if let serde_json::Value::String(s) = value {
            fields.insert(key, s);
        }
    }
    Ok(fields)
}

/// Handle ANY /jira/{*path}
async fn handle_jira(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<Response> {
    let inbound = InboundRequest::from_parts(method, &uri, JIRA_PREFIX, headers, body?);
    state.forwarder.forward(inbound).await
}

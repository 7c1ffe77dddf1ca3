//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use reqwest::Client;
use tokio::sync::oneshot;
use wiremock::MockServer;

use jirabridge_config::{
    AuthMode, BridgeConfig, JiraSection, OAuthSection, ServerSection, TenantMode,
    UpstreamSection,
};
use jirabridge_proxy::{ProxyServer, RecordingObserver};

pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";

/// Config pointing every upstream at `mock`.
pub fn config_for(mock: &MockServer) -> BridgeConfig {
    let mut config = BridgeConfig::new();
    config.server = Some(ServerSection {
        bind: "127.0.0.1:0".to_string(),
        request_logging: false,
        ..Default::default()
    });
    config.oauth = Some(OAuthSection {
        client_id: Some(CLIENT_ID.to_string()),
        client_secret: Some(CLIENT_SECRET.to_string()),
        token_url: format!("{}/oauth/token", mock.uri()),
        accessible_resources_url: format!("{}/oauth/token/accessible-resources", mock.uri()),
        ..Default::default()
    });
    config.jira = Some(JiraSection {
        base_url: Some(mock.uri()),
        gateway_url: format!("{}/ex/jira", mock.uri()),
        ..Default::default()
    });
    config
}

/// Switch to Basic auth with a fixed service account.
pub fn service_account(config: &mut BridgeConfig, email: &str, api_token: &str) {
    let mut jira = config.jira();
    jira.auth_mode = AuthMode::ServiceAccount;
    jira.email = Some(email.to_string());
    jira.api_token = Some(api_token.to_string());
    config.jira = Some(jira);
}

/// Switch to the cloud gateway with an optional pinned cloud id.
pub fn cloud_mode(config: &mut BridgeConfig, cloud_id: Option<&str>) {
    let mut jira = config.jira();
    jira.tenant_mode = TenantMode::CloudIdLookup;
    jira.cloud_id = cloud_id.map(str::to_string);
    config.jira = Some(jira);
}

/// Cap every upstream call at `secs`.
pub fn upstream_timeout(config: &mut BridgeConfig, secs: u64) {
    config.upstream = Some(UpstreamSection { timeout_secs: secs });
}

/// A proxy running in the background against a mock Atlassian.
pub struct TestProxy {
    /// The proxy's address.
    pub addr: SocketAddr,
    /// Client that does not follow redirects.
    pub client: Client,
    /// Upstream calls seen by the proxy.
    pub observer: Arc<RecordingObserver>,
    _shutdown: oneshot::Sender<()>,
}

impl TestProxy {
    pub async fn start(config: &BridgeConfig) -> Result<Self> {
        let observer = Arc::new(RecordingObserver::new());
        let server = ProxyServer::with_observer(config, observer.clone())?;

        let (tx, rx) = oneshot::channel::<()>();
        let addr = server
            .run_with_shutdown(async move {
                rx.await.ok();
            })
            .await?;

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            addr,
            client,
            observer,
            _shutdown: tx,
        })
    }

    /// Get the base URL for the proxy.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }
}

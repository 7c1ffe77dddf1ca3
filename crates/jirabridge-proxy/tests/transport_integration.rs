//! Upstream transport failures: timeouts, unreachable hosts, unreadable bodies.

mod common;

use std::time::Duration;

use anyhow::Result;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jirabridge_proxy::UpstreamKind;

#[tokio::test]
async fn test_slow_jira_times_out() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/myself"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"accountId": "a1"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock)
        .await;

    let mut config = common::config_for(&mock);
    common::upstream_timeout(&mut config, 1);
    let proxy = common::TestProxy::start(&config).await?;

    let resp = proxy
        .client
        .get(proxy.url("/jira/myself"))
        .bearer_auth("caller-token")
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 500);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["error"], "Upstream request timed out");

    let events = proxy.observer.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, UpstreamKind::JiraApi);
    assert_eq!(events[0].status, None);
    Ok(())
}

#[tokio::test]
async fn test_slow_token_endpoint_fails_authentication() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "access_token": "access-1",
                    "expires_in": 3600
                }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock)
        .await;

    let mut config = common::config_for(&mock);
    common::upstream_timeout(&mut config, 1);
    let proxy = common::TestProxy::start(&config).await?;

    let resp = proxy
        .client
        .post(proxy.url("/token"))
        .json(&serde_json::json!({
            "code": "auth-code",
            "redirect_uri": "https://chat.example.com/callback",
            "client_id": "test-client"
        }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 500);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["error"], "Failed to complete authentication");

    let events = proxy.observer.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, UpstreamKind::TokenExchange);
    assert_eq!(events[0].status, None);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_jira_is_json_500() -> Result<()> {
    let mock = MockServer::start().await;
    let mut config = common::config_for(&mock);
    let mut jira = config.jira();
    // Port 1 is reserved and refuses connections on loopback.
    jira.base_url = Some("http://127.0.0.1:1".to_string());
    config.jira = Some(jira);
    let proxy = common::TestProxy::start(&config).await?;

    let resp = proxy
        .client
        .get(proxy.url("/jira/myself"))
        .bearer_auth("caller-token")
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 500);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["error"], "Upstream request failed");
    assert_eq!(proxy.observer.events()[0].status, None);
    Ok(())
}

#[tokio::test]
async fn test_unparseable_token_response_is_reported() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-1",
            "expires_in": 3600.5
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let proxy = common::TestProxy::start(&common::config_for(&mock)).await?;

    let resp = proxy
        .client
        .post(proxy.url("/token"))
        .json(&serde_json::json!({
            "code": "auth-code",
            "redirect_uri": "https://chat.example.com/callback",
            "client_id": "test-client"
        }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 500);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["error"], "Failed to exchange token");
    Ok(())
}

#[tokio::test]
async fn test_jira_root_with_trailing_slash_is_forwarded() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/rest/api/3/?$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&mock)
        .await;

    let proxy = common::TestProxy::start(&common::config_for(&mock)).await?;

    let resp = proxy
        .client
        .get(proxy.url("/jira/"))
        .bearer_auth("caller-token")
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["ok"], true);
    Ok(())
}

//! Authorization redirect and token exchange integration tests.

mod common;

use anyhow::Result;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jirabridge_proxy::UpstreamKind;

fn token_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": "access-1",
        "refresh_token": "refresh-1",
        "expires_in": 3600,
        "scope": "read:jira-work",
        "token_type": "Bearer"
    }))
}

#[tokio::test]
async fn test_authorize_redirect() -> Result<()> {
    let mock = MockServer::start().await;
    let proxy = common::TestProxy::start(&common::config_for(&mock)).await?;

    let resp = proxy
        .client
        .get(proxy.url(
            "/authorize?redirect_uri=https%3A%2F%2Fchat.example.com%2Fcallback&state=abc123",
        ))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 302);

    let location = resp.headers().get("location").unwrap().to_str()?.to_string();
    assert_eq!(
        location,
        "https://auth.atlassian.com/authorize?response_type=code&client_id=test-client\
         &redirect_uri=https%3A%2F%2Fchat.example.com%2Fcallback\
         &scope=read%3Ajira-user%20read%3Ajira-work%20write%3Ajira-work\
         &audience=api.atlassian.com&prompt=consent&state=abc123"
    );
    Ok(())
}

#[tokio::test]
async fn test_token_exchange_success() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_json(serde_json::json!({
            "grant_type": "authorization_code",
            "client_id": "test-client",
            "client_secret": "test-secret",
            "code": "auth-code",
            "redirect_uri": "https://chat.example.com/callback"
        })))
        .respond_with(token_response())
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
            "client_id": "test-client",
            "client_secret": "caller-supplied-is-ignored"
        }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);

    let body: serde_json::Value = resp.json().await?;
    assert_eq!(
        body,
        serde_json::json!({
            "access_token": "access-1",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-1",
            "scope": "read:jira-work"
        })
    );
    assert_eq!(proxy.observer.count(UpstreamKind::AccessibleResources), 0);
    Ok(())
}

#[tokio::test]
async fn test_token_exchange_form_body() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-1",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let proxy = common::TestProxy::start(&common::config_for(&mock)).await?;

    let resp = proxy
        .client
        .post(proxy.url("/token?client_id=test-client"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("code=auth-code&redirect_uri=https%3A%2F%2Fcb")
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);

    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["refresh_token"], "");
    assert!(body.get("scope").is_none());
    Ok(())
}

#[tokio::test]
async fn test_token_exchange_invalid_grant() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Unknown or invalid authorization code."
        })))
        .mount(&mock)
        .await;

    let proxy = common::TestProxy::start(&common::config_for(&mock)).await?;

    let resp = proxy
        .client
        .post(proxy.url("/token"))
        .json(&serde_json::json!({
            "code": "stale",
            "redirect_uri": "https://cb",
            "client_id": "test-client"
        }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 500);

    let body: serde_json::Value = resp.json().await?;
    let error = body["error"].as_str().unwrap_or_default();
    assert!(error.contains("invalid_grant"));
    assert!(!error.contains("test-secret"));
    Ok(())
}

#[tokio::test]
async fn test_token_missing_access_token() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"expires_in": 3600})),
        )
        .mount(&mock)
        .await;

    let proxy = common::TestProxy::start(&common::config_for(&mock)).await?;

    let resp = proxy
        .client
        .post(proxy.url("/token"))
        .json(&serde_json::json!({
            "code": "c",
            "redirect_uri": "https://cb",
            "client_id": "test-client"
        }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 500);
    Ok(())
}

#[tokio::test]
async fn test_token_exchange_resolves_cloud_id() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(token_response())
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/token/accessible-resources"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "cloud-1", "name": "first", "url": "https://first.atlassian.net"},
            {"id": "cloud-2", "name": "second", "url": "https://second.atlassian.net"}
        ])))
        .expect(1)
        .mount(&mock)
        .await;

    let mut config = common::config_for(&mock);
    common::cloud_mode(&mut config, Some("pinned"));
    let proxy = common::TestProxy::start(&config).await?;

    let resp = proxy
        .client
        .post(proxy.url("/token"))
        .json(&serde_json::json!({
            "code": "c",
            "redirect_uri": "https://cb",
            "client_id": "test-client"
        }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["cloud_id"], "cloud-1");
    Ok(())
}

#[tokio::test]
async fn test_token_exchange_without_sites_fails() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(token_response())
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/oauth/token/accessible-resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock)
        .await;

    let mut config = common::config_for(&mock);
    common::cloud_mode(&mut config, None);
    let proxy = common::TestProxy::start(&config).await?;

    let resp = proxy
        .client
        .post(proxy.url("/token"))
        .json(&serde_json::json!({
            "code": "c",
            "redirect_uri": "https://cb",
            "client_id": "test-client"
        }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 500);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["error"], "Failed to get cloud ID");
    Ok(())
}

#[tokio::test]
async fn test_refresh_grant_echoes_refresh_token() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_json(serde_json::json!({
            "grant_type": "refresh_token",
            "client_id": "test-client",
            "client_secret": "test-secret",
            "refresh_token": "refresh-0"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-2",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let proxy = common::TestProxy::start(&common::config_for(&mock)).await?;

    let resp = proxy
        .client
        .post(proxy.url("/token"))
        .json(&serde_json::json!({
            "grant_type": "refresh_token",
            "refresh_token": "refresh-0",
            "client_id": "test-client"
        }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["access_token"], "access-2");
    assert_eq!(body["refresh_token"], "refresh-0");
    Ok(())
}

#[tokio::test]
async fn test_token_requires_client_secret() -> Result<()> {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(token_response())
        .expect(0)
        .mount(&mock)
        .await;

    let mut config = common::config_for(&mock);
    let mut oauth = config.oauth();
    oauth.client_secret = None;
    config.oauth = Some(oauth);
    let proxy = common::TestProxy::start(&config).await?;

    let resp = proxy
        .client
        .post(proxy.url("/token"))
        .json(&serde_json::json!({
            "code": "c",
            "redirect_uri": "https://cb",
            "client_id": "test-client",
            "client_secret": "from-caller"
        }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 500);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["error"], "Server misconfigured: missing oauth.client_secret");
    Ok(())
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token lifecycle and single-flight refresh tests.

use portal_client::error::RefreshError;
use portal_client::TokenManager;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{mount_refresh, mount_slow_refresh, test_client_with, REFRESH_PATH};

const CONCURRENT_CALLERS: usize = 10;

fn manager(server: &MockServer) -> TokenManager {
    TokenManager::new(
        reqwest::Client::new(),
        format!("{}{}", server.uri(), REFRESH_PATH),
        None,
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;
    mount_slow_refresh(&server, "T1", 1, Duration::from_millis(200)).await;

    let tokens = manager(&server);
    let mut handles = vec![];
    for _ in 0..CONCURRENT_CALLERS {
        let tokens = tokens.clone();
        handles.push(tokio::spawn(async move { tokens.ensure_token().await }));
    }

    for handle in handles {
        let token = handle
            .await
            .expect("Task join failed")
            .expect("Refresh should succeed");
        assert_eq!(token.secret(), "T1");
    }

    assert!(tokens.has_token());
    // Mock expectation (exactly one refresh) is verified when the server drops
}

#[tokio::test]
async fn test_cached_token_makes_no_network_call() {
    let server = MockServer::start().await;
    mount_refresh(&server, "T1", 1).await;

    let tokens = manager(&server);
    assert!(!tokens.has_token());

    let first = tokens.ensure_token().await.unwrap();
    let second = tokens.ensure_token().await.unwrap();

    assert_eq!(first.secret(), "T1");
    assert_eq!(second.secret(), "T1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_invalid_refresh_fails_every_waiter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"accessToken": "T1", "valid": false}))
                .set_delay(Duration::from_millis(150)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tokens = manager(&server);
    let mut handles = vec![];
    for _ in 0..CONCURRENT_CALLERS {
        let tokens = tokens.clone();
        handles.push(tokio::spawn(async move { tokens.ensure_token().await }));
    }

    for handle in handles {
        let result = handle.await.expect("Task join failed");
        assert!(matches!(result, Err(RefreshError::Invalid(_))));
    }

    assert!(!tokens.has_token(), "Cache must stay empty after failure");
}

#[tokio::test]
async fn test_empty_token_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"accessToken": "", "valid": true})),
        )
        .mount(&server)
        .await;

    let tokens = manager(&server);
    assert!(tokens.ensure_token().await.is_err());
    assert!(tokens.current_token().is_none());
}

#[tokio::test]
async fn test_refresh_http_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("no session"))
        .mount(&server)
        .await;

    let result = manager(&server).ensure_token().await;
    assert!(matches!(result, Err(RefreshError::Status(401))));
}

#[tokio::test]
async fn test_malformed_refresh_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let result = manager(&server).ensure_token().await;
    assert!(matches!(result, Err(RefreshError::Decode(_))));
}

#[tokio::test]
async fn test_failed_refresh_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "T2", 1).await;

    let tokens = manager(&server);
    assert!(tokens.ensure_token().await.is_err());

    // The pending slot is released, so the next caller starts a new refresh
    let token = tokens.ensure_token().await.unwrap();
    assert_eq!(token.secret(), "T2");
}

#[tokio::test]
async fn test_clear_then_ensure_refreshes_once() {
    let server = MockServer::start().await;
    mount_refresh(&server, "T1", 1).await;
    mount_refresh(&server, "T2", 1).await;

    let tokens = manager(&server);
    assert_eq!(tokens.ensure_token().await.unwrap().secret(), "T1");

    tokens.clear();
    assert!(!tokens.has_token());

    assert_eq!(tokens.ensure_token().await.unwrap().secret(), "T2");
    assert_eq!(tokens.ensure_token().await.unwrap().secret(), "T2");
}

#[tokio::test]
async fn test_force_refresh_replaces_cached_token() {
    let server = MockServer::start().await;
    mount_refresh(&server, "T1", 1).await;
    mount_refresh(&server, "T2", 1).await;

    let tokens = manager(&server);
    assert_eq!(tokens.ensure_token().await.unwrap().secret(), "T1");
    assert_eq!(tokens.force_refresh().await.unwrap().secret(), "T2");
    assert_eq!(tokens.current_token().unwrap().secret(), "T2");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_force_refresh_collapses() {
    let server = MockServer::start().await;
    mount_refresh(&server, "T1", 1).await;
    mount_slow_refresh(&server, "T2", 1, Duration::from_millis(200)).await;

    let tokens = manager(&server);
    tokens.ensure_token().await.unwrap();

    let mut handles = vec![];
    for _ in 0..CONCURRENT_CALLERS {
        let tokens = tokens.clone();
        handles.push(tokio::spawn(async move { tokens.force_refresh().await }));
    }

    for handle in handles {
        let token = handle.await.expect("Task join failed").unwrap();
        assert_eq!(token.secret(), "T2");
    }
}

#[tokio::test]
async fn test_rejected_token_reuses_newer_token() {
    let server = MockServer::start().await;
    mount_refresh(&server, "T1", 1).await;
    mount_refresh(&server, "T2", 1).await;

    let tokens = manager(&server);
    let stale = tokens.ensure_token().await.unwrap();

    // First rejection refreshes, second finds T2 already cached
    let first = tokens.refresh_rejected(&stale).await.unwrap();
    let second = tokens.refresh_rejected(&stale).await.unwrap();

    assert_eq!(first.secret(), "T2");
    assert_eq!(second.secret(), "T2");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropped_caller_does_not_abort_refresh() {
    let server = MockServer::start().await;
    mount_slow_refresh(&server, "T1", 1, Duration::from_millis(300)).await;

    let tokens = manager(&server);

    let abandoned = {
        let tokens = tokens.clone();
        tokio::spawn(async move { tokens.ensure_token().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    abandoned.abort();

    let token = tokens.ensure_token().await.unwrap();
    assert_eq!(token.secret(), "T1");
}

#[tokio::test]
async fn test_clear_does_not_cancel_inflight_refresh() {
    let server = MockServer::start().await;
    mount_slow_refresh(&server, "T1", 1, Duration::from_millis(200)).await;

    let tokens = manager(&server);
    let waiter = {
        let tokens = tokens.clone();
        tokio::spawn(async move { tokens.ensure_token().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    tokens.clear();

    let token = waiter.await.expect("Task join failed").unwrap();
    assert_eq!(token.secret(), "T1");
    assert!(tokens.has_token(), "Refresh in flight repopulates the cache");
}

#[tokio::test]
async fn test_refresh_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(REFRESH_PATH))
        .and(query_param("env", "dev"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::refresh_body("T1")))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client_with(&server, |c| {
        c.with_environment("dev")
            .with_session_cookie("portal_session=abc123")
    });
    let token = client.token_manager().ensure_token().await.unwrap();
    assert_eq!(token.secret(), "T1");
    assert_eq!(token.scope(), Some("read:org"));

    let requests = server.received_requests().await.unwrap();
    let cookie = requests[0]
        .headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(
        cookie.contains("portal_session=abc123"),
        "Session cookie should be sent, got {:?}",
        cookie
    );
}

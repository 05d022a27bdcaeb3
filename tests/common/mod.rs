// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use portal_client::{ClientConfig, PortalClient};
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the refresh endpoint under the default auth base.
#[allow(dead_code)]
pub const REFRESH_PATH: &str = "/api/auth/githubtools/refresh";

/// Successful refresh body carrying `token`.
#[allow(dead_code)]
pub fn refresh_body(token: &str) -> serde_json::Value {
    json!({
        "accessToken": token,
        "valid": true,
        "expiresInSeconds": 3600,
        "tokenType": "Bearer",
        "profile": {"login": "octocat"},
        "scope": "read:org"
    })
}

/// Mount a refresh mock that hands out `token` exactly `times` times.
#[allow(dead_code)]
pub async fn mount_refresh(server: &MockServer, token: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body(token)))
        .up_to_n_times(times)
        .expect(times)
        .mount(server)
        .await;
}

/// Like [`mount_refresh`], but the endpoint answers after `delay`.
#[allow(dead_code)]
pub async fn mount_slow_refresh(server: &MockServer, token: &str, times: u64, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(refresh_body(token))
                .set_delay(delay),
        )
        .up_to_n_times(times)
        .expect(times)
        .mount(server)
        .await;
}

/// Client pointed at the mock server for both API and auth.
#[allow(dead_code)]
pub fn test_client(server: &MockServer) -> PortalClient {
    PortalClient::new(&ClientConfig::new(server.uri())).expect("Failed to build client")
}

/// Client with a custom configuration built on the mock server URL.
#[allow(dead_code)]
pub fn test_client_with(
    server: &MockServer,
    configure: impl FnOnce(ClientConfig) -> ClientConfig,
) -> PortalClient {
    PortalClient::new(&configure(ClientConfig::new(server.uri())))
        .expect("Failed to build client")
}

/// Number of requests the server saw on `request_path`.
#[allow(dead_code)]
pub async fn request_count(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}

/// Raw HTTP server that answers every request with a 500 whose body stalls
/// after the first byte. Returns its base URL.
#[allow(dead_code)]
pub async fn stalled_error_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("No local address");

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 500 Internal Server Error\r\n\
                          Content-Type: application/json\r\n\
                          Content-Length: 100\r\n\r\n{",
                    )
                    .await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });

    format!("http://{}", addr)
}

/// Client whose API calls go to `api_base` and whose refresh goes to the
/// mock server.
#[allow(dead_code)]
pub fn split_client(server: &MockServer, api_base: &str) -> PortalClient {
    let config = ClientConfig::new(api_base)
        .with_auth_base_url(format!("{}/api/auth/githubtools", server.uri()));
    PortalClient::new(&config).expect("Failed to build client")
}

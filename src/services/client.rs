// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated portal API client.
//!
//! Handles:
//! - Bearer token injection on every call
//! - One-shot retry after a forced refresh when the API answers 401
//! - Classification of every failure into [`ApiError`]
//! - Binary downloads under the same authentication contract

use crate::config::ClientConfig;
use crate::error::{parse_details, ApiError, Result};
use crate::models::{AccessToken, BinaryPayload, RequestDescriptor, RequestOptions};
use crate::services::endpoint::{
    binary_default_headers, build_url, compose_headers, json_default_headers,
};
use crate::services::TokenManager;
use anyhow::Context;
use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of one network attempt that did not fail outright.
enum Attempt {
    /// 2xx response; `body` is `None` for 204.
    Completed { status: StatusCode, body: Option<Bytes> },
    /// 401: the token was rejected. On the first attempt `details` is only
    /// logged; the caller sees the details of the retry's 401.
    Unauthorized { details: Option<serde_json::Value> },
}

/// Portal API client.
///
/// Cheap to clone; clones share the HTTP connection pool and token cache.
#[derive(Clone)]
pub struct PortalClient {
    http: reqwest::Client,
    api_base: Arc<str>,
    tokens: TokenManager,
    json_headers: HeaderMap,
    binary_headers: HeaderMap,
}

impl PortalClient {
    /// Build a client from configuration.
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let jar = Arc::new(reqwest::cookie::Jar::default());
        if let Some(cookie) = &config.session_cookie {
            // Seed at each origin root so the cookie's default path is "/"
            let mut origins: Vec<reqwest::Url> = Vec::new();
            for base in [&config.auth_base_url, &config.base_url] {
                let origin = reqwest::Url::parse(base)
                    .and_then(|url| url.join("/"))
                    .with_context(|| format!("invalid base URL {}", base))?;
                if !origins.contains(&origin) {
                    origins.push(origin);
                }
            }
            for origin in &origins {
                jar.add_cookie_str(cookie, origin);
            }
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .cookie_provider(jar)
            .build()
            .context("failed building portal HTTP client")?;

        let tokens = TokenManager::new(
            http.clone(),
            config.refresh_url(),
            config.environment.clone(),
        );

        tracing::info!(
            api_base = %config.api_base_url(),
            refresh_url = %config.refresh_url(),
            timeout_secs = config.timeout.as_secs(),
            "Initialized portal client"
        );

        Ok(Self {
            http,
            api_base: Arc::from(config.api_base_url()),
            tokens,
            json_headers: json_default_headers(),
            binary_headers: binary_default_headers(),
        })
    }

    /// Base of every API URL (`<base>/api/v1`).
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// The token manager backing this client.
    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    // ─── Token Access ────────────────────────────────────────────────────────

    /// Forget the cached token (logout).
    pub fn clear_token(&self) {
        self.tokens.clear();
    }

    pub fn has_token(&self) -> bool {
        self.tokens.has_token()
    }

    /// Cached token string, for diagnostics.
    pub fn get_token(&self) -> Option<String> {
        self.tokens.current_token().map(|t| t.secret().to_string())
    }

    // ─── Verbs ───────────────────────────────────────────────────────────────

    pub async fn get<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T> {
        self.execute(&RequestDescriptor::new(Method::GET, path, options))
            .await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = RequestDescriptor::new(Method::POST, path, options).with_json_body(body)?;
        self.execute(&request).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = RequestDescriptor::new(Method::PUT, path, options).with_json_body(body)?;
        self.execute(&request).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = RequestDescriptor::new(Method::PATCH, path, options).with_json_body(body)?;
        self.execute(&request).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        self.execute(&RequestDescriptor::new(Method::DELETE, path, options))
            .await
    }

    // ─── Request Execution ───────────────────────────────────────────────────

    /// Execute a request and decode its JSON body.
    ///
    /// A 204 (or an empty 2xx body) decodes as JSON `null`, so `()`,
    /// `Option<_>` and `serde_json::Value` all accept it.
    pub async fn execute<T: DeserializeOwned>(&self, request: &RequestDescriptor) -> Result<T> {
        let (status, body) = self.execute_raw(request).await?;

        let decoded = match body {
            Some(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes),
            _ => serde_json::from_value(serde_json::Value::Null),
        };

        decoded.map_err(|e| ApiError::Payload {
            status: Some(status.as_u16()),
            message: format!("failed to decode response body: {}", e),
        })
    }

    /// Run the authentication and retry protocol, returning the final 2xx
    /// status and body.
    async fn execute_raw(
        &self,
        request: &RequestDescriptor,
    ) -> Result<(StatusCode, Option<Bytes>)> {
        let cancel = request.cancel_token();
        let token = cancellable(cancel, async {
            self.tokens
                .ensure_token()
                .await
                .map_err(|e| e.into_required())
        })
        .await?;

        let details = match self.attempt(request, &token).await? {
            Attempt::Completed { status, body } => return Ok((status, body)),
            Attempt::Unauthorized { details } => details,
        };

        tracing::info!(
            method = %request.method(),
            path = %request.path(),
            "Access token rejected, refreshing and retrying once"
        );
        tracing::debug!(details = ?details, "Rejected response body");

        // Cancelling drops only this waiter; the refresh task keeps running
        let refreshed = cancellable(cancel, async {
            self.tokens
                .refresh_rejected(&token)
                .await
                .map_err(|e| e.into_failed_after_refresh())
        })
        .await?;

        match self.attempt(request, &refreshed).await? {
            Attempt::Completed { status, body } => Ok((status, body)),
            Attempt::Unauthorized { details } => {
                tracing::warn!(
                    method = %request.method(),
                    path = %request.path(),
                    "Request rejected again after token refresh"
                );
                Err(ApiError::AuthenticationFailedAfterRefresh { details })
            }
        }
    }

    /// Issue one network call with `token` and classify the response.
    async fn attempt(&self, request: &RequestDescriptor, token: &AccessToken) -> Result<Attempt> {
        let url = build_url(&self.api_base, request.path(), request.params());
        let headers = compose_headers(&self.json_headers, request.headers(), token.bearer_header());

        let mut builder = self
            .http
            .request(request.method().clone(), url.as_str())
            .headers(headers);
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let cancel = request.cancel_token();
        let response = cancellable(cancel, async {
            builder.send().await.map_err(ApiError::from_transport)
        })
        .await?;

        let status = response.status();
        tracing::debug!(
            method = %request.method(),
            url = %url,
            status = status.as_u16(),
            "Portal API response"
        );

        if status == StatusCode::NO_CONTENT {
            return Ok(Attempt::Completed { status, body: None });
        }

        if status.is_success() {
            let body = cancellable(cancel, async {
                response.bytes().await.map_err(ApiError::from_transport)
            })
            .await?;
            return Ok(Attempt::Completed {
                status,
                body: Some(body),
            });
        }

        // Error bodies are best effort, but the read still honours cancellation
        let body = cancellable(cancel, async {
            Ok(response.bytes().await.unwrap_or_default())
        })
        .await?;

        match status {
            StatusCode::UNAUTHORIZED => Ok(Attempt::Unauthorized {
                details: parse_details(&body),
            }),
            StatusCode::BAD_GATEWAY => {
                tracing::warn!(url = %url, "Portal gateway unavailable (502)");
                Err(ApiError::Gateway {
                    details: parse_details(&body),
                })
            }
            _ => {
                let err = ApiError::from_response_body(status, &body);
                if status.is_server_error() {
                    tracing::warn!(url = %url, status = status.as_u16(), error = %err, "Portal API error");
                } else {
                    tracing::debug!(url = %url, status = status.as_u16(), error = %err, "Portal API error");
                }
                Err(err)
            }
        }
    }

    // ─── Binary Fetch ────────────────────────────────────────────────────────

    /// Fetch an opaque byte payload (e.g. an image).
    ///
    /// Single attempt: a 401 is not retried. Callers that need resilience
    /// should warm the token first.
    pub async fn get_binary(&self, path: &str, options: RequestOptions) -> Result<BinaryPayload> {
        let request = RequestDescriptor::new(Method::GET, path, options);
        let cancel = request.cancel_token();
        let token = cancellable(cancel, async {
            self.tokens
                .ensure_token()
                .await
                .map_err(|e| e.into_required())
        })
        .await?;

        let url = build_url(&self.api_base, request.path(), request.params());
        let headers =
            compose_headers(&self.binary_headers, request.headers(), token.bearer_header());
        let builder = self.http.get(url.as_str()).headers(headers);

        let response = cancellable(cancel, async {
            builder.send().await.map_err(ApiError::from_transport)
        })
        .await?;

        let status = response.status();
        tracing::debug!(url = %url, status = status.as_u16(), "Portal binary response");

        if !status.is_success() {
            let body = cancellable(cancel, async {
                Ok(response.bytes().await.unwrap_or_default())
            })
            .await?;
            return Err(match status {
                StatusCode::UNAUTHORIZED => {
                    ApiError::AuthenticationRequired("access token rejected".to_string())
                }
                StatusCode::BAD_GATEWAY => ApiError::Gateway {
                    details: parse_details(&body),
                },
                _ => ApiError::from_response_body(status, &body),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = cancellable(cancel, async {
            response.bytes().await.map_err(ApiError::from_transport)
        })
        .await?;

        Ok(BinaryPayload {
            bytes,
            content_type,
        })
    }
}

/// Race `fut` against the caller's cancellation token.
async fn cancellable<T, F>(cancel: Option<&CancellationToken>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(ApiError::Cancelled),
                result = fut => result,
            }
        }
        None => fut.await,
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access-token lifecycle with single-flight refresh.
//!
//! Handles:
//! - Returning the cached token without I/O
//! - Collapsing concurrent refreshes into one call to the refresh endpoint
//! - Forced refresh after the API rejects a token
//! - Logout (cache clear)

use crate::error::RefreshError;
use crate::models::{AccessToken, RefreshResponse};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::Arc;

/// Refresh operation shared by every caller that arrives while it runs.
type PendingRefresh = Shared<BoxFuture<'static, Result<AccessToken, RefreshError>>>;

#[derive(Default)]
struct TokenState {
    token: Option<AccessToken>,
    pending: Option<PendingRefresh>,
}

struct Inner {
    http: reqwest::Client,
    refresh_url: String,
    environment: Option<String>,
    state: Mutex<TokenState>,
}

/// Owner of the cached access token.
///
/// Cloning is cheap and every clone shares the same cache, so a single
/// manager can be handed to any number of request paths.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

impl TokenManager {
    /// Create a manager that refreshes against `refresh_url`.
    ///
    /// `http` must carry the session cookie store; the refresh call relies
    /// on it for credentials.
    pub fn new(
        http: reqwest::Client,
        refresh_url: impl Into<String>,
        environment: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                refresh_url: refresh_url.into(),
                environment,
                state: Mutex::new(TokenState::default()),
            }),
        }
    }

    /// Return the cached token, or wait for the (single) refresh.
    pub async fn ensure_token(&self) -> Result<AccessToken, RefreshError> {
        let pending = {
            let mut state = self.inner.state.lock();
            if let Some(token) = &state.token {
                return Ok(token.clone());
            }
            self.join_or_start(&mut state)
        };

        pending.await
    }

    /// Discard the cached token and refresh.
    ///
    /// Joins a refresh that is already in flight instead of starting another.
    pub async fn force_refresh(&self) -> Result<AccessToken, RefreshError> {
        let pending = {
            let mut state = self.inner.state.lock();
            state.token = None;
            self.join_or_start(&mut state)
        };

        pending.await
    }

    /// Refresh after the API rejected `rejected`.
    ///
    /// If the cache already holds a different token, another request's
    /// forced refresh won the race and that token is reused as-is.
    pub async fn refresh_rejected(
        &self,
        rejected: &AccessToken,
    ) -> Result<AccessToken, RefreshError> {
        let pending = {
            let mut state = self.inner.state.lock();
            if state.pending.is_none() {
                if let Some(current) = &state.token {
                    if current.secret() != rejected.secret() {
                        tracing::debug!("Token already replaced by a concurrent refresh");
                        return Ok(current.clone());
                    }
                }
            }
            state.token = None;
            self.join_or_start(&mut state)
        };

        pending.await
    }

    /// Drop the cached token (logout). An in-flight refresh is left alone
    /// and may still repopulate the cache.
    pub fn clear(&self) {
        self.inner.state.lock().token = None;
        tracing::debug!("Access token cleared");
    }

    pub fn has_token(&self) -> bool {
        self.inner.state.lock().token.is_some()
    }

    /// Snapshot of the cached token, if any.
    pub fn current_token(&self) -> Option<AccessToken> {
        self.inner.state.lock().token.clone()
    }

    /// Must be called with the state lock held: the ownership decision and
    /// the creation of the pending refresh happen in one critical section.
    fn join_or_start(&self, state: &mut TokenState) -> PendingRefresh {
        if let Some(pending) = &state.pending {
            return pending.clone();
        }

        // Owned by its own task: dropping any waiter leaves the refresh running
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = inner.fetch_token().await;
            inner.settle(&result);
            result
        });

        let inner = Arc::clone(&self.inner);
        let pending = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(error = %e, "Token refresh task failed");
                    inner.settle(&Err(RefreshError::Aborted(e.to_string())));
                    Err(RefreshError::Aborted(e.to_string()))
                }
            }
        }
        .boxed()
        .shared();

        state.pending = Some(pending.clone());
        pending
    }
}

impl Inner {
    /// Call the refresh endpoint and validate its answer.
    async fn fetch_token(&self) -> Result<AccessToken, RefreshError> {
        tracing::debug!(url = %self.refresh_url, "Refreshing access token");

        let mut request = self
            .http
            .get(&self.refresh_url)
            .header("X-Requested-With", "XMLHttpRequest");
        if let Some(environment) = &self.environment {
            request = request.query(&[("env", environment.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let decoded: RefreshResponse =
            serde_json::from_slice(&body).map_err(|e| RefreshError::Decode(e.to_string()))?;

        decoded.into_access_token()
    }

    /// Publish the outcome of a refresh and release the pending slot.
    fn settle(&self, result: &Result<AccessToken, RefreshError>) {
        let mut state = self.state.lock();
        state.pending = None;

        match result {
            Ok(token) => {
                tracing::info!(
                    token_type = %token.token_type(),
                    expires_in_secs = ?token.expires_in_secs(),
                    "Access token refreshed"
                );
                state.token = Some(token.clone());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Access token refresh failed");
                state.token = None;
            }
        }
    }
}

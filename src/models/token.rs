// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use crate::error::RefreshError;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::HeaderValue;
use serde::Deserialize;
use std::fmt;

/// Bearer credential obtained from the refresh endpoint.
///
/// Expiry is a hint only; the client discovers expiry when the API answers
/// 401.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    bearer: HeaderValue,
    token_type: String,
    expires_in_secs: Option<u64>,
    obtained_at: DateTime<Utc>,
    profile: Option<serde_json::Value>,
    scope: Option<String>,
}

impl AccessToken {
    /// The raw token string.
    pub fn secret(&self) -> &str {
        &self.value
    }

    /// Pre-built `Authorization` header value.
    pub fn bearer_header(&self) -> &HeaderValue {
        &self.bearer
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn expires_in_secs(&self) -> Option<u64> {
        self.expires_in_secs
    }

    pub fn obtained_at(&self) -> DateTime<Utc> {
        self.obtained_at
    }

    /// Expected expiry instant, if the endpoint reported a lifetime.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .map(|secs| self.obtained_at + Duration::seconds(secs))
    }

    /// Profile metadata returned alongside the token (read-only).
    pub fn profile(&self) -> Option<&serde_json::Value> {
        self.profile.as_ref()
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in_secs", &self.expires_in_secs)
            .field("obtained_at", &self.obtained_at)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Body of the refresh endpoint response.
///
/// Every field is optional at decode time; [`RefreshResponse::into_access_token`]
/// performs the structural check before anything is trusted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub valid: Option<bool>,
    #[serde(default)]
    pub expires_in_seconds: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub profile: Option<serde_json::Value>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl RefreshResponse {
    /// Validate the response and turn it into a cached token.
    pub fn into_access_token(self) -> Result<AccessToken, RefreshError> {
        if self.valid != Some(true) {
            return Err(RefreshError::Invalid("session is not valid".to_string()));
        }

        let value = self
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| RefreshError::Invalid("missing access token".to_string()))?;

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", value)).map_err(|_| {
            RefreshError::Invalid("access token is not a valid header value".to_string())
        })?;
        bearer.set_sensitive(true);

        Ok(AccessToken {
            value,
            bearer,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_in_secs: self.expires_in_seconds,
            obtained_at: Utc::now(),
            profile: self.profile,
            scope: self.scope,
        })
    }
}

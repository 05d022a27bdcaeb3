// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Classified client errors with a single caller-facing shape.

use reqwest::StatusCode;
use serde::Serialize;

/// Failure of a portal API call.
///
/// Every failure path of the client ends in exactly one of these. All kinds
/// expose the same `status` / `message` / `details` triple, and only the
/// authentication kinds report status 401.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("Authentication failed after token refresh")]
    AuthenticationFailedAfterRefresh {
        details: Option<serde_json::Value>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Bad gateway")]
    Gateway {
        details: Option<serde_json::Value>,
    },

    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Invalid payload: {message}")]
    Payload {
        status: Option<u16>,
        message: String,
    },

    #[error("Request cancelled")]
    Cancelled,
}

/// JSON rendering of an [`ApiError`] for presentation layers.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// HTTP status associated with this failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthenticationRequired(_) => Some(401),
            ApiError::AuthenticationFailedAfterRefresh { .. } => Some(401),
            ApiError::Network(_) => None,
            ApiError::Gateway { .. } => Some(502),
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Payload { status, .. } => *status,
            ApiError::Cancelled => None,
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> String {
        match self {
            ApiError::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Structured payload extracted from the error response body.
    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            ApiError::AuthenticationFailedAfterRefresh { details }
            | ApiError::Gateway { details }
            | ApiError::Http { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Short machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::AuthenticationRequired(_) => "authentication_required",
            ApiError::AuthenticationFailedAfterRefresh { .. } => {
                "authentication_failed_after_refresh"
            }
            ApiError::Network(_) => "network_error",
            ApiError::Gateway { .. } => "gateway_error",
            ApiError::Http { .. } => "http_error",
            ApiError::Payload { .. } => "payload_error",
            ApiError::Cancelled => "cancelled",
        }
    }

    /// Whether the caller should prompt the user to log in again.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ApiError::AuthenticationRequired(_) | ApiError::AuthenticationFailedAfterRefresh { .. }
        )
    }

    /// Uniform body for presentation code.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            status: self.status(),
            error: self.code(),
            message: self.message(),
            details: self.details().cloned(),
        }
    }

    /// Classify a transport-level failure.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network(format!("request timed out: {}", err))
        } else {
            ApiError::Network(err.to_string())
        }
    }

    /// Build an [`ApiError::Http`] from a non-2xx response body.
    ///
    /// Body decoding is best effort: anything that is not a JSON object falls
    /// back to the canonical status text.
    pub(crate) fn from_response_body(status: StatusCode, body: &[u8]) -> Self {
        let details = parse_details(body);
        let message = details
            .as_ref()
            .and_then(|v| {
                v.get("message")
                    .and_then(|m| m.as_str())
                    .or_else(|| v.get("error").and_then(|e| e.as_str()))
            })
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| status_text(status));

        ApiError::Http {
            status: status.as_u16(),
            message,
            details,
        }
    }
}

/// Failure of a token refresh.
///
/// Shared by every caller awaiting the same in-flight refresh, hence `Clone`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh request failed: {0}")]
    Transport(String),

    #[error("refresh endpoint returned HTTP {0}")]
    Status(u16),

    #[error("refresh response could not be decoded: {0}")]
    Decode(String),

    #[error("refresh response rejected: {0}")]
    Invalid(String),

    #[error("refresh task aborted: {0}")]
    Aborted(String),
}

impl RefreshError {
    /// Failure to obtain a token before a request was attempted.
    pub(crate) fn into_required(self) -> ApiError {
        ApiError::AuthenticationRequired(self.to_string())
    }

    /// Failure of the forced refresh that follows a 401.
    pub(crate) fn into_failed_after_refresh(self) -> ApiError {
        ApiError::AuthenticationFailedAfterRefresh {
            details: Some(serde_json::json!({ "cause": self.to_string() })),
        }
    }
}

/// Parse an error body as JSON, tolerating empty or non-JSON bodies.
pub(crate) fn parse_details(body: &[u8]) -> Option<serde_json::Value> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .filter(|v| !v.is_null())
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

/// Result type alias for client calls
pub type Result<T> = std::result::Result<T, ApiError>;

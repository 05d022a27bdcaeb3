// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use crate::error::ApiError;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Ordered query parameters. Entries without a value are kept here but
/// never reach the URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, Option<String>)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.push((key.into(), Some(value.to_string())));
        self
    }

    pub fn param_opt<V: ToString>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.0.push((key.into(), value.map(|v| v.to_string())));
        self
    }

    /// Build from a JSON object: `null` values are dropped, strings are
    /// used verbatim, arrays are comma-joined, everything else is rendered
    /// as JSON text. Non-object values yield no parameters.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };

        Self(
            map.iter()
                .map(|(key, value)| (key.clone(), stringify(value)))
                .collect(),
        )
    }

    /// Parameters that carry a value, in insertion order.
    pub fn present(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v)))
    }

    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

fn stringify(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .filter_map(stringify)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

/// Per-call options shared by every verb.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub params: QueryParams,
    pub headers: HeaderMap,
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params = self.params.param(key, value);
        self
    }

    pub fn param_opt<V: ToString>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.params = self.params.param_opt(key, value);
        self
    }

    pub fn params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Abort the network call when `token` is cancelled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// A fully described API call. Built once; a 401 retry replays it unchanged
/// apart from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    params: QueryParams,
    body: Option<Bytes>,
    headers: HeaderMap,
    cancel: Option<CancellationToken>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            method,
            path: path.into(),
            params: options.params,
            body: None,
            headers: options.headers,
            cancel: options.cancel,
        }
    }

    /// Attach a JSON body, serialized once so every attempt sends the same
    /// bytes.
    pub fn with_json_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let bytes = serde_json::to_vec(body).map_err(|e| ApiError::Payload {
            status: None,
            message: format!("failed to encode request body: {}", e),
        })?;
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn cancel_token(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }
}

/// Opaque bytes returned by the binary fetch path.
#[derive(Debug, Clone)]
pub struct BinaryPayload {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

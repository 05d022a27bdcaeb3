// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! URL and header composition for portal API calls.

use crate::models::QueryParams;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

/// Join `api_base`, `path` and the present query parameters.
///
/// Parameters without a value are skipped; keys and values are
/// percent-encoded and appended in insertion order.
pub fn build_url(api_base: &str, path: &str, params: &QueryParams) -> String {
    let mut url = String::from(api_base.trim_end_matches('/'));
    if !path.starts_with('/') {
        url.push('/');
    }
    url.push_str(path);

    let mut separator = if path.contains('?') { '&' } else { '?' };
    for (key, value) in params.present() {
        url.push(separator);
        url.push_str(&urlencoding::encode(key));
        url.push('=');
        url.push_str(&urlencoding::encode(value));
        separator = '&';
    }

    url
}

/// Headers sent with every JSON call unless the caller overrides them.
pub fn json_default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Headers sent with binary fetches unless the caller overrides them.
pub fn binary_default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers
}

/// Merge defaults, caller headers and the bearer token.
///
/// Precedence is defaults < caller < `Authorization`; a caller-supplied
/// `Authorization` header is always replaced.
pub fn compose_headers(defaults: &HeaderMap, custom: &HeaderMap, bearer: &HeaderValue) -> HeaderMap {
    let mut headers = defaults.clone();

    for name in custom.keys() {
        headers.remove(name);
    }
    for (name, value) in custom {
        headers.append(name.clone(), value.clone());
    }

    headers.insert(AUTHORIZATION, bearer.clone());
    headers
}

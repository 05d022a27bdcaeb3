// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local development.

use std::env;
use std::time::Duration;

/// Path prefix of every domain API call.
pub const API_PREFIX: &str = "/api/v1";

/// Default auth prefix, relative to the base URL.
const DEFAULT_AUTH_PREFIX: &str = "/api/auth/githubtools";

/// Default per-attempt network timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Portal client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Portal origin, e.g. `https://portal.example.com`
    pub base_url: String,
    /// Base of the cookie-authenticated auth endpoints
    pub auth_base_url: String,
    /// Optional environment discriminator sent to the refresh endpoint
    pub environment: Option<String>,
    /// Timeout applied to each individual network attempt
    pub timeout: Duration,
    /// Session cookie (`name=value`) seeded into the cookie store
    pub session_cookie: Option<String>,
}

impl Default for ClientConfig {
    /// Default config for testing only.
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}

impl ClientConfig {
    /// Configuration for `base_url` with default auth base and timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = trim_base(base_url.into());
        Self {
            auth_base_url: format!("{}{}", base_url, DEFAULT_AUTH_PREFIX),
            base_url,
            environment: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_cookie: None,
        }
    }

    pub fn with_auth_base_url(mut self, auth_base_url: impl Into<String>) -> Self {
        self.auth_base_url = trim_base(auth_base_url.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let base_url =
            env::var("PORTAL_BASE_URL").map_err(|_| ConfigError::Missing("PORTAL_BASE_URL"))?;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: "PORTAL_BASE_URL",
                reason: format!("expected an http(s) URL, got {:?}", base_url),
            });
        }

        let mut config = Self::new(base_url);

        if let Ok(auth_base) = env::var("PORTAL_AUTH_BASE_URL") {
            config = config.with_auth_base_url(auth_base);
        }

        config.environment = env::var("PORTAL_ENVIRONMENT")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        if let Ok(raw) = env::var("PORTAL_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "PORTAL_TIMEOUT_SECS",
                reason: format!("not a whole number of seconds: {:?}", raw),
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        config.session_cookie = env::var("PORTAL_SESSION_COOKIE")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(config)
    }

    /// Base of all domain API calls (`<base>/api/v1`).
    pub fn api_base_url(&self) -> String {
        format!("{}{}", self.base_url, API_PREFIX)
    }

    /// Refresh endpoint URL (without the environment query).
    pub fn refresh_url(&self) -> String {
        format!("{}/refresh", self.auth_base_url)
    }
}

fn trim_base(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

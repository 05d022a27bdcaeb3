// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Portal-Client: authenticated API client for the developer portal
//!
//! This crate provides the client every portal view uses to talk to the
//! backend: it keeps a short-lived access token obtained from the
//! cookie-authenticated refresh endpoint, attaches it to each call, and
//! retries once when the token turns out to be expired.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::ClientConfig;
pub use error::{ApiError, ErrorBody};
pub use models::{BinaryPayload, QueryParams, RequestDescriptor, RequestOptions};
pub use services::{PortalClient, TokenManager};

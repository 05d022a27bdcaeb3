// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for tokens and requests.

pub mod request;
pub mod token;

pub use request::{BinaryPayload, QueryParams, RequestDescriptor, RequestOptions};
pub use token::{AccessToken, RefreshResponse};

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - token lifecycle and request execution.

pub mod client;
pub mod endpoint;
pub mod token_manager;

pub use client::PortalClient;
pub use endpoint::{build_url, compose_headers};
pub use token_manager::TokenManager;

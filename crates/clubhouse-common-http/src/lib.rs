// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Clubhouse.
//!
//! - A `reqwest` client builder with a consistent User-Agent
//! - Bounded retry with exponential backoff for idempotent requests

mod client;
mod retry;

pub use client::{builder, new_client_with_timeout, user_agent};
pub use retry::{is_retryable_status, retry, RetryConfig, RetryableError};

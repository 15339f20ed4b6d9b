// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP client construction.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

/// Client builder carrying the Clubhouse User-Agent.
///
/// ```ignore
/// let client = clubhouse_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Build a client with the standard User-Agent and a per-request timeout.
pub fn new_client_with_timeout(timeout: Duration) -> reqwest::Result<Client> {
	builder().timeout(timeout).build()
}

/// `clubhouse/{version}`.
pub fn user_agent() -> String {
	format!("clubhouse/{}", env!("CARGO_PKG_VERSION"))
}

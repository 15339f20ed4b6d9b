// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Homeserver connection settings.

use std::time::Duration;

use clubhouse_common_http::RetryConfig;
use url::Url;

use crate::error::{MatrixError, Result};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Where the homeserver lives and how to talk to it. The admin credential is
/// not part of this struct; it is fetched per call and handed to
/// [`crate::HomeserverClient::new`].
#[derive(Debug, Clone)]
pub struct MatrixConfig {
	homeserver_url: Url,
	server_domain: String,
	/// Retry policy for alias lookups. No other call is retried.
	pub lookup_retry: RetryConfig,
	/// Per-HTTP-request timeout.
	pub request_timeout: Duration,
	/// Upper bound on avatar images fetched for re-upload.
	pub max_avatar_bytes: usize,
	/// Permit avatar sources over plain `http` and on loopback or private
	/// addresses. Local development and tests only.
	pub allow_private_avatar_sources: bool,
}

impl MatrixConfig {
	/// Validate the homeserver URL. Plain `http` is rejected unless
	/// `allow_insecure` is set (local development, in-cluster traffic, tests).
	pub fn new(
		homeserver_url: &str,
		server_domain: impl Into<String>,
		allow_insecure: bool,
	) -> Result<Self> {
		let homeserver_url = Url::parse(homeserver_url).map_err(|e| {
			MatrixError::Config(format!("invalid homeserver URL '{homeserver_url}': {e}"))
		})?;

		match homeserver_url.scheme() {
			"https" => {}
			"http" if allow_insecure => {}
			other => {
				return Err(MatrixError::Config(format!(
					"homeserver URL must use https, got '{other}'"
				)))
			}
		}

		if homeserver_url.host_str().is_none() {
			return Err(MatrixError::Config(
				"homeserver URL must include a host".to_string(),
			));
		}

		let server_domain = server_domain.into();
		if server_domain.trim().is_empty() {
			return Err(MatrixError::Config(
				"server domain must not be empty".to_string(),
			));
		}

		Ok(Self {
			homeserver_url,
			server_domain,
			lookup_retry: RetryConfig::default(),
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			max_avatar_bytes: DEFAULT_MAX_AVATAR_BYTES,
			allow_private_avatar_sources: false,
		})
	}

	pub fn with_lookup_retry(mut self, retry: RetryConfig) -> Self {
		self.lookup_retry = retry;
		self
	}

	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	pub fn with_max_avatar_bytes(mut self, max: usize) -> Self {
		self.max_avatar_bytes = max;
		self
	}

	pub fn with_private_avatar_sources(mut self, allow: bool) -> Self {
		self.allow_private_avatar_sources = allow;
		self
	}

	pub fn homeserver_url(&self) -> &Url {
		&self.homeserver_url
	}

	/// Homeserver URL without a trailing slash, ready for path joining.
	pub(crate) fn base_url(&self) -> &str {
		self.homeserver_url.as_str().trim_end_matches('/')
	}

	pub fn server_domain(&self) -> &str {
		&self.server_domain
	}
}

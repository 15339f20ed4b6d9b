// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Matrix homeserver configuration section.
//!
//! The admin access token is deliberately not part of this section. It is
//! read from `CLUBHOUSE_SERVER_MATRIX_ADMIN_TOKEN` (or `_FILE`) by the
//! credential store whenever it needs a fresh value.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LOOKUP_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_CREDENTIAL_CACHE_TTL_SECS: u64 = 300;

/// Resolved homeserver settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSettings {
	pub homeserver_url: Url,
	pub server_domain: String,
	pub allow_insecure: bool,
	pub allow_private_avatar_sources: bool,
	pub request_timeout: Duration,
	pub operation_timeout: Duration,
	pub lookup_max_attempts: u32,
	pub max_avatar_bytes: usize,
	pub credential_cache_ttl: Duration,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatrixSettingsLayer {
	#[serde(default)]
	pub homeserver_url: Option<String>,
	#[serde(default)]
	pub server_domain: Option<String>,
	#[serde(default)]
	pub allow_insecure: Option<bool>,
	#[serde(default)]
	pub allow_private_avatar_sources: Option<bool>,
	#[serde(default)]
	pub request_timeout_secs: Option<u64>,
	#[serde(default)]
	pub operation_timeout_secs: Option<u64>,
	#[serde(default)]
	pub lookup_max_attempts: Option<u32>,
	#[serde(default)]
	pub max_avatar_bytes: Option<usize>,
	#[serde(default)]
	pub credential_cache_ttl_secs: Option<u64>,
}

impl MatrixSettingsLayer {
	pub fn merge(&mut self, other: MatrixSettingsLayer) {
		if other.homeserver_url.is_some() {
			self.homeserver_url = other.homeserver_url;
		}
		if other.server_domain.is_some() {
			self.server_domain = other.server_domain;
		}
		if other.allow_insecure.is_some() {
			self.allow_insecure = other.allow_insecure;
		}
		if other.allow_private_avatar_sources.is_some() {
			self.allow_private_avatar_sources = other.allow_private_avatar_sources;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
		if other.operation_timeout_secs.is_some() {
			self.operation_timeout_secs = other.operation_timeout_secs;
		}
		if other.lookup_max_attempts.is_some() {
			self.lookup_max_attempts = other.lookup_max_attempts;
		}
		if other.max_avatar_bytes.is_some() {
			self.max_avatar_bytes = other.max_avatar_bytes;
		}
		if other.credential_cache_ttl_secs.is_some() {
			self.credential_cache_ttl_secs = other.credential_cache_ttl_secs;
		}
	}

	pub fn finalize(self) -> Result<MatrixSettings, ConfigError> {
		let raw_url = self
			.homeserver_url
			.filter(|s| !s.trim().is_empty())
			.ok_or_else(|| ConfigError::Missing("matrix.homeserver_url".to_string()))?;
		let server_domain = self
			.server_domain
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.ok_or_else(|| ConfigError::Missing("matrix.server_domain".to_string()))?;
		let allow_insecure = self.allow_insecure.unwrap_or(false);

		let homeserver_url = Url::parse(&raw_url).map_err(|e| ConfigError::InvalidValue {
			key: "matrix.homeserver_url".to_string(),
			message: e.to_string(),
		})?;
		match homeserver_url.scheme() {
			"https" => {}
			"http" if allow_insecure => {}
			"http" => {
				return Err(ConfigError::Validation(
					"matrix.homeserver_url must use https unless matrix.allow_insecure is set"
						.to_string(),
				))
			}
			other => {
				return Err(ConfigError::InvalidValue {
					key: "matrix.homeserver_url".to_string(),
					message: format!("unsupported scheme '{other}'"),
				})
			}
		}

		let lookup_max_attempts = self.lookup_max_attempts.unwrap_or(DEFAULT_LOOKUP_MAX_ATTEMPTS);
		if lookup_max_attempts == 0 {
			return Err(ConfigError::InvalidValue {
				key: "matrix.lookup_max_attempts".to_string(),
				message: "must be at least 1".to_string(),
			});
		}

		Ok(MatrixSettings {
			homeserver_url,
			server_domain,
			allow_insecure,
			allow_private_avatar_sources: self.allow_private_avatar_sources.unwrap_or(false),
			request_timeout: Duration::from_secs(
				self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
			),
			operation_timeout: Duration::from_secs(
				self.operation_timeout_secs
					.unwrap_or(DEFAULT_OPERATION_TIMEOUT_SECS),
			),
			lookup_max_attempts,
			max_avatar_bytes: self.max_avatar_bytes.unwrap_or(DEFAULT_MAX_AVATAR_BYTES),
			credential_cache_ttl: Duration::from_secs(
				self.credential_cache_ttl_secs
					.unwrap_or(DEFAULT_CREDENTIAL_CACHE_TTL_SECS),
			),
		})
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Identity provider configuration section.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct IdentityConfig {
	/// OpenID Connect `userinfo` endpoint used to verify caller tokens.
	pub userinfo_url: Url,
	pub request_timeout: Duration,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfigLayer {
	#[serde(default)]
	pub userinfo_url: Option<String>,
	#[serde(default)]
	pub request_timeout_secs: Option<u64>,
}

impl IdentityConfigLayer {
	pub fn merge(&mut self, other: IdentityConfigLayer) {
		if other.userinfo_url.is_some() {
			self.userinfo_url = other.userinfo_url;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
	}

	pub fn finalize(self) -> Result<IdentityConfig, ConfigError> {
		let raw = self
			.userinfo_url
			.filter(|s| !s.trim().is_empty())
			.ok_or_else(|| ConfigError::Missing("identity.userinfo_url".to_string()))?;
		let userinfo_url = Url::parse(&raw).map_err(|e| ConfigError::InvalidValue {
			key: "identity.userinfo_url".to_string(),
			message: e.to_string(),
		})?;

		Ok(IdentityConfig {
			userinfo_url,
			request_timeout: Duration::from_secs(
				self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
			),
		})
	}
}

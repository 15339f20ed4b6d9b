// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Caller authentication against the identity provider.

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

/// The authenticated application user making the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
	pub uid: String,
	pub display_name: Option<String>,
	pub photo_url: Option<String>,
	pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityProviderError {
	/// The token is missing, expired or unknown to the provider.
	#[error("unauthenticated: {0}")]
	Unauthenticated(String),

	/// The provider could not be asked.
	#[error("identity provider unavailable: {0}")]
	Unavailable(String),
}

/// Verifies a caller's bearer token and returns who they are.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
	async fn authenticate(&self, bearer_token: &str) -> Result<CallerIdentity, IdentityProviderError>;
}

/// Extract the token from an `Authorization: Bearer ...` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
	headers
		.get(AUTHORIZATION)
		.and_then(|h| h.to_str().ok())
		.and_then(|v| v.strip_prefix("Bearer "))
		.map(str::trim)
		.filter(|t| !t.is_empty())
}

/// OpenID Connect `userinfo` response.
#[derive(Debug, Deserialize)]
struct UserInfo {
	sub: Option<String>,
	name: Option<String>,
	picture: Option<String>,
	email: Option<String>,
}

/// Authenticates callers by presenting their token to an OpenID Connect
/// `userinfo` endpoint.
#[derive(Debug, Clone)]
pub struct UserinfoIdentityProvider {
	http: Client,
	userinfo_url: Url,
}

impl UserinfoIdentityProvider {
	pub fn new(http: Client, userinfo_url: Url) -> Self {
		Self { http, userinfo_url }
	}
}

#[async_trait]
impl IdentityProvider for UserinfoIdentityProvider {
	#[instrument(skip(self, bearer_token), name = "UserinfoIdentityProvider::authenticate")]
	async fn authenticate(&self, bearer_token: &str) -> Result<CallerIdentity, IdentityProviderError> {
		let response = self
			.http
			.get(self.userinfo_url.clone())
			.bearer_auth(bearer_token)
			.send()
			.await
			.map_err(|e| {
				warn!(error = %e, "userinfo request failed");
				IdentityProviderError::Unavailable(e.to_string())
			})?;

		let status = response.status();
		if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
			debug!(status = status.as_u16(), "token rejected by identity provider");
			return Err(IdentityProviderError::Unauthenticated(format!(
				"identity provider returned {}",
				status.as_u16()
			)));
		}
		if !status.is_success() {
			warn!(status = status.as_u16(), "userinfo endpoint returned an error");
			return Err(IdentityProviderError::Unavailable(format!(
				"userinfo returned HTTP {}",
				status.as_u16()
			)));
		}

		let info: UserInfo = response
			.json()
			.await
			.map_err(|e| IdentityProviderError::Unavailable(format!("invalid userinfo response: {e}")))?;

		let uid = info
			.sub
			.filter(|s| !s.trim().is_empty())
			.ok_or_else(|| IdentityProviderError::Unavailable("userinfo response has no subject".to_string()))?;

		debug!(%uid, "caller authenticated");
		Ok(CallerIdentity {
			uid,
			display_name: info.name,
			photo_url: info.picture,
			email: info.email,
		})
	}
}

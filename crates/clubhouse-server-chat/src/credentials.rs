// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Sources for the homeserver admin credential.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clubhouse_common_config::{require_secret_env, RequiredSecretError, SecretString};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

/// Default variable holding the admin token (`_FILE` variant supported).
pub const ADMIN_TOKEN_ENV: &str = "CLUBHOUSE_SERVER_MATRIX_ADMIN_TOKEN";

#[derive(Debug, Error)]
pub enum CredentialError {
	#[error("admin credential is not configured: {0}")]
	Missing(String),

	#[error("admin credential could not be loaded: {0}")]
	Unavailable(String),
}

impl From<RequiredSecretError> for CredentialError {
	fn from(e: RequiredSecretError) -> Self {
		match e {
			RequiredSecretError::Missing { .. } => CredentialError::Missing(e.to_string()),
			RequiredSecretError::Load(inner) => CredentialError::Unavailable(inner.to_string()),
		}
	}
}

/// Supplies the administrative Matrix access token.
#[async_trait]
pub trait CredentialStore: Send + Sync {
	async fn admin_token(&self) -> Result<SecretString, CredentialError>;

	/// Forget any cached value so the next call refetches. Called when the
	/// homeserver rejects the credential.
	async fn invalidate(&self) {}
}

/// Reads the token from `{var}_FILE` or `{var}` on every call, so a rotated
/// secret file is picked up without a restart.
#[derive(Debug, Clone)]
pub struct EnvCredentialStore {
	var: String,
}

impl EnvCredentialStore {
	pub fn new(var: impl Into<String>) -> Self {
		Self { var: var.into() }
	}
}

impl Default for EnvCredentialStore {
	fn default() -> Self {
		Self::new(ADMIN_TOKEN_ENV)
	}
}

#[async_trait]
impl CredentialStore for EnvCredentialStore {
	async fn admin_token(&self) -> Result<SecretString, CredentialError> {
		let token = require_secret_env(&self.var)?;
		if token.is_blank() {
			return Err(CredentialError::Missing(format!("{} is empty", self.var)));
		}
		Ok(token)
	}
}

struct CachedToken {
	token: SecretString,
	fetched_at: Instant,
}

/// Caches another store's token for `ttl`.
pub struct CachedCredentialStore<S> {
	inner: S,
	ttl: Duration,
	cached: Arc<RwLock<Option<CachedToken>>>,
}

impl<S> CachedCredentialStore<S> {
	pub fn new(inner: S, ttl: Duration) -> Self {
		Self {
			inner,
			ttl,
			cached: Arc::new(RwLock::new(None)),
		}
	}
}

impl<S> std::fmt::Debug for CachedCredentialStore<S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CachedCredentialStore")
			.field("ttl", &self.ttl)
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl<S: CredentialStore> CredentialStore for CachedCredentialStore<S> {
	async fn admin_token(&self) -> Result<SecretString, CredentialError> {
		{
			let cached = self.cached.read().await;
			if let Some(ref entry) = *cached {
				if entry.fetched_at.elapsed() < self.ttl {
					return Ok(entry.token.clone());
				}
			}
		}

		let token = self.inner.admin_token().await?;
		debug!(ttl_secs = self.ttl.as_secs(), "admin credential refreshed");

		let mut cached = self.cached.write().await;
		*cached = Some(CachedToken {
			token: token.clone(),
			fetched_at: Instant::now(),
		});
		Ok(token)
	}

	async fn invalidate(&self) {
		let mut cached = self.cached.write().await;
		if cached.take().is_some() {
			info!("cached admin credential invalidated");
		}
		drop(cached);
		self.inner.invalidate().await;
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Wiring for the Clubhouse chat provisioning server.

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use clubhouse_matrix::{MatrixConfig, RetryConfig};
use clubhouse_server_chat::{
	chat_routes, CachedCredentialStore, CredentialStore, EnvCredentialStore, IdentityProvider,
	ProvisioningGateway, UserinfoIdentityProvider,
};
use clubhouse_server_config::ServerConfig;
use tower_http::trace::TraceLayer;

/// Translate loaded settings into the Matrix client configuration.
pub fn matrix_config(config: &ServerConfig) -> anyhow::Result<MatrixConfig> {
	let settings = &config.matrix;
	let matrix = MatrixConfig::new(
		settings.homeserver_url.as_str(),
		settings.server_domain.clone(),
		settings.allow_insecure,
	)?
	.with_lookup_retry(RetryConfig {
		max_attempts: settings.lookup_max_attempts,
		..RetryConfig::default()
	})
	.with_request_timeout(settings.request_timeout)
	.with_max_avatar_bytes(settings.max_avatar_bytes)
	.with_private_avatar_sources(settings.allow_private_avatar_sources);
	Ok(matrix)
}

/// Build the gateway with the userinfo identity provider and the cached
/// environment credential store.
pub fn build_gateway(config: &ServerConfig) -> anyhow::Result<ProvisioningGateway> {
	let identity_http =
		clubhouse_common_http::new_client_with_timeout(config.identity.request_timeout)?;
	let identity_provider: Arc<dyn IdentityProvider> = Arc::new(UserinfoIdentityProvider::new(
		identity_http,
		config.identity.userinfo_url.clone(),
	));
	let credentials: Arc<dyn CredentialStore> = Arc::new(CachedCredentialStore::new(
		EnvCredentialStore::default(),
		config.matrix.credential_cache_ttl,
	));

	let gateway = ProvisioningGateway::new(identity_provider, credentials, matrix_config(config)?)?
		.with_operation_timeout(config.matrix.operation_timeout);
	Ok(gateway)
}

pub fn create_router(gateway: Arc<ProvisioningGateway>) -> Router {
	Router::new()
		.route("/health", get(health))
		.merge(chat_routes(gateway))
		.layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
	Json(serde_json::json!({ "status": "ok" }))
}

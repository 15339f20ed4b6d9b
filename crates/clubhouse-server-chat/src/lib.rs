// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The externally callable side of chat provisioning: caller
//! authentication, admin credential retrieval, input validation, error
//! mapping and the axum routes in front of it.

pub mod auth;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod request;
pub mod routes;

pub use auth::{bearer_token, CallerIdentity, IdentityProvider, IdentityProviderError, UserinfoIdentityProvider};
pub use credentials::{
	CachedCredentialStore, CredentialError, CredentialStore, EnvCredentialStore, ADMIN_TOKEN_ENV,
};
pub use error::{ChatApiError, ErrorBody};
pub use gateway::ProvisioningGateway;
pub use request::{GroupRoomRequest, ProfileSyncRequest, ProvisionedIdentity};
pub use routes::chat_routes;

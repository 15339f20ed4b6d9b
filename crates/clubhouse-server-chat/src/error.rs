// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use clubhouse_matrix::MatrixError;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::auth::IdentityProviderError;
use crate::credentials::CredentialError;

/// Caller-facing error taxonomy. Each variant has a stable [`code`].
///
/// [`code`]: ChatApiError::code
#[derive(Debug, thiserror::Error)]
pub enum ChatApiError {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	#[error("unauthenticated: {0}")]
	Unauthenticated(String),
	#[error("identity provider unavailable: {0}")]
	IdentityProviderUnavailable(String),
	#[error("admin credential unavailable: {0}")]
	CredentialUnavailable(String),
	#[error("room provisioning failed: {0}")]
	RoomProvisioningFailed(String),
	#[error("room creation failed: {0}")]
	RoomCreationFailed(String),
	#[error("profile sync failed: {0}")]
	ProfileSyncFailed(String),
	#[error("homeserver rejected the admin credential: {0}")]
	HomeserverUnauthorized(String),
	#[error("request cancelled")]
	Cancelled,
	#[error("request deadline exceeded")]
	DeadlineExceeded,
	#[error("internal error: {0}")]
	Internal(String),
}

/// `{"error": {"code": ..., "message": ...}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
	pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
	pub code: String,
	pub message: String,
}

impl ChatApiError {
	pub fn code(&self) -> &'static str {
		match self {
			ChatApiError::InvalidArgument(_) => "invalid_argument",
			ChatApiError::Unauthenticated(_) => "unauthenticated",
			ChatApiError::IdentityProviderUnavailable(_) => "identity_provider_unavailable",
			ChatApiError::CredentialUnavailable(_) => "credential_unavailable",
			ChatApiError::RoomProvisioningFailed(_) => "room_provisioning_failed",
			ChatApiError::RoomCreationFailed(_) => "room_creation_failed",
			ChatApiError::ProfileSyncFailed(_) => "profile_sync_failed",
			ChatApiError::HomeserverUnauthorized(_) => "homeserver_unauthorized",
			ChatApiError::Cancelled => "cancelled",
			ChatApiError::DeadlineExceeded => "deadline_exceeded",
			ChatApiError::Internal(_) => "internal",
		}
	}

	pub fn status(&self) -> StatusCode {
		match self {
			ChatApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
			ChatApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
			ChatApiError::RoomProvisioningFailed(_)
			| ChatApiError::RoomCreationFailed(_)
			| ChatApiError::ProfileSyncFailed(_)
			| ChatApiError::HomeserverUnauthorized(_) => StatusCode::BAD_GATEWAY,
			ChatApiError::IdentityProviderUnavailable(_)
			| ChatApiError::CredentialUnavailable(_)
			| ChatApiError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
			ChatApiError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
			ChatApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Message returned to the caller. Upstream detail is only echoed for
	/// input errors and room creation failures.
	fn public_message(&self) -> String {
		match self {
			ChatApiError::InvalidArgument(msg) => msg.clone(),
			ChatApiError::Unauthenticated(_) => "Authentication required".to_string(),
			ChatApiError::IdentityProviderUnavailable(_) => {
				"The identity provider is unavailable, try again later".to_string()
			}
			ChatApiError::CredentialUnavailable(_) => {
				"Chat provisioning is not configured".to_string()
			}
			ChatApiError::RoomProvisioningFailed(_) => {
				"Could not look up the group room on the chat server".to_string()
			}
			ChatApiError::RoomCreationFailed(detail) => {
				format!("The chat server refused to create the room: {detail}")
			}
			ChatApiError::ProfileSyncFailed(_) => "The chat server could not be reached".to_string(),
			ChatApiError::HomeserverUnauthorized(_) => {
				"The chat server rejected the provisioning credential".to_string()
			}
			ChatApiError::Cancelled => "Request cancelled".to_string(),
			ChatApiError::DeadlineExceeded => "Request timed out".to_string(),
			ChatApiError::Internal(_) => "Internal error".to_string(),
		}
	}
}

impl From<MatrixError> for ChatApiError {
	fn from(e: MatrixError) -> Self {
		match e {
			MatrixError::InvalidArgument(msg) => ChatApiError::InvalidArgument(msg),
			MatrixError::DirectoryLookupFailed { .. } => ChatApiError::RoomProvisioningFailed(e.to_string()),
			MatrixError::RoomCreationFailed { detail, .. } => ChatApiError::RoomCreationFailed(detail),
			MatrixError::ProfileSyncFailed(detail) => ChatApiError::ProfileSyncFailed(detail),
			MatrixError::Unauthorized(detail) => ChatApiError::HomeserverUnauthorized(detail),
			MatrixError::Cancelled => ChatApiError::Cancelled,
			MatrixError::DeadlineExceeded => ChatApiError::DeadlineExceeded,
			other => ChatApiError::Internal(other.to_string()),
		}
	}
}

impl From<CredentialError> for ChatApiError {
	fn from(e: CredentialError) -> Self {
		ChatApiError::CredentialUnavailable(e.to_string())
	}
}

impl From<IdentityProviderError> for ChatApiError {
	fn from(e: IdentityProviderError) -> Self {
		match e {
			IdentityProviderError::Unauthenticated(msg) => ChatApiError::Unauthenticated(msg),
			IdentityProviderError::Unavailable(msg) => ChatApiError::IdentityProviderUnavailable(msg),
		}
	}
}

impl IntoResponse for ChatApiError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status.is_server_error() {
			error!(code = self.code(), error = %self, "chat request failed");
		} else {
			warn!(code = self.code(), error = %self, "chat request rejected");
		}

		let body = ErrorBody {
			error: ErrorDetail {
				code: self.code().to_string(),
				message: self.public_message(),
			},
		};
		(status, Json(body)).into_response()
	}
}

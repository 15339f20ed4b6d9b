// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Error types for Matrix provisioning.

use clubhouse_common_http::{is_retryable_status, RetryableError};
use thiserror::Error;

/// Errors raised while talking to the homeserver.
///
/// Per-target invite failures are not errors; they are reported as
/// [`crate::InviteStatus::Failed`] outcomes. A partially applied profile sync
/// is likewise reported through [`crate::ProfileSyncResult`].
#[derive(Debug, Error)]
pub enum MatrixError {
	/// A required identifier was empty; raised before any network call.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("configuration error: {0}")]
	Config(String),

	/// Alias lookup failed for a reason other than "not found".
	#[error("room directory lookup failed: {detail}")]
	DirectoryLookupFailed { status: Option<u16>, detail: String },

	/// `createRoom` returned a non-success status. `detail` carries the raw
	/// homeserver body.
	#[error("room creation failed: {detail}")]
	RoomCreationFailed { status: Option<u16>, detail: String },

	/// No profile update could reach the homeserver.
	#[error("profile sync failed: {0}")]
	ProfileSyncFailed(String),

	/// The homeserver rejected the admin credential.
	#[error("homeserver rejected credential: {0}")]
	Unauthorized(String),

	/// Non-success response from the homeserver, before classification.
	/// `message` is a log-safe summary; `body` is the response body as sent.
	#[error("homeserver returned {status}: {message}")]
	Api {
		status: u16,
		errcode: Option<String>,
		message: String,
		body: String,
	},

	/// The avatar image could not be fetched from its source URL.
	#[error("avatar source fetch failed: {0}")]
	AvatarSource(String),

	#[error("invalid response from homeserver: {0}")]
	InvalidResponse(String),

	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("request cancelled")]
	Cancelled,

	#[error("request deadline exceeded")]
	DeadlineExceeded,
}

pub type Result<T> = std::result::Result<T, MatrixError>;

impl MatrixError {
	#[cfg(test)]
	pub(crate) fn api(status: u16, errcode: Option<String>, message: impl Into<String>) -> Self {
		Self::Api {
			status,
			errcode,
			message: message.into(),
			body: String::new(),
		}
	}

	/// HTTP status attached to this error, if the homeserver answered.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Api { status, .. } => Some(*status),
			Self::DirectoryLookupFailed { status, .. } | Self::RoomCreationFailed { status, .. } => {
				*status
			}
			Self::Unauthorized(_) => Some(401),
			Self::Http(e) => e.status().map(|s| s.as_u16()),
			_ => None,
		}
	}

	/// True when the homeserver could not be reached at all.
	pub fn is_unreachable(&self) -> bool {
		matches!(self, Self::Http(e) if e.is_connect() || e.is_timeout())
	}

	/// Cancellation and deadline expiry end the whole operation.
	pub fn is_interrupted(&self) -> bool {
		matches!(self, Self::Cancelled | Self::DeadlineExceeded)
	}
}

impl RetryableError for MatrixError {
	fn is_retryable(&self) -> bool {
		match self {
			Self::Http(e) => e.is_retryable(),
			Self::Api { status, .. } => is_retryable_status(*status),
			_ => false,
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Gateway request and response bodies.

use clubhouse_matrix::{ExternalIdentity, ProfileSyncResult};
use serde::{Deserialize, Serialize};

use crate::error::ChatApiError;

/// Provision (or reuse) the chat room for a group.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupRoomRequest {
	pub group_id: String,
	pub group_name: String,
	#[serde(default)]
	pub topic: Option<String>,
	/// Clubhouse uids; mapped to Matrix user ids by the gateway.
	#[serde(default)]
	pub member_uids: Vec<String>,
}

impl GroupRoomRequest {
	pub fn validate(&self) -> Result<(), ChatApiError> {
		if self.group_id.trim().is_empty() {
			return Err(ChatApiError::InvalidArgument(
				"group_id must not be empty".to_string(),
			));
		}
		if self.group_name.trim().is_empty() {
			return Err(ChatApiError::InvalidArgument(
				"group_name must not be empty".to_string(),
			));
		}
		if let Some(index) = self.member_uids.iter().position(|uid| uid.trim().is_empty()) {
			return Err(ChatApiError::InvalidArgument(format!(
				"member_uids[{index}] must not be empty"
			)));
		}
		Ok(())
	}

	/// The topic to send, falling back to the group name when absent or blank.
	pub fn effective_topic(&self) -> &str {
		self.topic
			.as_deref()
			.filter(|t| !t.trim().is_empty())
			.unwrap_or(&self.group_name)
	}
}

/// Optional display name override. A missing or blank name falls back to
/// the caller's identity-provider attributes. The avatar always comes from
/// the identity provider's photo URL, so unknown fields such as
/// `avatar_url` are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileSyncRequest {
	#[serde(default)]
	pub display_name: Option<String>,
}

impl ProfileSyncRequest {
	/// The override, if it carries a non-blank name.
	pub fn display_name_override(&self) -> Option<&str> {
		self.display_name
			.as_deref()
			.map(str::trim)
			.filter(|name| !name.is_empty())
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedIdentity {
	pub identity: ExternalIdentity,
	pub profile: ProfileSyncResult,
}

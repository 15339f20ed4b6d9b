// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Request-scoped results returned by the provisioning components.

use serde::{Deserialize, Serialize};

use crate::identity::RoomAlias;

/// Outcome of an alias lookup. Transport and server failures are errors,
/// not a variant, so "absent" can never be confused with "lookup failed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasResolution {
	Resolved { room_id: String },
	NotFound,
}

/// Result of [`crate::RoomProvisioner::ensure_group_room`].
#[derive(Debug, Clone, Serialize)]
pub struct RoomDescriptor {
	pub room_id: String,
	pub alias: RoomAlias,
	/// True iff this call created the room.
	pub created: bool,
	/// Invite outcomes from the reuse path. Empty when the room was created,
	/// since invites are part of the `createRoom` call.
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub invites: Vec<MembershipInviteOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
	Invited,
	AlreadyMember,
	Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipInviteOutcome {
	pub external_id: String,
	pub status: InviteStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub detail: Option<String>,
}

impl MembershipInviteOutcome {
	pub(crate) fn new(external_id: &str, status: InviteStatus, detail: Option<String>) -> Self {
		Self {
			external_id: external_id.to_string(),
			status,
			detail,
		}
	}
}

/// Result of [`crate::ProfileSynchronizer::sync_profile`]. A step that was
/// requested but did not apply leaves its flag `false` and records why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileSyncResult {
	pub display_name_updated: bool,
	pub avatar_updated: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub avatar_content_uri: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub display_name_error: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub avatar_error: Option<String>,
}

impl ProfileSyncResult {
	/// True when at least one requested step failed.
	pub fn is_partial(&self) -> bool {
		self.display_name_error.is_some() || self.avatar_error.is_some()
	}
}

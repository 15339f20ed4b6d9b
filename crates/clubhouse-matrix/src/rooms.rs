// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Idempotent group room provisioning.

use tracing::{info, instrument};

use crate::context::RequestContext;
use crate::directory::{CreateRoomParams, RoomDirectoryClient};
use crate::error::{MatrixError, Result};
use crate::identity::IdentityMapper;
use crate::invite::MembershipInviter;
use crate::types::{AliasResolution, RoomDescriptor};

/// What a group room should look like.
#[derive(Debug, Clone)]
pub struct GroupRoomParams {
	pub group_id: String,
	pub group_name: String,
	/// Defaults to `group_name`.
	pub topic: Option<String>,
	pub creator_external_id: String,
	/// Matrix user ids. Passed through as given, duplicates included.
	pub member_external_ids: Vec<String>,
}

/// Reuses the room behind `#group_{id}` when it exists and creates it
/// otherwise.
#[derive(Debug, Clone)]
pub struct RoomProvisioner {
	mapper: IdentityMapper,
	directory: RoomDirectoryClient,
	inviter: MembershipInviter,
}

impl RoomProvisioner {
	pub fn new(
		mapper: IdentityMapper,
		directory: RoomDirectoryClient,
		inviter: MembershipInviter,
	) -> Self {
		Self {
			mapper,
			directory,
			inviter,
		}
	}

	/// Resolve the group's alias first and only then decide between the
	/// reuse path (invite members) and the create path (`createRoom` with the
	/// members on the invite list). A lookup failure is returned as is and
	/// never treated as absence.
	#[instrument(
		skip(self, params, ctx),
		fields(group_id = %params.group_id, members = params.member_external_ids.len())
	)]
	pub async fn ensure_group_room(
		&self,
		params: &GroupRoomParams,
		ctx: &RequestContext,
	) -> Result<RoomDescriptor> {
		if params.group_name.trim().is_empty() {
			return Err(MatrixError::InvalidArgument(
				"group name must not be empty".to_string(),
			));
		}
		if params.creator_external_id.trim().is_empty() {
			return Err(MatrixError::InvalidArgument(
				"creator must not be empty".to_string(),
			));
		}
		let alias = self.mapper.alias(&params.group_id)?;

		match self.directory.resolve_alias(&alias, ctx).await? {
			AliasResolution::Resolved { room_id } => {
				let invites = self
					.inviter
					.invite_all(&room_id, &params.member_external_ids, ctx)
					.await;
				info!(%room_id, %alias, "reusing existing group room");
				Ok(RoomDescriptor {
					room_id,
					alias,
					created: false,
					invites,
				})
			}
			AliasResolution::NotFound => {
				let create = CreateRoomParams {
					name: params.group_name.clone(),
					room_alias_name: alias.localpart().to_string(),
					topic: params
						.topic
						.clone()
						.unwrap_or_else(|| params.group_name.clone()),
					creator: params.creator_external_id.clone(),
					invite: params.member_external_ids.clone(),
				};
				let room_id = self.directory.create_room(&create, ctx).await?;
				info!(%room_id, %alias, "created group room");
				Ok(RoomDescriptor {
					room_id,
					alias,
					created: true,
					invites: Vec::new(),
				})
			}
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Room directory: alias resolution and room creation.

use std::collections::BTreeMap;

use clubhouse_common_http::{retry, RetryConfig};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::context::RequestContext;
use crate::error::{MatrixError, Result};
use crate::identity::RoomAlias;
use crate::transport::{segment, HomeserverClient, CLIENT_API};
use crate::types::AliasResolution;

const NOT_FOUND_ERRCODE: &str = "M_NOT_FOUND";
const CREATOR_POWER_LEVEL: i64 = 100;

/// Inputs for `createRoom`.
#[derive(Debug, Clone)]
pub struct CreateRoomParams {
	pub name: String,
	/// Localpart only, e.g. `group_g1`.
	pub room_alias_name: String,
	pub topic: String,
	/// Matrix user id granted power level 100.
	pub creator: String,
	pub invite: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CreateRoomBody<'a> {
	name: &'a str,
	room_alias_name: &'a str,
	topic: &'a str,
	preset: &'static str,
	visibility: &'static str,
	invite: &'a [String],
	initial_state: Vec<StateEvent>,
	power_level_content_override: PowerLevelOverride<'a>,
}

#[derive(Debug, Serialize)]
struct StateEvent {
	#[serde(rename = "type")]
	event_type: &'static str,
	content: Value,
}

#[derive(Debug, Serialize)]
struct PowerLevelOverride<'a> {
	users: BTreeMap<&'a str, i64>,
}

impl<'a> CreateRoomBody<'a> {
	fn from_params(params: &'a CreateRoomParams) -> Self {
		Self {
			name: &params.name,
			room_alias_name: &params.room_alias_name,
			topic: &params.topic,
			preset: "private_chat",
			visibility: "private",
			invite: &params.invite,
			initial_state: vec![
				StateEvent {
					event_type: "m.room.join_rules",
					content: json!({ "join_rule": "invite" }),
				},
				StateEvent {
					event_type: "m.room.history_visibility",
					content: json!({ "history_visibility": "invited" }),
				},
			],
			power_level_content_override: PowerLevelOverride {
				users: BTreeMap::from([(params.creator.as_str(), CREATOR_POWER_LEVEL)]),
			},
		}
	}
}

#[derive(Debug, Deserialize)]
struct RoomIdResponse {
	room_id: Option<String>,
}

/// Thin wrapper over the directory and `createRoom` endpoints.
#[derive(Debug, Clone)]
pub struct RoomDirectoryClient {
	hs: HomeserverClient,
	retry: RetryConfig,
}

impl RoomDirectoryClient {
	pub fn new(hs: HomeserverClient, retry: RetryConfig) -> Self {
		Self { hs, retry }
	}

	/// Look up the room an alias points at.
	///
	/// Only a 404 carrying `M_NOT_FOUND` means the alias is absent. Every
	/// other failure is [`MatrixError::DirectoryLookupFailed`], except a
	/// rejected credential and interruption, which pass through unchanged.
	#[instrument(skip(self, alias, ctx), fields(alias = %alias))]
	pub async fn resolve_alias(
		&self,
		alias: &RoomAlias,
		ctx: &RequestContext,
	) -> Result<AliasResolution> {
		let path = format!("{CLIENT_API}/directory/room/{}", segment(alias.as_str()));

		let lookup = retry(&self.retry, "resolve_alias", || {
			self.hs.get_json::<RoomIdResponse>(&path, ctx)
		});

		match ctx.run(lookup).await {
			Ok(RoomIdResponse {
				room_id: Some(room_id),
			}) => {
				debug!(%room_id, "alias resolved");
				Ok(AliasResolution::Resolved { room_id })
			}
			Ok(RoomIdResponse { room_id: None }) => Err(MatrixError::DirectoryLookupFailed {
				status: None,
				detail: "directory response is missing room_id".to_string(),
			}),
			Err(MatrixError::Api {
				status: 404,
				errcode: Some(ref code),
				..
			}) if code == NOT_FOUND_ERRCODE => {
				debug!("alias not found");
				Ok(AliasResolution::NotFound)
			}
			Err(e) => Err(classify_lookup_error(e)),
		}
	}

	/// Issue `createRoom` exactly once and return the new room id.
	#[instrument(
		skip(self, params, ctx),
		fields(alias_localpart = %params.room_alias_name, invites = params.invite.len())
	)]
	pub async fn create_room(&self, params: &CreateRoomParams, ctx: &RequestContext) -> Result<String> {
		let body = CreateRoomBody::from_params(params);
		let path = format!("{CLIENT_API}/createRoom");

		let response: RoomIdResponse = self
			.hs
			.send_json(Method::POST, &path, &body, ctx)
			.await
			.map_err(classify_create_error)?;

		match response.room_id {
			Some(room_id) => {
				info!(%room_id, "room created");
				Ok(room_id)
			}
			None => Err(MatrixError::RoomCreationFailed {
				status: None,
				detail: "createRoom response is missing room_id".to_string(),
			}),
		}
	}
}

fn classify_lookup_error(err: MatrixError) -> MatrixError {
	match err {
		MatrixError::Unauthorized(_) | MatrixError::Cancelled | MatrixError::DeadlineExceeded => err,
		MatrixError::Api {
			status, message, ..
		} => {
			warn!(status, %message, "alias lookup failed");
			MatrixError::DirectoryLookupFailed {
				status: Some(status),
				detail: message,
			}
		}
		other => {
			warn!(error = %other, "alias lookup failed");
			MatrixError::DirectoryLookupFailed {
				status: other.status(),
				detail: other.to_string(),
			}
		}
	}
}

fn classify_create_error(err: MatrixError) -> MatrixError {
	match err {
		MatrixError::Unauthorized(_) | MatrixError::Cancelled | MatrixError::DeadlineExceeded => err,
		MatrixError::Api {
			status,
			message,
			body,
			..
		} => {
			warn!(status, %message, "createRoom rejected");
			let detail = if body.is_empty() {
				message
			} else {
				format!("HTTP {status}: {body}")
			};
			MatrixError::RoomCreationFailed {
				status: Some(status),
				detail,
			}
		}
		other => {
			warn!(error = %other, "createRoom failed");
			MatrixError::RoomCreationFailed {
				status: other.status(),
				detail: other.to_string(),
			}
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use axum::{
	body::Bytes,
	extract::{rejection::JsonRejection, State},
	http::{HeaderMap, StatusCode},
	response::IntoResponse,
	routing::{get, post},
	Json, Router,
};
use clubhouse_matrix::{ExternalIdentity, RequestContext};

use crate::auth::bearer_token;
use crate::error::ChatApiError;
use crate::gateway::ProvisioningGateway;
use crate::request::{GroupRoomRequest, ProfileSyncRequest, ProvisionedIdentity};

pub fn chat_routes(gateway: Arc<ProvisioningGateway>) -> Router {
	Router::new()
		.route("/api/chat/identity", get(get_identity).post(provision_identity))
		.route("/api/chat/group-rooms", post(ensure_group_room))
		.with_state(gateway)
}

async fn get_identity(
	State(gateway): State<Arc<ProvisioningGateway>>,
	headers: HeaderMap,
) -> Result<Json<ExternalIdentity>, ChatApiError> {
	let identity = gateway.resolve_identity(bearer_token(&headers)).await?;
	Ok(Json(identity))
}

/// The body is optional; an empty body means "use the caller's attributes".
async fn provision_identity(
	State(gateway): State<Arc<ProvisioningGateway>>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Json<ProvisionedIdentity>, ChatApiError> {
	let bearer = require_bearer(&headers)?;
	let request = if body.iter().all(u8::is_ascii_whitespace) {
		ProfileSyncRequest::default()
	} else {
		serde_json::from_slice(&body)
			.map_err(|e| ChatApiError::InvalidArgument(format!("invalid request body: {e}")))?
	};

	let provisioned = gateway
		.provision_identity(Some(bearer), request, &RequestContext::new())
		.await?;
	Ok(Json(provisioned))
}

async fn ensure_group_room(
	State(gateway): State<Arc<ProvisioningGateway>>,
	headers: HeaderMap,
	payload: Result<Json<GroupRoomRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ChatApiError> {
	let bearer = require_bearer(&headers)?;
	let Json(request) =
		payload.map_err(|e| ChatApiError::InvalidArgument(e.body_text()))?;

	let room = gateway
		.ensure_group_room(Some(bearer), request, &RequestContext::new())
		.await?;
	let status = if room.created {
		StatusCode::CREATED
	} else {
		StatusCode::OK
	};
	Ok((status, Json(room)))
}

/// Authentication failures take precedence over a malformed body.
fn require_bearer(headers: &HeaderMap) -> Result<&str, ChatApiError> {
	bearer_token(headers)
		.ok_or_else(|| ChatApiError::Unauthenticated("missing bearer token".to_string()))
}

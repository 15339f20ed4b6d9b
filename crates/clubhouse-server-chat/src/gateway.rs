// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The provisioning gateway: the boundary between callers and the Matrix
//! provisioning components.

use std::sync::Arc;
use std::time::Duration;

use clubhouse_matrix::{
	ExternalIdentity, GroupRoomParams, IdentityMapper, MatrixConfig, MatrixError, MatrixServices,
	RequestContext, RoomDescriptor,
};
use reqwest::Client;
use tracing::{info, instrument, warn};

use crate::auth::{CallerIdentity, IdentityProvider};
use crate::credentials::CredentialStore;
use crate::error::ChatApiError;
use crate::request::{GroupRoomRequest, ProfileSyncRequest, ProvisionedIdentity};

const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Authenticates callers, validates input, fetches the admin credential
/// and dispatches to the Matrix components.
#[derive(Clone)]
pub struct ProvisioningGateway {
	identity_provider: Arc<dyn IdentityProvider>,
	credentials: Arc<dyn CredentialStore>,
	matrix: MatrixConfig,
	mapper: IdentityMapper,
	http: Client,
	operation_timeout: Duration,
}

impl std::fmt::Debug for ProvisioningGateway {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProvisioningGateway")
			.field("homeserver_url", &self.matrix.homeserver_url().as_str())
			.field("server_domain", &self.matrix.server_domain())
			.field("operation_timeout", &self.operation_timeout)
			.finish_non_exhaustive()
	}
}

impl ProvisioningGateway {
	pub fn new(
		identity_provider: Arc<dyn IdentityProvider>,
		credentials: Arc<dyn CredentialStore>,
		matrix: MatrixConfig,
	) -> Result<Self, ChatApiError> {
		let http = clubhouse_common_http::builder()
			.timeout(matrix.request_timeout)
			.build()
			.map_err(|e| ChatApiError::Internal(format!("failed to build HTTP client: {e}")))?;
		let mapper = IdentityMapper::new(matrix.server_domain())?;

		Ok(Self {
			identity_provider,
			credentials,
			matrix,
			mapper,
			http,
			operation_timeout: DEFAULT_OPERATION_TIMEOUT,
		})
	}

	/// Upper bound on one whole gateway operation, applied as the request
	/// context deadline.
	pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
		self.operation_timeout = timeout;
		self
	}

	pub fn server_domain(&self) -> &str {
		self.mapper.server_domain()
	}

	/// The caller's Matrix identity. No homeserver call.
	#[instrument(skip(self, bearer), name = "ProvisioningGateway::resolve_identity")]
	pub async fn resolve_identity(&self, bearer: Option<&str>) -> Result<ExternalIdentity, ChatApiError> {
		let caller = self.authenticate(bearer).await?;
		let identity = self.mapper.identity(&caller.uid)?;
		info!(external_id = %identity, "identity resolved");
		Ok(identity)
	}

	/// Map the caller and push their profile to the homeserver.
	///
	/// The display name comes from `request` when it carries a non-blank
	/// one, otherwise from the identity provider. The avatar is always the
	/// identity provider's photo URL.
	#[instrument(skip(self, bearer, request, ctx), name = "ProvisioningGateway::provision_identity")]
	pub async fn provision_identity(
		&self,
		bearer: Option<&str>,
		request: ProfileSyncRequest,
		ctx: &RequestContext,
	) -> Result<ProvisionedIdentity, ChatApiError> {
		let caller = self.authenticate(bearer).await?;
		let identity = self.mapper.identity(&caller.uid)?;
		info!(external_id = %identity, "identity provisioning requested");

		let display_name = request
			.display_name_override()
			.map(str::to_string)
			.or(caller.display_name);
		let avatar_url = caller.photo_url;

		let services = self.services().await?;
		let ctx = ctx.clone().with_timeout(self.operation_timeout);
		let profile = services
			.profiles
			.sync_profile(
				&identity.external_id,
				display_name.as_deref(),
				avatar_url.as_deref(),
				&ctx,
			)
			.await;
		let profile = self.finish(profile).await?;

		info!(
			external_id = %identity,
			display_name_updated = profile.display_name_updated,
			avatar_updated = profile.avatar_updated,
			"identity provisioned"
		);
		Ok(ProvisionedIdentity { identity, profile })
	}

	/// Reuse or create the group's room. The caller becomes the room creator.
	#[instrument(
		skip(self, bearer, request, ctx),
		fields(group_id = %request.group_id),
		name = "ProvisioningGateway::ensure_group_room"
	)]
	pub async fn ensure_group_room(
		&self,
		bearer: Option<&str>,
		request: GroupRoomRequest,
		ctx: &RequestContext,
	) -> Result<RoomDescriptor, ChatApiError> {
		let caller = self.authenticate(bearer).await?;
		request.validate()?;

		let creator = self.mapper.external_user_id(&caller.uid)?;
		let members = request
			.member_uids
			.iter()
			.map(|uid| self.mapper.external_user_id(uid))
			.collect::<Result<Vec<_>, _>>()?;
		info!(%creator, members = members.len(), "group room requested");

		let params = GroupRoomParams {
			topic: Some(request.effective_topic().to_string()),
			group_id: request.group_id,
			group_name: request.group_name,
			creator_external_id: creator,
			member_external_ids: members,
		};

		let services = self.services().await?;
		let ctx = ctx.clone().with_timeout(self.operation_timeout);
		let room = services.rooms.ensure_group_room(&params, &ctx).await;
		let room = self.finish(room).await?;

		info!(
			room_id = %room.room_id,
			alias = %room.alias,
			created = room.created,
			invites = room.invites.len(),
			"group room provisioned"
		);
		Ok(room)
	}

	async fn authenticate(&self, bearer: Option<&str>) -> Result<CallerIdentity, ChatApiError> {
		let token = bearer
			.map(str::trim)
			.filter(|t| !t.is_empty())
			.ok_or_else(|| ChatApiError::Unauthenticated("missing bearer token".to_string()))?;
		Ok(self.identity_provider.authenticate(token).await?)
	}

	/// Matrix components bound to the current admin credential.
	async fn services(&self) -> Result<MatrixServices, ChatApiError> {
		let token = self.credentials.admin_token().await?;
		Ok(MatrixServices::new(self.http.clone(), &self.matrix, token)?)
	}

	/// Translate a Matrix outcome, dropping the cached credential when the
	/// homeserver rejected it.
	async fn finish<T>(&self, result: Result<T, MatrixError>) -> Result<T, ChatApiError> {
		match result {
			Ok(value) => Ok(value),
			Err(e) => {
				if matches!(e, MatrixError::Unauthorized(_)) {
					warn!(error = %e, "homeserver rejected admin credential");
					self.credentials.invalidate().await;
				}
				Err(e.into())
			}
		}
	}
}

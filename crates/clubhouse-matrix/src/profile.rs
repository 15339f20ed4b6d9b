// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Display name and avatar synchronization.
//!
//! The avatar pipeline is fetch (source URL, no credential) -> upload to the
//! homeserver media repository -> set `avatar_url` on the profile. A failed
//! step drops only the avatar part of the sync.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::avatar::{AvatarFetcher, AvatarImage};
use crate::config::MatrixConfig;
use crate::context::RequestContext;
use crate::error::{MatrixError, Result};
use crate::transport::{segment, HomeserverClient, CLIENT_API, MEDIA_API};
use crate::types::ProfileSyncResult;

#[derive(Debug, Serialize)]
struct DisplayNameBody<'a> {
	displayname: &'a str,
}

#[derive(Debug, Serialize)]
struct AvatarUrlBody<'a> {
	avatar_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
	content_uri: Option<String>,
}

/// Counts homeserver calls so a sync where nothing got through can be told
/// apart from a partial one.
#[derive(Debug, Default)]
struct Attempts {
	attempted: u32,
	unreachable: u32,
	last_error: Option<String>,
}

impl Attempts {
	fn record<T>(&mut self, result: &Result<T>) {
		self.attempted += 1;
		if let Err(e) = result {
			if e.is_unreachable() {
				self.unreachable += 1;
			}
			self.last_error = Some(e.to_string());
		}
	}

	fn none_reached(&self) -> bool {
		self.attempted > 0 && self.unreachable == self.attempted
	}
}

#[derive(Debug, Clone)]
pub struct ProfileSynchronizer {
	hs: HomeserverClient,
	avatars: AvatarFetcher,
}

impl ProfileSynchronizer {
	pub fn new(hs: HomeserverClient, config: &MatrixConfig) -> Self {
		Self {
			hs,
			avatars: AvatarFetcher::new(config),
		}
	}

	/// Push the display name and avatar for `user_id`.
	///
	/// Step failures are recorded in the returned [`ProfileSyncResult`].
	/// Errors are reserved for a rejected credential, interruption, and the
	/// case where no homeserver call could connect at all
	/// ([`MatrixError::ProfileSyncFailed`]). A blank display name counts as
	/// absent.
	#[instrument(
		skip(self, display_name, avatar_source_url, ctx),
		fields(
			has_display_name = display_name.is_some(),
			has_avatar = avatar_source_url.is_some()
		)
	)]
	pub async fn sync_profile(
		&self,
		user_id: &str,
		display_name: Option<&str>,
		avatar_source_url: Option<&str>,
		ctx: &RequestContext,
	) -> Result<ProfileSyncResult> {
		if user_id.trim().is_empty() {
			return Err(MatrixError::InvalidArgument(
				"user id must not be empty".to_string(),
			));
		}

		let mut result = ProfileSyncResult::default();
		let mut attempts = Attempts::default();

		if let Some(name) = display_name.filter(|n| !n.trim().is_empty()) {
			let outcome = self.set_display_name(user_id, name, ctx).await;
			attempts.record(&outcome);
			match outcome {
				Ok(()) => result.display_name_updated = true,
				Err(e) if is_fatal(&e) => return Err(e),
				Err(e) => {
					warn!(error = %e, "display name update failed");
					result.display_name_error = Some(e.to_string());
				}
			}
		}

		if let Some(source) = avatar_source_url.filter(|u| !u.trim().is_empty()) {
			match self.sync_avatar(user_id, source, ctx, &mut attempts).await {
				Ok(content_uri) => {
					result.avatar_updated = true;
					result.avatar_content_uri = Some(content_uri);
				}
				Err(e) if is_fatal(&e) => return Err(e),
				Err(e) => {
					warn!(error = %e, "avatar update failed");
					result.avatar_error = Some(e.to_string());
				}
			}
		}

		if attempts.none_reached() {
			return Err(MatrixError::ProfileSyncFailed(
				attempts
					.last_error
					.unwrap_or_else(|| "homeserver unreachable".to_string()),
			));
		}

		info!(
			display_name_updated = result.display_name_updated,
			avatar_updated = result.avatar_updated,
			partial = result.is_partial(),
			"profile sync finished"
		);
		Ok(result)
	}

	async fn set_display_name(&self, user_id: &str, name: &str, ctx: &RequestContext) -> Result<()> {
		let path = format!("{CLIENT_API}/profile/{}/displayname", segment(user_id));
		self
			.hs
			.send_json::<_, Value>(Method::PUT, &path, &DisplayNameBody { displayname: name }, ctx)
			.await?;
		debug!("display name updated");
		Ok(())
	}

	async fn sync_avatar(
		&self,
		user_id: &str,
		source: &str,
		ctx: &RequestContext,
		attempts: &mut Attempts,
	) -> Result<String> {
		let image = self.avatars.fetch(source, ctx).await?;

		let upload = self.upload(image, ctx).await;
		attempts.record(&upload);
		let content_uri = upload?;

		let path = format!("{CLIENT_API}/profile/{}/avatar_url", segment(user_id));
		let set = self
			.hs
			.send_json::<_, Value>(
				Method::PUT,
				&path,
				&AvatarUrlBody {
					avatar_url: &content_uri,
				},
				ctx,
			)
			.await
			.map(|_| ());
		attempts.record(&set);
		set?;

		debug!(%content_uri, "avatar updated");
		Ok(content_uri)
	}

	async fn upload(&self, image: AvatarImage, ctx: &RequestContext) -> Result<String> {
		let path = format!("{MEDIA_API}/upload");
		let response: UploadResponse = self
			.hs
			.post_bytes(&path, &image.content_type, image.bytes, ctx)
			.await?;
		response.content_uri.ok_or_else(|| {
			MatrixError::InvalidResponse("upload response is missing content_uri".to_string())
		})
	}
}

/// Errors that end the whole sync instead of one step.
fn is_fatal(err: &MatrixError) -> bool {
	err.is_interrupted() || matches!(err, MatrixError::Unauthorized(_))
}

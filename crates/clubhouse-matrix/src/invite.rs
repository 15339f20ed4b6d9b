// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Batch room invites with per-target fault isolation.

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::context::RequestContext;
use crate::error::MatrixError;
use crate::transport::{segment, HomeserverClient, CLIENT_API};
use crate::types::{InviteStatus, MembershipInviteOutcome};

#[derive(Debug, Serialize)]
struct InviteBody<'a> {
	user_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct MembershipInviter {
	hs: HomeserverClient,
}

impl MembershipInviter {
	pub fn new(hs: HomeserverClient) -> Self {
		Self { hs }
	}

	/// Invite every target into `room_id`, sequentially and in input order.
	///
	/// Returns one outcome per target. The only exception is interruption:
	/// when the context is cancelled or its deadline passes, the loop stops
	/// and the outcomes gathered so far are returned.
	#[instrument(skip(self, external_ids, ctx), fields(targets = external_ids.len()))]
	pub async fn invite_all(
		&self,
		room_id: &str,
		external_ids: &[String],
		ctx: &RequestContext,
	) -> Vec<MembershipInviteOutcome> {
		let path = format!("{CLIENT_API}/rooms/{}/invite", segment(room_id));
		let mut outcomes = Vec::with_capacity(external_ids.len());

		for external_id in external_ids {
			let body = InviteBody {
				user_id: external_id,
			};
			let result = self
				.hs
				.send_json::<_, Value>(Method::POST, &path, &body, ctx)
				.await;

			let outcome = match result {
				Ok(_) => MembershipInviteOutcome::new(external_id, InviteStatus::Invited, None),
				Err(e) if e.is_interrupted() => {
					warn!(
						error = %e,
						completed = outcomes.len(),
						"invite batch interrupted"
					);
					break;
				}
				Err(e) => classify(external_id, e),
			};

			match outcome.status {
				InviteStatus::Failed => warn!(
					%external_id,
					detail = outcome.detail.as_deref().unwrap_or_default(),
					"invite failed"
				),
				status => debug!(%external_id, ?status, "invite processed"),
			}
			outcomes.push(outcome);
		}

		let count = |status: InviteStatus| outcomes.iter().filter(|o| o.status == status).count();
		info!(
			invited = count(InviteStatus::Invited),
			already_member = count(InviteStatus::AlreadyMember),
			failed = count(InviteStatus::Failed),
			requested = external_ids.len(),
			"invite batch finished"
		);

		outcomes
	}
}

fn classify(external_id: &str, err: MatrixError) -> MembershipInviteOutcome {
	match err {
		MatrixError::Api {
			status: 403,
			errcode,
			message,
			..
		} => {
			let detail = match errcode {
				Some(code) => format!("{code}: {message}"),
				None => message,
			};
			MembershipInviteOutcome::new(external_id, InviteStatus::AlreadyMember, Some(detail))
		}
		other => MembershipInviteOutcome::new(external_id, InviteStatus::Failed, Some(other.to_string())),
	}
}

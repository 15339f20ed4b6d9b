// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Matrix provisioning for Clubhouse.
//!
//! Maps Clubhouse users and groups onto a Matrix homeserver:
//!
//! - [`IdentityMapper`] derives `@uid:domain` user ids and `#group_{id}:domain`
//!   room aliases.
//! - [`RoomDirectoryClient`] resolves aliases and creates rooms.
//! - [`MembershipInviter`] invites a batch of users, one outcome per user.
//! - [`RoomProvisioner`] reuses or creates a group's room.
//! - [`ProfileSynchronizer`] pushes display names and re-hosted avatars.
//!
//! Every remote call runs under a [`RequestContext`] carrying the caller's
//! cancellation token and deadline.

mod avatar;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod identity;
pub mod invite;
pub mod profile;
pub mod rooms;
pub mod services;
pub mod transport;
pub mod types;

pub use config::MatrixConfig;
pub use context::RequestContext;
pub use directory::{CreateRoomParams, RoomDirectoryClient};
pub use error::{MatrixError, Result};
pub use identity::{
	external_user_id, room_alias, room_alias_localpart, ExternalIdentity, IdentityMapper, RoomAlias,
};
pub use invite::MembershipInviter;
pub use profile::ProfileSynchronizer;
pub use rooms::{GroupRoomParams, RoomProvisioner};
pub use services::MatrixServices;
pub use transport::HomeserverClient;
pub use types::{
	AliasResolution, InviteStatus, MembershipInviteOutcome, ProfileSyncResult, RoomDescriptor,
};

pub use clubhouse_common_http::RetryConfig;
pub use tokio_util::sync::CancellationToken;

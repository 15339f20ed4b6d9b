// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Deterministic mapping from Clubhouse identities to Matrix identifiers.
//!
//! Nothing here is persisted: identifiers are recomputed on every request
//! from the local uid / group id and the deployment's server domain.

use std::fmt;

use serde::Serialize;

use crate::error::{MatrixError, Result};

const ALIAS_PREFIX: &str = "group_";

fn require(field: &str, value: &str) -> Result<()> {
	if value.trim().is_empty() {
		return Err(MatrixError::InvalidArgument(format!("{field} must not be empty")));
	}
	Ok(())
}

/// `@{local_uid}:{server_domain}`.
pub fn external_user_id(local_uid: &str, server_domain: &str) -> Result<String> {
	require("local uid", local_uid)?;
	require("server domain", server_domain)?;
	Ok(format!("@{local_uid}:{server_domain}"))
}

/// `group_{group_id}`, the `room_alias_name` sent to `createRoom`.
pub fn room_alias_localpart(group_id: &str) -> Result<String> {
	require("group id", group_id)?;
	Ok(format!("{ALIAS_PREFIX}{group_id}"))
}

/// `#group_{group_id}:{server_domain}`.
pub fn room_alias(group_id: &str, server_domain: &str) -> Result<String> {
	require("server domain", server_domain)?;
	Ok(format!("#{}:{server_domain}", room_alias_localpart(group_id)?))
}

/// A user's Matrix identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalIdentity {
	pub local_uid: String,
	pub server_domain: String,
	pub external_id: String,
}

impl fmt::Display for ExternalIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.external_id)
	}
}

/// A group's room alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct RoomAlias {
	localpart: String,
	full: String,
}

impl RoomAlias {
	/// `group_{group_id}`.
	pub fn localpart(&self) -> &str {
		&self.localpart
	}

	/// `#group_{group_id}:{server_domain}`.
	pub fn as_str(&self) -> &str {
		&self.full
	}
}

impl fmt::Display for RoomAlias {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.full)
	}
}

impl From<RoomAlias> for String {
	fn from(alias: RoomAlias) -> Self {
		alias.full
	}
}

/// Binds the mapping functions to one deployment's server domain.
#[derive(Debug, Clone)]
pub struct IdentityMapper {
	server_domain: String,
}

impl IdentityMapper {
	pub fn new(server_domain: impl Into<String>) -> Result<Self> {
		let server_domain = server_domain.into();
		require("server domain", &server_domain)?;
		Ok(Self { server_domain })
	}

	pub fn server_domain(&self) -> &str {
		&self.server_domain
	}

	pub fn identity(&self, local_uid: &str) -> Result<ExternalIdentity> {
		Ok(ExternalIdentity {
			local_uid: local_uid.to_string(),
			server_domain: self.server_domain.clone(),
			external_id: external_user_id(local_uid, &self.server_domain)?,
		})
	}

	pub fn external_user_id(&self, local_uid: &str) -> Result<String> {
		external_user_id(local_uid, &self.server_domain)
	}

	pub fn alias(&self, group_id: &str) -> Result<RoomAlias> {
		Ok(RoomAlias {
			localpart: room_alias_localpart(group_id)?,
			full: room_alias(group_id, &self.server_domain)?,
		})
	}
}

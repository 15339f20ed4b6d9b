// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use clubhouse_common_config::SecretString;
use reqwest::Client;

use crate::config::MatrixConfig;
use crate::directory::RoomDirectoryClient;
use crate::error::Result;
use crate::identity::IdentityMapper;
use crate::invite::MembershipInviter;
use crate::profile::ProfileSynchronizer;
use crate::rooms::RoomProvisioner;
use crate::transport::HomeserverClient;

/// The provisioning components wired to one homeserver with one admin
/// credential. Built per call, so a rotated credential takes effect on the
/// next request.
#[derive(Debug, Clone)]
pub struct MatrixServices {
	pub mapper: IdentityMapper,
	pub directory: RoomDirectoryClient,
	pub inviter: MembershipInviter,
	pub rooms: RoomProvisioner,
	pub profiles: ProfileSynchronizer,
}

impl MatrixServices {
	pub fn new(http: Client, config: &MatrixConfig, access_token: SecretString) -> Result<Self> {
		let hs = HomeserverClient::new(http, config, access_token);
		let mapper = IdentityMapper::new(config.server_domain())?;
		let directory = RoomDirectoryClient::new(hs.clone(), config.lookup_retry.clone());
		let inviter = MembershipInviter::new(hs.clone());
		let rooms = RoomProvisioner::new(mapper.clone(), directory.clone(), inviter.clone());
		let profiles = ProfileSynchronizer::new(hs, config);

		Ok(Self {
			mapper,
			directory,
			inviter,
			rooms,
			profiles,
		})
	}
}

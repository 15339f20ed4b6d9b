// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	HttpConfigLayer, IdentityConfigLayer, LogFormat, LoggingConfigLayer, MatrixSettingsLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/clubhouse/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: CLUBHOUSE_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(load_http_from_env()?),
			matrix: Some(load_matrix_from_env()?),
			identity: Some(load_identity_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {} value '{v}'", std::any::type_name::<T>()),
		}),
		None => Ok(None),
	}
}

fn load_http_from_env() -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var("CLUBHOUSE_SERVER_HOST"),
		port: env_parse("CLUBHOUSE_SERVER_PORT")?,
	})
}

fn load_matrix_from_env() -> Result<MatrixSettingsLayer, ConfigError> {
	Ok(MatrixSettingsLayer {
		homeserver_url: env_var("CLUBHOUSE_SERVER_MATRIX_HOMESERVER_URL"),
		server_domain: env_var("CLUBHOUSE_SERVER_MATRIX_SERVER_DOMAIN"),
		allow_insecure: env_bool("CLUBHOUSE_SERVER_MATRIX_ALLOW_INSECURE"),
		allow_private_avatar_sources: env_bool(
			"CLUBHOUSE_SERVER_MATRIX_ALLOW_PRIVATE_AVATAR_SOURCES",
		),
		request_timeout_secs: env_parse("CLUBHOUSE_SERVER_MATRIX_REQUEST_TIMEOUT_SECS")?,
		operation_timeout_secs: env_parse("CLUBHOUSE_SERVER_MATRIX_OPERATION_TIMEOUT_SECS")?,
		lookup_max_attempts: env_parse("CLUBHOUSE_SERVER_MATRIX_LOOKUP_MAX_ATTEMPTS")?,
		max_avatar_bytes: env_parse("CLUBHOUSE_SERVER_MATRIX_MAX_AVATAR_BYTES")?,
		credential_cache_ttl_secs: env_parse("CLUBHOUSE_SERVER_MATRIX_CREDENTIAL_CACHE_TTL_SECS")?,
	})
}

fn load_identity_from_env() -> Result<IdentityConfigLayer, ConfigError> {
	Ok(IdentityConfigLayer {
		userinfo_url: env_var("CLUBHOUSE_SERVER_IDENTITY_USERINFO_URL"),
		request_timeout_secs: env_parse("CLUBHOUSE_SERVER_IDENTITY_REQUEST_TIMEOUT_SECS")?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("CLUBHOUSE_SERVER_LOG_FORMAT") {
		Some(v) => Some(
			v.parse::<LogFormat>()
				.map_err(|message| ConfigError::InvalidValue {
					key: "CLUBHOUSE_SERVER_LOG_FORMAT".to_string(),
					message,
				})?,
		),
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var("CLUBHOUSE_SERVER_LOG_LEVEL"),
		format,
	})
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Configuration for the Clubhouse server.
//!
//! Values are layered from built-in defaults, an optional TOML file and
//! `CLUBHOUSE_SERVER_*` environment variables, in that order of precedence.
//!
//! ```ignore
//! let config = clubhouse_server_config::load_config()?;
//! println!("listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub matrix: MatrixSettings,
	pub identity: IdentityConfig,
	pub logging: LoggingConfig,
}

impl ServerConfig {
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration using the system config file
/// (`/etc/clubhouse/server.toml`).
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from(TomlSource::system())
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from(TomlSource::new(config_path))
}

fn load_from(file: TomlSource) -> Result<ServerConfig, ConfigError> {
	let mut sources: Vec<Box<dyn ConfigSource>> =
		vec![Box::new(EnvSource), Box::new(file), Box::new(DefaultsSource)];
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let matrix = layer.matrix.unwrap_or_default().finalize()?;
	let identity = layer.identity.unwrap_or_default().finalize()?;
	let logging = layer.logging.unwrap_or_default().finalize();

	info!(
		host = %http.host,
		port = http.port,
		homeserver = %matrix.homeserver_url,
		server_domain = %matrix.server_domain,
		allow_insecure = matrix.allow_insecure,
		lookup_max_attempts = matrix.lookup_max_attempts,
		userinfo_url = %identity.userinfo_url,
		log_format = %logging.format,
		"configuration loaded"
	);

	Ok(ServerConfig {
		http,
		matrix,
		identity,
		logging,
	})
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{HttpConfigLayer, IdentityConfigLayer, LoggingConfigLayer, MatrixSettingsLayer};

/// Server configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub matrix: Option<MatrixSettingsLayer>,
	#[serde(default)]
	pub identity: Option<IdentityConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl ServerConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_option(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_option(&mut self.matrix, other.matrix, MatrixSettingsLayer::merge);
		merge_option(&mut self.identity, other.identity, IdentityConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_empty_layers() {
		let mut base = ServerConfigLayer::default();
		base.merge(ServerConfigLayer::default());
		assert!(base.http.is_none());
		assert!(base.matrix.is_none());
	}

	#[test]
	fn test_merge_other_overwrites() {
		let mut base = ServerConfigLayer {
			http: Some(HttpConfigLayer {
				port: Some(9000),
				host: Some("127.0.0.1".to_string()),
			}),
			..Default::default()
		};
		base.merge(ServerConfigLayer {
			http: Some(HttpConfigLayer {
				port: Some(8080),
				..Default::default()
			}),
			..Default::default()
		});
		let http = base.http.unwrap();
		assert_eq!(http.port, Some(8080));
		assert_eq!(http.host.as_deref(), Some("127.0.0.1"));
	}

	#[test]
	fn test_merge_adds_missing_sections() {
		let mut base = ServerConfigLayer::default();
		base.merge(ServerConfigLayer {
			matrix: Some(MatrixSettingsLayer {
				server_domain: Some("example.org".to_string()),
				..Default::default()
			}),
			..Default::default()
		});
		assert_eq!(
			base.matrix.unwrap().server_domain.as_deref(),
			Some("example.org")
		);
	}

	#[test]
	fn test_deserialize_toml() {
		let layer: ServerConfigLayer = toml::from_str(
			r#"
[http]
port = 9090

[matrix]
homeserver_url = "https://matrix.example.org"
server_domain = "example.org"
lookup_max_attempts = 5

[logging]
format = "json"
"#,
		)
		.unwrap();
		assert_eq!(layer.http.unwrap().port, Some(9090));
		assert_eq!(layer.matrix.unwrap().lookup_max_attempts, Some(5));
		assert!(layer.identity.is_none());
	}
}

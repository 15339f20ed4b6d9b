// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Fetching avatar images from their source URL.
//!
//! Sources must be `https` and resolve only to public addresses; the checked
//! address is pinned for the request and redirects are not followed. The
//! response must be an image no larger than the configured limit.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use tracing::debug;
use url::{Host, Url};

use crate::config::MatrixConfig;
use crate::context::RequestContext;
use crate::error::{MatrixError, Result};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Downloaded avatar ready for re-upload.
#[derive(Debug)]
pub(crate) struct AvatarImage {
	pub(crate) content_type: String,
	pub(crate) bytes: Bytes,
}

#[derive(Debug, Clone)]
pub(crate) struct AvatarFetcher {
	max_bytes: usize,
	allow_private_sources: bool,
	timeout: Duration,
}

impl AvatarFetcher {
	pub(crate) fn new(config: &MatrixConfig) -> Self {
		Self {
			max_bytes: config.max_avatar_bytes,
			allow_private_sources: config.allow_private_avatar_sources,
			timeout: config.request_timeout,
		}
	}

	/// Download `source` without any credential.
	pub(crate) async fn fetch(&self, source: &str, ctx: &RequestContext) -> Result<AvatarImage> {
		let url = Url::parse(source)
			.map_err(|e| MatrixError::AvatarSource(format!("invalid avatar URL: {e}")))?;
		let pinned = ctx.run(vet_source(&url, self.allow_private_sources)).await?;

		let mut builder = clubhouse_common_http::builder()
			.redirect(Policy::none())
			.timeout(self.timeout);
		if let Some((host, addr)) = &pinned {
			builder = builder.resolve(host, *addr);
		}
		let client = builder
			.build()
			.map_err(|e| MatrixError::AvatarSource(format!("failed to build client: {e}")))?;

		let max = self.max_bytes;
		let download = async {
			let mut response = client
				.get(url.clone())
				.send()
				.await
				.map_err(|e| MatrixError::AvatarSource(e.to_string()))?;

			let status = response.status();
			if !status.is_success() {
				return Err(MatrixError::AvatarSource(format!(
					"source returned HTTP {}",
					status.as_u16()
				)));
			}
			if matches!(response.content_length(), Some(len) if len > max as u64) {
				return Err(MatrixError::AvatarSource(format!(
					"image exceeds {max} bytes"
				)));
			}

			let content_type = image_content_type(
				response
					.headers()
					.get(CONTENT_TYPE)
					.and_then(|v| v.to_str().ok()),
			)?;

			let mut body = Vec::new();
			while let Some(chunk) = response
				.chunk()
				.await
				.map_err(|e| MatrixError::AvatarSource(e.to_string()))?
			{
				if body.len() + chunk.len() > max {
					return Err(MatrixError::AvatarSource(format!(
						"image exceeds {max} bytes"
					)));
				}
				body.extend_from_slice(&chunk);
			}

			Ok::<_, MatrixError>(AvatarImage {
				content_type,
				bytes: Bytes::from(body),
			})
		};

		let image = ctx.run(download).await?;
		debug!(
			bytes = image.bytes.len(),
			content_type = %image.content_type,
			"avatar source fetched"
		);
		Ok(image)
	}
}

/// Check scheme and destination. Returns the host and address to pin when
/// the source is a DNS name.
async fn vet_source(url: &Url, allow_private: bool) -> Result<Option<(String, SocketAddr)>> {
	match url.scheme() {
		"https" => {}
		"http" if allow_private => {}
		other => {
			return Err(MatrixError::AvatarSource(format!(
				"avatar URL must use https, got '{other}'"
			)))
		}
	}
	if allow_private {
		return Ok(None);
	}

	let host = url
		.host()
		.ok_or_else(|| MatrixError::AvatarSource("avatar URL has no host".to_string()))?;
	let domain = match host {
		Host::Ipv4(ip) => return check_address(IpAddr::V4(ip)).map(|_| None),
		Host::Ipv6(ip) => return check_address(IpAddr::V6(ip)).map(|_| None),
		Host::Domain(domain) => domain,
	};

	let lowered = domain.trim_end_matches('.').to_ascii_lowercase();
	if lowered == "localhost" || lowered.ends_with(".localhost") {
		return Err(MatrixError::AvatarSource(format!(
			"avatar host '{domain}' is not allowed"
		)));
	}

	let port = url.port_or_known_default().unwrap_or(443);
	let addrs: Vec<SocketAddr> = tokio::net::lookup_host((domain, port))
		.await
		.map_err(|e| MatrixError::AvatarSource(format!("cannot resolve '{domain}': {e}")))?
		.collect();
	for addr in &addrs {
		check_address(addr.ip())?;
	}
	let first = addrs.first().copied().ok_or_else(|| {
		MatrixError::AvatarSource(format!("'{domain}' resolved to no addresses"))
	})?;
	Ok(Some((domain.to_string(), first)))
}

fn check_address(ip: IpAddr) -> Result<()> {
	if is_public(ip) {
		Ok(())
	} else {
		Err(MatrixError::AvatarSource(format!(
			"avatar address {ip} is not publicly routable"
		)))
	}
}

fn is_public(ip: IpAddr) -> bool {
	match ip {
		IpAddr::V4(v4) => is_public_v4(v4),
		IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
			Some(v4) => is_public_v4(v4),
			None => is_public_v6(v6),
		},
	}
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
	let [a, b, ..] = ip.octets();
	!(ip.is_unspecified()
		|| ip.is_loopback()
		|| ip.is_private()
		|| ip.is_link_local()
		|| ip.is_broadcast()
		|| ip.is_documentation()
		|| ip.is_multicast()
		|| a == 0
		// 100.64.0.0/10 carrier-grade NAT
		|| (a == 100 && (b & 0xc0) == 64)
		// 198.18.0.0/15 benchmarking
		|| (a == 198 && (b & 0xfe) == 18)
		|| a >= 240)
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
	let first = ip.segments()[0];
	!(ip.is_unspecified()
		|| ip.is_loopback()
		|| ip.is_multicast()
		// fc00::/7 unique local
		|| (first & 0xfe00) == 0xfc00
		// fe80::/10 link local
		|| (first & 0xffc0) == 0xfe80
		// 2001:db8::/32 documentation
		|| (first == 0x2001 && ip.segments()[1] == 0x0db8))
}

/// Only images are re-hosted. A missing header is uploaded as
/// `application/octet-stream`.
fn image_content_type(header: Option<&str>) -> Result<String> {
	let Some(value) = header.map(str::trim).filter(|v| !v.is_empty()) else {
		return Ok(DEFAULT_CONTENT_TYPE.to_string());
	};
	if value.to_ascii_lowercase().starts_with("image/") {
		Ok(value.to_string())
	} else {
		Err(MatrixError::AvatarSource(format!(
			"source content type '{value}' is not an image"
		)))
	}
}

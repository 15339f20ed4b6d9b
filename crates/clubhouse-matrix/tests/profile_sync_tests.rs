// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Profile synchronization against a mock homeserver and avatar source.

use std::time::Duration;

use clubhouse_common_config::SecretString;
use clubhouse_matrix::{MatrixConfig, MatrixError, MatrixServices, RequestContext};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DISPLAY_NAME_PATH: &str = "/_matrix/client/v3/profile/%40alice%3Aexample.org/displayname";
const AVATAR_URL_PATH: &str = "/_matrix/client/v3/profile/%40alice%3Aexample.org/avatar_url";
const UPLOAD_PATH: &str = "/_matrix/media/v3/upload";
const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-bytes";

/// Avatar sources may live on loopback, where the mock servers run.
fn services_for(homeserver: &str) -> MatrixServices {
	services_with(homeserver, true)
}

fn services_with(homeserver: &str, allow_private_avatar_sources: bool) -> MatrixServices {
	let config = MatrixConfig::new(homeserver, "example.org", true)
		.unwrap()
		.with_max_avatar_bytes(1024)
		.with_private_avatar_sources(allow_private_avatar_sources);
	let http = reqwest::Client::builder()
		.timeout(Duration::from_secs(5))
		.build()
		.unwrap();
	MatrixServices::new(http, &config, SecretString::new("admin-token".to_string())).unwrap()
}

async fn mount_profile_endpoints(homeserver: &MockServer) {
	Mock::given(method("PUT"))
		.and(path(DISPLAY_NAME_PATH))
		.and(header("authorization", "Bearer admin-token"))
		.and(body_json(json!({"displayname": "Alice"})))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
		.mount(homeserver)
		.await;
	Mock::given(method("POST"))
		.and(path(UPLOAD_PATH))
		.and(header("authorization", "Bearer admin-token"))
		.and(header("content-type", "image/png"))
		.respond_with(
			ResponseTemplate::new(200).set_body_json(json!({"content_uri": "mxc://example.org/abc123"})),
		)
		.mount(homeserver)
		.await;
	Mock::given(method("PUT"))
		.and(path(AVATAR_URL_PATH))
		.and(body_json(json!({"avatar_url": "mxc://example.org/abc123"})))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
		.mount(homeserver)
		.await;
}

#[tokio::test]
async fn display_name_only_makes_one_call() {
	let homeserver = MockServer::start().await;
	Mock::given(method("PUT"))
		.and(path(DISPLAY_NAME_PATH))
		.and(body_json(json!({"displayname": "Alice"})))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
		.expect(1)
		.mount(&homeserver)
		.await;

	let result = services_for(&homeserver.uri())
		.profiles
		.sync_profile("@alice:example.org", Some("Alice"), None, &RequestContext::new())
		.await
		.unwrap();

	assert!(result.display_name_updated);
	assert!(!result.avatar_updated);
	assert!(result.avatar_content_uri.is_none());
	assert_eq!(homeserver.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn full_sync_rehosts_avatar() {
	let homeserver = MockServer::start().await;
	let source = MockServer::start().await;
	mount_profile_endpoints(&homeserver).await;
	Mock::given(method("GET"))
		.and(path("/photos/alice.png"))
		.respond_with(ResponseTemplate::new(200).set_body_raw(PNG, "image/png"))
		.expect(1)
		.mount(&source)
		.await;

	let avatar_url = format!("{}/photos/alice.png", source.uri());
	let result = services_for(&homeserver.uri())
		.profiles
		.sync_profile(
			"@alice:example.org",
			Some("Alice"),
			Some(&avatar_url),
			&RequestContext::new(),
		)
		.await
		.unwrap();

	assert!(result.display_name_updated);
	assert!(result.avatar_updated);
	assert_eq!(
		result.avatar_content_uri.as_deref(),
		Some("mxc://example.org/abc123")
	);
	assert!(!result.is_partial());

	let uploads: Vec<_> = homeserver
		.received_requests()
		.await
		.unwrap()
		.into_iter()
		.filter(|r| r.url.path() == UPLOAD_PATH)
		.collect();
	assert_eq!(uploads.len(), 1);
	assert_eq!(uploads[0].body, PNG);
}

#[tokio::test]
async fn avatar_source_fetch_carries_no_credential() {
	let homeserver = MockServer::start().await;
	let source = MockServer::start().await;
	mount_profile_endpoints(&homeserver).await;
	Mock::given(method("GET"))
		.and(path("/photos/alice.png"))
		.respond_with(ResponseTemplate::new(200).set_body_raw(PNG, "image/png"))
		.mount(&source)
		.await;

	let avatar_url = format!("{}/photos/alice.png", source.uri());
	services_for(&homeserver.uri())
		.profiles
		.sync_profile("@alice:example.org", None, Some(&avatar_url), &RequestContext::new())
		.await
		.unwrap();

	let fetches = source.received_requests().await.unwrap();
	assert_eq!(fetches.len(), 1);
	assert!(fetches[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn avatar_fetch_failure_keeps_display_name() {
	let homeserver = MockServer::start().await;
	let source = MockServer::start().await;
	mount_profile_endpoints(&homeserver).await;
	Mock::given(method("GET"))
		.and(path("/photos/missing.png"))
		.respond_with(ResponseTemplate::new(404))
		.mount(&source)
		.await;

	let avatar_url = format!("{}/photos/missing.png", source.uri());
	let result = services_for(&homeserver.uri())
		.profiles
		.sync_profile(
			"@alice:example.org",
			Some("Alice"),
			Some(&avatar_url),
			&RequestContext::new(),
		)
		.await
		.unwrap();

	assert!(result.display_name_updated);
	assert!(!result.avatar_updated);
	assert!(result.avatar_error.as_deref().unwrap().contains("404"));
	assert!(result.is_partial());

	let uploads = homeserver
		.received_requests()
		.await
		.unwrap()
		.into_iter()
		.filter(|r| r.url.path() == UPLOAD_PATH)
		.count();
	assert_eq!(uploads, 0);
}

async fn upload_count(homeserver: &MockServer) -> usize {
	homeserver
		.received_requests()
		.await
		.unwrap()
		.into_iter()
		.filter(|r| r.url.path() == UPLOAD_PATH)
		.count()
}

#[tokio::test]
async fn internal_avatar_source_is_never_fetched() {
	let homeserver = MockServer::start().await;
	let internal = MockServer::start().await;
	mount_profile_endpoints(&homeserver).await;
	Mock::given(method("GET"))
		.respond_with(ResponseTemplate::new(200).set_body_raw("AKIA-INTERNAL-SECRET", "image/png"))
		.expect(0)
		.mount(&internal)
		.await;

	let sources = [
		format!("{}/latest/meta-data/iam/credentials", internal.uri()),
		"https://127.0.0.1/latest/meta-data/iam/credentials".to_string(),
		"https://169.254.169.254/latest/meta-data/iam/credentials".to_string(),
		"https://localhost/avatar.png".to_string(),
	];
	for avatar_url in sources {
		let result = services_with(&homeserver.uri(), false)
			.profiles
			.sync_profile(
				"@alice:example.org",
				Some("Alice"),
				Some(&avatar_url),
				&RequestContext::new(),
			)
			.await
			.unwrap();

		assert!(result.display_name_updated);
		assert!(!result.avatar_updated, "{avatar_url} was re-hosted");
		assert!(result.avatar_content_uri.is_none());
		assert!(result.avatar_error.is_some());
	}
	assert_eq!(upload_count(&homeserver).await, 0);
}

#[tokio::test]
async fn avatar_redirects_are_not_followed() {
	let homeserver = MockServer::start().await;
	let source = MockServer::start().await;
	mount_profile_endpoints(&homeserver).await;
	Mock::given(method("GET"))
		.and(path("/photos/alice.png"))
		.respond_with(
			ResponseTemplate::new(302).insert_header("location", format!("{}/internal", source.uri())),
		)
		.mount(&source)
		.await;
	Mock::given(method("GET"))
		.and(path("/internal"))
		.respond_with(ResponseTemplate::new(200).set_body_raw(PNG, "image/png"))
		.expect(0)
		.mount(&source)
		.await;

	let avatar_url = format!("{}/photos/alice.png", source.uri());
	let result = services_for(&homeserver.uri())
		.profiles
		.sync_profile("@alice:example.org", None, Some(&avatar_url), &RequestContext::new())
		.await
		.unwrap();

	assert!(!result.avatar_updated);
	assert!(result.avatar_error.as_deref().unwrap().contains("302"));
	assert_eq!(upload_count(&homeserver).await, 0);
}

#[tokio::test]
async fn non_image_avatar_source_is_refused() {
	let homeserver = MockServer::start().await;
	let source = MockServer::start().await;
	mount_profile_endpoints(&homeserver).await;
	Mock::given(method("GET"))
		.and(path("/photos/alice.png"))
		.respond_with(ResponseTemplate::new(200).set_body_raw("{\"secret\": true}", "application/json"))
		.mount(&source)
		.await;

	let avatar_url = format!("{}/photos/alice.png", source.uri());
	let result = services_for(&homeserver.uri())
		.profiles
		.sync_profile("@alice:example.org", None, Some(&avatar_url), &RequestContext::new())
		.await
		.unwrap();

	assert!(!result.avatar_updated);
	assert!(result.avatar_error.as_deref().unwrap().contains("not an image"));
	assert_eq!(upload_count(&homeserver).await, 0);
}

#[tokio::test]
async fn oversized_avatar_is_refused() {
	let homeserver = MockServer::start().await;
	let source = MockServer::start().await;
	mount_profile_endpoints(&homeserver).await;
	Mock::given(method("GET"))
		.and(path("/photos/huge.png"))
		.respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 4096], "image/png"))
		.mount(&source)
		.await;

	let avatar_url = format!("{}/photos/huge.png", source.uri());
	let result = services_for(&homeserver.uri())
		.profiles
		.sync_profile("@alice:example.org", None, Some(&avatar_url), &RequestContext::new())
		.await
		.unwrap();

	assert!(!result.avatar_updated);
	assert!(result.avatar_error.as_deref().unwrap().contains("exceeds"));
}

#[tokio::test]
async fn display_name_rejection_is_recorded_not_raised() {
	let homeserver = MockServer::start().await;
	Mock::given(method("PUT"))
		.and(path(DISPLAY_NAME_PATH))
		.respond_with(ResponseTemplate::new(403).set_body_json(json!({
			"errcode": "M_FORBIDDEN",
			"error": "Cannot set another user's displayname"
		})))
		.mount(&homeserver)
		.await;

	let result = services_for(&homeserver.uri())
		.profiles
		.sync_profile("@alice:example.org", Some("Alice"), None, &RequestContext::new())
		.await
		.unwrap();

	assert!(!result.display_name_updated);
	assert!(result.display_name_error.as_deref().unwrap().contains("403"));
}

#[tokio::test]
async fn blank_display_name_is_skipped() {
	let homeserver = MockServer::start().await;

	let result = services_for(&homeserver.uri())
		.profiles
		.sync_profile("@alice:example.org", Some("   "), None, &RequestContext::new())
		.await
		.unwrap();

	assert!(!result.display_name_updated);
	assert!(result.display_name_error.is_none());
	assert!(homeserver.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_homeserver_fails_the_sync() {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);

	let err = services_for(&format!("http://{addr}"))
		.profiles
		.sync_profile("@alice:example.org", Some("Alice"), None, &RequestContext::new())
		.await
		.unwrap_err();

	assert!(matches!(err, MatrixError::ProfileSyncFailed(_)));
}

#[tokio::test]
async fn rejected_credential_aborts_the_sync() {
	let homeserver = MockServer::start().await;
	Mock::given(method("PUT"))
		.and(path(DISPLAY_NAME_PATH))
		.respond_with(ResponseTemplate::new(401).set_body_json(json!({
			"errcode": "M_UNKNOWN_TOKEN",
			"error": "Invalid access token passed."
		})))
		.mount(&homeserver)
		.await;

	let err = services_for(&homeserver.uri())
		.profiles
		.sync_profile("@alice:example.org", Some("Alice"), None, &RequestContext::new())
		.await
		.unwrap_err();

	assert!(matches!(err, MatrixError::Unauthorized(_)));
}

#[tokio::test]
async fn cancelled_sync_is_an_error() {
	let homeserver = MockServer::start().await;
	mount_profile_endpoints(&homeserver).await;

	let ctx = RequestContext::new();
	ctx.cancel();
	let err = services_for(&homeserver.uri())
		.profiles
		.sync_profile("@alice:example.org", Some("Alice"), None, &ctx)
		.await
		.unwrap_err();

	assert!(matches!(err, MatrixError::Cancelled));
	assert!(homeserver.received_requests().await.unwrap().is_empty());
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Gateway and route tests with a stub identity provider, a counting
//! credential store and a mock homeserver.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use clubhouse_common_config::SecretString;
use clubhouse_matrix::{MatrixConfig, RequestContext, RetryConfig};
use clubhouse_server_chat::{
	chat_routes, CallerIdentity, ChatApiError, CredentialError, CredentialStore, ErrorBody,
	GroupRoomRequest, IdentityProvider, IdentityProviderError, ProfileSyncRequest,
	ProvisioningGateway,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_json, header as header_is, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ALIAS_PATH: &str = "/_matrix/client/v3/directory/room/%23group_g1%3Aexample.org";
const CREATE_PATH: &str = "/_matrix/client/v3/createRoom";
const INVITE_PATH: &str = "/_matrix/client/v3/rooms/%21xyz%3Aexample.org/invite";
const DISPLAY_NAME_PATH: &str = "/_matrix/client/v3/profile/%40alice%3Aexample.org/displayname";
const UPLOAD_PATH: &str = "/_matrix/media/v3/upload";
const METADATA_URL: &str = "https://169.254.169.254/latest/meta-data/iam/credentials";

/// Accepts `good-token` as alice.
struct StubIdentityProvider;

#[async_trait]
impl IdentityProvider for StubIdentityProvider {
	async fn authenticate(&self, bearer_token: &str) -> Result<CallerIdentity, IdentityProviderError> {
		match bearer_token {
			"good-token" => Ok(CallerIdentity {
				uid: "alice".to_string(),
				display_name: Some("Alice".to_string()),
				photo_url: None,
				email: Some("alice@example.org".to_string()),
			}),
			"metadata-photo-token" => Ok(CallerIdentity {
				uid: "alice".to_string(),
				display_name: Some("Alice".to_string()),
				photo_url: Some(METADATA_URL.to_string()),
				email: None,
			}),
			"flaky-token" => Err(IdentityProviderError::Unavailable("timeout".to_string())),
			_ => Err(IdentityProviderError::Unauthenticated("unknown token".to_string())),
		}
	}
}

#[derive(Default)]
struct CountingCredentialStore {
	fetches: AtomicUsize,
	invalidations: AtomicUsize,
	unavailable: bool,
}

#[async_trait]
impl CredentialStore for CountingCredentialStore {
	async fn admin_token(&self) -> Result<SecretString, CredentialError> {
		self.fetches.fetch_add(1, Ordering::SeqCst);
		if self.unavailable {
			return Err(CredentialError::Missing("not configured".to_string()));
		}
		Ok(SecretString::new("admin-token".to_string()))
	}

	async fn invalidate(&self) {
		self.invalidations.fetch_add(1, Ordering::SeqCst);
	}
}

fn gateway(homeserver: &str, store: Arc<CountingCredentialStore>) -> ProvisioningGateway {
	let config = MatrixConfig::new(homeserver, "example.org", true)
		.unwrap()
		.with_lookup_retry(RetryConfig::none());
	ProvisioningGateway::new(Arc::new(StubIdentityProvider), store, config).unwrap()
}

fn group_request(members: &[&str]) -> GroupRoomRequest {
	GroupRoomRequest {
		group_id: "g1".to_string(),
		group_name: "Rowing Club".to_string(),
		topic: None,
		member_uids: members.iter().map(|m| m.to_string()).collect(),
	}
}

async fn body_json_of(response: axum::response::Response) -> Value {
	let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
	serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn resolve_identity_maps_caller() {
	let store = Arc::new(CountingCredentialStore::default());
	let gateway = gateway("http://127.0.0.1:9", store.clone());

	let identity = gateway.resolve_identity(Some("good-token")).await.unwrap();

	assert_eq!(identity.external_id, "@alice:example.org");
	assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_bearer_is_unauthenticated() {
	let store = Arc::new(CountingCredentialStore::default());
	let gateway = gateway("http://127.0.0.1:9", store.clone());

	let err = gateway
		.ensure_group_room(None, group_request(&["bob"]), &RequestContext::new())
		.await
		.unwrap_err();

	assert_eq!(err.code(), "unauthenticated");
	assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_token_and_provider_outage() {
	let gateway = gateway("http://127.0.0.1:9", Arc::new(CountingCredentialStore::default()));

	let err = gateway.resolve_identity(Some("stolen")).await.unwrap_err();
	assert_eq!(err.code(), "unauthenticated");

	let err = gateway.resolve_identity(Some("flaky-token")).await.unwrap_err();
	assert_eq!(err.code(), "identity_provider_unavailable");
}

#[tokio::test]
async fn empty_group_id_is_rejected_before_any_remote_call() {
	let homeserver = MockServer::start().await;
	Mock::given(method("GET"))
		.respond_with(ResponseTemplate::new(500))
		.expect(0)
		.mount(&homeserver)
		.await;
	let store = Arc::new(CountingCredentialStore::default());
	let gateway = gateway(&homeserver.uri(), store.clone());

	let mut request = group_request(&["bob"]);
	request.group_id = String::new();
	let err = gateway
		.ensure_group_room(Some("good-token"), request, &RequestContext::new())
		.await
		.unwrap_err();

	assert!(matches!(err, ChatApiError::InvalidArgument(_)));
	assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_credential_is_reported() {
	let store = Arc::new(CountingCredentialStore {
		unavailable: true,
		..Default::default()
	});
	let gateway = gateway("http://127.0.0.1:9", store);

	let err = gateway
		.ensure_group_room(Some("good-token"), group_request(&["bob"]), &RequestContext::new())
		.await
		.unwrap_err();

	assert_eq!(err.code(), "credential_unavailable");
	assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn group_room_creator_is_the_caller() {
	let homeserver = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path(ALIAS_PATH))
		.respond_with(ResponseTemplate::new(404).set_body_json(json!({"errcode": "M_NOT_FOUND"})))
		.mount(&homeserver)
		.await;
	Mock::given(method("POST"))
		.and(path(CREATE_PATH))
		.and(header_is("authorization", "Bearer admin-token"))
		.and(body_json(json!({
			"name": "Rowing Club",
			"room_alias_name": "group_g1",
			"topic": "Rowing Club",
			"preset": "private_chat",
			"visibility": "private",
			"invite": ["@alice:example.org", "@bob:example.org"],
			"initial_state": [
				{"type": "m.room.join_rules", "content": {"join_rule": "invite"}},
				{"type": "m.room.history_visibility", "content": {"history_visibility": "invited"}}
			],
			"power_level_content_override": {"users": {"@alice:example.org": 100}}
		})))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"room_id": "!new:example.org"})))
		.expect(1)
		.mount(&homeserver)
		.await;
	let store = Arc::new(CountingCredentialStore::default());
	let gateway = gateway(&homeserver.uri(), store.clone());

	let room = gateway
		.ensure_group_room(
			Some("good-token"),
			group_request(&["alice", "bob"]),
			&RequestContext::new(),
		)
		.await
		.unwrap();

	assert!(room.created);
	assert_eq!(room.room_id, "!new:example.org");
	assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_admin_credential_invalidates_store() {
	let homeserver = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path(ALIAS_PATH))
		.respond_with(ResponseTemplate::new(401).set_body_json(json!({
			"errcode": "M_UNKNOWN_TOKEN",
			"error": "Invalid access token passed."
		})))
		.mount(&homeserver)
		.await;
	let store = Arc::new(CountingCredentialStore::default());
	let gateway = gateway(&homeserver.uri(), store.clone());

	let err = gateway
		.ensure_group_room(Some("good-token"), group_request(&["bob"]), &RequestContext::new())
		.await
		.unwrap_err();

	assert_eq!(err.code(), "homeserver_unauthorized");
	assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
	assert_eq!(store.invalidations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn provision_identity_falls_back_to_caller_attributes() {
	let homeserver = MockServer::start().await;
	Mock::given(method("PUT"))
		.and(path(DISPLAY_NAME_PATH))
		.and(body_json(json!({"displayname": "Alice"})))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
		.expect(1)
		.mount(&homeserver)
		.await;
	let gateway = gateway(&homeserver.uri(), Arc::new(CountingCredentialStore::default()));

	let provisioned = gateway
		.provision_identity(
			Some("good-token"),
			ProfileSyncRequest::default(),
			&RequestContext::new(),
		)
		.await
		.unwrap();

	assert_eq!(provisioned.identity.external_id, "@alice:example.org");
	assert!(provisioned.profile.display_name_updated);
	assert!(!provisioned.profile.avatar_updated);
}

#[tokio::test]
async fn blank_display_name_override_falls_back_to_caller() {
	let homeserver = MockServer::start().await;
	Mock::given(method("PUT"))
		.and(path(DISPLAY_NAME_PATH))
		.and(body_json(json!({"displayname": "Alice"})))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
		.expect(1)
		.mount(&homeserver)
		.await;
	let gateway = gateway(&homeserver.uri(), Arc::new(CountingCredentialStore::default()));

	let provisioned = gateway
		.provision_identity(
			Some("good-token"),
			ProfileSyncRequest {
				display_name: Some("   ".to_string()),
			},
			&RequestContext::new(),
		)
		.await
		.unwrap();

	assert!(provisioned.profile.display_name_updated);
}

#[tokio::test]
async fn internal_photo_url_is_not_rehosted() {
	let homeserver = MockServer::start().await;
	Mock::given(method("PUT"))
		.and(path(DISPLAY_NAME_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
		.mount(&homeserver)
		.await;
	Mock::given(method("POST"))
		.and(path(UPLOAD_PATH))
		.respond_with(
			ResponseTemplate::new(200).set_body_json(json!({"content_uri": "mxc://example.org/leak"})),
		)
		.expect(0)
		.mount(&homeserver)
		.await;
	let gateway = gateway(&homeserver.uri(), Arc::new(CountingCredentialStore::default()));

	let provisioned = gateway
		.provision_identity(
			Some("metadata-photo-token"),
			ProfileSyncRequest::default(),
			&RequestContext::new(),
		)
		.await
		.unwrap();

	assert!(provisioned.profile.display_name_updated);
	assert!(!provisioned.profile.avatar_updated);
	assert!(provisioned.profile.avatar_content_uri.is_none());
	assert!(provisioned.profile.avatar_error.is_some());
}

#[tokio::test]
async fn route_rejects_caller_supplied_avatar_url() {
	let homeserver = MockServer::start().await;
	let store = Arc::new(CountingCredentialStore::default());
	let router = chat_routes(Arc::new(gateway(&homeserver.uri(), store.clone())));

	let response = router
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/api/chat/identity")
				.header(header::AUTHORIZATION, "Bearer good-token")
				.header(header::CONTENT_TYPE, "application/json")
				.body(Body::from(format!("{{\"avatar_url\": \"{METADATA_URL}\"}}")))
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	let body: ErrorBody = serde_json::from_value(body_json_of(response).await).unwrap();
	assert_eq!(body.error.code, "invalid_argument");
	assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
	assert!(homeserver.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn route_requires_bearer() {
	let router = chat_routes(Arc::new(gateway(
		"http://127.0.0.1:9",
		Arc::new(CountingCredentialStore::default()),
	)));

	let response = router
		.oneshot(
			Request::builder()
				.method("GET")
				.uri("/api/chat/identity")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	let body: ErrorBody = serde_json::from_value(body_json_of(response).await).unwrap();
	assert_eq!(body.error.code, "unauthenticated");
}

#[tokio::test]
async fn route_returns_identity() {
	let router = chat_routes(Arc::new(gateway(
		"http://127.0.0.1:9",
		Arc::new(CountingCredentialStore::default()),
	)));

	let response = router
		.oneshot(
			Request::builder()
				.method("GET")
				.uri("/api/chat/identity")
				.header(header::AUTHORIZATION, "Bearer good-token")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(
		body_json_of(response).await,
		json!({
			"local_uid": "alice",
			"server_domain": "example.org",
			"external_id": "@alice:example.org"
		})
	);
}

#[tokio::test]
async fn route_reports_reused_room_with_200() {
	let homeserver = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path(ALIAS_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({"room_id": "!xyz:example.org"})))
		.mount(&homeserver)
		.await;
	Mock::given(method("POST"))
		.and(path(INVITE_PATH))
		.respond_with(ResponseTemplate::new(403).set_body_json(json!({"errcode": "M_FORBIDDEN"})))
		.mount(&homeserver)
		.await;
	let router = chat_routes(Arc::new(gateway(
		&homeserver.uri(),
		Arc::new(CountingCredentialStore::default()),
	)));

	let response = router
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/api/chat/group-rooms")
				.header(header::AUTHORIZATION, "Bearer good-token")
				.header(header::CONTENT_TYPE, "application/json")
				.body(Body::from(
					json!({"group_id": "g1", "group_name": "Rowing Club", "member_uids": ["bob"]})
						.to_string(),
				))
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	let body = body_json_of(response).await;
	assert_eq!(body["room_id"], "!xyz:example.org");
	assert_eq!(body["alias"], "#group_g1:example.org");
	assert_eq!(body["created"], false);
	assert_eq!(body["invites"][0]["status"], "already_member");
}

#[tokio::test]
async fn route_rejects_malformed_body() {
	let router = chat_routes(Arc::new(gateway(
		"http://127.0.0.1:9",
		Arc::new(CountingCredentialStore::default()),
	)));

	let response = router
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/api/chat/group-rooms")
				.header(header::AUTHORIZATION, "Bearer good-token")
				.header(header::CONTENT_TYPE, "application/json")
				.body(Body::from("{\"group_id\": 7}"))
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	let body: ErrorBody = serde_json::from_value(body_json_of(response).await).unwrap();
	assert_eq!(body.error.code, "invalid_argument");
}

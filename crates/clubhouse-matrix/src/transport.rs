// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Authenticated access to the homeserver's client-server API.

use bytes::Bytes;
use clubhouse_common_config::SecretString;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::MatrixConfig;
use crate::context::RequestContext;
use crate::error::{MatrixError, Result};

pub(crate) const CLIENT_API: &str = "/_matrix/client/v3";
pub(crate) const MEDIA_API: &str = "/_matrix/media/v3";

const MAX_ERROR_BODY: usize = 512;

/// Standard Matrix error body.
#[derive(Debug, Deserialize)]
struct MatrixErrorBody {
	errcode: Option<String>,
	error: Option<String>,
}

/// Sends requests to one homeserver with the admin credential attached.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Clone)]
pub struct HomeserverClient {
	http: Client,
	base_url: String,
	access_token: SecretString,
}

impl std::fmt::Debug for HomeserverClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HomeserverClient")
			.field("base_url", &self.base_url)
			.field("access_token", &self.access_token)
			.finish()
	}
}

impl HomeserverClient {
	pub fn new(http: Client, config: &MatrixConfig, access_token: SecretString) -> Self {
		Self {
			http,
			base_url: config.base_url().to_string(),
			access_token,
		}
	}

	pub(crate) fn url(&self, path: &str) -> String {
		format!("{}{}", self.base_url, path)
	}

	fn request(&self, method: Method, path: &str) -> RequestBuilder {
		self
			.http
			.request(method, self.url(path))
			.header(AUTHORIZATION, format!("Bearer {}", self.access_token.expose()))
	}

	pub(crate) async fn get_json<T>(&self, path: &str, ctx: &RequestContext) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let response = self.execute(self.request(Method::GET, path), ctx).await?;
		ctx.run(decode(response)).await
	}

	pub(crate) async fn send_json<B, T>(
		&self,
		method: Method,
		path: &str,
		body: &B,
		ctx: &RequestContext,
	) -> Result<T>
	where
		B: Serialize + ?Sized,
		T: DeserializeOwned,
	{
		let response = self
			.execute(self.request(method, path).json(body), ctx)
			.await?;
		ctx.run(decode(response)).await
	}

	pub(crate) async fn post_bytes<T>(
		&self,
		path: &str,
		content_type: &str,
		body: Bytes,
		ctx: &RequestContext,
	) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let request = self
			.request(Method::POST, path)
			.header(CONTENT_TYPE, content_type)
			.body(body);
		let response = self.execute(request, ctx).await?;
		ctx.run(decode(response)).await
	}

	async fn execute(&self, request: RequestBuilder, ctx: &RequestContext) -> Result<Response> {
		let response = ctx
			.run(async { request.send().await.map_err(MatrixError::from) })
			.await?;
		let status = response.status();
		debug!(status = status.as_u16(), url = %response.url().path(), "homeserver response");

		if status.is_success() {
			return Ok(response);
		}
		Err(error_from_response(response, ctx).await)
	}
}

/// Turn a non-success homeserver response into [`MatrixError::Api`], or
/// [`MatrixError::Unauthorized`] for 401.
pub(crate) async fn error_from_response(response: Response, ctx: &RequestContext) -> MatrixError {
	let status = response.status().as_u16();
	let body = match ctx
		.run(async { response.text().await.map_err(MatrixError::from) })
		.await
	{
		Ok(body) => body,
		Err(e) if e.is_interrupted() => return e,
		Err(_) => String::new(),
	};
	trace!(status, body = %body, "homeserver error body");

	let parsed = serde_json::from_str::<MatrixErrorBody>(&body).ok();
	let errcode = parsed.as_ref().and_then(|b| b.errcode.clone());
	let message = if body.is_empty() {
		format!("HTTP {status}")
	} else {
		format!("HTTP {status}: {}", truncate(&body, MAX_ERROR_BODY))
	};

	if status == 401 {
		let reason = parsed
			.and_then(|b| b.error)
			.unwrap_or_else(|| message.clone());
		return MatrixError::Unauthorized(match errcode {
			Some(code) => format!("{code}: {reason}"),
			None => reason,
		});
	}

	MatrixError::Api {
		status,
		errcode,
		message,
		body,
	}
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
	let bytes = response.bytes().await?;
	serde_json::from_slice(&bytes)
		.map_err(|e| MatrixError::InvalidResponse(format!("JSON parse error: {e}")))
}

fn truncate(body: &str, max: usize) -> String {
	let cleaned: String = body
		.chars()
		.filter(|c| !c.is_control() || *c == ' ')
		.take(max)
		.collect();
	if body.chars().count() > max {
		format!("{cleaned}...")
	} else {
		cleaned
	}
}

/// Percent-encode one path segment (`#`, `!`, `@`, `:` and friends).
pub(crate) fn segment(value: &str) -> String {
	urlencoding::encode(value).into_owned()
}

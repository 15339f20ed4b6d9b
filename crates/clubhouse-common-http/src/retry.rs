// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Retry with exponential backoff.
//!
//! Only wrap requests that are safe to repeat. Room creation, for example,
//! must never go through [`retry`].

use std::future::Future;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Total attempts including the first one. `1` disables retrying.
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(200),
			max_delay: Duration::from_secs(5),
			backoff_factor: 2.0,
			jitter: true,
		}
	}
}

impl RetryConfig {
	/// Single attempt, no backoff.
	pub fn none() -> Self {
		Self {
			max_attempts: 1,
			..Self::default()
		}
	}

	fn delay_for(&self, retry_index: u32) -> Duration {
		let exponential =
			self.base_delay.as_secs_f64() * self.backoff_factor.powi(retry_index as i32);
		let capped = exponential.min(self.max_delay.as_secs_f64());
		let delay = if self.jitter {
			capped * (0.5 + fastrand::f64())
		} else {
			capped
		};
		Duration::from_secs_f64(delay)
	}
}

pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

/// 408, 429 and the 5xx gateway family.
pub fn is_retryable_status(status: u16) -> bool {
	matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() {
			return true;
		}
		self
			.status()
			.map(|s| is_retryable_status(s.as_u16()))
			.unwrap_or(false)
	}
}

/// Run `f` until it succeeds, returns a non-retryable error, or
/// `cfg.max_attempts` is reached. `operation` labels the log lines.
pub async fn retry<F, Fut, T, E>(cfg: &RetryConfig, operation: &str, mut f: F) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: RetryableError + std::fmt::Display,
{
	let max_attempts = cfg.max_attempts.max(1);
	let mut attempt = 0;

	loop {
		attempt += 1;
		let err = match f().await {
			Ok(value) => return Ok(value),
			Err(err) => err,
		};

		if !err.is_retryable() || attempt >= max_attempts {
			if attempt > 1 {
				warn!(operation, attempt, error = %err, "giving up after retries");
			}
			return Err(err);
		}

		let delay = cfg.delay_for(attempt - 1);
		warn!(
			operation,
			attempt,
			max_attempts,
			delay_ms = delay.as_millis() as u64,
			error = %err,
			"retrying after transient error"
		);
		tokio::time::sleep(delay).await;
	}
}

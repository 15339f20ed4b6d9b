// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Per-request cancellation and deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{MatrixError, Result};

/// Carries the caller's cancellation signal and deadline into every
/// homeserver round trip.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
	cancel: CancellationToken,
	deadline: Option<Instant>,
}

impl RequestContext {
	/// No deadline; cancelled only through [`RequestContext::cancel`].
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_cancellation(cancel: CancellationToken) -> Self {
		Self {
			cancel,
			deadline: None,
		}
	}

	/// Set the deadline to `timeout` from now. An earlier existing deadline
	/// is kept.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		let candidate = Instant::now() + timeout;
		self.deadline = Some(match self.deadline {
			Some(existing) if existing < candidate => existing,
			_ => candidate,
		});
		self
	}

	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Fail fast if the request is already cancelled or past its deadline.
	pub fn check(&self) -> Result<()> {
		if self.cancel.is_cancelled() {
			return Err(MatrixError::Cancelled);
		}
		if matches!(self.deadline, Some(d) if Instant::now() >= d) {
			return Err(MatrixError::DeadlineExceeded);
		}
		Ok(())
	}

	/// Drive `fut` unless the request is cancelled or the deadline passes
	/// first. Cancellation wins ties.
	pub async fn run<F, T>(&self, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		self.check()?;

		let deadline = async {
			match self.deadline {
				Some(at) => tokio::time::sleep_until(at).await,
				None => std::future::pending::<()>().await,
			}
		};

		tokio::select! {
			biased;
			_ = self.cancel.cancelled() => Err(MatrixError::Cancelled),
			_ = deadline => Err(MatrixError::DeadlineExceeded),
			result = fut => result,
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod http;
mod identity;
mod logging;
mod matrix;

pub use http::{HttpConfig, HttpConfigLayer};
pub use identity::{IdentityConfig, IdentityConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use matrix::{MatrixSettings, MatrixSettingsLayer};

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Clubhouse chat provisioning server binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use clubhouse_server_config::{LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Clubhouse server - maps app users onto Matrix and provisions group rooms.
#[derive(Parser, Debug)]
#[command(name = "clubhouse-server", about = "Clubhouse chat provisioning server", version)]
struct Args {
	/// Config file path (defaults to /etc/clubhouse/server.toml)
	#[arg(long, env = "CLUBHOUSE_SERVER_CONFIG")]
	config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => clubhouse_server_config::load_config_with_file(path)?,
		None => clubhouse_server_config::load_config()?,
	};

	init_tracing(&config.logging);

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		homeserver = %config.matrix.homeserver_url,
		"starting clubhouse-server"
	);

	let gateway = Arc::new(clubhouse_server::build_gateway(&config)?);
	let app = clubhouse_server::create_router(gateway);

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);
	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	tracing::info!("Server shutdown complete");
	Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
	let registry = tracing_subscriber::registry().with(
		tracing_subscriber::EnvFilter::try_from_default_env()
			.unwrap_or_else(|_| logging.level.clone().into()),
	);

	match logging.format {
		LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}

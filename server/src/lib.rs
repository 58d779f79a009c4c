//! Domain server: the settings and permissions surface over HTTP
//!
//! Serves the settings read and write endpoints on top of the settings
//! context and rebuilds that context from disk whenever a settings write
//! asks for a restart.

pub mod auth;
pub mod config;
pub mod handler;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use domain_settings_core::{App, AppBuilder};
use domain_settings_directory_adapter_http::HttpGroupDirectory;
use domain_settings_types::directory_adapter::GroupDirectory;
use domain_settings_types::prelude::*;

pub use config::Config;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Load the settings context described by `config`
pub async fn build_app(config: &Config) -> DsResult<App> {
	let mut builder = AppBuilder::from_opts(config.app_opts());

	if let Some(url) = &config.directory_url {
		let directory = HttpGroupDirectory::new(url, config.directory_token.as_deref())
			.map_err(|e| {
				error!("FATAL: Invalid group directory configuration: {}", e);
				e
			})?
			.with_timeout(Duration::from_secs(config.directory_timeout_secs.max(1)));
		if !directory.is_authenticated() {
			warn!("No DIRECTORY_TOKEN set, group permissions stay unresolved");
		}
		builder.directory_adapter(Arc::new(directory));
	}

	builder.build().await
}

/// Serve until `shutdown` fires, rebuilding the context after every restart request
pub async fn run(config: &Config, shutdown: CancellationToken) -> DsResult<()> {
	info!("Domain server V{}", VERSION);

	loop {
		let app = build_app(config).await?;
		let listener = tokio::net::TcpListener::bind(&*app.opts.listen).await.map_err(|e| {
			error!("FATAL: Cannot listen on {}: {}", app.opts.listen, e);
			Error::Io(e)
		})?;
		info!("Listening on HTTP {}", app.opts.listen);

		let restart = app.restart.clone();
		let stop = shutdown.clone();
		axum::serve(listener, routes::init(app.clone()))
			.with_graceful_shutdown(async move {
				tokio::select! {
					() = restart.cancelled() => {}
					() = stop.cancelled() => {}
				}
			})
			.await?;

		// stops the directory sweep of this context
		app.restart.cancel();
		if shutdown.is_cancelled() {
			info!("Shutting down");
			return Ok(());
		}
		info!("Restarting to apply new settings");
	}
}

// vim: ts=4

use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use domain_server::Config;
use domain_settings_types::prelude::*;

#[tokio::main]
async fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();

	let config = Config::from_env();
	info!("Settings description: {}", config.settings_description.display());

	let shutdown = CancellationToken::new();
	{
		let shutdown = shutdown.clone();
		tokio::spawn(async move {
			if let Err(e) = tokio::signal::ctrl_c().await {
				warn!("Cannot listen for Ctrl-C: {}", e);
				return;
			}
			shutdown.cancel();
		});
	}

	match domain_server::run(&config, shutdown).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("FATAL: {}", e);
			ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
		}
	}
}

// vim: ts=4

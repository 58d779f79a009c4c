//! Server configuration from the environment

use std::path::PathBuf;
use std::time::Duration;

use domain_settings_core::AppBuilderOpts;
use domain_settings_types::prelude::*;

#[derive(Debug, Clone)]
pub struct Config {
	pub listen: String,
	pub data_dir: PathBuf,
	pub user_config: PathBuf,
	pub master_config: Option<PathBuf>,
	pub settings_description: PathBuf,
	pub directory_url: Option<String>,
	pub directory_token: Option<String>,
	pub directory_timeout_secs: u64,
	pub group_stale_secs: i64,
	pub group_sweep_secs: u64,
	pub restart_delay_ms: u64,
}

impl Config {
	pub fn from_env() -> Self {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Build the configuration from any variable source; unset and empty are the same
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
		let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

		let data_dir = PathBuf::from(var("DATA_DIR").unwrap_or_else(|| "./data".to_string()));
		let user_config = var("USER_CONFIG").map_or_else(|| data_dir.join("config.json"), PathBuf::from);

		Config {
			listen: var("LISTEN").unwrap_or_else(|| "127.0.0.1:40100".to_string()),
			user_config,
			data_dir,
			master_config: var("MASTER_CONFIG").map(PathBuf::from),
			settings_description: PathBuf::from(
				var("SETTINGS_DESCRIPTION")
					.unwrap_or_else(|| "./resources/describe-settings.json".to_string()),
			),
			directory_url: var("DIRECTORY_URL"),
			directory_token: var("DIRECTORY_TOKEN"),
			directory_timeout_secs: parse_number("DIRECTORY_TIMEOUT_SECS", var("DIRECTORY_TIMEOUT_SECS"), 10),
			group_stale_secs: parse_number("GROUP_STALE_SECS", var("GROUP_STALE_SECS"), 600),
			group_sweep_secs: parse_number("GROUP_SWEEP_SECS", var("GROUP_SWEEP_SECS"), 60),
			restart_delay_ms: parse_number("RESTART_DELAY_MS", var("RESTART_DELAY_MS"), 1000),
		}
	}

	pub fn app_opts(&self) -> AppBuilderOpts {
		AppBuilderOpts {
			listen: self.listen.as_str().into(),
			user_config: self.user_config.clone().into(),
			master_config: self.master_config.clone().map(Into::into),
			settings_description: self.settings_description.clone().into(),
			group_stale_secs: self.group_stale_secs,
			group_sweep_period: Duration::from_secs(self.group_sweep_secs.max(1)),
			restart_delay: Duration::from_millis(self.restart_delay_ms),
		}
	}
}

fn parse_number<T: std::str::FromStr + std::fmt::Display>(key: &str, value: Option<String>, default: T) -> T {
	let Some(value) = value else {
		return default;
	};
	value.trim().parse().unwrap_or_else(|_| {
		warn!("Invalid {} value {:?}, using {}", key, value, default);
		default
	})
}


// vim: ts=4

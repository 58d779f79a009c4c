//! App state and builder
//!
//! The [`AppState`] is the single owner of the settings context. Handlers and
//! background tasks share it as an [`App`] and serialize every mutation
//! through the settings lock.

use parking_lot::Mutex;
use std::{path::Path, path::PathBuf, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::directory;
use crate::manager::SettingsManager;
use crate::prelude::*;
use crate::update::UpdateOutcome;
use crate::version::VersionStore;
use domain_settings_types::directory_adapter::GroupDirectory;

pub struct AppState {
	pub settings: Mutex<SettingsManager>,
	pub directory: Option<Arc<dyn GroupDirectory>>,
	pub opts: AppBuilderOpts,
	/// Cancelled when the context has to be rebuilt from disk
	pub restart: CancellationToken,
}

pub type App = Arc<AppState>;

#[derive(Debug, Clone)]
pub struct AppBuilderOpts {
	pub listen: Box<str>,
	pub user_config: Box<Path>,
	pub master_config: Option<Box<Path>>,
	pub settings_description: Box<Path>,
	/// Maximum age of a group rank list before it is fetched again
	pub group_stale_secs: i64,
	pub group_sweep_period: Duration,
	pub restart_delay: Duration,
}

impl Default for AppBuilderOpts {
	fn default() -> Self {
		Self {
			listen: "127.0.0.1:40100".into(),
			user_config: PathBuf::from("./data/config.json").into(),
			master_config: None,
			settings_description: PathBuf::from("./resources/describe-settings.json").into(),
			group_stale_secs: 600,
			group_sweep_period: Duration::from_secs(60),
			restart_delay: Duration::from_millis(1000),
		}
	}
}

pub struct AppBuilder {
	opts: AppBuilderOpts,
	directory: Option<Arc<dyn GroupDirectory>>,
}

impl AppBuilder {
	pub fn new() -> Self {
		AppBuilder { opts: AppBuilderOpts::default(), directory: None }
	}

	pub fn from_opts(opts: AppBuilderOpts) -> Self {
		AppBuilder { opts, directory: None }
	}

	// Opts
	pub fn listen(&mut self, listen: impl Into<Box<str>>) -> &mut Self {
		self.opts.listen = listen.into();
		self
	}
	pub fn user_config(&mut self, user_config: impl Into<Box<Path>>) -> &mut Self {
		self.opts.user_config = user_config.into();
		self
	}
	pub fn master_config(&mut self, master_config: impl Into<Box<Path>>) -> &mut Self {
		self.opts.master_config = Some(master_config.into());
		self
	}
	pub fn settings_description(&mut self, settings_description: impl Into<Box<Path>>) -> &mut Self {
		self.opts.settings_description = settings_description.into();
		self
	}
	pub fn group_stale_secs(&mut self, secs: i64) -> &mut Self {
		self.opts.group_stale_secs = secs;
		self
	}
	pub fn group_sweep_period(&mut self, period: Duration) -> &mut Self {
		self.opts.group_sweep_period = period;
		self
	}
	pub fn restart_delay(&mut self, delay: Duration) -> &mut Self {
		self.opts.restart_delay = delay;
		self
	}

	// Adapters
	pub fn directory_adapter(&mut self, directory: Arc<dyn GroupDirectory>) -> &mut Self {
		self.directory = Some(directory);
		self
	}

	/// Load the documents, run pending migrations and start the directory sweep
	pub async fn build(self) -> DsResult<App> {
		let mut manager = SettingsManager::load(
			&self.opts.settings_description,
			self.opts.master_config.as_deref(),
			&self.opts.user_config,
		)
		.map_err(|e| {
			error!("FATAL: Cannot load settings: {}", e);
			e
		})?;

		let versions = VersionStore::beside(&self.opts.user_config);
		let outcome = manager.migrate(&versions)?;
		if outcome.applied.is_empty() {
			debug!("Settings are at version {}", outcome.to);
		} else {
			info!(
				"Migrated settings from version {} to {}: {:?}",
				outcome.from, outcome.to, outcome.applied
			);
		}

		if self.directory.is_none() {
			info!("No group directory configured, group permissions stay unresolved");
		}

		let app: App = Arc::new(AppState {
			settings: Mutex::new(manager),
			directory: self.directory,
			opts: self.opts,
			restart: CancellationToken::new(),
		});

		if app.directory.is_some() {
			directory::trigger_refresh(&app);
			directory::spawn_sweep(app.clone(), app.opts.group_sweep_period, app.restart.child_token());
		}

		Ok(app)
	}
}

impl Default for AppBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl AppState {
	/// Cancel the restart token once the configured delay has passed
	///
	/// The delay lets the response of the triggering request reach the client.
	pub fn schedule_restart(self: &Arc<Self>) {
		let token = self.restart.clone();
		let delay = self.opts.restart_delay;
		info!("Restart scheduled in {:?}", delay);
		tokio::spawn(async move {
			tokio::time::sleep(delay).await;
			token.cancel();
		});
	}

	/// Follow-up of a settings write: restart, or resolve newly named groups
	pub fn after_update(self: &Arc<Self>, outcome: &UpdateOutcome) {
		if outcome.restart_required {
			self.schedule_restart();
		} else {
			directory::trigger_refresh(self);
		}
	}
}

// vim: ts=4

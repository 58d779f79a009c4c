//! Persisted schema version of the user settings document

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::prelude::*;

pub const VERSION_FILE_NAME: &str = "settings-version.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct VersionDocument {
	version: f64,
}

#[derive(Debug, Clone)]
pub struct VersionStore {
	path: PathBuf,
}

impl VersionStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Store living next to the user settings document
	pub fn beside(user_config: &Path) -> Self {
		let dir = user_config.parent().unwrap_or_else(|| Path::new("."));
		Self::new(dir.join(VERSION_FILE_NAME))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Stored version, 0.0 when nothing was recorded yet
	pub fn read(&self) -> DsResult<f64> {
		if !self.path.exists() {
			return Ok(0.0);
		}
		let content = std::fs::read_to_string(&self.path)?;
		let document: VersionDocument = serde_json::from_str(&content).map_err(|e| {
			Error::ConfigError(format!("malformed version file {:?}: {}", self.path, e))
		})?;
		Ok(document.version)
	}

	pub fn write(&self, version: f64) -> DsResult<()> {
		if let Some(parent) = self.path.parent()
			&& !parent.as_os_str().is_empty()
		{
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(&self.path, serde_json::to_string(&VersionDocument { version })?)?;
		debug!("Recorded settings version {} in {:?}", version, self.path);
		Ok(())
	}
}


// vim: ts=4

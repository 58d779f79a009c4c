//! Shared fixtures for the integration tests

#![allow(dead_code)]

use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Initialize a tracing subscriber for tests that want log output
pub fn setup_test_logging() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_max_level(tracing::Level::DEBUG)
		.try_init();
}

/// Settings description at version 1.5
pub fn description() -> Value {
	json!({
		"version": 1.5,
		"settings": [
			{
				"name": "metaverse",
				"label": "Metaverse",
				"assignment-types": [0, 2],
				"settings": [
					{ "name": "id" },
					{ "name": "max_users", "type": "int", "default": 100 }
				]
			},
			{
				"name": "security",
				"label": "Security",
				"settings": [
					{ "name": "http_username" },
					{ "name": "http_password", "type": "password", "value-hidden": true },
					{ "name": "restricted_access", "type": "checkbox", "default": false },
					{ "name": "allowed_users", "type": "table" },
					{ "name": "allowed_editors", "type": "table" },
					{ "name": "editors_are_rezzers", "type": "checkbox", "default": false },
					{ "name": "standard_permissions", "type": "table" },
					{ "name": "permissions", "type": "table" },
					{ "name": "group_permissions", "type": "table" },
					{ "name": "group_forbiddens", "type": "table" }
				]
			},
			{
				"name": "descriptors",
				"settings": [
					{ "name": "weekday_hours", "type": "table" },
					{ "name": "weekend_hours", "type": "table" },
					{ "name": "utc_offset", "type": "double" }
				]
			}
		]
	})
}

/// On-disk layout of one test domain server
pub struct Fixture {
	pub dir: TempDir,
	pub description: PathBuf,
	pub user_config: PathBuf,
}

impl Fixture {
	/// Write the description and, unless it is null, the user document
	pub fn new(user: &Value) -> Self {
		let dir = tempfile::tempdir().unwrap();
		let description = dir.path().join("describe-settings.json");
		let user_config = dir.path().join("config.json");

		write_json(&description, &self::description());
		if !user.is_null() {
			write_json(&user_config, user);
		}
		Fixture { dir, description, user_config }
	}

	pub fn read_user_config(&self) -> Value {
		serde_json::from_str(&std::fs::read_to_string(&self.user_config).unwrap()).unwrap()
	}
}

pub fn write_json(path: &Path, value: &Value) {
	std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

// vim: ts=4

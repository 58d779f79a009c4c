//! Layered settings documents
//!
//! The store holds three JSON maps:
//! - **master**: operator-provided, never written by this process
//! - **user**: mutable, the only document persisted to disk
//! - **merged**: user layered over master, recomputed by [`ConfigStore::remerge`]
//!
//! Key paths are dot-delimited (`"security.http_username"`), each segment
//! indexing into a nested map.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::prelude::*;

pub type ConfigMap = Map<String, Value>;

pub struct ConfigStore {
	master: ConfigMap,
	user: ConfigMap,
	merged: ConfigMap,
	user_path: PathBuf,
}

impl ConfigStore {
	/// Load the master (optional) and user documents from disk
	///
	/// A missing document is an empty map. An unreadable user document is set
	/// aside as `<file>.invalid` so the next persist does not destroy it.
	pub fn load(master_path: Option<&Path>, user_path: impl Into<PathBuf>) -> DsResult<Self> {
		let user_path = user_path.into();

		let master = match master_path {
			Some(path) => match read_document(path) {
				Ok(map) => map,
				Err(Error::Parse) => {
					return Err(Error::ConfigError(format!(
						"master settings document {:?} is not a JSON object",
						path
					)));
				}
				Err(e) => return Err(e),
			},
			None => ConfigMap::new(),
		};

		let user = match read_document(&user_path) {
			Ok(map) => map,
			Err(Error::Parse) => {
				let backup = user_path.with_extension("json.invalid");
				error!(
					"User settings document {:?} is malformed, moving it to {:?} and starting empty",
					user_path, backup
				);
				std::fs::rename(&user_path, &backup)?;
				ConfigMap::new()
			}
			Err(e) => return Err(e),
		};

		info!("Loaded settings from {:?} (master: {:?})", user_path, master_path);
		Ok(Self::from_maps(master, user, user_path))
	}

	pub fn from_maps(master: ConfigMap, user: ConfigMap, user_path: impl Into<PathBuf>) -> Self {
		let mut store = Self { master, user, merged: ConfigMap::new(), user_path: user_path.into() };
		store.remerge();
		store
	}

	pub fn user_path(&self) -> &Path {
		&self.user_path
	}

	/// Merged value at `key_path`
	pub fn get(&self, key_path: &str) -> Option<&Value> {
		value_for_key_path(&self.merged, key_path)
	}

	/// Raw user value at `key_path`, bypassing the merge
	pub fn get_user(&self, key_path: &str) -> Option<&Value> {
		value_for_key_path(&self.user, key_path)
	}

	/// Mutable handle into the user map, creating intermediate maps as needed
	///
	/// A missing leaf is created as `null`. Intermediate values that are not
	/// maps are replaced by empty maps. The merged view is stale until the
	/// next [`ConfigStore::remerge`].
	pub fn get_or_create(&mut self, key_path: &str) -> &mut Value {
		let mut segments = key_path.split('.');
		let first = segments.next().unwrap_or_default();
		let mut current = self.user.entry(first.to_string()).or_insert(Value::Null);
		for segment in segments {
			if !current.is_object() {
				if !current.is_null() {
					warn!(
						"Value below {} is not a map, replacing it while creating {}",
						segment, key_path
					);
				}
				*current = Value::Object(ConfigMap::new());
			}
			current = &mut current[segment];
		}
		current
	}

	pub fn set(&mut self, key_path: &str, value: Value) {
		*self.get_or_create(key_path) = value;
	}

	pub fn remove(&mut self, key_path: &str) -> Option<Value> {
		match key_path.rsplit_once('.') {
			None => self.user.remove(key_path),
			Some((parent, leaf)) => {
				value_for_key_path_mut(&mut self.user, parent)?.as_object_mut()?.remove(leaf)
			}
		}
	}

	/// Operator-enforced values the user document cannot change
	pub fn locked(&self) -> &ConfigMap {
		&self.master
	}

	pub fn user(&self) -> &ConfigMap {
		&self.user
	}

	pub fn user_mut(&mut self) -> &mut ConfigMap {
		&mut self.user
	}

	pub fn merged(&self) -> &ConfigMap {
		&self.merged
	}

	/// Recompute the merged view: user wins at every key path, maps merge recursively
	pub fn remerge(&mut self) {
		let mut merged = self.master.clone();
		merge_into(&mut merged, &self.user);
		self.merged = merged;
	}

	/// Write the user map to its document, creating parent directories if absent
	pub fn persist(&self) -> DsResult<()> {
		if let Some(parent) = self.user_path.parent()
			&& !parent.as_os_str().is_empty()
		{
			std::fs::create_dir_all(parent)?;
		}
		let content = serde_json::to_string_pretty(&self.user)?;
		std::fs::write(&self.user_path, content)?;
		debug!("Persisted user settings to {:?}", self.user_path);
		Ok(())
	}

	/// Persist and remerge. A failed write is logged; memory stays authoritative.
	pub fn commit(&mut self) {
		if let Err(e) = self.persist() {
			error!("CRITICAL: could not persist settings to {:?}: {}", self.user_path, e);
		}
		self.remerge();
	}
}

fn read_document(path: &Path) -> DsResult<ConfigMap> {
	if !path.exists() {
		warn!("Settings document not found: {:?}", path);
		return Ok(ConfigMap::new());
	}
	let content = std::fs::read_to_string(path)?;
	match serde_json::from_str::<Value>(&content) {
		Ok(Value::Object(map)) => Ok(map),
		Ok(_) => Err(Error::Parse),
		Err(e) => {
			warn!("Failed to parse settings document {:?}: {}", path, e);
			Err(Error::Parse)
		}
	}
}

pub fn value_for_key_path<'a>(map: &'a ConfigMap, key_path: &str) -> Option<&'a Value> {
	let mut segments = key_path.split('.');
	let mut current = map.get(segments.next()?)?;
	for segment in segments {
		current = current.as_object()?.get(segment)?;
	}
	Some(current)
}

fn value_for_key_path_mut<'a>(map: &'a mut ConfigMap, key_path: &str) -> Option<&'a mut Value> {
	let mut segments = key_path.split('.');
	let mut current = map.get_mut(segments.next()?)?;
	for segment in segments {
		current = current.as_object_mut()?.get_mut(segment)?;
	}
	Some(current)
}

fn merge_into(base: &mut ConfigMap, overlay: &ConfigMap) {
	for (key, overlay_value) in overlay {
		if let (Some(Value::Object(base_map)), Value::Object(overlay_map)) =
			(base.get_mut(key), overlay_value)
		{
			merge_into(base_map, overlay_map);
			continue;
		}
		base.insert(key.clone(), overlay_value.clone());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn map(value: Value) -> ConfigMap {
		match value {
			Value::Object(map) => map,
			_ => ConfigMap::new(),
		}
	}

	#[test]
	fn test_user_overrides_master() {
		let store = ConfigStore::from_maps(
			map(json!({"metaverse": {"id": "master-id", "automatic_networking": "full"}})),
			map(json!({"metaverse": {"id": "user-id"}})),
			"/nonexistent/config.json",
		);
		assert_eq!(store.get("metaverse.id"), Some(&json!("user-id")));
		assert_eq!(store.get("metaverse.automatic_networking"), Some(&json!("full")));
		assert_eq!(store.locked()["metaverse"]["id"], json!("master-id"));
	}

	#[test]
	fn test_set_then_remerge() {
		let mut store = ConfigStore::from_maps(ConfigMap::new(), ConfigMap::new(), "config.json");
		store.set("security.http_username", json!("admin"));
		assert_eq!(store.get("security.http_username"), None);
		store.remerge();
		assert_eq!(store.get("security.http_username"), Some(&json!("admin")));
		assert_eq!(store.get_user("security.http_username"), Some(&json!("admin")));
	}

	#[test]
	fn test_get_or_create_replaces_non_map_intermediate() {
		let mut store = ConfigStore::from_maps(
			ConfigMap::new(),
			map(json!({"descriptors": "broken"})),
			"config.json",
		);
		*store.get_or_create("descriptors.utc_offset") = json!(2.0);
		assert_eq!(store.user()["descriptors"], json!({"utc_offset": 2.0}));
	}

	#[test]
	fn test_get_or_create_creates_null_leaf() {
		let mut store = ConfigStore::from_maps(ConfigMap::new(), ConfigMap::new(), "config.json");
		assert!(store.get_or_create("a.b.c").is_null());
		assert_eq!(store.user()["a"], json!({"b": {"c": null}}));
	}

	#[test]
	fn test_remove() {
		let mut store = ConfigStore::from_maps(
			ConfigMap::new(),
			map(json!({"entity_server_settings": {"persistFilename": "a", "other": 1}})),
			"config.json",
		);
		assert_eq!(store.remove("entity_server_settings.persistFilename"), Some(json!("a")));
		assert_eq!(store.remove("entity_server_settings.missing"), None);
		assert_eq!(store.remove("missing.path"), None);
		assert_eq!(store.user()["entity_server_settings"], json!({"other": 1}));
	}

	#[test]
	fn test_persist_creates_directories_and_reloads() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("config.json");
		let mut store = ConfigStore::load(None, &path).unwrap();
		store.set("metaverse.id", json!("abc"));
		store.persist().unwrap();

		let reloaded = ConfigStore::load(None, &path).unwrap();
		assert_eq!(reloaded.get("metaverse.id"), Some(&json!("abc")));
	}

	#[test]
	fn test_commit_survives_write_failure() {
		let dir = tempfile::tempdir().unwrap();
		let blocker = dir.path().join("blocker");
		std::fs::write(&blocker, "").unwrap();

		let mut store =
			ConfigStore::from_maps(ConfigMap::new(), ConfigMap::new(), blocker.join("config.json"));
		store.set("a", json!(1));
		store.commit();
		assert_eq!(store.get("a"), Some(&json!(1)));
		assert!(store.persist().is_err());
	}

	#[test]
	fn test_malformed_user_document_is_set_aside() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.json");
		std::fs::write(&path, "{ not json").unwrap();

		let store = ConfigStore::load(None, &path).unwrap();
		assert!(store.user().is_empty());
		assert!(dir.path().join("config.json.invalid").exists());
	}

	#[test]
	fn test_scalar_user_value_replaces_master_map() {
		let store = ConfigStore::from_maps(
			map(json!({"paths": {"/": {"viewpoint": "/0,0,0"}}})),
			map(json!({"paths": []})),
			"config.json",
		);
		assert_eq!(store.get("paths"), Some(&json!([])));
	}
}

// vim: ts=4

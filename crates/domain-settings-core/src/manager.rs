//! Settings manager: the single owner of the store, schema and permissions

use serde_json::Value;
use std::path::Path;
use uuid::Uuid;

use crate::config_store::{ConfigMap, ConfigStore};
use crate::hasher;
use crate::migration::{self, HTTP_PASSWORD, MigrationOutcome};
use crate::permissions::{PermissionsRegistry, sort_permission_lists};
use crate::prelude::*;
use crate::response::{self, FullSettingsResponse};
use crate::schema::SettingsSchema;
use crate::update::{self, UpdateOutcome};
use crate::version::VersionStore;
use domain_settings_types::directory_adapter::GroupRank;

pub const HTTP_USERNAME: &str = "security.http_username";
const DESCRIPTORS: &str = "descriptors";

pub struct SettingsManager {
	store: ConfigStore,
	schema: SettingsSchema,
	registry: PermissionsRegistry,
}

impl SettingsManager {
	pub fn new(store: ConfigStore, schema: SettingsSchema) -> Self {
		Self { store, schema, registry: PermissionsRegistry::new() }
	}

	/// Load the description and both settings documents
	///
	/// A missing or malformed description is a [`Error::SchemaError`].
	pub fn load(description: &Path, master: Option<&Path>, user: &Path) -> DsResult<Self> {
		let schema = SettingsSchema::load(description)?;
		let store = ConfigStore::load(master, user)?;
		Ok(Self::new(store, schema))
	}

	/// Run pending migrations and unpack the permission tables
	pub fn migrate(&mut self, versions: &VersionStore) -> DsResult<MigrationOutcome> {
		migration::run(&mut self.store, &self.schema, &mut self.registry, versions)
	}

	pub fn store(&self) -> &ConfigStore {
		&self.store
	}

	pub fn schema(&self) -> &SettingsSchema {
		&self.schema
	}

	pub fn registry(&self) -> &PermissionsRegistry {
		&self.registry
	}

	pub fn registry_mut(&mut self) -> &mut PermissionsRegistry {
		&mut self.registry
	}

	pub fn value_or_default(&self, key_path: &str) -> Option<&Value> {
		self.schema.value_or_default(&self.store, key_path)
	}

	/// The `descriptors` section, with missing business hours filled in first
	pub fn descriptors_map(&mut self) -> ConfigMap {
		if migration::validate_descriptors(&mut self.store) {
			self.store.commit();
		}
		self.store.get(DESCRIPTORS).and_then(Value::as_object).cloned().unwrap_or_default()
	}

	// Reads
	//*******

	pub fn values_for_type(&self, assignment_type: i64) -> ConfigMap {
		response::values_for_type(&self.store, &self.schema, assignment_type)
	}

	pub fn full_response(&self) -> FullSettingsResponse {
		response::full_response(&self.store, &self.schema)
	}

	// Writes
	//********

	/// Apply a posted settings document and persist it
	///
	/// Updates that need no restart re-derive the permission tables right away.
	pub fn apply_update(&mut self, document: &ConfigMap) -> UpdateOutcome {
		let outcome = update::apply_update(&mut self.store, &self.schema, document);
		sort_permission_lists(&mut self.store);
		self.store.commit();

		if !outcome.restart_required {
			self.registry.unpack(&mut self.store);
		}
		outcome
	}

	/// Bind a group name to its directory ID, repacking when table entries changed
	pub fn apply_group_id(&mut self, name: &str, group_id: Uuid) -> bool {
		let changed = self.registry.set_group_id(name, group_id);
		if changed {
			self.registry.pack_all(&mut self.store);
		}
		changed
	}

	pub fn apply_group_ranks(&mut self, group_id: Uuid, ranks: &[GroupRank]) -> bool {
		let changed = self.registry.apply_group_ranks(group_id, ranks);
		if changed {
			self.registry.pack_all(&mut self.store);
		}
		changed
	}

	// HTTP authentication
	//*********************

	/// Whether the settings surface is protected by a username/password pair
	pub fn authentication_required(&self) -> bool {
		self.store.get(HTTP_USERNAME).and_then(Value::as_str).is_some_and(|u| !u.is_empty())
	}

	pub fn verify_credentials(&self, username: &str, password: &str) -> bool {
		let Some(expected_user) = self.store.get(HTTP_USERNAME).and_then(Value::as_str) else {
			return false;
		};
		let expected_digest = self.store.get(HTTP_PASSWORD).and_then(Value::as_str).unwrap_or_default();
		expected_user == username && expected_digest == hasher::password_digest(password)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn manager(user: Value) -> (tempfile::TempDir, SettingsManager) {
		let dir = tempfile::tempdir().unwrap();
		let schema = SettingsSchema::from_value(json!({
			"version": 1.5,
			"settings": [
				{
					"name": "security",
					"settings": [
						{ "name": "http_username" },
						{ "name": "http_password", "type": "password" },
						{ "name": "restricted_access", "type": "checkbox", "default": false },
						{ "name": "standard_permissions", "type": "table" }
					]
				}
			]
		}))
		.unwrap();
		let user = match user {
			Value::Object(map) => map,
			_ => ConfigMap::new(),
		};
		let store = ConfigStore::from_maps(ConfigMap::new(), user, dir.path().join("config.json"));
		(dir, SettingsManager::new(store, schema))
	}

	#[test]
	fn test_credentials() {
		let (_dir, mut manager) = manager(json!({}));
		assert!(!manager.authentication_required());

		let outcome = manager.apply_update(
			&serde_json::from_value(json!({"security": {"http_username": "admin", "http_password": "pw"}}))
				.unwrap(),
		);
		assert!(!outcome.restart_required);
		assert!(manager.authentication_required());
		assert!(manager.verify_credentials("admin", "pw"));
		assert!(!manager.verify_credentials("admin", "wrong"));
		assert!(!manager.verify_credentials("root", "pw"));
	}

	#[test]
	fn test_hex_shaped_password_still_verifies() {
		let (_dir, mut manager) = manager(json!({}));
		let password = "a".repeat(64);
		manager.apply_update(
			&serde_json::from_value(json!({"security": {"http_username": "admin", "http_password": password}}))
				.unwrap(),
		);
		assert!(manager.verify_credentials("admin", &password));
	}

	#[test]
	fn test_security_update_unpacks_permissions() {
		let (dir, mut manager) = manager(json!({}));
		manager.apply_update(
			&serde_json::from_value(json!({
				"security": {
					"standard_permissions": [ { "permissions_id": "anonymous", "id_can_connect": true } ]
				}
			}))
			.unwrap(),
		);
		let anonymous = manager.registry().effective_standard(
			&domain_settings_types::permissions::StandardRole::Anonymous.key(),
		);
		assert!(anonymous.contains(domain_settings_types::permissions::PermissionSet::CONNECT));
		assert!(dir.path().join("config.json").exists());
	}

	#[test]
	fn test_value_or_default() {
		let (_dir, defaults) = manager(json!({}));
		assert_eq!(defaults.value_or_default("security.restricted_access"), Some(&json!(false)));
		assert_eq!(defaults.value_or_default("security.http_username"), None);
		assert_eq!(defaults.value_or_default("metaverse.id"), None);

		let (_dir, mut manager) = self::manager(json!({}));
		manager.apply_update(&serde_json::from_value(json!({"security": {"restricted_access": true}})).unwrap());
		assert_eq!(manager.value_or_default("security.restricted_access"), Some(&json!(true)));
	}

	#[test]
	fn test_descriptors_map_is_filled() {
		let (_dir, mut manager) = manager(json!({}));
		let descriptors = manager.descriptors_map();
		assert!(descriptors.contains_key("weekday_hours"));
		assert!(descriptors.contains_key("weekend_hours"));
		assert!(descriptors["utc_offset"].is_number());
	}
}

// vim: ts=4

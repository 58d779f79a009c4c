//! Settings description (schema)
//!
//! Loaded once at startup from the description document and read-only
//! afterwards. The document has the shape:
//!
//! ```json
//! { "version": 2.4, "settings": [ { "name": "security", "settings": [ ... ] } ] }
//! ```
//!
//! A group without a `name` holds root-level settings.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::config_store::ConfigStore;
use crate::prelude::*;

/// Declared type of a setting, as far as update coercion is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingType {
	Double,
	Int,
	/// Stored as a SHA-256 hex digest
	Password,
	/// Strings, checkboxes, tables and anything else
	Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingDescriptor {
	#[serde(default)]
	pub name: String,
	#[serde(rename = "type", default)]
	pub kind: Option<String>,
	#[serde(default)]
	pub default: Option<Value>,
	#[serde(rename = "value-hidden", default)]
	pub value_hidden: bool,
	#[serde(rename = "assignment-types", default)]
	pub assignment_types: Vec<i64>,
	/// Row descriptors of table settings
	#[serde(default)]
	pub columns: Vec<SettingDescriptor>,
}

impl SettingDescriptor {
	pub fn setting_type(&self) -> SettingType {
		match self.kind.as_deref() {
			Some("double") => SettingType::Double,
			Some("int") => SettingType::Int,
			Some("password") => SettingType::Password,
			_ => SettingType::Other,
		}
	}

	pub fn column(&self, name: &str) -> Option<&SettingDescriptor> {
		self.columns.iter().find(|column| column.name == name)
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsGroup {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub label: Option<String>,
	#[serde(rename = "assignment-types", default)]
	pub assignment_types: Vec<i64>,
	#[serde(default)]
	pub settings: Vec<SettingDescriptor>,
}

impl SettingsGroup {
	pub fn setting(&self, name: &str) -> Option<&SettingDescriptor> {
		self.settings.iter().find(|setting| setting.name == name)
	}

	pub fn is_root(&self) -> bool {
		self.name.is_none()
	}
}

#[derive(Debug, Deserialize)]
struct DescriptionDocument {
	version: f64,
	settings: Value,
}

#[derive(Debug)]
pub struct SettingsSchema {
	version: f64,
	groups: Vec<SettingsGroup>,
	/// Untouched `settings` array, served as `descriptions`
	descriptions: Value,
}

impl SettingsSchema {
	/// Load the description document. Every failure is a [`Error::SchemaError`].
	pub fn load(path: &Path) -> DsResult<Self> {
		let content = std::fs::read_to_string(path).map_err(|e| {
			Error::SchemaError(format!("cannot read settings description {:?}: {}", path, e))
		})?;
		let document: Value = serde_json::from_str(&content).map_err(|e| {
			Error::SchemaError(format!("settings description {:?} is not valid JSON: {}", path, e))
		})?;
		let schema = Self::from_value(document)?;
		info!(
			"Loaded settings description {:?} (version {}, {} groups)",
			path,
			schema.version,
			schema.groups.len()
		);
		Ok(schema)
	}

	pub fn from_value(document: Value) -> DsResult<Self> {
		let document: DescriptionDocument = serde_json::from_value(document)
			.map_err(|e| Error::SchemaError(format!("malformed settings description: {}", e)))?;
		let groups: Vec<SettingsGroup> = serde_json::from_value(document.settings.clone())
			.map_err(|e| Error::SchemaError(format!("malformed settings groups: {}", e)))?;

		Ok(Self { version: document.version, groups, descriptions: document.settings })
	}

	/// Target schema version for migrations
	pub fn version(&self) -> f64 {
		self.version
	}

	pub fn all_groups(&self) -> &[SettingsGroup] {
		&self.groups
	}

	pub fn descriptions(&self) -> &Value {
		&self.descriptions
	}

	/// Named group lookup (root groups have no name and never match)
	pub fn group(&self, name: &str) -> Option<&SettingsGroup> {
		self.groups.iter().find(|group| group.name.as_deref() == Some(name))
	}

	pub fn root_setting(&self, name: &str) -> Option<&SettingDescriptor> {
		self.groups.iter().filter(|group| group.is_root()).find_map(|group| group.setting(name))
	}

	pub fn descriptor_for(&self, group: &str, setting: &str) -> Option<&SettingDescriptor> {
		self.group(group)?.setting(setting)
	}

	pub fn default_for(&self, group: &str, setting: &str) -> Option<&Value> {
		self.descriptor_for(group, setting)?.default.as_ref()
	}

	/// Schema default for a `group.setting` key path; a path without a dot names a root setting
	pub fn default_for_key_path(&self, key_path: &str) -> Option<&Value> {
		match key_path.split_once('.') {
			Some((group, setting)) => self.default_for(group, setting),
			None => self.root_setting(key_path)?.default.as_ref(),
		}
	}

	/// Merged value at `key_path`, falling back to the schema default
	pub fn value_or_default<'a>(&'a self, store: &'a ConfigStore, key_path: &str) -> Option<&'a Value> {
		store.get(key_path).or_else(|| self.default_for_key_path(key_path))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use domain_settings_types::error::EXIT_MISSING_SETTINGS_DESCRIPTION;
	use serde_json::json;

	fn sample() -> SettingsSchema {
		SettingsSchema::from_value(json!({
			"version": 1.5,
			"settings": [
				{
					"settings": [
						{ "name": "paths", "type": "table", "columns": [ { "name": "viewpoint" } ] }
					]
				},
				{
					"name": "metaverse",
					"label": "Metaverse",
					"assignment-types": [0, 2],
					"settings": [
						{ "name": "id", "default": "" },
						{ "name": "max_users", "type": "int", "default": 100, "assignment-types": [0] }
					]
				},
				{
					"name": "security",
					"settings": [
						{ "name": "http_password", "type": "password", "value-hidden": true }
					]
				}
			]
		}))
		.unwrap()
	}

	#[test]
	fn test_lookup() {
		let schema = sample();
		assert_eq!(schema.version(), 1.5);
		assert_eq!(schema.all_groups().len(), 3);
		assert_eq!(schema.default_for("metaverse", "max_users"), Some(&json!(100)));
		assert_eq!(schema.default_for_key_path("metaverse.id"), Some(&json!("")));
		assert_eq!(schema.default_for("security", "http_password"), None);
		assert!(schema.descriptor_for("security", "missing").is_none());

		let password = schema.descriptor_for("security", "http_password").unwrap();
		assert_eq!(password.setting_type(), SettingType::Password);
		assert!(password.value_hidden);
	}

	#[test]
	fn test_root_settings_are_not_groups() {
		let schema = sample();
		assert!(schema.group("paths").is_none());
		let paths = schema.root_setting("paths").unwrap();
		assert!(paths.column("viewpoint").is_some());
		assert_eq!(paths.setting_type(), SettingType::Other);
	}

	#[test]
	fn test_missing_version_is_schema_error() {
		let err = SettingsSchema::from_value(json!({ "settings": [] })).unwrap_err();
		assert!(matches!(err, Error::SchemaError(_)));
	}

	#[test]
	fn test_missing_file_is_schema_error() {
		let dir = tempfile::tempdir().unwrap();
		let err = SettingsSchema::load(&dir.path().join("describe-settings.json")).unwrap_err();
		assert_eq!(err.exit_code(), EXIT_MISSING_SETTINGS_DESCRIPTION);
	}
}

// vim: ts=4

//! Read views of the settings
//!
//! Values come from the merged map, falling back to the schema default, and
//! to the empty string when there is neither. Hidden settings never appear.

use serde::Serialize;
use serde_json::Value;

use crate::config_store::{ConfigMap, ConfigStore, value_for_key_path};
use crate::schema::{SettingDescriptor, SettingsGroup, SettingsSchema};

/// Response to the authenticated full read
#[derive(Debug, Serialize)]
pub struct FullSettingsResponse {
	pub descriptions: Value,
	pub values: ConfigMap,
	pub locked: ConfigMap,
}

/// Settings visible to one assignment type, grouped like the settings tree
pub fn values_for_type(store: &ConfigStore, schema: &SettingsSchema, assignment_type: i64) -> ConfigMap {
	collect_values(store, schema, |group, setting| {
		effective_types(group, setting).contains(&assignment_type)
	})
}

/// Every non-hidden setting
pub fn all_values(store: &ConfigStore, schema: &SettingsSchema) -> ConfigMap {
	collect_values(store, schema, |_, _| true)
}

pub fn full_response(store: &ConfigStore, schema: &SettingsSchema) -> FullSettingsResponse {
	FullSettingsResponse {
		descriptions: schema.descriptions().clone(),
		values: all_values(store, schema),
		locked: store.locked().clone(),
	}
}

/// A setting without its own assignment types inherits the group's
fn effective_types<'a>(group: &'a SettingsGroup, setting: &'a SettingDescriptor) -> &'a [i64] {
	if setting.assignment_types.is_empty() {
		&group.assignment_types
	} else {
		&setting.assignment_types
	}
}

fn collect_values(
	store: &ConfigStore,
	schema: &SettingsSchema,
	include: impl Fn(&SettingsGroup, &SettingDescriptor) -> bool,
) -> ConfigMap {
	let mut response = ConfigMap::new();

	for group in schema.all_groups() {
		let mut group_response = ConfigMap::new();

		for setting in group.settings.iter().filter(|s| !s.value_hidden && include(group, s)) {
			let stored = match &group.name {
				Some(group_name) => store
					.get(group_name)
					.and_then(Value::as_object)
					.and_then(|map| value_for_key_path(map, &setting.name)),
				None => store.merged().get(&setting.name),
			};
			let value = stored
				.filter(|v| !v.is_null())
				.or(setting.default.as_ref())
				.cloned()
				.unwrap_or_else(|| Value::String(String::new()));

			match group.name {
				Some(_) => group_response.insert(setting.name.clone(), value),
				None => response.insert(setting.name.clone(), value),
			};
		}

		if let Some(group_name) = &group.name
			&& !group_response.is_empty()
		{
			response.insert(group_name.clone(), Value::Object(group_response));
		}
	}

	response
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn schema() -> SettingsSchema {
		SettingsSchema::from_value(json!({
			"version": 2.0,
			"settings": [
				{
					"assignment-types": [1],
					"settings": [ { "name": "paths", "type": "table" } ]
				},
				{
					"name": "metaverse",
					"assignment-types": [0, 2],
					"settings": [
						{ "name": "id" },
						{ "name": "max_users", "type": "int", "default": 100, "assignment-types": [0] }
					]
				},
				{
					"name": "security",
					"settings": [
						{ "name": "http_username" },
						{ "name": "http_password", "type": "password", "value-hidden": true }
					]
				}
			]
		}))
		.unwrap()
	}

	fn store(master: Value, user: Value) -> ConfigStore {
		let to_map = |v: Value| match v {
			Value::Object(map) => map,
			_ => ConfigMap::new(),
		};
		ConfigStore::from_maps(to_map(master), to_map(user), "config.json")
	}

	#[test]
	fn test_values_for_type() {
		let store = store(json!({}), json!({"metaverse": {"id": "abc"}}));
		let schema = schema();

		let agent = values_for_type(&store, &schema, 2);
		assert_eq!(Value::Object(agent), json!({"metaverse": {"id": "abc"}}));

		let audio = values_for_type(&store, &schema, 0);
		assert_eq!(Value::Object(audio), json!({"metaverse": {"id": "abc", "max_users": 100}}));

		let root = values_for_type(&store, &schema, 1);
		assert_eq!(Value::Object(root), json!({"paths": ""}));

		assert!(values_for_type(&store, &schema, 9).is_empty());
	}

	#[test]
	fn test_full_response_hides_hidden_values() {
		let store = store(
			json!({"security": {"http_username": "operator"}}),
			json!({"security": {"http_password": "digest"}}),
		);
		let response = full_response(&store, &schema());
		assert_eq!(response.values["security"], json!({"http_username": "operator"}));
		assert_eq!(response.locked["security"], json!({"http_username": "operator"}));
		assert!(response.descriptions.is_array());
	}
}

// vim: ts=4

//! Applying a posted settings document to the user map
//!
//! The document mirrors the settings tree: top-level keys are group names or
//! root-level setting names. Every value is checked against its schema
//! descriptor and coerced to the declared type before it is stored.

use serde_json::{Map, Number, Value};

use crate::config_store::{ConfigMap, ConfigStore};
use crate::hasher;
use crate::prelude::*;
use crate::schema::{SettingDescriptor, SettingType, SettingsSchema};

/// The one group whose updates take effect without a restart
pub const SECURITY_GROUP: &str = "security";
const VIEWPOINT_KEY: &str = "viewpoint";
const PATHS_KEY: &str = "paths";

/// Result of coercing one scalar or array value
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
	/// Remove the key, so reads fall back to the schema default
	Clear,
	Set(Value),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
	pub restart_required: bool,
	/// Key paths that had no schema descriptor or an unusable value
	pub skipped: Vec<String>,
}

/// Coerce a posted value to the declared setting type
///
/// Objects are not coerced here; they are applied key by key. Arrays replace
/// the stored value wholesale without per-element coercion.
pub fn coerce(value: &Value, setting_type: SettingType) -> DsResult<Coerced> {
	match value {
		Value::Null => Ok(Coerced::Clear),
		Value::Bool(b) => Ok(Coerced::Set(Value::Bool(*b))),
		Value::String(s) if s.is_empty() => Ok(Coerced::Clear),
		Value::String(s) => match setting_type {
			SettingType::Double => parse_double(s.trim()).map(Coerced::Set),
			SettingType::Int => parse_int(s.trim()).map(Coerced::Set),
			SettingType::Password => Ok(Coerced::Set(Value::String(hasher::password_digest(s)))),
			SettingType::Other => Ok(Coerced::Set(Value::String(s.clone()))),
		},
		Value::Number(n) => match setting_type {
			SettingType::Double => n
				.as_f64()
				.and_then(Number::from_f64)
				.map(|n| Coerced::Set(Value::Number(n)))
				.ok_or_else(|| Error::ValidationError(format!("{} is not a double", n))),
			SettingType::Int => integral(n)
				.map(|i| Coerced::Set(Value::from(i)))
				.ok_or_else(|| Error::ValidationError(format!("{} is not an integer", n))),
			SettingType::Password => {
				Ok(Coerced::Set(Value::String(hasher::password_digest(&n.to_string()))))
			}
			SettingType::Other => Ok(Coerced::Set(Value::Number(n.clone()))),
		},
		Value::Array(items) => Ok(Coerced::Set(Value::Array(items.clone()))),
		Value::Object(_) => {
			Err(Error::ValidationError("maps are applied key by key, not coerced".into()))
		}
	}
}

fn parse_double(s: &str) -> DsResult<Value> {
	s.parse::<f64>()
		.ok()
		.and_then(Number::from_f64)
		.map(Value::Number)
		.ok_or_else(|| Error::ValidationError(format!("{:?} is not a double", s)))
}

fn parse_int(s: &str) -> DsResult<Value> {
	s.parse::<i64>()
		.map(Value::from)
		.map_err(|_| Error::ValidationError(format!("{:?} is not an integer", s)))
}

#[allow(clippy::cast_possible_truncation)]
fn integral(n: &Number) -> Option<i64> {
	n.as_i64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
}

/// Apply `document` to the user map of `store`
///
/// Does not persist or remerge; the caller commits once for the whole document.
pub fn apply_update(store: &mut ConfigStore, schema: &SettingsSchema, document: &ConfigMap) -> UpdateOutcome {
	let mut outcome = UpdateOutcome::default();
	let user = store.user_mut();

	for (root_key, root_value) in document {
		if let Some(group) = schema.group(root_key) {
			let Value::Object(settings) = root_value else {
				warn!("Update for group {} is not a map, ignoring it", root_key);
				outcome.skipped.push(root_key.clone());
				continue;
			};

			let group_value = user.entry(root_key.clone()).or_insert_with(|| Value::Object(Map::new()));
			if !group_value.is_object() {
				warn!("Value at {} was not a map while updating settings, replacing it", root_key);
				*group_value = Value::Object(Map::new());
			}
			let Value::Object(group_map) = group_value else {
				continue;
			};

			for (setting_key, setting_value) in settings {
				let key_path = format!("{}.{}", root_key, setting_key);
				match group.setting(setting_key) {
					Some(descriptor) => {
						let applied = update_setting(
							&key_path,
							setting_key,
							setting_value,
							group_map,
							descriptor,
							&mut outcome.skipped,
						);
						outcome.restart_required |= applied && root_key != SECURITY_GROUP;
					}
					None => {
						warn!("Could not find description for setting {}, cannot update it", key_path);
						outcome.skipped.push(key_path);
					}
				}
			}

			let emptied = group_map.is_empty();
			if emptied {
				user.remove(root_key);
			}
		} else if let Some(descriptor) = schema.root_setting(root_key) {
			let applied = update_setting(root_key, root_key, root_value, user, descriptor, &mut outcome.skipped);
			outcome.restart_required |= applied && root_key != SECURITY_GROUP;
		} else {
			warn!("Setting for root key {} does not exist, cannot update it", root_key);
			outcome.skipped.push(root_key.clone());
		}
	}

	outcome
}

/// Apply one value below `map[key]`
///
/// Discarded values, at any depth, are recorded in `skipped`. Returns false
/// when the value itself was discarded.
fn update_setting(
	key_path: &str,
	key: &str,
	value: &Value,
	map: &mut ConfigMap,
	descriptor: &SettingDescriptor,
	skipped: &mut Vec<String>,
) -> bool {
	let Value::Object(children) = value else {
		return match coerce(value, descriptor.setting_type()) {
			Ok(Coerced::Clear) => {
				map.remove(key);
				true
			}
			Ok(Coerced::Set(Value::String(s))) if key == VIEWPOINT_KEY && !s.starts_with('/') => {
				map.insert(key.to_string(), Value::String(format!("/{}", s)));
				true
			}
			Ok(Coerced::Set(coerced)) => {
				map.insert(key.to_string(), coerced);
				true
			}
			Err(e) => {
				warn!("Discarding value for {}: {}", key_path, e);
				skipped.push(key_path.to_string());
				false
			}
		};
	};

	let entry = map.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
	if !entry.is_object() {
		warn!("Value at {} was not a map while updating settings, replacing it", key_path);
		*entry = Value::Object(Map::new());
	}

	let emptied = if let Value::Object(child_map) = entry {
		for (child_key, child_value) in children {
			let child_descriptor = if key == descriptor.name {
				descriptor
			} else {
				descriptor.column(child_key).unwrap_or(descriptor)
			};
			let child_key = if key == PATHS_KEY && !child_key.starts_with('/') {
				format!("/{}", child_key)
			} else {
				child_key.clone()
			};
			let child_path = format!("{}.{}", key_path, child_key);
			update_setting(&child_path, &child_key, child_value, child_map, child_descriptor, skipped);
		}
		child_map.is_empty()
	} else {
		false
	};

	if emptied {
		map.remove(key);
	}
	true
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
					"settings": [
						{
							"name": "paths",
							"type": "table",
							"columns": [ { "name": "viewpoint" } ]
						}
					]
				},
				{
					"name": "metaverse",
					"settings": [
						{ "name": "id" },
						{ "name": "max_users", "type": "int", "default": 100 },
						{ "name": "scale", "type": "double", "default": 1.0 },
						{ "name": "tags" }
					]
				},
				{
					"name": "security",
					"settings": [
						{ "name": "http_username" },
						{ "name": "http_password", "type": "password" }
					]
				}
			]
		}))
		.unwrap()
	}

	fn document(value: Value) -> ConfigMap {
		match value {
			Value::Object(map) => map,
			_ => ConfigMap::new(),
		}
	}

	fn store(user: Value) -> ConfigStore {
		ConfigStore::from_maps(ConfigMap::new(), document(user), "config.json")
	}

	#[test]
	fn test_coerce_by_declared_type() {
		assert_eq!(coerce(&json!("42"), SettingType::Int).unwrap(), Coerced::Set(json!(42)));
		assert_eq!(coerce(&json!("1.5"), SettingType::Double).unwrap(), Coerced::Set(json!(1.5)));
		assert_eq!(coerce(&json!(3.0), SettingType::Int).unwrap(), Coerced::Set(json!(3)));
		assert_eq!(coerce(&json!(7), SettingType::Double).unwrap(), Coerced::Set(json!(7.0)));
		assert_eq!(coerce(&json!(""), SettingType::Int).unwrap(), Coerced::Clear);
		assert_eq!(coerce(&Value::Null, SettingType::Other).unwrap(), Coerced::Clear);
		assert_eq!(coerce(&json!(true), SettingType::Int).unwrap(), Coerced::Set(json!(true)));
		assert!(coerce(&json!("many"), SettingType::Int).is_err());
		assert!(coerce(&json!(2.5), SettingType::Int).is_err());
	}

	#[test]
	fn test_password_is_stored_as_digest() {
		let digest = hasher::password_digest("secret");
		assert_eq!(
			coerce(&json!("secret"), SettingType::Password).unwrap(),
			Coerced::Set(json!(digest))
		);
		// a submitted password that looks like a digest is still a password
		let hex_password = "a".repeat(64);
		assert_eq!(
			coerce(&json!(hex_password), SettingType::Password).unwrap(),
			Coerced::Set(json!(hasher::password_digest(&hex_password)))
		);
	}

	#[test]
	fn test_security_update_needs_no_restart() {
		let mut store = store(json!({}));
		let outcome = apply_update(
			&mut store,
			&schema(),
			&document(json!({"security": {"http_password": "secret"}})),
		);
		assert!(!outcome.restart_required);
		assert_eq!(store.get_user("security.http_password"), Some(&json!(hasher::password_digest("secret"))));
	}

	#[test]
	fn test_other_groups_need_restart() {
		let mut store = store(json!({}));
		let outcome =
			apply_update(&mut store, &schema(), &document(json!({"metaverse": {"max_users": "25"}})));
		assert!(outcome.restart_required);
		assert_eq!(store.get_user("metaverse.max_users"), Some(&json!(25)));
	}

	#[test]
	fn test_empty_string_clears_and_removes_empty_group() {
		let mut store = store(json!({"metaverse": {"id": "abc"}}));
		apply_update(&mut store, &schema(), &document(json!({"metaverse": {"id": ""}})));
		assert!(store.get_user("metaverse").is_none());
	}

	#[test]
	fn test_unknown_keys_are_skipped() {
		let mut store = store(json!({}));
		let outcome = apply_update(
			&mut store,
			&schema(),
			&document(json!({
				"metaverse": {"id": "abc", "bogus": 1},
				"nonsense": true
			})),
		);
		assert_eq!(outcome.skipped, vec!["metaverse.bogus".to_string(), "nonsense".to_string()]);
		assert_eq!(store.get_user("metaverse.id"), Some(&json!("abc")));
	}

	#[test]
	fn test_paths_and_viewpoints_get_leading_slash() {
		let mut store = store(json!({}));
		apply_update(
			&mut store,
			&schema(),
			&document(json!({"paths": {"spawn": {"viewpoint": "0,0,0/0,0,0,1"}}})),
		);
		assert_eq!(store.get_user("paths"), Some(&json!({"/spawn": {"viewpoint": "/0,0,0/0,0,0,1"}})));
	}

	#[test]
	fn test_non_map_container_is_replaced() {
		let mut store = store(json!({"metaverse": "broken", "paths": 12}));
		apply_update(
			&mut store,
			&schema(),
			&document(json!({"metaverse": {"id": "abc"}, "paths": {"/": {"viewpoint": "/1,1,1"}}})),
		);
		assert_eq!(store.get_user("metaverse"), Some(&json!({"id": "abc"})));
		assert_eq!(store.get_user("paths"), Some(&json!({"/": {"viewpoint": "/1,1,1"}})));
	}

	#[test]
	fn test_arrays_replace_wholesale() {
		let mut store = store(json!({"metaverse": {"tags": ["a", "b"]}}));
		apply_update(&mut store, &schema(), &document(json!({"metaverse": {"tags": [1, "c"]}})));
		assert_eq!(store.get_user("metaverse.tags"), Some(&json!([1, "c"])));
	}

	#[test]
	fn test_uncoercible_value_is_discarded() {
		let mut store = store(json!({"metaverse": {"max_users": 10}}));
		let outcome =
			apply_update(&mut store, &schema(), &document(json!({"metaverse": {"max_users": "lots"}})));
		assert!(!outcome.restart_required);
		assert_eq!(outcome.skipped, vec!["metaverse.max_users".to_string()]);
		assert_eq!(store.get_user("metaverse.max_users"), Some(&json!(10)));
	}

	#[test]
	fn test_nested_discards_are_reported() {
		let schema = SettingsSchema::from_value(json!({
			"version": 2.0,
			"settings": [
				{
					"name": "metaverse",
					"settings": [
						{
							"name": "zones",
							"type": "table",
							"columns": [ { "name": "capacity", "type": "int" }, { "name": "label" } ]
						}
					]
				}
			]
		}))
		.unwrap();
		let mut store = store(json!({}));
		let outcome = apply_update(
			&mut store,
			&schema,
			&document(json!({"metaverse": {"zones": {"north": {"capacity": "many", "label": "N"}}}})),
		);
		assert_eq!(outcome.skipped, vec!["metaverse.zones.north.capacity".to_string()]);
		assert!(outcome.restart_required);
		assert_eq!(store.get_user("metaverse.zones.north"), Some(&json!({"label": "N"})));
	}
}

// vim: ts=4

//! End-to-end settings scenarios over on-disk documents

mod common;

use serde_json::{Value, json};

use common::Fixture;
use domain_settings_core::SettingsManager;
use domain_settings_core::config_store::ConfigMap;
use domain_settings_core::hasher;
use domain_settings_core::version::VersionStore;
use domain_settings_types::permissions::{PermissionSet, StandardRole};

fn load(fixture: &Fixture) -> SettingsManager {
	SettingsManager::load(&fixture.description, None, &fixture.user_config).unwrap()
}

fn document(value: Value) -> ConfigMap {
	serde_json::from_value(value).unwrap()
}

#[test]
fn test_legacy_allow_list_migrates_to_permission_tables() {
	common::setup_test_logging();
	let fixture = Fixture::new(&json!({
		"security": { "allowed_users": ["Alice"] }
	}));
	let versions = VersionStore::beside(&fixture.user_config);
	let mut manager = load(&fixture);

	let outcome = manager.migrate(&versions).unwrap();
	assert!(outcome.from.abs() < f64::EPSILON);
	assert!((outcome.to - 1.5).abs() < f64::EPSILON);
	assert!(outcome.applied.contains(&1.0));
	assert!(outcome.applied.contains(&1.4));

	let registry = manager.registry();
	assert!(registry.effective_for_name("alice").contains(PermissionSet::CONNECT));
	assert_eq!(manager.store().get("security.restricted_access"), Some(&Value::Bool(true)));
	for role in [StandardRole::Anonymous, StandardRole::LoggedIn, StandardRole::Friends] {
		assert!(!registry.effective_standard(&role.key()).contains(PermissionSet::CONNECT), "{:?}", role);
	}
	assert_eq!(registry.effective_standard(&StandardRole::Localhost.key()), PermissionSet::all());

	// Persisted and versioned
	let persisted = fixture.read_user_config();
	assert!(persisted["security"]["permissions"].is_array());
	assert!(persisted["descriptors"]["weekday_hours"].is_array());
	assert!((versions.read().unwrap() - 1.5).abs() < f64::EPSILON);
}

#[test]
fn test_second_start_runs_no_migrations() {
	let fixture = Fixture::new(&json!({
		"security": { "allowed_users": ["alice"], "allowed_editors": ["bob"] }
	}));
	let versions = VersionStore::beside(&fixture.user_config);
	load(&fixture).migrate(&versions).unwrap();
	let first = fixture.read_user_config();

	let mut manager = load(&fixture);
	let outcome = manager.migrate(&versions).unwrap();
	assert!(outcome.applied.is_empty());
	assert_eq!(fixture.read_user_config(), first);
	assert!(manager.registry().effective_for_name("bob").contains(PermissionSet::ADJUST_LOCKS));
}

#[test]
fn test_password_update_stores_digest_without_restart() {
	let fixture = Fixture::new(&Value::Null);
	let mut manager = load(&fixture);
	manager.migrate(&VersionStore::beside(&fixture.user_config)).unwrap();

	let outcome = manager.apply_update(&document(json!({"security": {"http_password": "secret"}})));
	assert!(!outcome.restart_required);

	let expected = hasher::password_digest("secret");
	assert_eq!(
		expected,
		"2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
	);
	assert_eq!(manager.store().get("security.http_password"), Some(&Value::String(expected.clone())));
	assert_eq!(fixture.read_user_config()["security"]["http_password"], json!(expected));
}

#[test]
fn test_empty_string_restores_default() {
	let fixture = Fixture::new(&json!({"metaverse": {"id": "domain-1", "max_users": 20}}));
	let mut manager = load(&fixture);
	assert_eq!(manager.value_or_default("metaverse.max_users"), Some(&json!(20)));

	let outcome = manager.apply_update(&document(json!({"metaverse": {"max_users": ""}})));
	assert!(outcome.restart_required);
	assert_eq!(manager.store().get_user("metaverse.max_users"), None);
	assert_eq!(manager.value_or_default("metaverse.max_users"), Some(&json!(100)));
	assert_eq!(fixture.read_user_config(), json!({"metaverse": {"id": "domain-1"}}));
}

#[test]
fn test_unknown_keys_are_skipped() {
	let fixture = Fixture::new(&Value::Null);
	let mut manager = load(&fixture);

	let outcome = manager.apply_update(&document(json!({
		"metaverse": { "id": "domain-2", "colour": "blue" },
		"nonsense": { "a": 1 }
	})));
	assert_eq!(manager.store().get("metaverse.id"), Some(&json!("domain-2")));
	assert_eq!(manager.store().get("metaverse.colour"), None);
	assert_eq!(manager.store().get("nonsense"), None);
	assert_eq!(outcome.skipped.len(), 2);
}

#[test]
fn test_master_values_are_locked() {
	let fixture = Fixture::new(&json!({"metaverse": {"max_users": 5}}));
	let master = fixture.dir.path().join("master.json");
	common::write_json(&master, &json!({"metaverse": {"id": "operator-id", "max_users": 50}}));

	let manager = SettingsManager::load(&fixture.description, Some(&master), &fixture.user_config).unwrap();
	let response = manager.full_response();
	assert_eq!(response.values["metaverse"], json!({"id": "operator-id", "max_users": 5}));
	assert_eq!(response.locked["metaverse"]["max_users"], json!(50));
	assert!(response.values["security"].get("http_password").is_none());
}

// vim: ts=4

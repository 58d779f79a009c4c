//! Settings document migrations
//!
//! Steps are ordered by the version that introduced them. A step runs when
//! the stored version is older than the step and the step is not newer than
//! the description version. Every step that changes something is persisted
//! before the next one runs, so later steps see the effects of earlier ones.

use serde_json::{Value, json};

use crate::config_store::ConfigStore;
use crate::hasher;
use crate::permissions::{PermissionCategory, PermissionsRegistry};
use crate::prelude::*;
use crate::schema::SettingsSchema;
use crate::version::VersionStore;
use domain_settings_types::permissions::{PermissionEntry, PermissionKey, PermissionSet, StandardRole};

pub const ALLOWED_USERS: &str = "security.allowed_users";
pub const RESTRICTED_ACCESS: &str = "security.restricted_access";
pub const ALLOWED_EDITORS: &str = "security.allowed_editors";
pub const EDITORS_ARE_REZZERS: &str = "security.editors_are_rezzers";
pub const HTTP_PASSWORD: &str = "security.http_password";

const ENTITY_FILE_NAME: &str = "entity_server_settings.persistFilename";
const ENTITY_FILE_PATH: &str = "entity_server_settings.persistFilePath";

const WEEKDAY_HOURS: &str = "descriptors.weekday_hours";
const WEEKEND_HOURS: &str = "descriptors.weekend_hours";
const UTC_OFFSET: &str = "descriptors.utc_offset";

pub struct MigrationContext<'a> {
	pub store: &'a mut ConfigStore,
	pub schema: &'a SettingsSchema,
	pub registry: &'a mut PermissionsRegistry,
}

/// Returns whether the step changed anything
type StepFn = fn(&mut MigrationContext<'_>) -> bool;

pub struct MigrationStep {
	pub version: f64,
	pub description: &'static str,
	pub apply: StepFn,
}

pub const MIGRATIONS: &[MigrationStep] = &[
	MigrationStep {
		version: 1.0,
		description: "restricted access flag",
		apply: restricted_access_flag,
	},
	MigrationStep {
		version: 1.1,
		description: "entity persist file path",
		apply: entity_persist_file_path,
	},
	MigrationStep { version: 1.2, description: "hashed HTTP password", apply: hashed_http_password },
	MigrationStep { version: 1.4, description: "permissions grid", apply: permissions_grid },
	MigrationStep { version: 1.5, description: "operating hours", apply: operating_hours },
];

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationOutcome {
	pub from: f64,
	pub to: f64,
	/// Versions of the steps that changed the document
	pub applied: Vec<f64>,
}

/// Bring the settings document up to the description version, then unpack permissions
pub fn run(
	store: &mut ConfigStore,
	schema: &SettingsSchema,
	registry: &mut PermissionsRegistry,
	versions: &VersionStore,
) -> DsResult<MigrationOutcome> {
	let from = versions.read()?;
	let to = schema.version();
	let mut applied = Vec::new();

	info!("Previous settings version was {} and the new version is {}", from, to);
	{
		let mut ctx = MigrationContext { store: &mut *store, schema, registry: &mut *registry };
		for step in MIGRATIONS.iter().filter(|step| from < step.version && step.version <= to) {
			debug!("Checking settings migration {} ({})", step.version, step.description);
			if (step.apply)(&mut ctx) {
				info!("Applied settings migration {} ({})", step.version, step.description);
				ctx.store.commit();
				applied.push(step.version);
			}
		}
	}

	registry.unpack(store);

	if from >= to {
		debug!("Settings version {} is not older than {}, leaving it", from, to);
	} else if let Err(e) = versions.write(to) {
		error!("CRITICAL: could not record settings version {}: {}", to, e);
	}

	Ok(MigrationOutcome { from, to, applied })
}

// Version 1.0: a non-empty allow list implies restricted access
fn restricted_access_flag(ctx: &mut MigrationContext<'_>) -> bool {
	let has_allowed_users =
		ctx.store.get(ALLOWED_USERS).and_then(Value::as_array).is_some_and(|list| !list.is_empty());
	if !has_allowed_users {
		return false;
	}

	info!("Forcing {} to true since there is an existing list of allowed users", RESTRICTED_ACCESS);
	ctx.store.set(RESTRICTED_ACCESS, Value::Bool(true));
	true
}

// Version 1.1: persistFilename became persistFilePath
fn entity_persist_file_path(ctx: &mut MigrationContext<'_>) -> bool {
	let Some(file_name) = ctx.store.get(ENTITY_FILE_NAME).and_then(Value::as_str).map(str::to_string)
	else {
		return false;
	};

	info!("Migrating persistFilename to persistFilePath for entity server settings");
	ctx.store.set(ENTITY_FILE_PATH, Value::String(file_name));
	ctx.store.remove(ENTITY_FILE_NAME);
	true
}

// Version 1.2: the HTTP password is stored as a SHA-256 digest
fn hashed_http_password(ctx: &mut MigrationContext<'_>) -> bool {
	let Some(digest) =
		ctx.store.get_user(HTTP_PASSWORD).and_then(Value::as_str).and_then(hasher::ensure_digest)
	else {
		return false;
	};

	info!("Migrating plaintext HTTP password to its SHA-256 digest");
	ctx.store.set(HTTP_PASSWORD, Value::String(digest));
	true
}

// Version 1.4: permission tables replace the flat access lists
fn permissions_grid(ctx: &mut MigrationContext<'_>) -> bool {
	let restricted = truthy(ctx.schema.value_or_default(ctx.store, RESTRICTED_ACCESS));
	let allowed_users = string_list(ctx.schema.value_or_default(ctx.store, ALLOWED_USERS));
	let allowed_editors = string_list(ctx.schema.value_or_default(ctx.store, ALLOWED_EDITORS));
	let editors_are_rezzers = truthy(ctx.schema.value_or_default(ctx.store, EDITORS_ARE_REZZERS));

	let registry = &mut *ctx.registry;
	registry.clear();

	let standard = registry.table_mut(PermissionCategory::Standard);
	for role in StandardRole::ALL {
		let permissions = match role {
			StandardRole::Localhost => PermissionSet::all(),
			StandardRole::Anonymous | StandardRole::LoggedIn if !restricted => PermissionSet::CONNECT,
			_ => PermissionSet::empty(),
		};
		standard.insert(PermissionEntry::with_permissions(role.key(), permissions));
	}

	let named = registry.table_mut(PermissionCategory::Named);
	for user in &allowed_users {
		named.insert(PermissionEntry::with_permissions(
			PermissionKey::new(user, 0),
			PermissionSet::CONNECT,
		));
	}
	for editor in &allowed_editors {
		let key = PermissionKey::new(editor, 0);
		if !named.contains(&key) {
			let initial = if restricted { PermissionSet::empty() } else { PermissionSet::CONNECT };
			named.insert(PermissionEntry::with_permissions(key.clone(), initial));
		}
		if let Some(entry) = named.get_mut(&key) {
			entry.set(PermissionSet::ADJUST_LOCKS);
		}
	}

	let rez = PermissionSet::REZ | PermissionSet::REZ_TMP;
	for category in [PermissionCategory::Standard, PermissionCategory::Named] {
		for entry in registry.table_mut(category).iter_mut() {
			if !editors_are_rezzers || entry.can(PermissionSet::ADJUST_LOCKS) {
				entry.set(rez);
			} else {
				entry.clear(rez);
			}
		}
	}

	// group tables already in the document are left as they are
	registry.pack(ctx.store, PermissionCategory::Standard);
	registry.pack(ctx.store, PermissionCategory::Named);
	registry.clear();
	true
}

// Version 1.5: operating hours descriptor
fn operating_hours(ctx: &mut MigrationContext<'_>) -> bool {
	validate_descriptors(ctx.store)
}

/// Fill in missing business-hours descriptors: always open, host UTC offset
///
/// Returns whether the user map changed. Does not persist.
pub fn validate_descriptors(store: &mut ConfigStore) -> bool {
	let mut changed = false;
	for key_path in [WEEKDAY_HOURS, WEEKEND_HOURS] {
		if store.get(key_path).is_none_or(Value::is_null) {
			store.set(key_path, json!([{ "open": "00:00", "close": "23:59" }]));
			changed = true;
		}
	}
	if store.get(UTC_OFFSET).is_none_or(Value::is_null) {
		store.set(UTC_OFFSET, json!(local_utc_offset_hours()));
		changed = true;
	}
	if changed {
		store.remerge();
	}
	changed
}

fn local_utc_offset_hours() -> f64 {
	f64::from(chrono::Local::now().offset().local_minus_utc()) / 3600.0
}

fn truthy(value: Option<&Value>) -> bool {
	match value {
		Some(Value::Bool(b)) => *b,
		Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
		Some(Value::String(s)) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
		_ => false,
	}
}

fn string_list(value: Option<&Value>) -> Vec<String> {
	match value {
		Some(Value::Array(list)) => list
			.iter()
			.filter_map(Value::as_str)
			.filter(|s| !s.is_empty())
			.map(str::to_string)
			.collect(),
		Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
		_ => Vec::new(),
	}
}


// vim: ts=4

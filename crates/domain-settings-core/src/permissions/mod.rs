//! Permission tables and their persisted form
//!
//! Each of the four tables is packed into a list of permission records under
//! `security.*` in the user settings document.

pub mod registry;

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::config_store::ConfigStore;
use crate::prelude::*;
use domain_settings_types::permissions::{GroupKey, PermissionEntry, PermissionKey};

pub use registry::{GroupRef, PermissionsRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionCategory {
	/// localhost / anonymous / logged-in / friends
	Standard,
	/// Individual user names
	Named,
	/// (group, rank) grants
	Group,
	/// (group, rank) denials
	GroupForbidden,
}

impl PermissionCategory {
	pub const ALL: [PermissionCategory; 4] = [
		PermissionCategory::Standard,
		PermissionCategory::Named,
		PermissionCategory::Group,
		PermissionCategory::GroupForbidden,
	];

	pub fn key_path(self) -> &'static str {
		match self {
			PermissionCategory::Standard => "security.standard_permissions",
			PermissionCategory::Named => "security.permissions",
			PermissionCategory::Group => "security.group_permissions",
			PermissionCategory::GroupForbidden => "security.group_forbiddens",
		}
	}

	/// Whether entries of this table are keyed by (name, rank) rather than by name alone
	pub fn is_ranked(self) -> bool {
		matches!(self, PermissionCategory::Group | PermissionCategory::GroupForbidden)
	}
}

impl std::fmt::Display for PermissionCategory {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			PermissionCategory::Standard => "standard permissions",
			PermissionCategory::Named => "permissions",
			PermissionCategory::Group => "group permissions",
			PermissionCategory::GroupForbidden => "group forbiddens",
		};
		write!(f, "{}", name)
	}
}

/// One permissions table with a secondary index for group entries
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PermissionTable {
	entries: BTreeMap<PermissionKey, PermissionEntry>,
	by_group: BTreeMap<GroupKey, PermissionKey>,
}

impl PermissionTable {
	pub fn get(&self, key: &PermissionKey) -> Option<&PermissionEntry> {
		self.entries.get(key)
	}

	pub fn get_mut(&mut self, key: &PermissionKey) -> Option<&mut PermissionEntry> {
		self.entries.get_mut(key)
	}

	pub fn by_group(&self, key: &GroupKey) -> Option<&PermissionEntry> {
		self.by_group.get(key).and_then(|key| self.entries.get(key))
	}

	pub fn contains(&self, key: &PermissionKey) -> bool {
		self.entries.contains_key(key)
	}

	pub fn insert(&mut self, entry: PermissionEntry) {
		if let Some(group_key) = entry.group_key() {
			self.by_group.insert(group_key, entry.key().clone());
		}
		self.entries.insert(entry.key().clone(), entry);
	}

	/// Insert, or merge by capability union into an existing entry. Returns true on merge.
	pub fn insert_or_merge(&mut self, entry: PermissionEntry) -> bool {
		let merged = match self.entries.get_mut(entry.key()) {
			Some(existing) => {
				existing.merge(&entry);
				existing.clone()
			}
			None => {
				self.insert(entry);
				return false;
			}
		};
		self.insert(merged);
		true
	}

	/// Attach `group_id` to every entry named `name` that has none yet
	pub fn bind_group(&mut self, name: &str, group_id: Uuid) -> bool {
		let name = name.to_lowercase();
		let mut changed = false;
		for entry in self.entries.values_mut() {
			if entry.id() == name && !entry.is_group() {
				entry.set_group_id(group_id);
				self.by_group.insert(GroupKey::new(group_id, entry.rank()), entry.key().clone());
				changed = true;
			}
		}
		changed
	}

	pub fn group_ids(&self) -> BTreeSet<Uuid> {
		self.entries.values().filter_map(PermissionEntry::group_id).collect()
	}

	pub fn names(&self) -> BTreeSet<String> {
		self.entries.keys().map(|key| key.name.clone()).collect()
	}

	pub fn iter(&self) -> impl Iterator<Item = &PermissionEntry> {
		self.entries.values()
	}

	pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PermissionEntry> {
		self.entries.values_mut()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn clear(&mut self) {
		self.entries.clear();
		self.by_group.clear();
	}
}

/// Persisted list order: by permissions_id, then by rank_name when both records carry one
fn compare_records(a: &Value, b: &Value) -> Ordering {
	let id = |v: &Value| v.get("permissions_id").and_then(Value::as_str).map(str::to_string);
	let (Some(id_a), Some(id_b)) = (id(a), id(b)) else {
		return a.to_string().cmp(&b.to_string());
	};

	if id_a == id_b {
		let rank_name = |v: &Value| v.get("rank_name").and_then(Value::as_str).map(str::to_string);
		if let (Some(rank_a), Some(rank_b)) = (rank_name(a), rank_name(b)) {
			return rank_a.cmp(&rank_b);
		}
	}
	id_a.cmp(&id_b)
}

/// Sort every permission list present in the user map
pub fn sort_permission_lists(store: &mut ConfigStore) {
	for category in PermissionCategory::ALL {
		if store.get_user(category.key_path()).is_some_and(Value::is_array)
			&& let Value::Array(list) = store.get_or_create(category.key_path())
		{
			list.sort_by(compare_records);
		}
	}
}

/// Parse the records of one persisted list, skipping malformed ones
pub(crate) fn read_entries(store: &ConfigStore, category: PermissionCategory) -> Vec<PermissionEntry> {
	let Some(list) = store.get_user(category.key_path()).and_then(Value::as_array) else {
		debug!("No {} list in settings", category);
		return Vec::new();
	};

	list.iter()
		.filter_map(|record| {
			if !record.is_object() {
				warn!("Skipping {} record that is not a map: {}", category, record);
				return None;
			}
			match serde_json::from_value(record.clone()) {
				Ok(record) => Some(PermissionEntry::from_record(&record)),
				Err(e) => {
					warn!("Skipping malformed {} record {}: {}", category, record, e);
					None
				}
			}
		})
		.collect()
}


// vim: ts=4

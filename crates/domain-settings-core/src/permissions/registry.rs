//! Permissions registry
//!
//! Holds the four permission tables together with what is known about groups
//! from the directory: name/ID bindings, ordered rank names, and when the
//! rank list of each group was last requested.

use itertools::Itertools;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::{PermissionCategory, PermissionTable, read_entries, sort_permission_lists};
use crate::config_store::ConfigStore;
use crate::prelude::*;
use domain_settings_types::directory_adapter::GroupRank;
use domain_settings_types::permissions::{
	GroupKey, PermissionEntry, PermissionKey, PermissionSet, StandardRole,
};

/// A group addressed either by its name or by its directory ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRef<'a> {
	Name(&'a str),
	Id(Uuid),
}

#[derive(Debug, Default)]
pub struct PermissionsRegistry {
	standard: PermissionTable,
	named: PermissionTable,
	groups: PermissionTable,
	forbidden: PermissionTable,

	/// lower-cased group name -> ID
	group_ids: BTreeMap<String, Uuid>,
	group_names: BTreeMap<Uuid, String>,
	group_ranks: BTreeMap<Uuid, Vec<String>>,
	ranks_last_fetched: BTreeMap<Uuid, Timestamp>,

	/// user name -> group ID -> rank
	membership: BTreeMap<String, BTreeMap<Uuid, u32>>,
}

impl PermissionsRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn table(&self, category: PermissionCategory) -> &PermissionTable {
		match category {
			PermissionCategory::Standard => &self.standard,
			PermissionCategory::Named => &self.named,
			PermissionCategory::Group => &self.groups,
			PermissionCategory::GroupForbidden => &self.forbidden,
		}
	}

	pub fn table_mut(&mut self, category: PermissionCategory) -> &mut PermissionTable {
		match category {
			PermissionCategory::Standard => &mut self.standard,
			PermissionCategory::Named => &mut self.named,
			PermissionCategory::Group => &mut self.groups,
			PermissionCategory::GroupForbidden => &mut self.forbidden,
		}
	}

	/// Drop the four tables; group caches are kept
	pub fn clear(&mut self) {
		for category in PermissionCategory::ALL {
			self.table_mut(category).clear();
		}
	}

	// Pack / unpack
	//***************

	fn write_table(&self, store: &mut ConfigStore, category: PermissionCategory) {
		let records = self
			.table(category)
			.iter()
			.map(|entry| {
				let rank_names =
					entry.group_id().and_then(|id| self.group_ranks.get(&id)).map(Vec::as_slice);
				serde_json::to_value(entry.to_record(rank_names)).unwrap_or(Value::Null)
			})
			.filter(|record| !record.is_null())
			.collect();
		store.set(category.key_path(), Value::Array(records));
	}

	/// Serialize one table into the user map, then persist and remerge
	pub fn pack(&self, store: &mut ConfigStore, category: PermissionCategory) {
		self.write_table(store, category);
		sort_permission_lists(store);
		store.commit();
	}

	/// Serialize all four tables with a single persist
	pub fn pack_all(&self, store: &mut ConfigStore) {
		for category in PermissionCategory::ALL {
			self.write_table(store, category);
		}
		sort_permission_lists(store);
		store.commit();
	}

	/// Rebuild the tables from the user map
	///
	/// Duplicate keys are merged by capability union, missing standard roles
	/// are synthesized and every known rank of every resolved group gets an
	/// entry. If any of that changed the tables they are packed back.
	/// Returns whether a pack happened.
	pub fn unpack(&mut self, store: &mut ConfigStore) -> bool {
		self.clear();
		let mut dirty = false;
		let mut bindings: Vec<(String, Uuid)> = Vec::new();

		for category in PermissionCategory::ALL {
			for entry in read_entries(store, category) {
				let entry = if category.is_ranked() {
					if let Some(group_id) = entry.group_id() {
						bindings.push((entry.id().to_string(), group_id));
					}
					entry
				} else {
					PermissionEntry::with_permissions(PermissionKey::new(entry.id(), 0), entry.permissions)
				};

				let key = entry.key().clone();
				if self.table_mut(category).insert_or_merge(entry) {
					warn!("Duplicate name in {} table: {}", category, key);
					dirty = true;
				}
			}
		}

		for (name, group_id) in bindings {
			dirty |= self.set_group_id(&name, group_id);
		}

		for role in StandardRole::ALL {
			if !self.standard.contains(&role.key()) {
				debug!("Adding missing standard role {}", role.name());
				self.standard
					.insert(PermissionEntry::with_permissions(role.key(), role.default_permissions()));
				dirty = true;
			}
		}

		if let Some(localhost) = self.standard.get_mut(&StandardRole::Localhost.key())
			&& localhost.permissions != PermissionSet::all()
		{
			info!("Restoring full permissions for localhost");
			localhost.permissions = PermissionSet::all();
			dirty = true;
		}

		dirty |= self.ensure_rank_coverage();

		if dirty {
			self.pack_all(store);
		}

		self.debug_dump_permissions();
		dirty
	}

	/// Make sure every known rank of every resolved group has an entry in both group tables
	pub fn ensure_rank_coverage(&mut self) -> bool {
		let mut changed = false;
		for table in [&mut self.groups, &mut self.forbidden] {
			for group_id in table.group_ids() {
				let Some(name) = self.group_names.get(&group_id) else {
					continue;
				};
				let rank_count = self.group_ranks.get(&group_id).map_or(0, Vec::len);
				for rank in 0..rank_count {
					let Ok(rank) = u32::try_from(rank) else {
						break;
					};
					let key = PermissionKey::new(name, rank);
					match table.get(&key) {
						Some(entry) if entry.group_id() == Some(group_id) => {}
						Some(entry) if entry.is_group() => {
							warn!("{} is bound to group {:?}, not {}", key, entry.group_id(), group_id);
						}
						Some(_) => {
							changed |= table.bind_group(name, group_id);
						}
						None => {
							let mut entry = PermissionEntry::new(key);
							entry.set_group_id(group_id);
							table.insert(entry);
							changed = true;
						}
					}
				}
			}
		}

		self.debug_dump_groups();
		changed
	}

	// Effective permissions
	//***********************

	pub fn effective_standard(&self, key: &PermissionKey) -> PermissionSet {
		self.standard.get(key).map_or_else(PermissionSet::empty, |entry| entry.permissions)
	}

	pub fn effective_for_name(&self, name: &str) -> PermissionSet {
		self.named
			.get(&PermissionKey::new(name, 0))
			.map_or_else(PermissionSet::empty, |entry| entry.permissions)
	}

	pub fn effective_for_group_rank(&self, group: GroupRef<'_>, rank: u32) -> PermissionSet {
		Self::lookup_group(&self.groups, group, rank)
	}

	pub fn effective_forbidden_for_group_rank(&self, group: GroupRef<'_>, rank: u32) -> PermissionSet {
		Self::lookup_group(&self.forbidden, group, rank)
	}

	fn lookup_group(table: &PermissionTable, group: GroupRef<'_>, rank: u32) -> PermissionSet {
		let entry = match group {
			GroupRef::Name(name) => table.get(&PermissionKey::new(name, rank)),
			GroupRef::Id(group_id) => table.by_group(&GroupKey::new(group_id, rank)),
		};
		entry.map_or_else(PermissionSet::empty, |entry| entry.permissions)
	}

	// Principals
	//************

	pub fn all_names(&self) -> Vec<String> {
		self.named.names().into_iter().collect()
	}

	pub fn group_ids(&self) -> Vec<Uuid> {
		self.groups.group_ids().into_iter().collect()
	}

	pub fn forbidden_group_ids(&self) -> Vec<Uuid> {
		self.forbidden.group_ids().into_iter().collect()
	}

	pub fn group_id_for_name(&self, name: &str) -> Option<Uuid> {
		self.group_ids.get(&name.to_lowercase()).copied()
	}

	pub fn group_name_for_id(&self, group_id: Uuid) -> Option<&str> {
		self.group_names.get(&group_id).map(String::as_str)
	}

	pub fn group_ranks(&self, group_id: Uuid) -> Option<&[String]> {
		self.group_ranks.get(&group_id).map(Vec::as_slice)
	}

	/// Remember (or forget, with `None`) the rank a user holds in a group
	pub fn record_group_membership(&mut self, name: &str, group_id: Uuid, rank: Option<u32>) {
		let name = name.to_lowercase();
		match rank {
			Some(rank) => {
				self.membership.entry(name).or_default().insert(group_id, rank);
			}
			None => {
				if let Some(groups) = self.membership.get_mut(&name) {
					groups.remove(&group_id);
					if groups.is_empty() {
						self.membership.remove(&name);
					}
				}
			}
		}
	}

	pub fn group_membership_rank(&self, name: &str, group_id: Uuid) -> Option<u32> {
		self.membership.get(&name.to_lowercase())?.get(&group_id).copied()
	}

	// Directory sync hooks
	//**********************

	/// Group names mentioned by either group table
	pub fn known_group_names(&self) -> BTreeSet<String> {
		let mut names = self.groups.names();
		names.extend(self.forbidden.names());
		names
	}

	/// Group names with no resolved ID yet
	pub fn groups_needing_ids(&self) -> Vec<String> {
		self.known_group_names()
			.into_iter()
			.filter(|name| !self.group_ids.contains_key(name))
			.collect()
	}

	/// Bind a group name to its ID; returns whether any table entry changed
	pub fn set_group_id(&mut self, name: &str, group_id: Uuid) -> bool {
		self.group_ids.insert(name.to_lowercase(), group_id);
		self.group_names.insert(group_id, name.to_string());

		let changed_groups = self.groups.bind_group(name, group_id);
		let changed_forbidden = self.forbidden.bind_group(name, group_id);
		changed_groups || changed_forbidden
	}

	pub fn mark_ranks_requested(&mut self, group_id: Uuid, at: Timestamp) {
		self.ranks_last_fetched.insert(group_id, at);
	}

	/// Resolved groups whose rank list was last requested more than `threshold_secs` ago
	pub fn stale_groups(&self, now: Timestamp, threshold_secs: i64) -> Vec<Uuid> {
		self.group_names
			.keys()
			.filter(|group_id| {
				let last = self.ranks_last_fetched.get(group_id).copied().unwrap_or_default();
				now.seconds_since(last) > threshold_secs
			})
			.copied()
			.collect()
	}

	/// Merge a rank list from the directory, then ensure rank coverage
	///
	/// The list grows to fit the highest `order`; gaps stay empty strings.
	pub fn apply_group_ranks(&mut self, group_id: Uuid, ranks: &[GroupRank]) -> bool {
		let mut changed = false;
		let names = self.group_ranks.entry(group_id).or_default();
		for rank in ranks {
			let order = rank.order as usize;
			if names.len() < order + 1 {
				names.resize(order + 1, String::new());
				changed = true;
			}
			if names[order] != rank.name {
				names[order].clone_from(&rank.name);
				changed = true;
			}
		}

		changed |= self.ensure_rank_coverage();
		changed
	}

	// Diagnostics
	//*************

	fn debug_dump_groups(&self) {
		debug!("--------- GROUPS ---------");
		for entry in self.groups.iter() {
			debug!("group permissions | {} {:?} {:?}", entry.key(), entry.group_id(), entry.permissions);
		}
		for (name, group_id) in &self.group_ids {
			debug!("group ids | {} => {}", name, group_id);
		}
		for (group_id, ranks) in &self.group_ranks {
			debug!(
				"group ranks | {} => {}",
				group_id,
				ranks.iter().map(|r| if r.is_empty() { "-" } else { r.as_str() }).join(",")
			);
		}
	}

	fn debug_dump_permissions(&self) {
		for category in PermissionCategory::ALL {
			for entry in self.table(category).iter() {
				debug!("{} | {} {:?} {:?}", category, entry.key(), entry.group_id(), entry.permissions);
			}
		}
	}
}


// vim: ts=4

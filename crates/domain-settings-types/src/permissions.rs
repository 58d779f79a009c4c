//! Permission value types: capability bitsets, principal keys and entries
//!
//! A [`PermissionEntry`] is the in-memory form of one row of a permissions
//! table. On disk the same row is a [`PermissionRecord`] inside one of the
//! `security.*` lists of the user settings document.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

bitflags! {
	/// Capabilities a principal may hold on the domain
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct PermissionSet: u32 {
		/// Connect to the domain at all
		const CONNECT                   = 0b0000_0001;
		/// Change the lock state of entities
		const ADJUST_LOCKS              = 0b0000_0010;
		/// Create entities that outlive their creator's session
		const REZ                       = 0b0000_0100;
		/// Create temporary entities
		const REZ_TMP                   = 0b0000_1000;
		const WRITE_TO_ASSET_SERVER     = 0b0001_0000;
		/// Connect even when the domain is at capacity
		const CONNECT_PAST_MAX_CAPACITY = 0b0010_0000;
	}
}

impl Default for PermissionSet {
	fn default() -> Self {
		Self::empty()
	}
}

/// The four roles that always exist in the standard permissions table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardRole {
	Localhost,
	Anonymous,
	LoggedIn,
	Friends,
}

impl StandardRole {
	pub const ALL: [StandardRole; 4] =
		[StandardRole::Localhost, StandardRole::Anonymous, StandardRole::LoggedIn, StandardRole::Friends];

	pub fn name(self) -> &'static str {
		match self {
			StandardRole::Localhost => "localhost",
			StandardRole::Anonymous => "anonymous",
			StandardRole::LoggedIn => "logged-in",
			StandardRole::Friends => "friends",
		}
	}

	pub fn key(self) -> PermissionKey {
		PermissionKey::new(self.name(), 0)
	}

	/// Capabilities a missing standard role is synthesized with
	pub fn default_permissions(self) -> PermissionSet {
		match self {
			StandardRole::Localhost => PermissionSet::all(),
			_ => PermissionSet::empty(),
		}
	}
}

/// Principal key: a lower-cased name and a rank (0 for non-group principals)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionKey {
	pub name: String,
	pub rank: u32,
}

impl PermissionKey {
	pub fn new(name: &str, rank: u32) -> Self {
		Self { name: name.to_lowercase(), rank }
	}
}

impl std::fmt::Display for PermissionKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}#{}", self.name, self.rank)
	}
}

/// Secondary index key for group entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
	pub group_id: Uuid,
	pub rank: u32,
}

impl GroupKey {
	pub fn new(group_id: Uuid, rank: u32) -> Self {
		Self { group_id, rank }
	}
}

/// One row of a permissions table
///
/// An entry is a group entry exactly when it carries a group ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionEntry {
	key: PermissionKey,
	group_id: Option<Uuid>,
	pub permissions: PermissionSet,
}

impl PermissionEntry {
	pub fn new(key: PermissionKey) -> Self {
		Self { key, group_id: None, permissions: PermissionSet::empty() }
	}

	pub fn with_permissions(key: PermissionKey, permissions: PermissionSet) -> Self {
		Self { key, group_id: None, permissions }
	}

	pub fn key(&self) -> &PermissionKey {
		&self.key
	}

	pub fn id(&self) -> &str {
		&self.key.name
	}

	pub fn rank(&self) -> u32 {
		self.key.rank
	}

	pub fn is_group(&self) -> bool {
		self.group_id.is_some()
	}

	pub fn group_id(&self) -> Option<Uuid> {
		self.group_id
	}

	pub fn set_group_id(&mut self, group_id: Uuid) {
		self.group_id = Some(group_id);
	}

	pub fn group_key(&self) -> Option<GroupKey> {
		self.group_id.map(|group_id| GroupKey::new(group_id, self.key.rank))
	}

	pub fn can(&self, permission: PermissionSet) -> bool {
		self.permissions.contains(permission)
	}

	pub fn set(&mut self, permission: PermissionSet) {
		self.permissions.insert(permission);
	}

	pub fn clear(&mut self, permission: PermissionSet) {
		self.permissions.remove(permission);
	}

	/// Capability union with another entry for the same key
	pub fn merge(&mut self, other: &PermissionEntry) {
		self.permissions |= other.permissions;
		if self.group_id.is_none() {
			self.group_id = other.group_id;
		}
	}

	pub fn from_record(record: &PermissionRecord) -> Self {
		let mut permissions = PermissionSet::empty();
		permissions.set(PermissionSet::CONNECT, record.id_can_connect);
		permissions.set(PermissionSet::ADJUST_LOCKS, record.id_can_adjust_locks);
		permissions.set(PermissionSet::REZ, record.id_can_rez);
		permissions.set(PermissionSet::REZ_TMP, record.id_can_rez_tmp);
		permissions.set(PermissionSet::WRITE_TO_ASSET_SERVER, record.id_can_write_to_asset_server);
		permissions
			.set(PermissionSet::CONNECT_PAST_MAX_CAPACITY, record.id_can_connect_past_max_capacity);

		Self {
			key: PermissionKey::new(&record.permissions_id, record.rank.unwrap_or(0)),
			group_id: record.group_id.filter(|id| !id.is_nil()),
			permissions,
		}
	}

	/// Serialize into a record; group entries carry their rank name when it is known
	pub fn to_record(&self, rank_names: Option<&[String]>) -> PermissionRecord {
		let (rank, rank_name) = if self.is_group() {
			let rank_name = rank_names
				.and_then(|names| names.get(self.key.rank as usize))
				.cloned();
			(Some(self.key.rank), rank_name)
		} else if self.key.rank > 0 {
			(Some(self.key.rank), None)
		} else {
			(None, None)
		};

		PermissionRecord {
			permissions_id: self.key.name.clone(),
			group_id: self.group_id,
			rank,
			rank_name,
			id_can_connect: self.can(PermissionSet::CONNECT),
			id_can_adjust_locks: self.can(PermissionSet::ADJUST_LOCKS),
			id_can_rez: self.can(PermissionSet::REZ),
			id_can_rez_tmp: self.can(PermissionSet::REZ_TMP),
			id_can_write_to_asset_server: self.can(PermissionSet::WRITE_TO_ASSET_SERVER),
			id_can_connect_past_max_capacity: self.can(PermissionSet::CONNECT_PAST_MAX_CAPACITY),
		}
	}
}

/// Persisted form of a [`PermissionEntry`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
	pub permissions_id: String,
	#[serde(default, deserialize_with = "lenient_uuid", skip_serializing_if = "Option::is_none")]
	pub group_id: Option<Uuid>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rank: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rank_name: Option<String>,
	#[serde(default)]
	pub id_can_connect: bool,
	#[serde(default)]
	pub id_can_adjust_locks: bool,
	#[serde(default)]
	pub id_can_rez: bool,
	#[serde(default)]
	pub id_can_rez_tmp: bool,
	#[serde(default)]
	pub id_can_write_to_asset_server: bool,
	#[serde(default)]
	pub id_can_connect_past_max_capacity: bool,
}

/// Unparsable or empty group IDs are treated as "not a group"
fn lenient_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw: Option<String> = Option::deserialize(deserializer)?;
	Ok(raw.and_then(|s| Uuid::parse_str(s.trim()).ok()))
}


// vim: ts=4

//! Adapter trait for the external group directory service
//!
//! The directory resolves group names to group IDs and lists the ordered
//! ranks of a group. Implementations must not be called without an
//! authentication context: callers check [`GroupDirectory::is_authenticated`]
//! first and skip the call otherwise.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Debug;
use uuid::Uuid;

use crate::prelude::*;

/// A group as returned by the name lookup
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectoryGroup {
	pub id: Uuid,
	pub name: String,
}

/// One rank of a group; `order` 0 is the highest rank
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupRank {
	pub name: String,
	pub order: u32,
}

#[async_trait]
pub trait GroupDirectory: Debug + Send + Sync {
	/// Whether an authentication context is available for directory calls
	fn is_authenticated(&self) -> bool;

	/// `GET /groups/names/{name}`
	async fn resolve_group_id(&self, name: &str) -> DsResult<Vec<DirectoryGroup>>;

	/// `GET /groups/{id}/ranks`
	async fn resolve_group_ranks(&self, group_id: Uuid) -> DsResult<Vec<GroupRank>>;
}

// vim: ts=4

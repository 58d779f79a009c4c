//! Response bodies of the directory API
//!
//! Every response is wrapped in `{"status": ..., "data": ...}`. Only
//! `"success"` responses carry usable data.

use serde::Deserialize;
use serde_json::Map;
use uuid::Uuid;

use domain_settings_types::directory_adapter::{DirectoryGroup, GroupRank};
use domain_settings_types::prelude::*;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
	status: String,
	#[serde(default)]
	message: Option<String>,
	data: Option<T>,
}

impl<T> Envelope<T> {
	fn into_data(self) -> DsResult<T> {
		if self.status != "success" {
			return Err(Error::NetworkError(format!(
				"directory answered {}: {}",
				self.status,
				self.message.as_deref().unwrap_or("no message")
			)));
		}
		self.data.ok_or(Error::Parse)
	}
}

#[derive(Debug, Deserialize)]
struct GroupList {
	groups: Vec<DirectoryGroup>,
}

#[derive(Debug, Deserialize)]
struct GroupRanks {
	#[serde(default)]
	ranks: Vec<GroupRank>,
}

#[derive(Debug, Deserialize)]
struct RanksByGroup {
	groups: Map<String, serde_json::Value>,
}

/// `{"status":"success","data":{"groups":[{"id":..,"name":..}, ...]}}`
pub fn parse_group_names(body: &[u8]) -> DsResult<Vec<DirectoryGroup>> {
	let envelope: Envelope<GroupList> = serde_json::from_slice(body)?;
	Ok(envelope.into_data()?.groups)
}

/// `{"status":"success","data":{"groups":{"<id>":{"ranks":[{"name":..,"order":..}, ...]}}}}`
///
/// Group keys may carry curly braces; a response without the requested group is empty.
pub fn parse_group_ranks(body: &[u8], group_id: Uuid) -> DsResult<Vec<GroupRank>> {
	let envelope: Envelope<RanksByGroup> = serde_json::from_slice(body)?;
	let groups = envelope.into_data()?.groups;

	let Some(group) = groups.into_iter().find_map(|(key, value)| {
		Uuid::parse_str(key.trim_matches(['{', '}'])).ok().filter(|id| *id == group_id).map(|_| value)
	}) else {
		debug!("Directory returned no ranks for group {}", group_id);
		return Ok(Vec::new());
	};

	let ranks: GroupRanks = serde_json::from_value(group)?;
	Ok(ranks.ranks)
}

// vim: ts=4

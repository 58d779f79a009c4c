//! Common value types

use serde::{Deserialize, Serialize};

/// Unix timestamp in seconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Timestamp {
		Timestamp(chrono::Utc::now().timestamp())
	}

	pub fn add_seconds(&self, seconds: i64) -> Timestamp {
		Timestamp(self.0.saturating_add(seconds))
	}

	/// Seconds elapsed since `earlier` (negative if `earlier` is in the future)
	pub fn seconds_since(&self, earlier: Timestamp) -> i64 {
		self.0.saturating_sub(earlier.0)
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

// vim: ts=4

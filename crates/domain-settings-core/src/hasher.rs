//! Password digests stored in the settings document

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `password`
pub fn password_digest(password: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(password.as_bytes());
	hex::encode(hasher.finalize())
}

/// Whether `value` already has the shape of a [`password_digest`] output
pub fn is_password_digest(value: &str) -> bool {
	value.len() == 64 && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Digest `value` unless it is empty or already a digest
///
/// Only for upgrading stored values; a submitted password is always digested.
pub fn ensure_digest(value: &str) -> Option<String> {
	if value.is_empty() || is_password_digest(value) {
		None
	} else {
		Some(password_digest(value))
	}
}


// vim: ts=4

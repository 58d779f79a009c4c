//! HTTP basic authentication for the settings surface

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use base64::{Engine, engine::general_purpose::STANDARD};

use domain_settings_core::App;
use domain_settings_types::prelude::*;

/// Extracts `(username, password)` from an `Authorization: Basic` header
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
	let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
	let encoded = value.strip_prefix("Basic ").or_else(|| value.strip_prefix("basic "))?;
	let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
	let (username, password) = decoded.split_once(':')?;
	Some((username.to_string(), password.to_string()))
}

/// Check the request against the configured credentials
///
/// Without a configured username the surface is open.
pub fn authorize(app: &App, headers: &HeaderMap) -> DsResult<()> {
	let settings = app.settings.lock();
	if !settings.authentication_required() {
		return Ok(());
	}
	match basic_credentials(headers) {
		Some((username, password)) if settings.verify_credentials(&username, &password) => Ok(()),
		Some((username, _)) => {
			info!("Rejected settings credentials for {}", username);
			Err(Error::Unauthorized)
		}
		None => Err(Error::Unauthorized),
	}
}

// Admin //
//*******//
/// Extractor for handlers behind basic authentication
#[derive(Debug, Clone, Copy)]
pub struct Admin;

impl FromRequestParts<App> for Admin {
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, app: &App) -> Result<Self, Self::Rejection> {
		authorize(app, &parts.headers)?;
		Ok(Admin)
	}
}


// vim: ts=4

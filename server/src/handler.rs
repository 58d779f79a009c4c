//! Settings request handlers

use axum::{
	Json,
	extract::{Path, Query, State},
	http::HeaderMap,
	response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::{self, Admin};
use domain_settings_core::App;
use domain_settings_core::config_store::ConfigMap;
use domain_settings_types::prelude::*;

#[derive(Debug, Deserialize)]
pub struct SettingsQuery {
	#[serde(rename = "type")]
	pub assignment_type: Option<i64>,
}

/// GET /settings.json
///
/// With `?type=<n>` this is the public read for one assignment type, otherwise
/// the authenticated full read.
pub async fn get_settings(
	State(app): State<App>,
	Query(query): Query<SettingsQuery>,
	headers: HeaderMap,
) -> DsResult<Response> {
	if let Some(assignment_type) = query.assignment_type {
		let values = app.settings.lock().values_for_type(assignment_type);
		return Ok(Json(values).into_response());
	}

	auth::authorize(&app, &headers)?;
	let response = app.settings.lock().full_response();
	Ok(Json(response).into_response())
}

/// POST /settings.json
pub async fn post_settings(
	State(app): State<App>,
	_admin: Admin,
	Json(document): Json<ConfigMap>,
) -> DsResult<Json<Value>> {
	let outcome = app.settings.lock().apply_update(&document);
	if !outcome.skipped.is_empty() {
		info!("Settings update skipped {} keys: {:?}", outcome.skipped.len(), outcome.skipped);
	}
	app.after_update(&outcome);

	Ok(Json(json!({ "status": "success" })))
}

/// GET /permissions/{name}
pub async fn get_permissions(
	State(app): State<App>,
	_admin: Admin,
	Path(name): Path<String>,
) -> DsResult<Json<Value>> {
	let permissions = app.settings.lock().registry().effective_for_name(&name);
	let names: Vec<&str> = permissions.iter_names().map(|(name, _)| name).collect();

	Ok(Json(json!({ "name": name.to_lowercase(), "permissions": names })))
}

// vim: ts=4

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handler;
use domain_settings_core::App;

pub fn init(app: App) -> Router {
	Router::new()
		.route("/settings.json", get(handler::get_settings).post(handler::post_settings))
		.route("/permissions/{name}", get(handler::get_permissions))
		.layer(TraceLayer::new_for_http())
		.with_state(app)
}

// vim: ts=4

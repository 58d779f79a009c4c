//! Error type shared by every crate of the workspace

use axum::{
	Json,
	http::{StatusCode, header},
	response::IntoResponse,
};

pub type DsResult<T> = std::result::Result<T, Error>;

/// Exit code used when the settings description document is missing or malformed
pub const EXIT_MISSING_SETTINGS_DESCRIPTION: i32 = 6;
/// Exit code for every other startup failure
pub const EXIT_STARTUP_FAILURE: i32 = 1;

#[derive(Debug)]
pub enum Error {
	NotFound,
	PermissionDenied,
	Unauthorized,
	Parse,
	ValidationError(String),
	ConfigError(String),
	/// The settings description could not be loaded (fatal at startup)
	SchemaError(String),
	NetworkError(String),
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		tracing::debug!("JSON error: {}", err);
		Self::Parse
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::PermissionDenied => write!(f, "permission denied"),
			Error::Unauthorized => write!(f, "unauthorized"),
			Error::Parse => write!(f, "parse error"),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::ConfigError(msg) => write!(f, "configuration error: {}", msg),
			Error::SchemaError(msg) => write!(f, "settings description error: {}", msg),
			Error::NetworkError(msg) => write!(f, "network error: {}", msg),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "I/O error: {}", err),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(err) => Some(err),
			_ => None,
		}
	}
}

impl Error {
	/// Process exit code to use when this error aborts startup
	pub fn exit_code(&self) -> i32 {
		match self {
			Error::SchemaError(_) => EXIT_MISSING_SETTINGS_DESCRIPTION,
			_ => EXIT_STARTUP_FAILURE,
		}
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		match self {
			Error::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
			Error::PermissionDenied => (StatusCode::FORBIDDEN, "permission denied").into_response(),
			Error::Unauthorized => (
				StatusCode::UNAUTHORIZED,
				[(header::WWW_AUTHENTICATE, "Basic realm=\"domain-server\"")],
				"unauthorized",
			)
				.into_response(),
			Error::Parse | Error::ValidationError(_) => (
				StatusCode::BAD_REQUEST,
				Json(serde_json::json!({ "status": "error", "message": self.to_string() })),
			)
				.into_response(),
			_ => {
				tracing::error!("Request failed: {}", self);
				StatusCode::INTERNAL_SERVER_ERROR.into_response()
			}
		}
	}
}


// vim: ts=4

//! Domain server settings and permissions registry
//!
//! Owns the layered settings documents, the settings description, the node
//! permission tables and their migrations, and keeps group permissions in
//! sync with an external group directory.

pub mod app;
pub mod config_store;
pub mod directory;
pub mod hasher;
pub mod manager;
pub mod migration;
pub mod permissions;
pub mod prelude;
pub mod response;
pub mod schema;
pub mod update;
pub mod version;

pub use app::{App, AppBuilder, AppBuilderOpts, AppState};
pub use manager::SettingsManager;

// vim: ts=4

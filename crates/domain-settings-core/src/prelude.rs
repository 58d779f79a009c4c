pub use domain_settings_types::prelude::*;

pub use crate::app::{App, AppState};

// vim: ts=4

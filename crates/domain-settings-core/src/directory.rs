//! Group directory synchronization
//!
//! Resolves group names to IDs and refreshes group rank lists through the
//! configured [`GroupDirectory`]. Network calls run without holding the
//! settings lock; their results are applied under it afterwards.
//!
//! Every refresh belongs to one settings context. Once that context's restart
//! token is cancelled, calls in flight are abandoned and late results are
//! dropped, so a rebuilt context never has its document overwritten by the
//! previous one.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::prelude::*;
use domain_settings_types::directory_adapter::GroupDirectory;

/// Directory requests in flight at once during a refresh
const CONCURRENT_REQUESTS: usize = 4;

fn authenticated_directory(app: &App) -> Option<Arc<dyn GroupDirectory>> {
	let directory = app.directory.as_ref()?;
	if !directory.is_authenticated() {
		debug!("Group directory has no authentication context, skipping refresh");
		return None;
	}
	Some(directory.clone())
}

/// Await a directory call unless `cancel` fires first
async fn until_cancelled<T>(
	cancel: &CancellationToken,
	call: impl Future<Output = DsResult<T>>,
) -> Option<DsResult<T>> {
	tokio::select! {
		() = cancel.cancelled() => None,
		result = call => Some(result),
	}
}

/// Resolve unknown group names and refresh rank lists older than the stale threshold
///
/// Stops early when `cancel` fires.
pub async fn refresh_group_information(app: &App, cancel: &CancellationToken) {
	if cancel.is_cancelled() {
		return;
	}
	let Some(directory) = authenticated_directory(app) else {
		return;
	};

	let (names, stale) = {
		let settings = app.settings.lock();
		let registry = settings.registry();
		(
			registry.groups_needing_ids(),
			registry.stale_groups(Timestamp::now(), app.opts.group_stale_secs),
		)
	};
	if names.is_empty() && stale.is_empty() {
		return;
	}
	debug!("Refreshing group information: {} unresolved, {} stale", names.len(), stale.len());

	stream::iter(names)
		.for_each_concurrent(CONCURRENT_REQUESTS, |name| {
			let directory = directory.clone();
			async move { resolve_group_id(app, directory.as_ref(), &name, cancel).await }
		})
		.await;

	stream::iter(stale)
		.for_each_concurrent(CONCURRENT_REQUESTS, |group_id| {
			let directory = directory.clone();
			async move { resolve_group_ranks(app, directory.as_ref(), group_id, cancel).await }
		})
		.await;
}

/// Look up the ID of `name`; a binding that changes table entries triggers a rank lookup
pub async fn resolve_group_id(
	app: &App,
	directory: &dyn GroupDirectory,
	name: &str,
	cancel: &CancellationToken,
) {
	let groups = match until_cancelled(cancel, directory.resolve_group_id(name)).await {
		Some(Ok(groups)) => groups,
		Some(Err(e)) => {
			warn!("Group ID lookup for {} failed: {}", name, e);
			return;
		}
		None => {
			debug!("Group ID lookup for {} abandoned", name);
			return;
		}
	};

	let changed: Vec<Uuid> = {
		let mut settings = app.settings.lock();
		if cancel.is_cancelled() {
			debug!("Dropping group ID of {} for a retired settings context", name);
			return;
		}
		groups
			.into_iter()
			.filter(|group| settings.apply_group_id(&group.name, group.id))
			.map(|group| group.id)
			.collect()
	};

	for group_id in changed {
		resolve_group_ranks(app, directory, group_id, cancel).await;
	}
}

/// Fetch the rank list of a group and extend the tables to cover every rank
pub async fn resolve_group_ranks(
	app: &App,
	directory: &dyn GroupDirectory,
	group_id: Uuid,
	cancel: &CancellationToken,
) {
	app.settings.lock().registry_mut().mark_ranks_requested(group_id, Timestamp::now());

	match until_cancelled(cancel, directory.resolve_group_ranks(group_id)).await {
		Some(Ok(ranks)) => {
			let mut settings = app.settings.lock();
			if cancel.is_cancelled() {
				debug!("Dropping ranks of group {} for a retired settings context", group_id);
			} else if settings.apply_group_ranks(group_id, &ranks) {
				info!("Updated {} ranks for group {}", ranks.len(), group_id);
			}
		}
		Some(Err(e)) => warn!("Rank lookup for group {} failed: {}", group_id, e),
		None => debug!("Rank lookup for group {} abandoned", group_id),
	}
}

/// Refresh in the background without waiting for the directory
pub fn trigger_refresh(app: &App) {
	if app.directory.is_none() {
		return;
	}
	let app = app.clone();
	let cancel = app.restart.clone();
	tokio::spawn(async move { refresh_group_information(&app, &cancel).await });
}

/// Periodic refresh until `cancel` fires
pub fn spawn_sweep(app: App, period: Duration, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
	tokio::spawn(async move {
		let mut interval = tokio::time::interval(period);
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		// the first tick completes immediately; startup already triggered a refresh
		interval.tick().await;
		loop {
			tokio::select! {
				() = cancel.cancelled() => break,
				_ = interval.tick() => refresh_group_information(&app, &cancel).await,
			}
		}
		debug!("Group directory sweep stopped");
	})
}

// vim: ts=4

//! Periodic removal of stale presence entries.

use std::sync::Arc;
use std::time::Duration;

use storyforge_core::collaboration::{PRESENCE_STALE_TIMEOUT_SECS, PRESENCE_SWEEP_INTERVAL_SECS};
use tokio_util::sync::CancellationToken;

use crate::ws::{PresenceTracker, WsManager};

/// Run the sweep until `cancel` is triggered. Rooms whose presence changed
/// receive a fresh `presence.update`.
pub async fn run(
    presence: Arc<PresenceTracker>,
    ws_manager: Arc<WsManager>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(PRESENCE_SWEEP_INTERVAL_SECS));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Presence sweep stopping");
                break;
            }
            _ = interval.tick() => {
                let changed = presence.sweep(PRESENCE_STALE_TIMEOUT_SECS).await;
                if !changed.is_empty() {
                    tracing::debug!(projects = changed.len(), "Presence sweep removed stale users");
                }
                for project_id in changed {
                    presence.broadcast(&ws_manager, project_id).await;
                }
            }
        }
    }
}

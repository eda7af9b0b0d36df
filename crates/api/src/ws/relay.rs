//! Forwards project-scoped domain events from the bus into project rooms.

use std::sync::Arc;

use storyforge_core::collaboration::CollabMessage;
use storyforge_events::StoryEvent;
use tokio::sync::broadcast;

use crate::ws::manager::{collab_frame, WsManager};

/// Relay events until the bus closes. Events without a project are not
/// sent to clients.
pub async fn run_event_relay(
    ws_manager: Arc<WsManager>,
    mut rx: broadcast::Receiver<StoryEvent>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                let Some(project_id) = event.project_id else {
                    continue;
                };
                let message = CollabMessage::ProjectEvent {
                    project_id,
                    event_type: event.kind,
                    actor_user_id: event.actor_user_id,
                    payload: event.payload,
                };
                let sent = ws_manager
                    .broadcast_to_project(project_id, collab_frame(&message), None)
                    .await;
                tracing::trace!(project_id, sent, "Event relayed");
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Event relay lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!("Event bus closed, relay stopping");
                break;
            }
        }
    }
}

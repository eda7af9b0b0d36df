//! Durable activity log.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes every [`StoryEvent`] to `activity_events`. It runs as a
//! long-lived background task and stops when the bus sender is dropped.

use storyforge_core::types::DbId;
use storyforge_db::repositories::ActivityEventRepo;
use storyforge_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::StoryEvent;

pub struct EventPersistence;

impl EventPersistence {
    /// Persist events until the channel closes. Lag is logged and skipped.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<StoryEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            kind = %event.kind,
                            "Failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    pub async fn persist(pool: &DbPool, event: &StoryEvent) -> Result<DbId, sqlx::Error> {
        ActivityEventRepo::insert(
            pool,
            &event.kind,
            event.project_id,
            event.entity_type.as_deref(),
            event.entity_id,
            event.actor_user_id,
            &event.payload,
            event.timestamp,
        )
        .await
    }
}

//! Repository for the `activity_events` table.

use sqlx::PgPool;
use storyforge_core::types::{DbId, Timestamp};

use crate::models::activity::ActivityEvent;

const COLUMNS: &str = "id, kind, project_id, source_entity_type, source_entity_id, \
                        actor_user_id, payload, created_at";

pub struct ActivityEventRepo;

impl ActivityEventRepo {
    /// Insert a new event row, returning the generated ID.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        pool: &PgPool,
        kind: &str,
        project_id: Option<DbId>,
        source_entity_type: Option<&str>,
        source_entity_id: Option<DbId>,
        actor_user_id: Option<DbId>,
        payload: &serde_json::Value,
        created_at: Timestamp,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO activity_events \
                (kind, project_id, source_entity_type, source_entity_id, actor_user_id, \
                 payload, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id",
        )
        .bind(kind)
        .bind(project_id)
        .bind(source_entity_type)
        .bind(source_entity_id)
        .bind(actor_user_id)
        .bind(payload)
        .bind(created_at)
        .fetch_one(pool)
        .await
    }

    /// A project's recent activity, newest first.
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ActivityEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM activity_events
             WHERE project_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ActivityEvent>(&query)
            .bind(project_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}

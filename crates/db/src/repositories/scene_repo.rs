//! Repository for the `scenes` table.

use sqlx::{PgExecutor, PgPool};
use storyforge_core::story::{DEFAULT_EMOTIONAL_INTENSITY, DEFAULT_SCENE_TYPE};
use storyforge_core::types::DbId;

use crate::models::scene::{CreateScene, Scene, UpdateScene};

const COLUMNS: &str = "id, project_id, title, description, scene_type, order_index, location, \
                        conflict, emotional_intensity, word_count, dialog_count, hook, \
                        character_focus, created_at, updated_at";

pub struct SceneRepo;

impl SceneRepo {
    /// Insert a scene. Without an explicit `order_index` it goes after the
    /// project's last scene.
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        input: &CreateScene,
    ) -> Result<Scene, sqlx::Error> {
        let query = format!(
            "INSERT INTO scenes
                (project_id, title, description, scene_type, order_index, location, conflict,
                 emotional_intensity, hook, character_focus)
             VALUES ($1, $2, $3, COALESCE($4, '{DEFAULT_SCENE_TYPE}'),
                     COALESCE($5, (SELECT COALESCE(MAX(order_index) + 1, 0)
                                   FROM scenes WHERE project_id = $1)),
                     $6, $7, COALESCE($8, {DEFAULT_EMOTIONAL_INTENSITY}), $9, $10)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Scene>(&query)
            .bind(project_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.scene_type)
            .bind(input.order_index)
            .bind(&input.location)
            .bind(&input.conflict)
            .bind(input.emotional_intensity)
            .bind(&input.hook)
            .bind(&input.character_focus)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Scene>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scenes WHERE id = $1");
        sqlx::query_as::<_, Scene>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Scenes in story order.
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<Scene>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM scenes WHERE project_id = $1 ORDER BY order_index, id"
        );
        sqlx::query_as::<_, Scene>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateScene,
    ) -> Result<Option<Scene>, sqlx::Error> {
        let query = format!(
            "UPDATE scenes SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                scene_type = COALESCE($4, scene_type),
                order_index = COALESCE($5, order_index),
                location = COALESCE($6, location),
                conflict = COALESCE($7, conflict),
                emotional_intensity = COALESCE($8, emotional_intensity),
                word_count = COALESCE($9, word_count),
                dialog_count = COALESCE($10, dialog_count),
                hook = COALESCE($11, hook),
                character_focus = COALESCE($12, character_focus)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Scene>(&query)
            .bind(id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.scene_type)
            .bind(input.order_index)
            .bind(&input.location)
            .bind(&input.conflict)
            .bind(input.emotional_intensity)
            .bind(input.word_count)
            .bind(input.dialog_count)
            .bind(&input.hook)
            .bind(&input.character_focus)
            .fetch_optional(pool)
            .await
    }

    /// Renumber scenes so `scene_ids[i]` gets `order_index = i`.
    ///
    /// All ids must belong to `project_id`; otherwise nothing changes and
    /// `false` is returned.
    pub async fn reorder(
        pool: &PgPool,
        project_id: DbId,
        scene_ids: &[DbId],
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let result = sqlx::query(
            "UPDATE scenes s SET order_index = o.position - 1
             FROM UNNEST($2::BIGINT[]) WITH ORDINALITY AS o(id, position)
             WHERE s.id = o.id AND s.project_id = $1",
        )
        .bind(project_id)
        .bind(scene_ids)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != scene_ids.len() as u64 {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }

    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM scenes WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

//! Repository for the `scene_objects` link table.

use sqlx::{PgExecutor, PgPool};
use storyforge_core::story::significance;
use storyforge_core::types::DbId;

use crate::models::scene::{LinkSceneObject, SceneObjectLink};

/// Link columns joined with the object's name and type (`so` / `o` aliases).
const LINK_COLUMNS: &str = "so.id, so.scene_id, so.object_id, o.name, o.object_type, so.role, \
                        so.transformation, so.significance, so.interaction_type";

pub struct SceneObjectRepo;

impl SceneObjectRepo {
    /// Link an object to a scene. A duplicate link violates
    /// `uq_scene_objects_scene_object`.
    pub async fn link(
        pool: &PgPool,
        scene_id: DbId,
        input: &LinkSceneObject,
    ) -> Result<SceneObjectLink, sqlx::Error> {
        let query = format!(
            "WITH so AS (
                INSERT INTO scene_objects
                    (scene_id, object_id, role, transformation, significance, interaction_type)
                VALUES ($1, $2, $3, $4, COALESCE($5, '{supporting}'), $6)
                RETURNING *
             )
             SELECT {LINK_COLUMNS} FROM so JOIN story_objects o ON o.id = so.object_id",
            supporting = significance::SUPPORTING,
        );
        sqlx::query_as::<_, SceneObjectLink>(&query)
            .bind(scene_id)
            .bind(input.object_id)
            .bind(&input.role)
            .bind(&input.transformation)
            .bind(&input.significance)
            .bind(&input.interaction_type)
            .fetch_one(pool)
            .await
    }

    /// Link unless already linked. Returns `true` if a new link was made.
    pub async fn link_if_missing<'e>(
        db: impl PgExecutor<'e>,
        scene_id: DbId,
        object_id: DbId,
        significance: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO scene_objects (scene_id, object_id, significance)
             VALUES ($1, $2, $3)
             ON CONFLICT ON CONSTRAINT uq_scene_objects_scene_object DO NOTHING",
        )
        .bind(scene_id)
        .bind(object_id)
        .bind(significance)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn unlink(
        pool: &PgPool,
        scene_id: DbId,
        object_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM scene_objects WHERE scene_id = $1 AND object_id = $2")
            .bind(scene_id)
            .bind(object_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_for_scene(
        pool: &PgPool,
        scene_id: DbId,
    ) -> Result<Vec<SceneObjectLink>, sqlx::Error> {
        let query = format!(
            "SELECT {LINK_COLUMNS}
             FROM scene_objects so JOIN story_objects o ON o.id = so.object_id
             WHERE so.scene_id = $1
             ORDER BY o.object_type, o.name"
        );
        sqlx::query_as::<_, SceneObjectLink>(&query)
            .bind(scene_id)
            .fetch_all(pool)
            .await
    }

    /// Every link in the project, for assembling scene detail in bulk.
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<SceneObjectLink>, sqlx::Error> {
        let query = format!(
            "SELECT {LINK_COLUMNS}
             FROM scene_objects so
             JOIN story_objects o ON o.id = so.object_id
             JOIN scenes s ON s.id = so.scene_id
             WHERE s.project_id = $1
             ORDER BY so.scene_id, o.object_type, o.name"
        );
        sqlx::query_as::<_, SceneObjectLink>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }
}

//! Repository for the `story_objects` table.

use sqlx::{PgExecutor, PgPool};
use storyforge_core::story::{object_status, DEFAULT_IMPORTANCE};
use storyforge_core::types::DbId;

use crate::models::story_object::{
    CreateStoryObject, StoryObject, StoryObjectWithUsage, UpdateStoryObject,
};

const COLUMNS: &str = "id, project_id, name, object_type, description, importance, status, \
                        attributes, first_appearance, symbolic_meaning, character_role, \
                        created_at, updated_at";

const O_COLUMNS: &str = "o.id, o.project_id, o.name, o.object_type, o.description, \
                        o.importance, o.status, o.attributes, o.first_appearance, \
                        o.symbolic_meaning, o.character_role, o.created_at, o.updated_at";

pub struct StoryObjectRepo;

impl StoryObjectRepo {
    pub async fn create(
        pool: &PgPool,
        project_id: DbId,
        input: &CreateStoryObject,
    ) -> Result<StoryObject, sqlx::Error> {
        let query = format!(
            "INSERT INTO story_objects
                (project_id, name, object_type, description, importance, status, attributes,
                 first_appearance, symbolic_meaning, character_role)
             VALUES ($1, $2, $3, $4, COALESCE($5, '{DEFAULT_IMPORTANCE}'),
                     COALESCE($6, '{active}'), COALESCE($7, '{{}}'::jsonb), $8, $9, $10)
             RETURNING {COLUMNS}",
            active = object_status::ACTIVE,
        );
        sqlx::query_as::<_, StoryObject>(&query)
            .bind(project_id)
            .bind(&input.name)
            .bind(&input.object_type)
            .bind(&input.description)
            .bind(&input.importance)
            .bind(&input.status)
            .bind(&input.attributes)
            .bind(input.first_appearance)
            .bind(&input.symbolic_meaning)
            .bind(&input.character_role)
            .fetch_one(pool)
            .await
    }

    /// Return the project's object with this kind and (case-insensitive)
    /// name, creating it if missing.
    pub async fn find_or_create<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        object_type: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<StoryObject, sqlx::Error> {
        let query = format!(
            "INSERT INTO story_objects (project_id, name, object_type, description)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (project_id, object_type, (LOWER(name)))
                DO UPDATE SET name = story_objects.name
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StoryObject>(&query)
            .bind(project_id)
            .bind(name)
            .bind(object_type)
            .bind(description)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<StoryObject>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM story_objects WHERE id = $1");
        sqlx::query_as::<_, StoryObject>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Objects with their scene counts, optionally filtered by kind.
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: DbId,
        object_type: Option<&str>,
    ) -> Result<Vec<StoryObjectWithUsage>, sqlx::Error> {
        let query = format!(
            "SELECT {O_COLUMNS},
                    (SELECT COUNT(*) FROM scene_objects so WHERE so.object_id = o.id) AS scene_count
             FROM story_objects o
             WHERE o.project_id = $1 AND ($2::TEXT IS NULL OR o.object_type = $2)
             ORDER BY o.object_type, o.name"
        );
        sqlx::query_as::<_, StoryObjectWithUsage>(&query)
            .bind(project_id)
            .bind(object_type)
            .fetch_all(pool)
            .await
    }

    pub async fn update<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        input: &UpdateStoryObject,
    ) -> Result<Option<StoryObject>, sqlx::Error> {
        let query = format!(
            "UPDATE story_objects SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                importance = COALESCE($4, importance),
                status = COALESCE($5, status),
                attributes = COALESCE($6, attributes),
                first_appearance = COALESCE($7, first_appearance),
                symbolic_meaning = COALESCE($8, symbolic_meaning),
                character_role = COALESCE($9, character_role)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StoryObject>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.importance)
            .bind(&input.status)
            .bind(&input.attributes)
            .bind(input.first_appearance)
            .bind(&input.symbolic_meaning)
            .bind(&input.character_role)
            .fetch_optional(db)
            .await
    }

    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM story_objects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

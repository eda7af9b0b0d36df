//! Repository for the `projects` table.

use sqlx::{FromRow, PgExecutor, PgPool};
use storyforge_core::collaboration::collaborator_status;
use storyforge_core::story::{phases, DEFAULT_TARGET_WORD_COUNT};
use storyforge_core::types::DbId;

use crate::models::project::{CreateProject, Project, ProjectListItem, UpdateProject};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, title, description, genre, current_phase, \
                        target_word_count, current_word_count, tone, target_audience, \
                        estimated_scope, marketability, original_idea, attributes, \
                        created_at, updated_at";

/// `COLUMNS` qualified with the `p.` alias.
const P_COLUMNS: &str = "p.id, p.user_id, p.title, p.description, p.genre, p.current_phase, \
                        p.target_word_count, p.current_word_count, p.tone, p.target_audience, \
                        p.estimated_scope, p.marketability, p.original_idea, p.attributes, \
                        p.created_at, p.updated_at";

/// The caller's standing on a project.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectAccess {
    pub owner_id: DbId,
    /// Collaborator role, if the caller has a collaborator row.
    pub role: Option<String>,
    pub permissions: Option<serde_json::Value>,
    pub status: Option<String>,
}

/// Provides CRUD operations for projects.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a new project owned by `user_id`, returning the created row.
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        user_id: DbId,
        input: &CreateProject,
    ) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects
                (user_id, title, description, genre, current_phase, target_word_count, tone,
                 target_audience, estimated_scope, marketability, original_idea, attributes)
             VALUES ($1, $2, $3, $4, COALESCE($5, '{idea}'), COALESCE($6, {target}), $7, $8, $9,
                     COALESCE($10, 3), $11, COALESCE($12, '{{}}'::jsonb))
             RETURNING {COLUMNS}",
            idea = phases::IDEA,
            target = DEFAULT_TARGET_WORD_COUNT,
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(user_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.genre)
            .bind(&input.current_phase)
            .bind(input.target_word_count)
            .bind(&input.tone)
            .bind(&input.target_audience)
            .bind(&input.estimated_scope)
            .bind(input.marketability)
            .bind(&input.original_idea)
            .bind(&input.attributes)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Projects the user owns or actively collaborates on, most recently
    /// updated first.
    pub async fn list_accessible(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<ProjectListItem>, sqlx::Error> {
        let query = format!(
            "SELECT {P_COLUMNS},
                    (SELECT COUNT(*) FROM scenes s WHERE s.project_id = p.id) AS scene_count,
                    CASE WHEN p.user_id = $1 THEN 'owner' ELSE c.role END AS access_role
             FROM projects p
             LEFT JOIN project_collaborators c
                ON c.project_id = p.id AND c.user_id = $1 AND c.status = '{active}'
             WHERE p.user_id = $1 OR c.id IS NOT NULL
             ORDER BY p.updated_at DESC, p.id DESC",
            active = collaborator_status::ACTIVE,
        );
        sqlx::query_as::<_, ProjectListItem>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    pub async fn count_owned(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Owner id plus the user's collaborator row, if any. `None` when the
    /// project does not exist.
    pub async fn access(
        pool: &PgPool,
        project_id: DbId,
        user_id: DbId,
    ) -> Result<Option<ProjectAccess>, sqlx::Error> {
        sqlx::query_as::<_, ProjectAccess>(
            "SELECT p.user_id AS owner_id, c.role, c.permissions, c.status
             FROM projects p
             LEFT JOIN project_collaborators c ON c.project_id = p.id AND c.user_id = $2
             WHERE p.id = $1",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Update a project. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateProject,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!(
            "UPDATE projects SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                genre = COALESCE($4, genre),
                current_phase = COALESCE($5, current_phase),
                target_word_count = COALESCE($6, target_word_count),
                current_word_count = COALESCE($7, current_word_count),
                tone = COALESCE($8, tone),
                target_audience = COALESCE($9, target_audience),
                estimated_scope = COALESCE($10, estimated_scope),
                marketability = COALESCE($11, marketability),
                attributes = COALESCE($12, attributes)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.genre)
            .bind(&input.current_phase)
            .bind(input.target_word_count)
            .bind(input.current_word_count)
            .bind(&input.tone)
            .bind(&input.target_audience)
            .bind(&input.estimated_scope)
            .bind(input.marketability)
            .bind(&input.attributes)
            .fetch_optional(pool)
            .await
    }

    /// Move the project into `phase` and record the story word count.
    pub async fn set_phase<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        phase: &str,
        current_word_count: Option<i32>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE projects SET
                current_phase = $2,
                current_word_count = COALESCE($3, current_word_count)
             WHERE id = $1",
        )
        .bind(id)
        .bind(phase)
        .bind(current_word_count)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Delete a project and, through cascades, everything it owns.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
